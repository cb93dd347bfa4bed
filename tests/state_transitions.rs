use donations_gateway::domain::donation::{decide_transition, DonationStatus, TransitionDecision};
use donations_gateway::service::ledger::goal_newly_reached;
use rust_decimal_macros::dec;

#[test]
fn pending_accepts_either_terminal() {
    assert_eq!(
        decide_transition(DonationStatus::Pending, DonationStatus::Completed),
        TransitionDecision::Apply
    );
    assert_eq!(
        decide_transition(DonationStatus::Pending, DonationStatus::Failed),
        TransitionDecision::Apply
    );
}

#[test]
fn terminal_repeat_is_a_noop() {
    assert_eq!(
        decide_transition(DonationStatus::Completed, DonationStatus::Completed),
        TransitionDecision::AlreadyApplied
    );
    assert_eq!(
        decide_transition(DonationStatus::Failed, DonationStatus::Failed),
        TransitionDecision::AlreadyApplied
    );
}

#[test]
fn terminal_never_flips_to_the_other_terminal() {
    assert_eq!(
        decide_transition(DonationStatus::Completed, DonationStatus::Failed),
        TransitionDecision::Conflict
    );
    assert_eq!(
        decide_transition(DonationStatus::Failed, DonationStatus::Completed),
        TransitionDecision::Conflict
    );
}

#[test]
fn non_terminal_incoming_is_ignored_everywhere() {
    for current in [
        DonationStatus::Pending,
        DonationStatus::Completed,
        DonationStatus::Failed,
    ] {
        assert_eq!(
            decide_transition(current, DonationStatus::Pending),
            TransitionDecision::AlreadyApplied
        );
    }
}

#[test]
fn goal_fires_only_on_the_crossing_donation() {
    let goal = dec!(1000);
    assert!(goal_newly_reached(goal, dec!(950), dec!(1000)));
    assert!(goal_newly_reached(goal, dec!(999.99), dec!(1049.99)));
    // Already past the goal: no second signal.
    assert!(!goal_newly_reached(goal, dec!(1000), dec!(1050)));
    assert!(!goal_newly_reached(goal, dec!(1200), dec!(1250)));
    // Still short of it.
    assert!(!goal_newly_reached(goal, dec!(100), dec!(150)));
}

#[test]
fn zero_goal_never_fires() {
    assert!(!goal_newly_reached(dec!(0), dec!(0), dec!(500)));
}
