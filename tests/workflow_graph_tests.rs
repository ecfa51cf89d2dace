use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use grant_lifecycle::workflow::WITHDRAWABLE_STATES;
use grant_lifecycle::{ProposalState, ProposalTransition, ProposalWorkflow};

mod fixtures;

use ProposalState as S;
use ProposalTransition as T;

#[test]
fn test_graph_matches_fixture() {
    let workflow = ProposalWorkflow::new();
    let actual: BTreeSet<_> = workflow.all_transitions().into_iter().collect();
    let expected: BTreeSet<_> = fixtures::expected_edges().into_iter().collect();

    assert_eq!(expected.len(), 40);
    assert_eq!(actual, expected);
}

#[test]
fn test_every_state_is_part_of_the_graph() {
    let workflow = ProposalWorkflow::new();
    let all: BTreeSet<_> = ProposalState::ALL.into_iter().collect();
    assert_eq!(workflow.engine().all_states(), all);
}

#[test]
fn test_every_state_reachable_from_draft() {
    let workflow = ProposalWorkflow::new();
    let mut seen = BTreeSet::from([S::Draft]);
    let mut queue = VecDeque::from([S::Draft]);

    while let Some(state) = queue.pop_front() {
        for transition in workflow.available_transitions(state) {
            let next = workflow.next_state(state, transition).unwrap();
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    assert_eq!(seen.len(), ProposalState::ALL.len());
}

#[test]
fn test_terminal_states_are_exactly_the_dead_ends() {
    let workflow = ProposalWorkflow::new();
    for state in ProposalState::ALL {
        let outgoing = workflow.available_transitions(state);
        assert_eq!(state.is_terminal(), outgoing.is_empty(), "{state}");
    }
}

#[test]
fn test_listing_agrees_with_next_state() {
    let workflow = ProposalWorkflow::new();
    for state in ProposalState::ALL {
        let available = workflow.available_transitions(state);
        for transition in ProposalTransition::ALL {
            assert_eq!(
                available.contains(&transition),
                workflow.next_state(state, transition).is_ok(),
                "{state} / {transition}"
            );
            assert_eq!(
                workflow.can_transition(state, transition),
                available.contains(&transition)
            );
        }
    }
}

#[test]
fn test_withdraw_eligibility() {
    let workflow = ProposalWorkflow::new();
    for state in WITHDRAWABLE_STATES {
        assert_eq!(workflow.next_state(state, T::Withdraw), Ok(S::Withdrawn), "{state}");
    }

    let ineligible = [
        S::Rejected,
        S::Submitted,
        S::UnderReview,
        S::Awarded,
        S::Negotiation,
        S::Declined,
        S::NotFunded,
        S::Active,
        S::Closeout,
        S::Closed,
        S::Withdrawn,
    ];
    for state in ineligible {
        assert!(!workflow.can_transition(state, T::Withdraw), "{state}");
    }
    assert_eq!(WITHDRAWABLE_STATES.len() + ineligible.len(), ProposalState::ALL.len());
}

#[test]
fn test_rejected_can_only_reopen_to_draft() {
    let workflow = ProposalWorkflow::new();
    assert_eq!(
        workflow.available_transitions(S::Rejected),
        BTreeSet::from([T::Reopen])
    );
    assert_eq!(workflow.next_state(S::Rejected, T::Reopen), Ok(S::Draft));
}

#[test]
fn test_happy_path_walks_to_closed() {
    let workflow = ProposalWorkflow::new();
    let end = fixtures::HAPPY_PATH
        .into_iter()
        .try_fold(S::Draft, |state, transition| workflow.next_state(state, transition))
        .unwrap();
    assert_eq!(end, S::Closed);
}

#[test]
fn test_guard_vetoes_one_symbol_everywhere() {
    let workflow = ProposalWorkflow::new();
    workflow.engine().add_guard(T::Award, |_, _| false);

    assert!(!workflow.can_transition(S::UnderReview, T::Award));
    assert!(!workflow.can_transition(S::Negotiation, T::Award));
    assert!(!workflow.available_transitions(S::UnderReview).contains(&T::Award));
    assert!(workflow.can_transition(S::UnderReview, T::Negotiate));
}

#[test]
fn test_guards_combine_with_and() {
    let workflow = ProposalWorkflow::new();
    workflow.engine().add_guard(T::Decline, |_, _| true);
    assert!(workflow.can_transition(S::Negotiation, T::Decline));

    workflow
        .engine()
        .add_guard(T::Decline, |from, _| from != S::Negotiation);
    assert!(!workflow.can_transition(S::Negotiation, T::Decline));
    assert!(workflow.can_transition(S::UnderReview, T::Decline));
}

#[test]
fn test_execute_transition_fires_exit_then_enter() {
    let workflow = ProposalWorkflow::new();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let exits = Arc::clone(&order);
    workflow
        .engine()
        .on_exit(S::Awarded, move |next| exits.lock().unwrap().push(format!("exit->{next}")));
    let enters = Arc::clone(&order);
    workflow
        .engine()
        .on_enter(S::Active, move |prev| enters.lock().unwrap().push(format!("enter<-{prev}")));

    let next = workflow.engine().execute_transition(S::Awarded, T::Activate).unwrap();
    assert_eq!(next, S::Active);
    assert_eq!(
        *order.lock().unwrap(),
        vec![
            format!("exit->{}", S::Active),
            format!("enter<-{}", S::Awarded)
        ]
    );
}

#[test]
fn test_failed_execute_fires_no_hooks() {
    let workflow = ProposalWorkflow::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    workflow.engine().on_exit(S::Closed, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(workflow.engine().execute_transition(S::Closed, T::Reopen).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_clone_topology_drops_guards() {
    let workflow = ProposalWorkflow::new();
    workflow.engine().add_guard(T::Close, |_, _| false);

    let copy = workflow.engine().clone_topology();
    assert_eq!(copy.edge_count(), 40);
    assert!(copy.can_transition(S::Closeout, T::Close));
    assert!(!workflow.can_transition(S::Closeout, T::Close));
}

#[test]
fn test_concurrent_readers_see_consistent_graph() {
    let workflow = Arc::new(ProposalWorkflow::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let workflow = Arc::clone(&workflow);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    for state in ProposalState::ALL {
                        let _ = workflow.available_transitions(state);
                    }
                }
                workflow.all_transitions().len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 40);
    }
}
