use grant_lifecycle::proposal::{NewProposal, Proposal, ProposalUpdates};
use grant_lifecycle::workflow::WITHDRAWABLE_STATES;
use grant_lifecycle::{
    roles, ActorContext, EventPayload, ProposalError, ProposalState, ProposalTransition,
    ProposalWorkflow, TransitionRequest, UnlistedStatePolicy,
};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod fixtures;

use fixtures::Tenant;
use ProposalState as S;
use ProposalTransition as T;

fn new_proposal(tenant: &Tenant, pi: &ActorContext) -> Proposal {
    let input = fixtures::create_input(pi.actor_id);
    Proposal::new(NewProposal {
        tenant_id: tenant.id,
        created_by: pi.actor_id,
        title: input.title,
        principal_investigator_id: pi.actor_id,
        sponsor_id: input.sponsor_id,
        department: input.department,
        project_period: input.project_period,
    })
}

/// Shortest transition sequence from Draft to `target`.
fn path_to(workflow: &ProposalWorkflow, target: ProposalState) -> Vec<ProposalTransition> {
    let mut came_from: HashMap<ProposalState, (ProposalState, ProposalTransition)> = HashMap::new();
    let mut queue = VecDeque::from([S::INITIAL]);
    while let Some(state) = queue.pop_front() {
        if state == target {
            break;
        }
        for transition in workflow.available_transitions(state) {
            let Ok(next) = workflow.next_state(state, transition) else {
                continue;
            };
            if next != S::INITIAL && !came_from.contains_key(&next) {
                came_from.insert(next, (state, transition));
                queue.push_back(next);
            }
        }
    }

    let mut path = Vec::new();
    let mut state = target;
    while let Some(&(previous, transition)) = came_from.get(&state) {
        path.push(transition);
        state = previous;
    }
    path.reverse();
    path
}

fn step(
    proposal: &mut Proposal,
    workflow: &ProposalWorkflow,
    actor: &ActorContext,
    transition: ProposalTransition,
) -> Result<ProposalState, ProposalError> {
    let request = TransitionRequest::new(transition).expecting_version(proposal.version());
    proposal
        .transition_to(workflow, actor, request)
        .map(|outcome| outcome.to)
}

#[test]
fn test_role_holders_drive_review_chain_to_approval() {
    let workflow = ProposalWorkflow::new();
    let tenant = Tenant::new();
    let pi = tenant.actor(&[roles::PI]);
    let mut proposal = new_proposal(&tenant, &pi);

    let chain = [
        (tenant.actor(&[roles::PI]), T::Start, S::InProgress),
        (tenant.actor(&[roles::PROPOSAL_CREATOR]), T::SubmitForReview, S::InternalReview),
        (tenant.actor(&[roles::REVIEWER]), T::AdvanceReview, S::DeptReview),
        (tenant.actor(&[roles::DEPT_HEAD]), T::AdvanceReview, S::OspReview),
        (tenant.actor(&[roles::OSP_OFFICER]), T::AdvanceReview, S::Compliance),
        (tenant.actor(&[roles::COMPLIANCE_OFFICER]), T::AdvanceReview, S::BudgetReview),
        (tenant.actor(&[roles::BUDGET_OFFICER]), T::AdvanceReview, S::PendingApproval),
        (tenant.actor(&[roles::AUTHORIZED_SIGNATORY]), T::Approve, S::Approved),
        (tenant.actor(&[roles::OSP_OFFICER]), T::SubmitToSponsor, S::ReadyToSubmit),
    ];
    for (actor, transition, expected) in &chain {
        assert_eq!(step(&mut proposal, &workflow, actor, *transition), Ok(*expected));
    }

    assert_eq!(proposal.version(), 10);
    assert_eq!(proposal.history().len(), 9);
    assert!(proposal
        .history()
        .windows(2)
        .all(|pair| pair[0].to_state == pair[1].from_state));
}

#[test]
fn test_deny_policy_blocks_unlisted_states_except_owner_withdraw() {
    let workflow = ProposalWorkflow::new();
    let tenant = Tenant::new();
    let pi = tenant.actor(&[roles::PI]);
    let admin = tenant.administrator();
    let mut proposal = new_proposal(&tenant, &pi);

    for transition in [T::Start, T::SubmitForReview] {
        step(&mut proposal, &workflow, &pi, transition).unwrap();
    }
    step(&mut proposal, &workflow, &admin, T::RequestRevisions).unwrap();
    assert_eq!(proposal.state(), S::Revisions);

    let err = step(&mut proposal, &workflow, &admin, T::SubmitForReview).unwrap_err();
    assert!(matches!(err, ProposalError::Unauthorized { state: S::Revisions, .. }));

    assert_eq!(step(&mut proposal, &workflow, &pi, T::Withdraw), Ok(S::Withdrawn));
    assert!(proposal.is_terminal());
}

#[test]
fn test_permit_policy_opens_unlisted_states() {
    let workflow = ProposalWorkflow::with_policy(UnlistedStatePolicy::Permit);
    let tenant = Tenant::new();
    let pi = tenant.actor(&[roles::PI]);
    let reviewer = tenant.actor(&[roles::REVIEWER]);
    let mut proposal = new_proposal(&tenant, &pi);

    for transition in [T::Start, T::SubmitForReview] {
        step(&mut proposal, &workflow, &pi, transition).unwrap();
    }
    step(&mut proposal, &workflow, &reviewer, T::RequestRevisions).unwrap();

    // Revisions has no registry entry, so any tenant member may resubmit
    assert_eq!(
        step(&mut proposal, &workflow, &reviewer, T::SubmitForReview),
        Ok(S::InternalReview)
    );
}

#[test]
fn test_full_path_history_and_events() {
    let workflow = ProposalWorkflow::with_policy(UnlistedStatePolicy::Permit);
    let tenant = Tenant::new();
    let admin = tenant.administrator();
    let mut proposal = new_proposal(&tenant, &admin);
    let created = proposal.take_pending_events();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].version, 1);

    for transition in fixtures::HAPPY_PATH {
        step(&mut proposal, &workflow, &admin, transition).unwrap();
    }

    assert_eq!(proposal.state(), S::Closed);
    assert_eq!(proposal.version(), 16);
    assert_eq!(proposal.history().len(), 15);

    let events = proposal.take_pending_events();
    assert_eq!(events.len(), 15);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.version, i as u64 + 2);
        assert_eq!(event.aggregate_id, proposal.id());
        assert!(matches!(
            event.payload,
            EventPayload::ProposalStateChanged { .. }
        ));
    }
    assert!(proposal.take_pending_events().is_empty());
}

#[test]
fn test_revisions_loop_restarts_review() {
    let workflow = ProposalWorkflow::with_policy(UnlistedStatePolicy::Permit);
    let tenant = Tenant::new();
    let admin = tenant.administrator();
    let mut proposal = new_proposal(&tenant, &admin);

    for transition in [
        T::Start,
        T::SubmitForReview,
        T::AdvanceReview,
        T::AdvanceReview,
        T::RequestRevisions,
        T::SubmitForReview,
    ] {
        step(&mut proposal, &workflow, &admin, transition).unwrap();
    }

    assert_eq!(proposal.state(), S::InternalReview);
    let visits = proposal
        .history()
        .iter()
        .filter(|record| record.to_state == S::InternalReview)
        .count();
    assert_eq!(visits, 2);
}

#[test]
fn test_rejection_then_reopen_returns_to_draft() {
    let workflow = ProposalWorkflow::with_policy(UnlistedStatePolicy::Permit);
    let tenant = Tenant::new();
    let admin = tenant.administrator();
    let mut proposal = new_proposal(&tenant, &admin);

    for transition in fixtures::HAPPY_PATH.iter().take(7) {
        step(&mut proposal, &workflow, &admin, *transition).unwrap();
    }
    assert_eq!(proposal.state(), S::PendingApproval);

    step(&mut proposal, &workflow, &admin, T::Reject).unwrap();
    let err = step(&mut proposal, &workflow, &admin, T::Withdraw).unwrap_err();
    assert!(matches!(err, ProposalError::InvalidTransition { from: S::Rejected, .. }));

    step(&mut proposal, &workflow, &admin, T::Reopen).unwrap();
    assert_eq!(proposal.state(), S::Draft);
    assert!(proposal.can_edit());
}

#[test]
fn test_stale_version_leaves_proposal_unchanged() {
    let workflow = ProposalWorkflow::new();
    let tenant = Tenant::new();
    let pi = tenant.actor(&[roles::PI]);
    let mut proposal = new_proposal(&tenant, &pi);
    let before = proposal.clone();

    let request = TransitionRequest::new(T::Start).expecting_version(5);
    let err = proposal.transition_to(&workflow, &pi, request).unwrap_err();

    assert_eq!(err, ProposalError::VersionConflict { expected: 5, actual: 1 });
    assert!(err.is_retryable());
    assert_eq!(proposal, before);
}

#[test]
fn test_edits_follow_editable_states() {
    let workflow = ProposalWorkflow::with_policy(UnlistedStatePolicy::Permit);
    let tenant = Tenant::new();
    let admin = tenant.administrator();
    let mut proposal = new_proposal(&tenant, &admin);

    let updates = ProposalUpdates {
        keywords: Some(vec!["climate".to_string()]),
        ..Default::default()
    };
    proposal.update(admin.actor_id, updates.clone()).unwrap();
    assert_eq!(proposal.version(), 1);

    for transition in [T::Start, T::SubmitForReview] {
        step(&mut proposal, &workflow, &admin, transition).unwrap();
    }
    let err = proposal.update(admin.actor_id, updates.clone()).unwrap_err();
    assert_eq!(err.error_code(), "NOT_EDITABLE");
    assert_eq!(err.status_code(), 409);

    step(&mut proposal, &workflow, &admin, T::RequestRevisions).unwrap();
    assert!(proposal.update(admin.actor_id, updates).is_ok());
}

#[test]
fn test_owner_without_roles_withdraws_only_from_withdrawable_states() {
    let permissive = ProposalWorkflow::with_policy(UnlistedStatePolicy::Permit);
    let workflow = ProposalWorkflow::new();
    let tenant = Tenant::new();
    let admin = tenant.administrator();
    let pi = tenant.actor(&[]);

    for target in ProposalState::ALL {
        let mut proposal = new_proposal(&tenant, &pi);
        for transition in path_to(&permissive, target) {
            step(&mut proposal, &permissive, &admin, transition).unwrap();
        }
        assert_eq!(proposal.state(), target);
        let version = proposal.version();

        let result = step(&mut proposal, &workflow, &pi, T::Withdraw);
        if WITHDRAWABLE_STATES.contains(&target) {
            assert_eq!(result, Ok(S::Withdrawn), "withdraw from {target}");
            assert_eq!(proposal.version(), version + 1);
        } else {
            assert_eq!(
                result,
                Err(ProposalError::InvalidTransition {
                    from: target,
                    transition: T::Withdraw,
                }),
                "withdraw from {target}"
            );
            assert_eq!(proposal.state(), target);
            assert_eq!(proposal.version(), version);
        }
    }
}

#[test]
fn test_engine_guards_apply_to_proposals_but_hooks_do_not() {
    let workflow = ProposalWorkflow::new();
    let tenant = Tenant::new();
    let pi = tenant.actor(&[roles::PI]);

    let entered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&entered);
    workflow.engine().on_enter(S::InProgress, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut proposal = new_proposal(&tenant, &pi);
    assert_eq!(step(&mut proposal, &workflow, &pi, T::Start), Ok(S::InProgress));
    assert_eq!(entered.load(Ordering::SeqCst), 0);

    assert_eq!(workflow.engine().execute_transition(S::Draft, T::Start), Ok(S::InProgress));
    assert_eq!(entered.load(Ordering::SeqCst), 1);

    workflow
        .engine()
        .add_guard(T::SubmitForReview, |_, _| false);
    assert_eq!(
        step(&mut proposal, &workflow, &pi, T::SubmitForReview),
        Err(ProposalError::InvalidTransition {
            from: S::InProgress,
            transition: T::SubmitForReview,
        })
    );
    assert_eq!(proposal.state(), S::InProgress);
}
