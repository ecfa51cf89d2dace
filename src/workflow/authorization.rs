use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::metadata::StateMetadataRegistry;
use super::states::{ProposalState, ProposalTransition};

/// Caller identity supplied by the authentication layer. Roles are scoped to `tenant_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub roles: BTreeSet<String>,
}

impl ActorContext {
    pub fn new<I, R>(tenant_id: Uuid, actor_id: Uuid, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            tenant_id,
            actor_id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// How transitions out of a state without a registry entry are authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlistedStatePolicy {
    /// The fallback metadata has no required roles, so only the owner may withdraw.
    #[default]
    Deny,
    /// States without an entry carry no role gate.
    Permit,
}

/// Role check for `transition` out of `state`.
///
/// Permitted when the actor holds one of the state's required roles, or when the actor owns
/// the proposal and is withdrawing it.
pub fn is_authorized(
    registry: &StateMetadataRegistry,
    policy: UnlistedStatePolicy,
    actor: &ActorContext,
    owner_id: Uuid,
    state: ProposalState,
    transition: ProposalTransition,
) -> bool {
    if registry.get(state).permits_any(&actor.roles) {
        return true;
    }
    if transition == ProposalTransition::Withdraw && actor.actor_id == owner_id {
        return true;
    }
    policy == UnlistedStatePolicy::Permit && !registry.is_listed(state)
}
