use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::membership::MembershipCache;
use crate::router::ConversationState;
use crate::types::UserId;
use crate::usage_limit::UsageLedger;

/// Process-wide state shared by the router: usage, membership verdicts,
/// conversation states and the per-user locks that serialize them.
pub struct CoreStore {
    pub ledger: Arc<UsageLedger>,
    pub membership: Arc<MembershipCache>,
    states: DashMap<UserId, ConversationState>,
    user_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl CoreStore {
    pub fn new(ledger: Arc<UsageLedger>, membership: Arc<MembershipCache>) -> Self {
        Self {
            ledger,
            membership,
            states: DashMap::new(),
            user_locks: DashMap::new(),
        }
    }

    /// Current state, `Idle` for users never seen
    pub fn state(&self, user_id: UserId) -> ConversationState {
        self.states
            .get(&user_id)
            .map(|state| *state.value())
            .unwrap_or_default()
    }

    pub fn set_state(&self, user_id: UserId, state: ConversationState) {
        self.states.insert(user_id, state);
    }

    pub fn reset_state(&self, user_id: UserId) {
        self.states.remove(&user_id);
    }

    /// Lock guarding every read-check-write sequence for one user
    pub fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        Arc::clone(self.user_locks.entry(user_id).or_default().value())
    }
}
