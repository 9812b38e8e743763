use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::GroupConfig;
use crate::membership::MembershipCache;
use crate::usage_limit::UsageLedger;

pub mod status;

/// Read-only view of the bot served by the status endpoints
#[derive(Clone)]
pub struct StatusState {
    pub bot_name: String,
    pub groups: Arc<Vec<GroupConfig>>,
    pub ledger: Arc<UsageLedger>,
    pub membership: Arc<MembershipCache>,
    pub started_at: DateTime<Utc>,
}

pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(status::health_handler))
        .route("/ping", get(status::health_handler))
        .route("/health", get(status::health_handler))
        .route("/status", get(status::status_handler))
        .with_state(state)
}
