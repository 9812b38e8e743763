use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::endpoints::StatusState;
use crate::membership::MembershipMetricsSnapshot;
use crate::types::GroupId;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub bot: String,
    pub uptime_seconds: i64,
    pub started_at: DateTime<Utc>,
    pub groups: Vec<GroupId>,
}

#[derive(Debug, Serialize)]
pub struct GroupStatus {
    pub id: GroupId,
    pub label: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub bot_name: String,
    pub status: &'static str,
    pub total_users: usize,
    pub groups: Vec<GroupStatus>,
    pub membership_cache: MembershipMetricsSnapshot,
}

/// A handler for liveness probes and keep-alive pings
pub async fn health_handler(State(state): State<StatusState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.started_at);
    Json(HealthResponse {
        status: "alive",
        bot: state.bot_name.clone(),
        uptime_seconds: uptime.num_seconds().max(0),
        started_at: state.started_at,
        groups: state.groups.iter().map(|group| group.id.clone()).collect(),
    })
}

/// A handler reporting user count, configured groups and cache counters
pub async fn status_handler(State(state): State<StatusState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        bot_name: state.bot_name.clone(),
        status: "running",
        total_users: state.ledger.user_count(),
        groups: state
            .groups
            .iter()
            .map(|group| GroupStatus {
                id: group.id.clone(),
                label: group.label.clone(),
                url: group.join_url().map(|url| url.to_string()),
            })
            .collect(),
        membership_cache: state.membership.metrics(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_groups, test_membership_cache, ScriptedMembershipSource};
    use crate::types::{Feature, UserId};
    use crate::usage_limit::UsageLedger;
    use chrono::Duration;
    use std::sync::Arc;

    fn state() -> StatusState {
        StatusState {
            bot_name: "Artemius AI".to_string(),
            groups: Arc::new(test_groups()),
            ledger: Arc::new(UsageLedger::new(2)),
            membership: Arc::new(test_membership_cache(Arc::new(
                ScriptedMembershipSource::default(),
            ))),
            started_at: Utc::now() - Duration::seconds(90),
        }
    }

    #[tokio::test]
    async fn test_health_handler() {
        let Json(response) = health_handler(State(state())).await;

        assert_eq!(response.status, "alive");
        assert_eq!(response.bot, "Artemius AI");
        assert!(response.uptime_seconds >= 90);
        assert_eq!(
            response.groups,
            vec![GroupId::from("@one"), GroupId::from("@two")]
        );
    }

    #[tokio::test]
    async fn test_status_handler_counts_users() {
        let state = state();
        state.ledger.touch(UserId(1), Utc::now());
        state.ledger.record_use(UserId(2), Feature::Chat, Utc::now());
        state.membership.is_entitled(UserId(1), Utc::now()).await;

        let Json(response) = status_handler(State(state)).await;
        assert_eq!(response.status, "running");
        assert_eq!(response.total_users, 2);
        assert_eq!(response.groups.len(), 2);
        assert_eq!(response.groups[0].url.as_deref(), Some("https://t.me/one"));
        assert_eq!(response.membership_cache.misses, 1);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["membership_cache"]["external_checks"], 1);
    }
}
