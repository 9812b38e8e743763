mod state;

pub use state::ConversationState;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ErrorDetails;
use crate::generation::{GenerationRequest, Generators};
use crate::menu::{
    MenuAction, MenuPresenter, CHECK_SUBSCRIPTIONS_CALLBACK, SKIP_SUBSCRIPTIONS_CALLBACK,
};
use crate::store::CoreStore;
use crate::transport::{EventPayload, InboundEvent, Reply};
use crate::types::{Feature, GroupId, Tier, UserId};
use crate::usage_limit::{AdmissionDecision, QuotaPolicy};

pub const START_COMMAND: &str = "/start";

/// Per-user conversational state machine.
///
/// Every event for a user runs under that user's lock, so admission,
/// usage recording and the state transition are never interleaved with
/// another event from the same user.
pub struct ConversationRouter {
    store: Arc<CoreStore>,
    policy: QuotaPolicy,
    presenter: MenuPresenter,
    generators: Generators,
    generation_timeout: Duration,
}

impl ConversationRouter {
    pub fn new(
        store: Arc<CoreStore>,
        policy: QuotaPolicy,
        presenter: MenuPresenter,
        generators: Generators,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            presenter,
            generators,
            generation_timeout,
        }
    }

    pub fn store(&self) -> &Arc<CoreStore> {
        &self.store
    }

    pub async fn handle(&self, event: &InboundEvent, now: DateTime<Utc>) -> Vec<Reply> {
        let user_id = event.user_id;
        let lock = self.store.user_lock(user_id);
        let _guard = lock.lock().await;

        self.store.ledger.touch(user_id, now);

        match &event.payload {
            EventPayload::Command(command) if command == START_COMMAND => {
                self.start(user_id, now).await
            }
            EventPayload::Callback { data, .. } => self.callback(user_id, data, now).await,
            EventPayload::Text(text) if MenuAction::from_label(text) == Some(MenuAction::MainMenu) => {
                self.store.reset_state(user_id);
                let tier = self.policy.tier(user_id, now).await;
                vec![self.presenter.main_menu(tier)]
            }
            payload => match self.store.state(user_id).awaited_feature() {
                None => self.idle(user_id, payload, now).await,
                Some(feature) => self.awaiting(user_id, feature, payload, now).await,
            },
        }
    }

    async fn start(&self, user_id: UserId, now: DateTime<Utc>) -> Vec<Reply> {
        self.store.reset_state(user_id);
        let tier = self.policy.tier(user_id, now).await;
        let subscriptions = self.subscriptions_for(user_id, tier).await;
        vec![self.presenter.welcome(tier, &subscriptions)]
    }

    async fn callback(&self, user_id: UserId, data: &str, now: DateTime<Utc>) -> Vec<Reply> {
        match data {
            CHECK_SUBSCRIPTIONS_CALLBACK => {
                self.store.membership.invalidate(user_id).await;
                match self.policy.tier(user_id, now).await {
                    Tier::Vip => vec![self.presenter.vip_activated()],
                    Tier::Basic => {
                        let subscriptions = self.store.membership.check_per_group(user_id).await;
                        vec![self.presenter.subscriptions_missing(&subscriptions)]
                    }
                }
            }
            SKIP_SUBSCRIPTIONS_CALLBACK => {
                let tier = self.policy.tier(user_id, now).await;
                vec![self.presenter.basic_mode(tier)]
            }
            other => {
                debug!("Ignoring callback `{other}` from user {user_id}");
                Vec::new()
            }
        }
    }

    async fn idle(&self, user_id: UserId, payload: &EventPayload, now: DateTime<Utc>) -> Vec<Reply> {
        let action = match payload {
            EventPayload::Text(text) => MenuAction::from_label(text),
            _ => None,
        };

        match action {
            Some(MenuAction::Select(feature)) => self.select(user_id, feature, now).await,
            Some(MenuAction::Profile) => {
                let snapshot = self.policy.quota_snapshot(user_id, now).await;
                let subscriptions = self.subscriptions_for(user_id, snapshot.tier).await;
                vec![self.presenter.profile(&snapshot, &subscriptions)]
            }
            Some(MenuAction::VipInfo) => {
                let tier = self.policy.tier(user_id, now).await;
                let subscriptions = self.subscriptions_for(user_id, tier).await;
                vec![self.presenter.vip_info(tier, &subscriptions)]
            }
            // Handled before the state is consulted
            Some(MenuAction::MainMenu) | None => {
                let tier = self.policy.tier(user_id, now).await;
                vec![self.presenter.fallback(tier)]
            }
        }
    }

    async fn select(&self, user_id: UserId, feature: Feature, now: DateTime<Utc>) -> Vec<Reply> {
        match self.policy.check_admission(user_id, feature, now).await {
            AdmissionDecision::Admit { .. } => {
                self.store
                    .set_state(user_id, ConversationState::awaiting(feature));
                vec![self.presenter.feature_prompt(feature)]
            }
            AdmissionDecision::Deny { tier, .. } => {
                let subscriptions = self.subscriptions_for(user_id, tier).await;
                vec![self.presenter.denial(tier, feature, &subscriptions)]
            }
        }
    }

    async fn awaiting(
        &self,
        user_id: UserId,
        feature: Feature,
        payload: &EventPayload,
        now: DateTime<Utc>,
    ) -> Vec<Reply> {
        let request = match (feature, payload) {
            (Feature::Document, EventPayload::Photo(photo)) => GenerationRequest::Photo(photo.clone()),
            (Feature::Chat | Feature::Image | Feature::Music | Feature::Video, EventPayload::Text(text)) => {
                GenerationRequest::Prompt(text.clone())
            }
            _ => {
                debug!("Ignoring unexpected input from user {user_id} while awaiting {feature}");
                return Vec::new();
            }
        };

        // Charge and leave the awaiting state before calling out, so a failed
        // or timed-out generation still leaves the user idle
        self.store.ledger.record_use(user_id, feature, now);
        self.store.reset_state(user_id);

        vec![self.generate(feature, &request).await]
    }

    async fn generate(&self, feature: Feature, request: &GenerationRequest) -> Reply {
        match timeout(self.generation_timeout, self.generators.run(feature, request)).await {
            Ok(Ok(artifact)) => self.presenter.generation_result(feature, artifact),
            // Logged when the error was built
            Ok(Err(_)) => self.presenter.generation_failed(feature),
            Err(_) => {
                ErrorDetails::GenerationTimeout {
                    feature,
                    timeout_ms: self.generation_timeout.as_millis() as u64,
                }
                .log();
                self.presenter.generation_failed(feature)
            }
        }
    }

    /// Per-group membership for the subscription menu. VIP users never see it.
    async fn subscriptions_for(&self, user_id: UserId, tier: Tier) -> HashMap<GroupId, bool> {
        match tier {
            Tier::Vip => HashMap::new(),
            Tier::Basic => self.store.membership.check_per_group(user_id).await,
        }
    }
}
