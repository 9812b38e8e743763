#![cfg(test)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{GroupConfig, LimitsConfig, MembershipConfig};
use crate::error::{Error, ErrorDetails};
use crate::generation::{
    Artifact, DocumentOcr, Generators, ImageGenerator, MusicGenerator, TextGenerator,
    VideoGenerator,
};
use crate::membership::{MembershipCache, MembershipSource, MembershipStatus};
use crate::menu::MenuPresenter;
use crate::router::ConversationRouter;
use crate::store::CoreStore;
use crate::transport::Photo;
use crate::types::{Feature, GroupId, UserId};
use crate::usage_limit::{QuotaPolicy, UsageLedger};

/// Scripted answer of the membership source for one lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Member,
    NotMember,
    Fail,
    Hang,
}

/// Membership source answering from a script. Unscripted lookups answer `NotMember`.
#[derive(Default)]
pub struct ScriptedMembershipSource {
    per_group: Mutex<HashMap<(UserId, GroupId), Scripted>>,
    per_user: Mutex<HashMap<UserId, Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedMembershipSource {
    pub fn set(&self, user_id: UserId, group_id: &GroupId, answer: Scripted) {
        self.per_group
            .lock()
            .unwrap()
            .insert((user_id, group_id.clone()), answer);
    }

    /// Same answer for every group; clears per-group answers for the user
    pub fn set_all(&self, user_id: UserId, answer: Scripted) {
        self.per_group
            .lock()
            .unwrap()
            .retain(|(user, _), _| *user != user_id);
        self.per_user.lock().unwrap().insert(user_id, answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, user_id: UserId, group_id: &GroupId) -> Scripted {
        if let Some(answer) = self
            .per_group
            .lock()
            .unwrap()
            .get(&(user_id, group_id.clone()))
        {
            return *answer;
        }
        self.per_user
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(Scripted::NotMember)
    }
}

#[async_trait]
impl MembershipSource for ScriptedMembershipSource {
    async fn check_membership(
        &self,
        user_id: UserId,
        group_id: &GroupId,
    ) -> Result<MembershipStatus, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer(user_id, group_id) {
            Scripted::Member => Ok(MembershipStatus::Member),
            Scripted::NotMember => Ok(MembershipStatus::NotMember),
            Scripted::Fail => Err(Error::new(ErrorDetails::MembershipCheck {
                user_id,
                group_id: group_id.clone(),
                message: "scripted failure".to_string(),
            })),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

pub fn test_groups() -> Vec<GroupConfig> {
    vec![
        GroupConfig {
            id: GroupId::from("@one"),
            label: "Channel One".to_string(),
            url: None,
        },
        GroupConfig {
            id: GroupId::from("@two"),
            label: "Channel Two".to_string(),
            url: None,
        },
    ]
}

/// Cache over `@one` and `@two` with the default window and a 50ms lookup timeout
pub fn test_membership_cache(source: Arc<ScriptedMembershipSource>) -> MembershipCache {
    let config = MembershipConfig {
        groups: test_groups(),
        check_timeout_ms: 50,
        ..Default::default()
    };
    MembershipCache::new(&config, source)
}

/// Router over fresh in-memory state with default limits and the `test_groups`
pub fn test_router(
    source: Arc<ScriptedMembershipSource>,
    backend: &Arc<RecordingBackend>,
    generation_timeout: Duration,
) -> ConversationRouter {
    let ledger = Arc::new(UsageLedger::new(2));
    let membership = Arc::new(test_membership_cache(source));
    let store = Arc::new(CoreStore::new(ledger.clone(), membership.clone()));
    let limits = LimitsConfig::default();
    let policy = QuotaPolicy::new(&limits, membership, ledger);
    let presenter = MenuPresenter::new("Artemius AI", &test_groups(), &limits);
    ConversationRouter::new(
        store,
        policy,
        presenter,
        backend.generators(),
        generation_timeout,
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendMode {
    #[default]
    Succeed,
    Fail,
    Hang,
}

/// Generator backend recording every call it receives
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<(Feature, String)>>,
    mode: Mutex<BackendMode>,
}

impl RecordingBackend {
    pub fn set_mode(&self, mode: BackendMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls_for(&self, feature: Feature) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == feature)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn generators(self: &Arc<Self>) -> Generators {
        Generators {
            text: self.clone(),
            image: self.clone(),
            music: self.clone(),
            video: self.clone(),
            ocr: self.clone(),
        }
    }

    async fn respond(&self, feature: Feature, input: &str) -> Result<String, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((feature, input.to_string()));
        let mode = *self.mode.lock().unwrap();
        match mode {
            BackendMode::Succeed => Ok(format!("{feature} for {input}")),
            BackendMode::Fail => Err(Error::new(ErrorDetails::Generation {
                feature,
                message: "scripted failure".to_string(),
            })),
            BackendMode::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl TextGenerator for RecordingBackend {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        self.respond(Feature::Chat, prompt).await
    }
}

#[async_trait]
impl ImageGenerator for RecordingBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        self.respond(Feature::Image, prompt).await.map(Artifact::Text)
    }
}

#[async_trait]
impl MusicGenerator for RecordingBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        self.respond(Feature::Music, prompt).await.map(Artifact::Text)
    }
}

#[async_trait]
impl VideoGenerator for RecordingBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        self.respond(Feature::Video, prompt).await.map(Artifact::Text)
    }
}

#[async_trait]
impl DocumentOcr for RecordingBackend {
    async fn extract(&self, photo: &Photo) -> Result<String, Error> {
        self.respond(Feature::Document, &photo.file_id).await
    }
}
