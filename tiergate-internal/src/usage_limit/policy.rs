use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::LimitsConfig;
use crate::membership::MembershipCache;
use crate::types::{Feature, Tier, UserId};
use crate::usage_limit::{AdmissionDecision, DailyUsage, UsageLedger};

/// Daily limit per feature for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureLimits {
    pub chat: u32,
    pub image: u32,
    pub music: u32,
    pub video: u32,
    pub document: u32,
}

impl FeatureLimits {
    pub fn basic() -> Self {
        Self {
            chat: 3,
            image: 1,
            music: 1,
            video: 1,
            document: 2,
        }
    }

    pub fn vip() -> Self {
        Self {
            chat: 25,
            image: 10,
            music: 5,
            video: 3,
            document: 8,
        }
    }

    pub fn get(&self, feature: Feature) -> u32 {
        match feature {
            Feature::Chat => self.chat,
            Feature::Image => self.image,
            Feature::Music => self.music,
            Feature::Video => self.video,
            Feature::Document => self.document,
        }
    }
}

/// Tier, limits and today's usage for one user, as shown on the profile view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub tier: Tier,
    pub limits: FeatureLimits,
    pub usage: DailyUsage,
}

impl QuotaSnapshot {
    pub fn remaining(&self, feature: Feature) -> u32 {
        self.limits
            .get(feature)
            .saturating_sub(self.usage.count(feature))
    }
}

/// Maps the membership verdict to a tier and decides admission against the ledger.
///
/// Deciding never records usage: the caller charges the ledger separately,
/// once it actually dispatches work.
#[derive(Clone)]
pub struct QuotaPolicy {
    basic: FeatureLimits,
    vip: FeatureLimits,
    membership: Arc<MembershipCache>,
    ledger: Arc<UsageLedger>,
}

impl QuotaPolicy {
    pub fn new(
        limits: &LimitsConfig,
        membership: Arc<MembershipCache>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            basic: limits.basic,
            vip: limits.vip,
            membership,
            ledger,
        }
    }

    pub fn limits(&self, tier: Tier) -> &FeatureLimits {
        match tier {
            Tier::Basic => &self.basic,
            Tier::Vip => &self.vip,
        }
    }

    pub fn limit_for(&self, tier: Tier, feature: Feature) -> u32 {
        self.limits(tier).get(feature)
    }

    pub async fn tier(&self, user_id: UserId, now: DateTime<Utc>) -> Tier {
        Tier::from_entitlement(self.membership.is_entitled(user_id, now).await)
    }

    pub async fn check_admission(
        &self,
        user_id: UserId,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> AdmissionDecision {
        let tier = self.tier(user_id, now).await;
        let used = self.ledger.daily_usage(user_id, now).count(feature);
        let limit = self.limit_for(tier, feature);

        if used < limit {
            AdmissionDecision::Admit { tier }
        } else {
            info!("Denied {feature} for user {user_id}: {used}/{limit} used on {tier:?} tier");
            AdmissionDecision::Deny {
                tier,
                feature,
                used,
                limit,
            }
        }
    }

    pub async fn is_admitted(&self, user_id: UserId, feature: Feature, now: DateTime<Utc>) -> bool {
        self.check_admission(user_id, feature, now)
            .await
            .is_allowed()
    }

    pub async fn quota_snapshot(&self, user_id: UserId, now: DateTime<Utc>) -> QuotaSnapshot {
        let tier = self.tier(user_id, now).await;
        QuotaSnapshot {
            tier,
            limits: *self.limits(tier),
            usage: self.ledger.daily_usage(user_id, now),
        }
    }
}
