use chrono::{DateTime, Days, NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{Feature, UserId};

/// Per-feature counters for one user on one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    counts: BTreeMap<Feature, u32>,
}

impl DailyUsage {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            counts: BTreeMap::new(),
        }
    }

    pub fn count(&self, feature: Feature) -> u32 {
        self.counts.get(&feature).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifetimeStats {
    pub first_seen: DateTime<Utc>,
    totals_by_feature: BTreeMap<Feature, u64>,
}

impl LifetimeStats {
    fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            first_seen,
            totals_by_feature: BTreeMap::new(),
        }
    }

    pub fn total(&self, feature: Feature) -> u64 {
        self.totals_by_feature.get(&feature).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct UserUsage {
    days: BTreeMap<NaiveDate, DailyUsage>,
    lifetime: LifetimeStats,
}

impl UserUsage {
    fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            days: BTreeMap::new(),
            lifetime: LifetimeStats::new(first_seen),
        }
    }

    /// Drops every day older than the retention horizon ending at `today`.
    fn prune(&mut self, today: NaiveDate, retention_days: u32) {
        let keep = u64::from(retention_days.saturating_sub(1));
        if let Some(cutoff) = today.checked_sub_days(Days::new(keep)) {
            self.days = self.days.split_off(&cutoff);
        }
    }

    fn day_mut(&mut self, today: NaiveDate, retention_days: u32) -> &mut DailyUsage {
        self.prune(today, retention_days);
        self.days
            .entry(today)
            .or_insert_with(|| DailyUsage::new(today))
    }
}

/// Per-user, per-day usage counters plus lifetime totals.
///
/// Counters only ever grow within a day. Each user keeps at most
/// `retention_days` calendar days of history; older days are pruned lazily
/// whenever that user's record is touched.
#[derive(Debug)]
pub struct UsageLedger {
    users: DashMap<UserId, UserUsage>,
    retention_days: u32,
}

impl UsageLedger {
    pub fn new(retention_days: u32) -> Self {
        Self {
            users: DashMap::new(),
            retention_days: retention_days.max(1),
        }
    }

    /// Registers the user on first interaction
    pub fn touch(&self, user_id: UserId, now: DateTime<Utc>) {
        self.users
            .entry(user_id)
            .or_insert_with(|| UserUsage::new(now));
    }

    /// Returns the usage for the calendar day of `now`, creating a zeroed record if absent
    pub fn daily_usage(&self, user_id: UserId, now: DateTime<Utc>) -> DailyUsage {
        let today = now.date_naive();
        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| UserUsage::new(now));
        user.day_mut(today, self.retention_days).clone()
    }

    /// Records exactly one unit of consumption of `feature`
    pub fn record_use(&self, user_id: UserId, feature: Feature, now: DateTime<Utc>) -> u32 {
        let today = now.date_naive();
        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| UserUsage::new(now));

        *user
            .lifetime
            .totals_by_feature
            .entry(feature)
            .or_insert(0) += 1;

        let day = user.day_mut(today, self.retention_days);
        let count = day.counts.entry(feature).or_insert(0);
        *count += 1;
        let count = *count;

        debug!("Recorded {feature} use for user {user_id} on {today}: {count} today");
        count
    }

    pub fn lifetime_stats(&self, user_id: UserId) -> Option<LifetimeStats> {
        self.users.get(&user_id).map(|user| user.lifetime.clone())
    }

    /// Number of calendar days currently retained for a user
    pub fn retained_days(&self, user_id: UserId) -> usize {
        self.users
            .get(&user_id)
            .map(|user| user.days.len())
            .unwrap_or(0)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
