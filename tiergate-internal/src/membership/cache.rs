use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use crate::config::MembershipConfig;
use crate::error::ErrorDetails;
use crate::membership::{MembershipSource, MembershipStatus};
use crate::types::{GroupId, UserId};

/// Cached outcome of the AND-reduced membership check for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MembershipVerdict {
    pub checked_at: DateTime<Utc>,
    pub entitled: bool,
}

impl MembershipVerdict {
    /// A verdict stamped in the future (clock skew) is treated as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match now.signed_duration_since(self.checked_at).to_std() {
            Ok(elapsed) => elapsed < window,
            Err(_) => true,
        }
    }
}

#[derive(Debug, Default)]
pub struct MembershipCacheMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub external_checks: AtomicU64,
    pub failures: AtomicU64,
    pub invalidations: AtomicU64,
}

impl MembershipCacheMetrics {
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_external_check(&self) {
        self.external_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the cache metrics, served on `/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MembershipMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub external_checks: u64,
    pub failures: u64,
    pub invalidations: u64,
    pub cached_verdicts: u64,
}

/// Membership verdict cache in front of a [`MembershipSource`].
///
/// A verdict is served while `now - checked_at` is below the freshness
/// window; the first read after that re-queries every configured group.
/// Any failed or timed-out lookup counts as "not a member".
pub struct MembershipCache {
    cache: Cache<UserId, MembershipVerdict>,
    source: Arc<dyn MembershipSource>,
    groups: Vec<GroupId>,
    freshness_window: Duration,
    check_timeout: Duration,
    metrics: MembershipCacheMetrics,
}

impl MembershipCache {
    pub fn new(config: &MembershipConfig, source: Arc<dyn MembershipSource>) -> Self {
        // Freshness is judged against the caller's clock, so moka only bounds the size
        let cache = Cache::builder().max_capacity(config.max_cache_size).build();

        Self {
            cache,
            source,
            groups: config.groups.iter().map(|group| group.id.clone()).collect(),
            freshness_window: config.freshness_window(),
            check_timeout: config.check_timeout(),
            metrics: MembershipCacheMetrics::default(),
        }
    }

    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    pub async fn is_entitled(&self, user_id: UserId, now: DateTime<Utc>) -> bool {
        if let Some(verdict) = self.cache.get(&user_id).await {
            if verdict.is_fresh(now, self.freshness_window) {
                self.metrics.record_cache_hit();
                return verdict.entitled;
            }
        }

        self.metrics.record_cache_miss();
        let mut entitled = true;
        for group_id in &self.groups {
            if !self.lookup(user_id, group_id).await {
                entitled = false;
                break;
            }
        }

        self.cache
            .insert(
                user_id,
                MembershipVerdict {
                    checked_at: now,
                    entitled,
                },
            )
            .await;
        debug!("Refreshed membership verdict for user {user_id}: entitled={entitled}");
        entitled
    }

    /// Drops the cached verdict so the next read goes to the source
    pub async fn invalidate(&self, user_id: UserId) {
        self.metrics.record_invalidation();
        self.cache.invalidate(&user_id).await;
        info!("Invalidated membership verdict for user {user_id}");
    }

    /// Per-group membership for display purposes. Never cached, never AND-reduced.
    pub async fn check_per_group(&self, user_id: UserId) -> HashMap<GroupId, bool> {
        let mut result = HashMap::with_capacity(self.groups.len());
        for group_id in &self.groups {
            let member = self.lookup(user_id, group_id).await;
            result.insert(group_id.clone(), member);
        }
        result
    }

    pub async fn cached_verdict(&self, user_id: UserId) -> Option<MembershipVerdict> {
        self.cache.get(&user_id).await
    }

    pub fn metrics(&self) -> MembershipMetricsSnapshot {
        MembershipMetricsSnapshot {
            hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            misses: self.metrics.cache_misses.load(Ordering::Relaxed),
            external_checks: self.metrics.external_checks.load(Ordering::Relaxed),
            failures: self.metrics.failures.load(Ordering::Relaxed),
            invalidations: self.metrics.invalidations.load(Ordering::Relaxed),
            cached_verdicts: self.cache.entry_count(),
        }
    }

    async fn lookup(&self, user_id: UserId, group_id: &GroupId) -> bool {
        self.metrics.record_external_check();

        match timeout(
            self.check_timeout,
            self.source.check_membership(user_id, group_id),
        )
        .await
        {
            Ok(Ok(status)) => status == MembershipStatus::Member,
            Ok(Err(e)) => {
                // Already logged by the source when the error was built
                self.metrics.record_failure();
                debug!("Treating user {user_id} as non-member of {group_id}: {e}");
                false
            }
            Err(_) => {
                self.metrics.record_failure();
                ErrorDetails::MembershipTimeout {
                    user_id,
                    group_id: group_id.clone(),
                    timeout_ms: self.check_timeout.as_millis() as u64,
                }
                .log();
                false
            }
        }
    }
}
