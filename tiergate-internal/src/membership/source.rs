use async_trait::async_trait;
use serde::Serialize;

use crate::error::Error;
use crate::types::{GroupId, UserId};

/// Result of a single external membership lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Member,
    NotMember,
}

impl MembershipStatus {
    pub fn is_member(&self) -> bool {
        matches!(self, MembershipStatus::Member)
    }
}

/// External authority answering "is this user a member of this group".
///
/// Implementations should surface failures as `Err`; the cache turns every
/// failure into "not a member".
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn check_membership(
        &self,
        user_id: UserId,
        group_id: &GroupId,
    ) -> Result<MembershipStatus, Error>;
}
