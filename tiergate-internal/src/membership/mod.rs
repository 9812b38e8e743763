pub mod cache;
pub mod source;

pub use cache::{MembershipCache, MembershipCacheMetrics, MembershipMetricsSnapshot, MembershipVerdict};
pub use source::{MembershipSource, MembershipStatus};
