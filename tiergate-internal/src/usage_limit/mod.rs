pub mod ledger;
pub mod policy;

pub use ledger::{DailyUsage, LifetimeStats, UsageLedger};
pub use policy::{FeatureLimits, QuotaPolicy, QuotaSnapshot};

use crate::types::{Feature, Tier};

/// Admission decision for a single feature use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit { tier: Tier },
    Deny { tier: Tier, feature: Feature, used: u32, limit: u32 },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Admit { .. })
    }

    pub fn tier(&self) -> Tier {
        match self {
            AdmissionDecision::Admit { tier } | AdmissionDecision::Deny { tier, .. } => *tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_decision() {
        let admit = AdmissionDecision::Admit { tier: Tier::Vip };
        assert!(admit.is_allowed());
        assert_eq!(admit.tier(), Tier::Vip);

        let deny = AdmissionDecision::Deny {
            tier: Tier::Basic,
            feature: Feature::Chat,
            used: 3,
            limit: 3,
        };
        assert!(!deny.is_allowed());
        assert_eq!(deny.tier(), Tier::Basic);
    }
}
