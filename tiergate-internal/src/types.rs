use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::{AsRefStr, EnumIter};

/// Opaque user identifier handed to us by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation the transport should deliver replies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl Display for ChatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an external group (e.g. `@channel` or a numeric chat id)
/// whose membership grants the VIP tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One of the gated capabilities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    Chat,
    Image,
    Music,
    Video,
    Document,
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Quota tier, derived from the current membership verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Vip,
}

impl Tier {
    pub fn from_entitlement(entitled: bool) -> Self {
        if entitled {
            Tier::Vip
        } else {
            Tier::Basic
        }
    }

    pub fn is_vip(&self) -> bool {
        matches!(self, Tier::Vip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_feature_display_is_snake_case() {
        let names: Vec<String> = Feature::iter().map(|f| f.to_string()).collect();
        assert_eq!(names, vec!["chat", "image", "music", "video", "document"]);
    }

    #[test]
    fn test_tier_from_entitlement() {
        assert_eq!(Tier::from_entitlement(true), Tier::Vip);
        assert_eq!(Tier::from_entitlement(false), Tier::Basic);
        assert!(!Tier::Basic.is_vip());
    }

    #[test]
    fn test_group_id_serde_transparent() {
        let group: GroupId = serde_json::from_str("\"@news\"").unwrap();
        assert_eq!(group, GroupId::from("@news"));
        assert_eq!(serde_json::to_string(&UserId(42)).unwrap(), "42");
    }
}
