use std::collections::HashMap;
use std::fmt::Write;
use strum::IntoEnumIterator;

use crate::config::{GroupConfig, LimitsConfig};
use crate::generation::Artifact;
use crate::transport::{ChoiceSet, InlineChoice, Reply};
use crate::types::{Feature, GroupId, Tier};
use crate::usage_limit::{FeatureLimits, QuotaSnapshot};

pub const CHAT_LABEL: &str = "💬 Chat";
pub const IMAGE_LABEL: &str = "🎨 Create image";
pub const MUSIC_LABEL: &str = "🎵 Create song";
pub const VIDEO_LABEL: &str = "🎬 Create video";
pub const DOCUMENT_LABEL: &str = "📄 Document";
pub const PROFILE_LABEL: &str = "👤 My profile";
pub const VIP_MODE_LABEL: &str = "⭐ VIP mode";
pub const BASIC_ACCESS_LABEL: &str = "🔒 Basic access";
pub const GET_VIP_LABEL: &str = "📢 Get VIP";
pub const MAIN_MENU_LABEL: &str = "🏠 Main menu";

pub const CHECK_SUBSCRIPTIONS_CALLBACK: &str = "check_subscriptions";
pub const SKIP_SUBSCRIPTIONS_CALLBACK: &str = "skip_subscriptions";
pub const SEPARATOR_CALLBACK: &str = "separator";

/// What a keyboard label sent back as text asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Select(Feature),
    Profile,
    VipInfo,
    MainMenu,
}

impl MenuAction {
    pub fn from_label(text: &str) -> Option<Self> {
        let action = match text.trim() {
            CHAT_LABEL => MenuAction::Select(Feature::Chat),
            IMAGE_LABEL => MenuAction::Select(Feature::Image),
            MUSIC_LABEL => MenuAction::Select(Feature::Music),
            VIDEO_LABEL => MenuAction::Select(Feature::Video),
            DOCUMENT_LABEL => MenuAction::Select(Feature::Document),
            PROFILE_LABEL => MenuAction::Profile,
            VIP_MODE_LABEL | BASIC_ACCESS_LABEL | GET_VIP_LABEL => MenuAction::VipInfo,
            MAIN_MENU_LABEL => MenuAction::MainMenu,
            _ => return None,
        };
        Some(action)
    }
}

fn feature_icon(feature: Feature) -> &'static str {
    match feature {
        Feature::Chat => "💬",
        Feature::Image => "🎨",
        Feature::Music => "🎵",
        Feature::Video => "🎬",
        Feature::Document => "📄",
    }
}

fn feature_title(feature: Feature) -> &'static str {
    match feature {
        Feature::Chat => "Conversations",
        Feature::Image => "Images",
        Feature::Music => "Songs",
        Feature::Video => "Videos",
        Feature::Document => "Documents",
    }
}

/// Renders every user-facing view. Holds no per-user state.
#[derive(Debug, Clone)]
pub struct MenuPresenter {
    bot_name: String,
    groups: Vec<GroupConfig>,
    basic: FeatureLimits,
    vip: FeatureLimits,
}

impl MenuPresenter {
    pub fn new(bot_name: impl Into<String>, groups: &[GroupConfig], limits: &LimitsConfig) -> Self {
        Self {
            bot_name: bot_name.into(),
            groups: groups.to_vec(),
            basic: limits.basic,
            vip: limits.vip,
        }
    }

    pub fn main_menu_choices(&self, tier: Tier) -> ChoiceSet {
        let status = if tier.is_vip() {
            VIP_MODE_LABEL
        } else {
            BASIC_ACCESS_LABEL
        };
        let rows = [
            [CHAT_LABEL, IMAGE_LABEL],
            [MUSIC_LABEL, VIDEO_LABEL],
            [DOCUMENT_LABEL, PROFILE_LABEL],
            [status, GET_VIP_LABEL],
        ];
        ChoiceSet::Keyboard(
            rows.iter()
                .map(|row| row.iter().map(|label| label.to_string()).collect())
                .collect(),
        )
    }

    /// One join button per group in configured order, then the check and skip actions
    pub fn subscription_choices(&self, subscriptions: &HashMap<GroupId, bool>) -> ChoiceSet {
        let mut rows: Vec<Vec<InlineChoice>> = Vec::with_capacity(self.groups.len() + 3);
        for group in &self.groups {
            let subscribed = subscriptions.get(&group.id).copied().unwrap_or(false);
            let label = if subscribed {
                format!("✅ {} • Subscribed", group.label)
            } else {
                format!("📢 {} • Subscribe", group.label)
            };
            let choice = match group.join_url() {
                Some(url) => InlineChoice::url(label, url),
                None => InlineChoice::callback(label, SEPARATOR_CALLBACK),
            };
            rows.push(vec![choice]);
        }
        rows.push(vec![InlineChoice::callback("➖ ➖ ➖ ➖ ➖", SEPARATOR_CALLBACK)]);
        rows.push(vec![InlineChoice::callback(
            "🔄 Check subscriptions and get VIP",
            CHECK_SUBSCRIPTIONS_CALLBACK,
        )]);
        rows.push(vec![InlineChoice::callback(
            "⏭️ Continue with basic access",
            SKIP_SUBSCRIPTIONS_CALLBACK,
        )]);
        ChoiceSet::Inline(rows)
    }

    pub fn back_choices(&self) -> ChoiceSet {
        ChoiceSet::Keyboard(vec![vec![MAIN_MENU_LABEL.to_string()]])
    }

    pub fn welcome(&self, tier: Tier, subscriptions: &HashMap<GroupId, bool>) -> Reply {
        let mut text = String::new();
        match tier {
            Tier::Vip => {
                let _ = writeln!(text, "🏛️ Welcome, VIP user!\n");
                let _ = writeln!(text, "⭐ VIP status is active. Thank you for subscribing!\n");
                let _ = writeln!(text, "🚀 Your VIP limits:");
                self.write_limits(&mut text, &self.vip);
                Reply::text(text.trim_end()).with_choices(self.main_menu_choices(tier))
            }
            Tier::Basic => {
                let _ = writeln!(text, "🏛️ Welcome to {}!\n", self.bot_name);
                let _ = writeln!(text, "🔒 Current limits (basic):");
                self.write_limits(&mut text, &self.basic);
                let _ = writeln!(text, "\n⭐ Get VIP status:");
                self.write_vip_bonus(&mut text);
                let _ = writeln!(text, "\n📢 Subscribe to every channel below!");
                Reply::text(text.trim_end()).with_choices(self.subscription_choices(subscriptions))
            }
        }
    }

    pub fn main_menu(&self, tier: Tier) -> Reply {
        Reply::text("🏛️ Main menu").with_choices(self.main_menu_choices(tier))
    }

    pub fn feature_prompt(&self, feature: Feature) -> Reply {
        let text = match feature {
            Feature::Chat => format!("🏛️ {} is ready to talk!\n\nAsk your question.", self.bot_name),
            Feature::Image => "🎨 Art studio\n\nDescribe the image to create:".to_string(),
            Feature::Music => "🎵 Music studio\n\nDescribe the song to create:".to_string(),
            Feature::Video => "🎬 Video studio\n\nDescribe the video to create:".to_string(),
            Feature::Document => "📄 Document recognition\n\nSend a photo of the document:".to_string(),
        };
        Reply::text(text).with_choices(self.back_choices())
    }

    pub fn denial(
        &self,
        tier: Tier,
        feature: Feature,
        subscriptions: &HashMap<GroupId, bool>,
    ) -> Reply {
        let title = feature_title(feature).to_lowercase();
        match tier {
            Tier::Vip => Reply::text(format!(
                "🚫 You have used up today's {title} limit!\n\n⏰ Limits reset at midnight UTC."
            )),
            Tier::Basic => {
                let mut text = format!(
                    "🚫 You have used up today's {title} limit!\n\n⭐ Subscribe to the channels to get VIP status!\n\n🚀 All VIP bonuses:\n"
                );
                self.write_vip_bonus(&mut text);
                Reply::text(text.trim_end()).with_choices(self.subscription_choices(subscriptions))
            }
        }
    }

    pub fn profile(&self, snapshot: &QuotaSnapshot, subscriptions: &HashMap<GroupId, bool>) -> Reply {
        let status = if snapshot.tier.is_vip() {
            "⭐ VIP active!"
        } else {
            "🔒 Basic access"
        };
        let mut text = format!("👤 {} profile\n\n{status}\n\n📊 Used today:\n", self.bot_name);
        for feature in Feature::iter() {
            let _ = writeln!(
                text,
                "{} {}: {}/{}",
                feature_icon(feature),
                feature_title(feature),
                snapshot.usage.count(feature),
                snapshot.limits.get(feature)
            );
        }

        let reply = Reply::text(text.trim_end());
        match snapshot.tier {
            Tier::Vip => reply,
            Tier::Basic => reply.with_choices(self.subscription_choices(subscriptions)),
        }
    }

    pub fn vip_info(&self, tier: Tier, subscriptions: &HashMap<GroupId, bool>) -> Reply {
        match tier {
            Tier::Vip => Reply::text("⭐ VIP status is active!\n\nThank you for subscribing!"),
            Tier::Basic => Reply::text("⭐ Get VIP status!\n\nSubscribe to the channels:")
                .with_choices(self.subscription_choices(subscriptions)),
        }
    }

    pub fn vip_activated(&self) -> Reply {
        Reply::text("✅ VIP status activated!").with_choices(self.main_menu_choices(Tier::Vip))
    }

    pub fn subscriptions_missing(&self, subscriptions: &HashMap<GroupId, bool>) -> Reply {
        Reply::text("❌ Subscription not found\n\nSubscribe to every channel!")
            .with_choices(self.subscription_choices(subscriptions))
    }

    pub fn basic_mode(&self, tier: Tier) -> Reply {
        Reply::text("🔒 Basic mode is active").with_choices(self.main_menu_choices(tier))
    }

    pub fn fallback(&self, tier: Tier) -> Reply {
        Reply::text("🤔 I did not understand that command").with_choices(self.main_menu_choices(tier))
    }

    pub fn generation_result(&self, feature: Feature, artifact: Artifact) -> Reply {
        match artifact {
            Artifact::Text(text) if feature == Feature::Chat => {
                Reply::text(format!("🏛️ {}: {text}", self.bot_name))
            }
            Artifact::Text(text) => Reply::text(format!("{} {text}", feature_icon(feature))),
            Artifact::Media(media) => {
                Reply::text(format!("{} Done!", feature_icon(feature))).with_media(media)
            }
        }
    }

    pub fn generation_failed(&self, feature: Feature) -> Reply {
        Reply::text(format!(
            "{} Something went wrong while processing your request. Please try again.",
            feature_icon(feature)
        ))
        .with_choices(self.back_choices())
    }

    fn write_limits(&self, text: &mut String, limits: &FeatureLimits) {
        for feature in Feature::iter() {
            let _ = writeln!(
                text,
                "{} {}: {} per day",
                feature_icon(feature),
                feature_title(feature),
                limits.get(feature)
            );
        }
    }

    fn write_vip_bonus(&self, text: &mut String) {
        for feature in Feature::iter() {
            let vip = self.vip.get(feature);
            let bonus = vip.saturating_sub(self.basic.get(feature));
            let _ = writeln!(
                text,
                "{} {vip} {} (+{bonus})",
                feature_icon(feature),
                feature_title(feature).to_lowercase()
            );
        }
    }
}
