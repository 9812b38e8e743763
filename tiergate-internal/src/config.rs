use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ErrorDetails};
use crate::types::GroupId;
use crate::usage_limit::FeatureLimits;

pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const HUGGINGFACE_TOKEN_ENV: &str = "HUGGINGFACE_API_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub membership: MembershipConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// Address of the liveness/status HTTP server
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            bind_address: default_bind_address(),
        }
    }
}

fn default_bot_name() -> String {
    "Artemius AI".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// A group the user must belong to in order to be entitled to the VIP tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub id: GroupId,
    pub label: String,
    /// Invite link shown on the subscribe button. Derived from `@name` ids when absent.
    #[serde(default)]
    pub url: Option<Url>,
}

impl GroupConfig {
    pub fn join_url(&self) -> Option<Url> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let name = self.id.as_str().strip_prefix('@')?;
        Url::parse(&format!("https://t.me/{name}")).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipConfig {
    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    /// How long a membership verdict stays fresh
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,

    /// Timeout for a single external membership lookup
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// Maximum number of cached verdicts
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: u64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            freshness_window_secs: default_freshness_window_secs(),
            check_timeout_ms: default_check_timeout_ms(),
            max_cache_size: default_max_cache_size(),
        }
    }
}

impl MembershipConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

fn default_freshness_window_secs() -> u64 {
    300
}

fn default_check_timeout_ms() -> u64 {
    5000
}

fn default_max_cache_size() -> u64 {
    100_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "FeatureLimits::basic")]
    pub basic: FeatureLimits,
    #[serde(default = "FeatureLimits::vip")]
    pub vip: FeatureLimits,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            basic: FeatureLimits::basic(),
            vip: FeatureLimits::vip(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    /// Number of calendar days of usage kept per user, today included
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,

    /// Hugging Face model used for chat replies
    #[serde(default)]
    pub text_model: Option<String>,

    /// Hugging Face model used for image generation
    #[serde(default)]
    pub image_model: Option<String>,

    #[serde(default = "default_huggingface_api_base")]
    pub huggingface_api_base: Url,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_generation_timeout_ms(),
            text_model: None,
            image_model: None,
            huggingface_api_base: default_huggingface_api_base(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_generation_timeout_ms() -> u64 {
    60_000
}

#[expect(clippy::expect_used)]
fn default_huggingface_api_base() -> Url {
    Url::parse("https://api-inference.huggingface.co/").expect("static URL is valid")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: Url,

    /// Long-polling timeout for `getUpdates`
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

#[expect(clippy::expect_used)]
fn default_telegram_api_base() -> Url {
    Url::parse("https://api.telegram.org/").expect("static URL is valid")
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load_and_verify_from_path(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to read config file `{}`: {e}", path.display()),
            })
        })?;
        Self::load_and_verify_from_str(&contents)
    }

    pub fn load_and_verify_from_str(contents: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(contents).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse config file: {e}"),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.membership.groups.is_empty() {
            return Err(Error::new(ErrorDetails::Config {
                message: "At least one `[[membership.groups]]` entry is required".to_string(),
            }));
        }

        let mut seen = HashSet::new();
        for group in &self.membership.groups {
            if group.id.as_str().trim().is_empty() {
                return Err(Error::new(ErrorDetails::Config {
                    message: "Membership group ids must not be empty".to_string(),
                }));
            }
            if !seen.insert(&group.id) {
                return Err(Error::new(ErrorDetails::Config {
                    message: format!("Duplicate membership group `{}`", group.id),
                }));
            }
        }

        if self.membership.freshness_window_secs == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`membership.freshness_window_secs` must be greater than zero".to_string(),
            }));
        }

        if self.usage.retention_days == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`usage.retention_days` must be at least 1".to_string(),
            }));
        }

        Ok(())
    }
}

/// Secrets read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub telegram_token: SecretString,
    pub huggingface_token: Option<SecretString>,
}

impl Credentials {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let telegram_token = lookup(TELEGRAM_TOKEN_ENV)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                Error::new(ErrorDetails::Config {
                    message: format!("Environment variable `{TELEGRAM_TOKEN_ENV}` is not set"),
                })
            })?;
        let huggingface_token = lookup(HUGGINGFACE_TOKEN_ENV)
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        Ok(Self {
            telegram_token: SecretString::from(telegram_token),
            huggingface_token,
        })
    }
}
