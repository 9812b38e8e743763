use crate::types::{Feature, GroupId, UserId};

#[derive(Debug, PartialEq)]
// As long as the struct member is private, we force people to use the `new` method and log the error.
// We box `ErrorDetails` per the `clippy::result_large_err` lint
pub struct Error(Box<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Box::new(details))
    }

    pub fn new_without_logging(details: ErrorDetails) -> Self {
        Error(Box::new(details))
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn get_owned_details(self) -> ErrorDetails {
        *self.0
    }

    pub fn log(&self) {
        self.0.log();
    }

    /// Whether the failure came from a timed-out external call.
    pub fn is_timeout(&self) -> bool {
        matches!(
            *self.0,
            ErrorDetails::MembershipTimeout { .. } | ErrorDetails::GenerationTimeout { .. }
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, PartialEq)]
pub enum ErrorDetails {
    AppState {
        message: String,
    },
    Config {
        message: String,
    },
    Generation {
        feature: Feature,
        message: String,
    },
    GenerationTimeout {
        feature: Feature,
        timeout_ms: u64,
    },
    MembershipCheck {
        user_id: UserId,
        group_id: GroupId,
        message: String,
    },
    MembershipTimeout {
        user_id: UserId,
        group_id: GroupId,
        timeout_ms: u64,
    },
    Serialization {
        message: String,
    },
    TelegramApi {
        method: String,
        description: String,
    },
    Transport {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the error level for logging this error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::AppState { .. } => tracing::Level::ERROR,
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::Generation { .. } => tracing::Level::ERROR,
            ErrorDetails::GenerationTimeout { .. } => tracing::Level::WARN,
            ErrorDetails::MembershipCheck { .. } => tracing::Level::WARN,
            ErrorDetails::MembershipTimeout { .. } => tracing::Level::WARN,
            ErrorDetails::Serialization { .. } => tracing::Level::ERROR,
            ErrorDetails::TelegramApi { .. } => tracing::Level::WARN,
            ErrorDetails::Transport { .. } => tracing::Level::ERROR,
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::AppState { message } => {
                write!(f, "Error initializing application state: {message}")
            }
            ErrorDetails::Config { message } => {
                write!(f, "{message}")
            }
            ErrorDetails::Generation { feature, message } => {
                write!(f, "Error generating {feature} content: {message}")
            }
            ErrorDetails::GenerationTimeout {
                feature,
                timeout_ms,
            } => {
                write!(f, "Generating {feature} content timed out after {timeout_ms}ms")
            }
            ErrorDetails::MembershipCheck {
                user_id,
                group_id,
                message,
            } => {
                write!(
                    f,
                    "Failed to check membership of user {user_id} in group {group_id}: {message}"
                )
            }
            ErrorDetails::MembershipTimeout {
                user_id,
                group_id,
                timeout_ms,
            } => {
                write!(
                    f,
                    "Membership check of user {user_id} in group {group_id} timed out after {timeout_ms}ms"
                )
            }
            ErrorDetails::Serialization { message } => {
                write!(f, "Error serializing or deserializing: {message}")
            }
            ErrorDetails::TelegramApi {
                method,
                description,
            } => {
                write!(f, "Telegram API call `{method}` failed: {description}")
            }
            ErrorDetails::Transport { message } => {
                write!(f, "Transport error: {message}")
            }
        }
    }
}
