//! Error types for the core library.

use thiserror::Error;

/// Errors surfaced by mailbox operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    /// The server rejected the username or password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// IMAP access is turned off for the account.
    #[error("IMAP access is disabled for this account")]
    AccessDisabled,

    /// The account requires an app password instead of the login password.
    #[error("An app password is required for this account")]
    AppPasswordRequired,

    /// Transport failure, or a server error that matched nothing more specific.
    #[error("Connection failed: {0}")]
    ConnectionFailure(String),

    /// SEARCH failed; the retrieval is aborted.
    #[error("Search failed: {0}")]
    SearchFailure(String),

    /// Fetching one message failed; bulk retrieval skips it.
    #[error("Fetch of message {id} failed: {message}")]
    FetchFailure {
        /// Sequence number of the message.
        id: u32,
        /// Underlying error text.
        message: String,
    },
}

const INVALID_CREDENTIALS: &[&str] = &[
    "authentication failed",
    "invalid credentials",
    "login failed",
    "authenticationfailed",
];

const ACCESS_DISABLED: &[&str] = &["imap access disabled"];

const APP_PASSWORD_REQUIRED: &[&str] = &[
    "app password required",
    "2-step verification",
    "application-specific password",
];

impl MailError {
    /// Maps server or transport error text onto the error taxonomy.
    ///
    /// Matching is by case-insensitive substring; text that matches no
    /// known phrase becomes [`MailError::ConnectionFailure`].
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let contains_any = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));

        if contains_any(INVALID_CREDENTIALS) {
            Self::InvalidCredentials
        } else if contains_any(ACCESS_DISABLED) {
            Self::AccessDisabled
        } else if contains_any(APP_PASSWORD_REQUIRED) {
            Self::AppPasswordRequired
        } else {
            Self::ConnectionFailure(text.to_string())
        }
    }

    /// True for the account-level errors that retrying cannot fix.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::AccessDisabled | Self::AppPasswordRequired
        )
    }
}

impl From<cvmail_imap::Error> for MailError {
    fn from(err: cvmail_imap::Error) -> Self {
        Self::classify(&err.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, MailError>;

/// Problems reading [`MailConfig`](crate::MailConfig) from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}
