//! Mailbox account configuration.

use std::fmt;

use cvmail_imap::Config;

use crate::error::ConfigError;

/// Gmail's implicit-TLS IMAP endpoint.
pub const GMAIL_IMAP_HOST: &str = "imap.gmail.com";

/// Mailbox selected when none is configured.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Account address.
pub const ENV_EMAIL: &str = "CVMAIL_EMAIL";
/// Account (app) password.
pub const ENV_PASSWORD: &str = "CVMAIL_PASSWORD";
/// IMAP host override.
pub const ENV_IMAP_HOST: &str = "CVMAIL_IMAP_HOST";
/// IMAP port override.
pub const ENV_IMAP_PORT: &str = "CVMAIL_IMAP_PORT";
/// Mailbox override.
pub const ENV_MAILBOX: &str = "CVMAIL_MAILBOX";
/// Set to `true`/`1` to skip certificate validation.
pub const ENV_ACCEPT_INVALID_CERTS: &str = "CVMAIL_ACCEPT_INVALID_CERTS";

/// Everything needed to open a session against one mailbox.
#[derive(Clone, PartialEq, Eq)]
pub struct MailConfig {
    /// Transport settings.
    pub imap: Config,
    /// Login name, usually the email address.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Mailbox to select.
    pub mailbox: String,
}

impl MailConfig {
    /// Creates a configuration for `imap` that selects the inbox.
    #[must_use]
    pub fn new(imap: Config, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            imap,
            username: username.into(),
            password: password.into(),
            mailbox: DEFAULT_MAILBOX.to_string(),
        }
    }

    /// Gmail over implicit TLS on port 993.
    #[must_use]
    pub fn gmail(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(Config::new(GMAIL_IMAP_HOST), username, password)
    }

    /// Selects `mailbox` instead of the inbox.
    #[must_use]
    pub fn with_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    /// Reads the configuration from `CVMAIL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the address or password is missing, or if an
    /// optional variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let get = |name| lookup(name).filter(|v: &String| !v.trim().is_empty());

        let username = get(ENV_EMAIL).ok_or(ConfigError::Missing(ENV_EMAIL))?;
        let password = get(ENV_PASSWORD).ok_or(ConfigError::Missing(ENV_PASSWORD))?;
        let host = get(ENV_IMAP_HOST).unwrap_or_else(|| GMAIL_IMAP_HOST.to_string());

        let mut builder = Config::builder(host.trim());
        if let Some(port) = get(ENV_IMAP_PORT) {
            let port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                name: ENV_IMAP_PORT,
                value: port.clone(),
            })?;
            builder = builder.port(port);
        }
        if let Some(flag) = get(ENV_ACCEPT_INVALID_CERTS) {
            builder = builder.accept_invalid_certs(parse_flag(ENV_ACCEPT_INVALID_CERTS, &flag)?);
        }

        let mut config = Self::new(builder.build(), username.trim(), password);
        if let Some(mailbox) = get(ENV_MAILBOX) {
            config.mailbox = mailbox.trim().to_string();
        }
        Ok(config)
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("imap", &self.imap)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use cvmail_imap::Security;

    use super::*;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_gmail_defaults() {
        let config = MailConfig::gmail("me@gmail.com", "app-pass");
        assert_eq!(config.imap.host, "imap.gmail.com");
        assert_eq!(config.imap.port, 993);
        assert_eq!(config.imap.security, Security::Implicit);
        assert!(!config.imap.accept_invalid_certs);
        assert_eq!(config.mailbox, "INBOX");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = MailConfig::gmail("me@gmail.com", "hunter2");
        let debug = format!("{config:?}");
        assert!(debug.contains("me@gmail.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_lookup_minimal() {
        let config =
            MailConfig::from_lookup(lookup(&[(ENV_EMAIL, "me@gmail.com"), (ENV_PASSWORD, "pw")]))
                .unwrap();
        assert_eq!(config, MailConfig::gmail("me@gmail.com", "pw"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = MailConfig::from_lookup(lookup(&[
            (ENV_EMAIL, "hr@example.com"),
            (ENV_PASSWORD, "pw"),
            (ENV_IMAP_HOST, "mail.example.com"),
            (ENV_IMAP_PORT, "1993"),
            (ENV_MAILBOX, "Jobs"),
            (ENV_ACCEPT_INVALID_CERTS, "true"),
        ]))
        .unwrap();
        assert_eq!(config.imap.host, "mail.example.com");
        assert_eq!(config.imap.port, 1993);
        assert!(config.imap.accept_invalid_certs);
        assert_eq!(config.mailbox, "Jobs");
    }

    #[test]
    fn test_from_lookup_missing_password() {
        let err = MailConfig::from_lookup(lookup(&[(ENV_EMAIL, "me@gmail.com")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_PASSWORD));

        let err = MailConfig::from_lookup(lookup(&[(ENV_EMAIL, "  "), (ENV_PASSWORD, "pw")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_EMAIL));
    }

    #[test]
    fn test_from_lookup_bad_port() {
        let err = MailConfig::from_lookup(lookup(&[
            (ENV_EMAIL, "me@gmail.com"),
            (ENV_PASSWORD, "pw"),
            (ENV_IMAP_PORT, "imap"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == ENV_IMAP_PORT));
    }
}
