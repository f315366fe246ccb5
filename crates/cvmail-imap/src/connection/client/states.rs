//! Type-state markers for the client.

use std::sync::Arc;

/// Connected, greeting read, not logged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox open.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is open.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Arc<str>,
}

impl Selected {
    /// Creates the selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<Arc<str>>) -> Self {
        Self {
            mailbox: mailbox.into(),
        }
    }

    /// Name of the open mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_states_are_send_sync() {
        assert_send_sync::<NotAuthenticated>();
        assert_send_sync::<Authenticated>();
        assert_send_sync::<Selected>();
    }

    #[test]
    fn test_selected_mailbox() {
        assert_eq!(Selected::new("Job Offers").mailbox(), "Job Offers");
    }
}
