//! Mailbox operations exposed to callers.
//!
//! Every operation opens its own session and releases it before
//! returning.

mod mail;

pub use mail::MailService;
