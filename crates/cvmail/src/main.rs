//! `cvmail` - fetch a mailbox and sort applications into job-title buckets.
//!
//! Credentials come from `CVMAIL_*` environment variables, optionally
//! loaded from a `.env` file. Results are printed as JSON on stdout; logs
//! go to stderr.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cvmail_core::{CategorizedMailbox, Categorizer, JobCategory, MailConfig, MailService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cvmail", version, about = "Sort a mailbox into job-title buckets")]
struct Cli {
    /// Mailbox to read instead of the configured one.
    #[arg(long, global = true, env = "CVMAIL_MAILBOX")]
    mailbox: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch recent messages and print them grouped by category.
    Fetch {
        /// Number of most recent messages to fetch.
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Only fetch unread messages (they stay unread).
        #[arg(long)]
        unread: bool,

        /// Print only the JSON document.
        #[arg(long)]
        json_only: bool,

        /// JSON file with `[{"name": ..., "keywords": [...]}]` categories.
        #[arg(long)]
        categories: Option<PathBuf>,
    },

    /// Check that the account can be reached and the mailbox read.
    Check,

    /// Save one attachment of a message to disk.
    Attachment {
        /// Message-ID header of the message, angle brackets included.
        #[arg(long)]
        message_id: String,

        /// Attachment filename as shown in `fetch` output.
        #[arg(long)]
        filename: String,

        /// Where to write the file; defaults to the attachment filename.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = MailConfig::from_env().context("reading mailbox configuration")?;
    if let Some(mailbox) = cli.mailbox {
        config = config.with_mailbox(mailbox);
    }

    match cli.command {
        Command::Fetch {
            limit,
            unread,
            json_only,
            categories,
        } => {
            let categorizer = load_categorizer(categories.as_deref()).await?;
            fetch(MailService::new(config, categorizer), limit, unread, json_only).await
        }
        Command::Check => {
            let service = MailService::new(config, Categorizer::with_defaults()?);
            if !service.test_connection().await {
                bail!("connection test failed");
            }
            println!("ok");
            Ok(())
        }
        Command::Attachment {
            message_id,
            filename,
            output,
        } => {
            let service = MailService::new(config, Categorizer::with_defaults()?);
            let attachment = service
                .find_attachment(&message_id, &filename)
                .await?
                .with_context(|| format!("no attachment {filename:?} on {message_id}"))?;

            let path = output.unwrap_or_else(|| PathBuf::from(safe_file_name(&attachment.filename)));
            tokio::fs::write(&path, &attachment.data)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), size = attachment.size, "attachment saved");
            Ok(())
        }
    }
}

async fn load_categorizer(path: Option<&Path>) -> Result<Categorizer> {
    let Some(path) = path else {
        return Ok(Categorizer::with_defaults()?);
    };

    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let categories: Vec<JobCategory> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Categorizer::new(categories)?)
}

async fn fetch(service: MailService, limit: usize, unread: bool, json_only: bool) -> Result<()> {
    let messages = if unread {
        service.fetch_unread(limit).await?
    } else {
        service.fetch_all(limit).await?
    };
    info!(count = messages.len(), "messages retrieved");

    let mailbox = service.categorize_all(messages);
    if !json_only {
        print_summary(&mailbox);
    }
    println!("{}", serde_json::to_string_pretty(&mailbox)?);
    Ok(())
}

fn print_summary(mailbox: &CategorizedMailbox) {
    for (name, messages) in mailbox.iter() {
        println!("{name}: {}", messages.len());
        for message in messages {
            let clip = if message.has_attachments { " 📎" } else { "" };
            println!("  {} | {} | {}{clip}", message.date, message.sender, message.subject);
        }
    }
    println!();
}

/// Keeps only the final path component of a server-supplied name.
fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        "attachment".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_flags() {
        let cli = Cli::try_parse_from(["cvmail", "fetch", "--limit", "5", "--unread", "--json-only"])
            .unwrap();
        match cli.command {
            Command::Fetch {
                limit,
                unread,
                json_only,
                categories,
            } => {
                assert_eq!(limit, 5);
                assert!(unread);
                assert!(json_only);
                assert!(categories.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("cv.pdf"), "cv.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\temp\\cv.docx"), "cv.docx");
        assert_eq!(safe_file_name(".."), "attachment");
        assert_eq!(safe_file_name("dir/"), "attachment");
    }

    proptest! {
        #[test]
        fn safe_file_name_has_no_separators(name in "\\PC{0,40}") {
            let safe = safe_file_name(&name);
            prop_assert!(!safe.is_empty());
            prop_assert!(!safe.contains('/') && !safe.contains('\\'));
        }
    }
}
