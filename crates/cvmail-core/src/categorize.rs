//! Job-title categorization of messages by subject.

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::decoder::ParsedMessage;

/// Bucket for messages that match no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A named set of keyword phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCategory {
    /// Category (bucket) name.
    pub name: String,
    /// Phrases matched as whole words, in order.
    pub keywords: Vec<String>,
}

impl JobCategory {
    /// Creates a category.
    pub fn new<I, K>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// The built-in categories.
#[must_use]
pub fn default_categories() -> Vec<JobCategory> {
    vec![
        JobCategory::new("Prompt Engineer", ["prompt engineer"]),
        JobCategory::new("Software Engineer", ["software engineer"]),
        JobCategory::new("Process Engineer", ["process engineer"]),
    ]
}

/// Assigns each subject to the first category with a matching keyword.
#[derive(Debug, Clone)]
pub struct Categorizer {
    categories: Vec<CompiledCategory>,
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    category: JobCategory,
    patterns: Vec<Regex>,
}

impl Categorizer {
    /// Compiles `categories`. Order decides precedence. Blank keywords
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a keyword pattern exceeds the regex size limits.
    pub fn new(categories: Vec<JobCategory>) -> Result<Self, regex::Error> {
        let categories = categories
            .into_iter()
            .map(|category| -> Result<CompiledCategory, regex::Error> {
                let patterns = category
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .map(|k| Regex::new(&format!(r"\b{}\b", regex::escape(&k))))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledCategory { category, patterns })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { categories })
    }

    /// Categorizer for [`default_categories`].
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_defaults() -> Result<Self, regex::Error> {
        Self::new(default_categories())
    }

    /// Configured categories in precedence order.
    pub fn categories(&self) -> impl Iterator<Item = &JobCategory> {
        self.categories.iter().map(|c| &c.category)
    }

    /// Category name for `subject`, or [`UNCATEGORIZED`].
    #[must_use]
    pub fn categorize_one(&self, subject: &str) -> &str {
        let subject = subject.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.patterns.iter().any(|p| p.is_match(&subject)))
            .map_or(UNCATEGORIZED, |c| c.category.name.as_str())
    }

    /// Buckets every message by subject, keeping input order per bucket.
    #[must_use]
    pub fn categorize_all<I>(&self, messages: I) -> CategorizedMailbox
    where
        I: IntoIterator<Item = ParsedMessage>,
    {
        let mut mailbox = CategorizedMailbox::with_buckets(
            self.categories()
                .map(|c| c.name.as_str())
                .chain(std::iter::once(UNCATEGORIZED)),
        );

        for message in messages {
            let name = self.categorize_one(&message.subject);
            tracing::trace!(subject = %message.subject, category = name, "categorized");
            mailbox.push(name, message);
        }
        mailbox
    }
}

/// Category name to messages, in category order with
/// [`UNCATEGORIZED`] last.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedMailbox {
    buckets: Vec<(String, Vec<ParsedMessage>)>,
}

impl CategorizedMailbox {
    fn with_buckets<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut mailbox = Self::default();
        for name in names {
            if mailbox.get(name).is_none() {
                mailbox.buckets.push((name.to_string(), Vec::new()));
            }
        }
        mailbox
    }

    fn push(&mut self, name: &str, message: ParsedMessage) {
        if let Some((_, messages)) = self.buckets.iter_mut().find(|(n, _)| n == name) {
            messages.push(message);
        } else {
            self.buckets.push((name.to_string(), vec![message]));
        }
    }

    /// Messages in bucket `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[ParsedMessage]> {
        self.buckets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, messages)| messages.as_slice())
    }

    /// Buckets in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParsedMessage])> {
        self.buckets
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    /// Bucket names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(name, _)| name.as_str())
    }

    /// Total number of messages across buckets.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.buckets.iter().map(|(_, messages)| messages.len()).sum()
    }
}

impl Serialize for CategorizedMailbox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (name, messages) in &self.buckets {
            map.serialize_entry(name, messages)?;
        }
        map.end()
    }
}
