//! Attachment extraction.

use cvmail_mime::{Message, Part};
use serde::Serialize;

/// Icon used for extensions missing from the table.
pub const DEFAULT_ICON: &str = "📎";

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// A decoded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Decoded filename.
    pub filename: String,
    /// Lowercase `type/subtype`.
    pub content_type: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// Human-readable size, e.g. `2.0 KB`.
    pub size_display: String,
    /// Decoded content.
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Lowercase extension, or `file` when there is none.
    pub extension: String,
    /// Icon for the extension.
    pub icon: &'static str,
}

impl Attachment {
    /// Builds an attachment from a part marked as one.
    ///
    /// Returns `None` when the part has no filename or no decodable,
    /// non-empty payload.
    #[must_use]
    pub fn from_part(part: &Part) -> Option<Self> {
        let filename = part.filename()?.trim().to_string();
        if filename.is_empty() {
            return None;
        }

        let data = match part.decode_body() {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                tracing::debug!(%filename, "skipping empty attachment");
                return None;
            }
            Err(e) => {
                tracing::debug!(%filename, error = %e, "skipping undecodable attachment");
                return None;
            }
        };

        let size = data.len() as u64;
        let extension = extension_of(&filename);
        Some(Self {
            content_type: part.content_type().mime_type(),
            size,
            size_display: format_size(size),
            icon: icon_for(&extension),
            extension,
            filename,
            data,
        })
    }
}

/// Attachments of a multipart message in document order.
#[must_use]
pub fn extract(message: &Message) -> Vec<Attachment> {
    if !message.is_multipart() {
        return Vec::new();
    }

    message
        .walk()
        .filter(|part| !part.is_multipart() && part.is_attachment())
        .filter_map(Attachment::from_part)
        .collect()
}

/// True when a multipart message has any part marked as an attachment.
#[must_use]
pub fn has_attachments(message: &Message) -> bool {
    message.is_multipart() && message.walk().any(Part::is_attachment)
}

/// Formats a byte count as `N B`, `x.y KB` or `x.y MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(size: u64) -> String {
    if size < KIB {
        format!("{size} B")
    } else if size < MIB {
        format!("{:.1} KB", size as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", size as f64 / MIB as f64)
    }
}

/// Lowercase text after the last `.`, or `file`.
#[must_use]
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map_or_else(|| "file".to_string(), |(_, ext)| ext.to_lowercase())
}

/// Icon for a lowercase extension.
#[must_use]
pub fn icon_for(extension: &str) -> &'static str {
    match extension {
        "pdf" | "txt" => "📄",
        "doc" | "docx" => "📝",
        "xls" | "xlsx" => "📊",
        "ppt" | "pptx" => "📽️",
        "jpg" | "jpeg" | "png" | "gif" => "🖼️",
        "zip" | "rar" | "7z" => "🗜️",
        "mp4" | "avi" | "mov" => "🎥",
        "mp3" | "wav" => "🎵",
        "exe" | "msi" => "⚙️",
        "html" | "htm" => "🌐",
        "css" => "🎨",
        "js" => "📜",
        _ => DEFAULT_ICON,
    }
}
