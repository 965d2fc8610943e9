//! Domain models for archived collaboration data.
//!
//! Every archived unit (chat message, email, calendar event) is a [`RawItem`]
//! carrying a tree of [`ContentPart`]s plus kind-specific metadata.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A node in an item's nested content structure.
///
/// Leaves carry a body or describe an attachment; inner nodes group sub-parts
/// (`multipart/*` in email, file lists and legacy attachments in chat).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPart {
    /// Media type, e.g. `text/plain`, `text/html`, `multipart/mixed`.
    pub mime_type: String,
    /// Attachment filename, if this part is a file.
    pub filename: Option<String>,
    /// Declared size in bytes (0 when unknown).
    pub size: u64,
    /// Decoded textual body, if any.
    pub body: Option<String>,
    /// Nested sub-parts, in document order.
    pub parts: Vec<Self>,
}

impl ContentPart {
    /// A `text/plain` leaf.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            mime_type: "text/plain".into(),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// A `text/html` leaf.
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            mime_type: "text/html".into(),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// An attachment leaf.
    #[must_use]
    pub fn attachment(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            mime_type: mime_type.into(),
            filename: Some(name.into()),
            size,
            ..Self::default()
        }
    }

    /// A container node.
    #[must_use]
    pub fn multipart(subtype: &str, parts: Vec<Self>) -> Self {
        Self {
            mime_type: format!("multipart/{subtype}"),
            parts,
            ..Self::default()
        }
    }

    /// Media type without parameters, lowercased.
    #[must_use]
    pub fn media_kind(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// One archived unit as returned by an external API, before extraction.
#[derive(Debug, Clone)]
pub struct RawItem<M> {
    /// Identifier unique within its collection.
    pub id: String,
    /// When the item was created or starts.
    pub timestamp: Option<DateTime<Utc>>,
    /// Nested content tree.
    pub content: ContentPart,
    /// Kind-specific metadata.
    pub meta: M,
}

/// Chat message metadata.
#[derive(Debug, Clone, Default)]
pub struct ChatMeta {
    /// Identifier of the sending user, resolved through the identity cache.
    pub sender_id: Option<String>,
    /// Free-form sender label for bots and integrations.
    pub sender_label: Option<String>,
    /// Message subtype (`bot_message`, `channel_join`, ...).
    pub subtype: Option<String>,
    /// Number of replies in the thread started by this message.
    pub reply_count: u32,
    /// Parent message id when this item is a thread reply.
    pub parent_id: Option<String>,
}

/// Email metadata.
#[derive(Debug, Clone, Default)]
pub struct EmailMeta {
    pub thread_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub subject: Option<String>,
    /// Human-readable label names.
    pub labels: Vec<String>,
}

/// Calendar event start/end. Compare through [`EventTime::instant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// Full-day event date.
    Date(NaiveDate),
    /// Timed event instant.
    DateTime(DateTime<Utc>),
}

impl EventTime {
    /// Renders the time in a stable UTC form.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }

    /// Calendar date this time falls on.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date(d) => *d,
            Self::DateTime(dt) => dt.date_naive(),
        }
    }

    /// Start-of-day instant for dates, the instant itself otherwise.
    #[must_use]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => d.and_hms_opt(0, 0, 0).map(|n| n.and_utc()),
            Self::DateTime(dt) => Some(*dt),
        }
    }
}

/// A single event attendee.
#[derive(Debug, Clone, Default)]
pub struct Attendee {
    pub name: Option<String>,
    pub email: Option<String>,
    pub response: Option<String>,
}

impl Attendee {
    /// Display label: name and email when both are known.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) if name != email => format!("{name} <{email}>"),
            (Some(name), _) => name.clone(),
            (None, Some(email)) => email.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

/// Calendar event metadata.
#[derive(Debug, Clone, Default)]
pub struct EventMeta {
    pub title: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub status: Option<String>,
    pub organizer: Option<String>,
    pub location: Option<String>,
    pub recurrence: Vec<String>,
    pub attendees: Vec<Attendee>,
    pub link: Option<String>,
}

impl EventMeta {
    /// Whether the event spans whole days.
    #[must_use]
    pub const fn all_day(&self) -> bool {
        matches!(self.start, Some(EventTime::Date(_)))
    }
}

pub type ChatItem = RawItem<ChatMeta>;
pub type EmailItem = RawItem<EmailMeta>;
pub type EventItem = RawItem<EventMeta>;

/// Attachment metadata collected from the content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Text and attachments pulled out of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub plain_text: String,
    pub attachments: Vec<Attachment>,
}

/// One rendered record, ready for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedRecord(String);

impl FormattedRecord {
    #[must_use]
    pub const fn new(text: String) -> Self {
        Self(text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FormattedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One complete output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUnit {
    /// Sanitized file name, including extension.
    pub name: String,
    /// Full UTF-8 text content.
    pub content: String,
}

/// Which archiver produced a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArchiveKind {
    Chat,
    Email,
    Calendar,
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Email => write!(f, "email"),
            Self::Calendar => write!(f, "calendar"),
        }
    }
}

/// Outcome of archiving one collection (conversation, label, calendar).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CollectionStatus {
    /// Every page was fetched and every file written.
    Complete,
    /// Enumeration aborted; partial results were written.
    Incomplete { reason: String },
    /// Writing output failed; nothing reliable was persisted.
    Failed { reason: String },
}

/// Per-collection entry of the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    /// Logical grouping key (conversation, label, calendar name).
    pub key: String,
    pub records: usize,
    pub files: usize,
    pub status: CollectionStatus,
}

/// Summary of one archiving run.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub kind: ArchiveKind,
    pub collections: Vec<CollectionReport>,
    /// Number of identity lookups issued against the remote service.
    pub identity_lookups: usize,
}

impl ArchiveReport {
    #[must_use]
    pub const fn new(kind: ArchiveKind) -> Self {
        Self {
            kind,
            collections: Vec::new(),
            identity_lookups: 0,
        }
    }

    /// Total records across collections.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.collections.iter().map(|c| c.records).sum()
    }

    /// Total files written across collections.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.collections.iter().map(|c| c.files).sum()
    }

    /// Collections that did not complete cleanly.
    #[must_use]
    pub fn problem_count(&self) -> usize {
        self.collections
            .iter()
            .filter(|c| c.status != CollectionStatus::Complete)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_strips_parameters() {
        let part = ContentPart {
            mime_type: "Text/HTML; charset=UTF-8".into(),
            ..ContentPart::default()
        };
        assert_eq!(part.media_kind(), "text/html");
    }

    #[test]
    fn test_event_time_ordering_and_display() {
        let date = EventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let later = EventTime::DateTime(
            DateTime::from_timestamp(1_709_290_800, 0).unwrap(), // 2024-03-01 11:00 UTC
        );
        assert_eq!(date.display(), "2024-03-01");
        assert_eq!(later.display(), "2024-03-01 11:00:00 UTC");
        assert!(date.instant() < later.instant());
    }

    #[test]
    fn test_attendee_label() {
        let both = Attendee {
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            response: None,
        };
        assert_eq!(both.label(), "Ada <ada@example.com>");
        assert_eq!(Attendee::default().label(), "Unknown");
    }

    #[test]
    fn test_report_totals() {
        let mut report = ArchiveReport::new(ArchiveKind::Email);
        report.collections.push(CollectionReport {
            key: "INBOX".into(),
            records: 3,
            files: 1,
            status: CollectionStatus::Complete,
        });
        report.collections.push(CollectionReport {
            key: "SENT".into(),
            records: 2,
            files: 1,
            status: CollectionStatus::Incomplete {
                reason: "timeout".into(),
            },
        });
        assert_eq!(report.total_records(), 5);
        assert_eq!(report.total_files(), 2);
        assert_eq!(report.problem_count(), 1);
    }
}
