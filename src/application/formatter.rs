//! Record rendering for archived items.
//!
//! Every item kind renders through [`RecordBuilder`], which owns the layout:
//! header fields, optional attachment listing, body, each framed by fixed
//! 80-column rules. Field order and placeholders are fixed per item kind.

use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{
    ArchiveReport, Attachment, ChatItem, CollectionStatus, EmailItem, EventItem,
    ExtractedContent, FormattedRecord,
};

use super::identity::{IdentityCache, IdentitySource};

/// Frames a record.
pub const RECORD_RULE: &str =
    "================================================================================";
/// Separates sections inside a record.
pub const SECTION_RULE: &str =
    "--------------------------------------------------------------------------------";

const UNKNOWN: &str = "Unknown";
const NO_SUBJECT: &str = "(No subject)";
const NO_TITLE: &str = "(No title)";
const NO_CONTENT: &str = "(No content)";

/// A header line.
#[derive(Debug, Clone)]
enum HeaderLine {
    Field { key: &'static str, value: String },
    List { key: &'static str, items: Vec<String> },
}

/// One section of a record, rendered in order.
#[derive(Debug, Clone)]
enum Section {
    Header(Vec<HeaderLine>),
    Attachments(Vec<Attachment>),
    Body(String),
}

impl Section {
    /// Whether the section produces any output.
    fn is_empty(&self) -> bool {
        match self {
            Self::Header(lines) => lines.is_empty(),
            Self::Attachments(attachments) => attachments.is_empty(),
            Self::Body(_) => false,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Header(lines) => {
                for line in lines {
                    match line {
                        HeaderLine::Field { key, value } => {
                            push_line(out, &format!("{key}: {value}"));
                        }
                        HeaderLine::List { key, items } => {
                            push_line(out, &format!("{key}: {}", items.len()));
                            for item in items {
                                push_line(out, &format!("  - {item}"));
                            }
                        }
                    }
                }
            }
            Self::Attachments(attachments) => {
                push_line(out, &format!("Attachments ({}):", attachments.len()));
                for a in attachments {
                    push_line(
                        out,
                        &format!("  - {} [{}, {} bytes]", a.name, a.mime_type, a.size),
                    );
                }
            }
            Self::Body(text) => {
                let text = text.trim();
                push_line(out, if text.is_empty() { NO_CONTENT } else { text });
            }
        }
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Collapses a header value onto one line.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds a record with a fixed section layout.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    header: Vec<HeaderLine>,
    attachments: Vec<Attachment>,
    body: String,
}

impl RecordBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always-rendered field.
    #[must_use]
    pub fn field(mut self, key: &'static str, value: impl AsRef<str>) -> Self {
        self.header.push(HeaderLine::Field {
            key,
            value: single_line(value.as_ref()),
        });
        self
    }

    /// Field rendered with `placeholder` when the value is absent or blank.
    #[must_use]
    pub fn field_or(self, key: &'static str, value: Option<&str>, placeholder: &str) -> Self {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => self.field(key, v),
            None => self.field(key, placeholder),
        }
    }

    /// Field omitted entirely when the value is absent or blank.
    #[must_use]
    pub fn optional_field(self, key: &'static str, value: Option<&str>) -> Self {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Count line followed by one indented line per item.
    #[must_use]
    pub fn list_field(mut self, key: &'static str, items: Vec<String>) -> Self {
        self.header.push(HeaderLine::List {
            key,
            items: items.iter().map(|i| single_line(i)).collect(),
        });
        self
    }

    #[must_use]
    pub fn attachments(mut self, attachments: &[Attachment]) -> Self {
        self.attachments = attachments.to_vec();
        self
    }

    #[must_use]
    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body = text.into();
        self
    }

    /// Renders the sections in their fixed order.
    #[must_use]
    pub fn build(self) -> FormattedRecord {
        let sections = [
            Section::Header(self.header),
            Section::Attachments(self.attachments),
            Section::Body(self.body),
        ];

        let mut out = String::new();
        push_line(&mut out, RECORD_RULE);

        let mut first = true;
        for section in sections.iter().filter(|s| !s.is_empty()) {
            if !first {
                push_line(&mut out, SECTION_RULE);
            }
            section.render(&mut out);
            first = false;
        }

        push_line(&mut out, RECORD_RULE);
        FormattedRecord::new(out)
    }
}

/// Stable UTC rendering used by every record kind.
#[must_use]
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || UNKNOWN.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Renders one chat message, resolving the sender through `identities`.
pub fn format_chat_message(
    item: &ChatItem,
    content: &ExtractedContent,
    identities: &mut IdentityCache,
    directory: &mut dyn IdentitySource,
) -> FormattedRecord {
    let meta = &item.meta;

    let sender = match (meta.sender_id.as_deref(), meta.sender_label.as_deref()) {
        (Some(id), _) if !id.is_empty() => identities.resolve(id, directory),
        (_, Some(label)) if !label.is_empty() => label.to_string(),
        _ => UNKNOWN.to_string(),
    };

    RecordBuilder::new()
        .field("Message-ID", &item.id)
        .field("Timestamp", format_timestamp(item.timestamp))
        .field("From", sender)
        .field_or("Type", meta.subtype.as_deref(), "message")
        .field("Thread-Replies", meta.reply_count.to_string())
        .optional_field("In-Thread", meta.parent_id.as_deref())
        .attachments(&content.attachments)
        .body(content.plain_text.as_str())
        .build()
}

/// Renders one email.
#[must_use]
pub fn format_email(item: &EmailItem, content: &ExtractedContent) -> FormattedRecord {
    let meta = &item.meta;
    let labels = if meta.labels.is_empty() {
        "None".to_string()
    } else {
        meta.labels.join(", ")
    };

    RecordBuilder::new()
        .field("Message-ID", &item.id)
        .field_or("Thread-ID", meta.thread_id.as_deref(), UNKNOWN)
        .field("Date", format_timestamp(item.timestamp))
        .field_or("From", meta.from.as_deref(), UNKNOWN)
        .field_or("To", meta.to.as_deref(), UNKNOWN)
        .optional_field("Cc", meta.cc.as_deref())
        .field_or("Subject", meta.subject.as_deref(), NO_SUBJECT)
        .field("Labels", labels)
        .attachments(&content.attachments)
        .body(content.plain_text.as_str())
        .build()
}

/// Renders one calendar event.
#[must_use]
pub fn format_event(item: &EventItem, content: &ExtractedContent) -> FormattedRecord {
    let meta = &item.meta;
    let start = meta.start.map(|t| t.display());
    let end = meta.end.map(|t| t.display());
    let recurrence = (!meta.recurrence.is_empty()).then(|| meta.recurrence.join("; "));
    let attendees = meta
        .attendees
        .iter()
        .map(|a| match a.response.as_deref() {
            Some(response) => format!("{} ({response})", a.label()),
            None => a.label(),
        })
        .collect();

    RecordBuilder::new()
        .field("Event-ID", &item.id)
        .field_or("Title", meta.title.as_deref(), NO_TITLE)
        .field_or("Start", start.as_deref(), UNKNOWN)
        .field_or("End", end.as_deref(), UNKNOWN)
        .field("All-Day", if meta.all_day() { "yes" } else { "no" })
        .field_or("Status", meta.status.as_deref(), UNKNOWN)
        .field_or("Organizer", meta.organizer.as_deref(), UNKNOWN)
        .optional_field("Location", meta.location.as_deref())
        .optional_field("Recurrence", recurrence.as_deref())
        .list_field("Attendees", attendees)
        .optional_field("Link", meta.link.as_deref())
        .attachments(&content.attachments)
        .body(content.plain_text.as_str())
        .build()
}

/// Formats the per-collection summary of a run as a table.
#[must_use]
pub fn format_report_table(report: &ArchiveReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Collection", "Records", "Files", "Status"]);

    for c in &report.collections {
        let status = match &c.status {
            CollectionStatus::Complete => "complete".to_string(),
            CollectionStatus::Incomplete { reason } => {
                format!("incomplete: {}", truncate(reason, 40))
            }
            CollectionStatus::Failed { reason } => format!("failed: {}", truncate(reason, 40)),
        };

        table.add_row(vec![
            truncate(&c.key, 35),
            c.records.to_string(),
            c.files.to_string(),
            status,
        ]);
    }

    table.to_string()
}

/// Formats run totals for display.
#[must_use]
pub fn format_report_totals(report: &ArchiveReport) -> String {
    let problems = report.problem_count();
    let problems = if problems == 0 {
        problems.to_string().green()
    } else {
        problems.to_string().red()
    };

    format!(
        "{}\n  Collections: {}\n  Records: {}\n  Files written: {}\n  Identity lookups: {}\n  With problems: {}",
        format!("📊 {} archive", report.kind).bold(),
        report.collections.len().to_string().cyan(),
        report.total_records().to_string().cyan(),
        report.total_files().to_string().green(),
        report.identity_lookups.to_string().yellow(),
        problems
    )
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
