//! Application layer - the archiving pipeline and its orchestration.
//!
//! Paginator yields raw items, the extractor and normalizer turn them into
//! text, the formatter renders records and the batch writer groups them into
//! output files.

pub mod archive;
pub mod batch;
pub mod calendar_archiver;
pub mod chat_archiver;
pub mod email_archiver;
pub mod extractor;
pub mod formatter;
pub mod identity;
pub mod normalizer;
pub mod paginator;

pub use archive::OutputSink;
pub use calendar_archiver::{CalendarApi, CalendarArchiver};
pub use chat_archiver::{ChatApi, ChatArchiver, Conversation};
pub use email_archiver::{EmailArchiver, MailApi, MailLabel};
pub use formatter::{format_report_table, format_report_totals};
pub use identity::IdentitySource;
pub use paginator::{Page, ThreadPacer};
