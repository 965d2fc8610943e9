//! Domain layer - core types, configuration and errors.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (network, filesystem).

pub mod config;
pub mod error;
pub mod models;

pub use config::{
    access_token, AppConfig, CalendarConfig, ChatConfig, DateRange, EmailConfig, EmailMode,
    EmailOptions,
};
pub use error::{AppError, Result};
pub use models::{
    ArchiveKind, ArchiveReport, Attachment, Attendee, ChatItem, ChatMeta, CollectionReport,
    CollectionStatus, ContentPart, EmailItem, EmailMeta, EventItem, EventMeta, EventTime,
    ExtractedContent, FormattedRecord, OutputUnit, RawItem,
};
