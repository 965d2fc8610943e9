//! Infrastructure layer - external adapters (HTTP services, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod gmail;
pub mod google_calendar;
pub mod http;
pub mod output;
pub mod slack;

pub use config::{load_config, render_config, write_default_config};
pub use gmail::{GmailClient, GMAIL_API_URL};
pub use google_calendar::{CalendarClient, CALENDAR_API_URL};
pub use http::ApiClient;
pub use output::DirectorySink;
pub use slack::{SlackClient, SLACK_API_URL};
