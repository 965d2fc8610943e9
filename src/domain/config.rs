//! Archiver configuration.
//!
//! One explicit struct per archiver, deserialized from TOML with per-field
//! defaults, then checked once by [`AppConfig::validate`] before any request
//! is made.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives the archive files.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("archives")
}

/// Chat (Slack) archiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Environment variable holding the access token.
    #[serde(default = "default_chat_token_env")]
    pub token_env: String,

    /// Messages requested per page.
    #[serde(default = "default_chat_page_size")]
    pub page_size: u32,

    /// Pause between page fetches in milliseconds.
    #[serde(default = "default_chat_delay_ms")]
    pub delay_ms: u64,

    /// Stop after this many messages per conversation.
    #[serde(default)]
    pub max_messages: Option<usize>,

    /// Conversation names to archive (empty = all).
    #[serde(default)]
    pub conversations: Vec<String>,

    /// Conversation types passed to the listing call.
    #[serde(default = "default_chat_types")]
    pub types: String,

    /// Pull thread replies into the conversation file.
    #[serde(default)]
    pub include_threads: bool,

    /// Keep markup-bearing parts verbatim instead of normalizing them.
    #[serde(default)]
    pub include_markup: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            token_env: default_chat_token_env(),
            page_size: default_chat_page_size(),
            delay_ms: default_chat_delay_ms(),
            max_messages: None,
            conversations: Vec::new(),
            types: default_chat_types(),
            include_threads: false,
            include_markup: false,
        }
    }
}

fn default_chat_token_env() -> String {
    "SLACK_TOKEN".into()
}

const fn default_chat_page_size() -> u32 {
    200
}

const fn default_chat_delay_ms() -> u64 {
    1000
}

fn default_chat_types() -> String {
    "public_channel,private_channel,mpim,im".into()
}

impl ChatConfig {
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Which mailbox slice the email archiver walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailMode {
    /// Messages labelled INBOX.
    #[default]
    Inbox,
    /// Messages labelled SENT.
    Sent,
    /// Every message in the mailbox.
    All,
    /// One collection per configured label.
    Labels,
    /// Messages matching a free-form search query.
    Query,
}

impl EmailMode {
    /// Whether the advanced options (promotion exclusion, HTML inclusion)
    /// may be overridden in this mode.
    #[must_use]
    pub const fn accepts_advanced_options(self) -> bool {
        matches!(self, Self::All | Self::Query)
    }

    /// Built-in `(exclude_promotions, include_html)` for the mode.
    #[must_use]
    pub const fn default_options(self) -> (bool, bool) {
        match self {
            Self::Inbox | Self::All => (true, false),
            Self::Sent | Self::Labels | Self::Query => (false, false),
        }
    }
}

impl std::str::FromStr for EmailMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inbox" => Ok(Self::Inbox),
            "sent" => Ok(Self::Sent),
            "all" => Ok(Self::All),
            "labels" | "label" => Ok(Self::Labels),
            "query" | "search" => Ok(Self::Query),
            _ => Err(format!(
                "Unknown email mode: {s}. Use: inbox, sent, all, labels, query"
            )),
        }
    }
}

impl std::fmt::Display for EmailMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::All => "all",
            Self::Labels => "labels",
            Self::Query => "query",
        };
        f.write_str(name)
    }
}

/// Email (Gmail) archiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_token_env")]
    pub token_env: String,

    #[serde(default)]
    pub mode: EmailMode,

    /// Label names for `labels` mode.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Search expression for `query` mode.
    #[serde(default)]
    pub query: Option<String>,

    /// Inclusive lower date bound, `YYYY-MM-DD`.
    #[serde(default)]
    pub after: Option<String>,

    /// Exclusive upper date bound, `YYYY-MM-DD`.
    #[serde(default)]
    pub before: Option<String>,

    /// Override for promotional mail exclusion (`all` and `query` only).
    #[serde(default)]
    pub exclude_promotions: Option<bool>,

    /// Override for raw HTML inclusion (`all` and `query` only).
    #[serde(default)]
    pub include_html: Option<bool>,

    #[serde(default = "default_email_page_size")]
    pub page_size: u32,

    #[serde(default = "default_api_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Stop after this many messages per collection.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            token_env: default_email_token_env(),
            mode: EmailMode::default(),
            labels: Vec::new(),
            query: None,
            after: None,
            before: None,
            exclude_promotions: None,
            include_html: None,
            page_size: default_email_page_size(),
            delay_ms: default_api_delay_ms(),
            batch_size: default_batch_size(),
            max_results: None,
        }
    }
}

fn default_email_token_env() -> String {
    "GMAIL_TOKEN".into()
}

const fn default_email_page_size() -> u32 {
    100
}

const fn default_api_delay_ms() -> u64 {
    100
}

const fn default_batch_size() -> usize {
    100
}

/// Resolved per-run email behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailOptions {
    pub exclude_promotions: bool,
    pub include_html: bool,
}

impl EmailConfig {
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Applies the per-mode defaults and, where the mode allows it, the
    /// configured overrides.
    #[must_use]
    pub fn options(&self) -> EmailOptions {
        let (exclude_promotions, include_html) = self.mode.default_options();
        if self.mode.accepts_advanced_options() {
            EmailOptions {
                exclude_promotions: self.exclude_promotions.unwrap_or(exclude_promotions),
                include_html: self.include_html.unwrap_or(include_html),
            }
        } else {
            EmailOptions {
                exclude_promotions,
                include_html,
            }
        }
    }

    /// Overrides that the selected mode will ignore.
    #[must_use]
    pub fn ignored_overrides(&self) -> Vec<&'static str> {
        if self.mode.accepts_advanced_options() {
            return Vec::new();
        }
        let mut ignored = Vec::new();
        if self.exclude_promotions.is_some() {
            ignored.push("exclude_promotions");
        }
        if self.include_html.is_some() {
            ignored.push("include_html");
        }
        ignored
    }

    /// Builds the mailbox search expression for this configuration.
    ///
    /// # Errors
    /// Returns error if a date bound is malformed.
    pub fn search_query(&self) -> Result<String> {
        let mut terms = Vec::new();

        if self.mode == EmailMode::Query {
            if let Some(query) = self.query.as_deref().map(str::trim) {
                if !query.is_empty() {
                    terms.push(query.to_string());
                }
            }
        }

        let range = DateRange::parse(self.after.as_deref(), self.before.as_deref())?;
        if let Some(after) = range.after {
            terms.push(format!("after:{}", after.format("%Y/%m/%d")));
        }
        if let Some(before) = range.before {
            terms.push(format!("before:{}", before.format("%Y/%m/%d")));
        }

        if self.options().exclude_promotions {
            terms.push("-category:promotions".to_string());
        }

        Ok(terms.join(" "))
    }
}

/// Calendar (Google Calendar) archiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_token_env")]
    pub token_env: String,

    /// Calendar identifiers to export.
    #[serde(default = "default_calendars")]
    pub calendars: Vec<String>,

    #[serde(default)]
    pub after: Option<String>,

    #[serde(default)]
    pub before: Option<String>,

    #[serde(default = "default_calendar_page_size")]
    pub page_size: u32,

    #[serde(default = "default_api_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub include_markup: bool,

    #[serde(default)]
    pub max_results: Option<usize>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            token_env: default_calendar_token_env(),
            calendars: default_calendars(),
            after: None,
            before: None,
            page_size: default_calendar_page_size(),
            delay_ms: default_api_delay_ms(),
            batch_size: default_batch_size(),
            include_markup: false,
            max_results: None,
        }
    }
}

fn default_calendar_token_env() -> String {
    "GCAL_TOKEN".into()
}

fn default_calendars() -> Vec<String> {
    vec!["primary".into()]
}

const fn default_calendar_page_size() -> u32 {
    250
}

impl CalendarConfig {
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Parsed time window.
    ///
    /// # Errors
    /// Returns error if a date bound is malformed or inverted.
    pub fn window(&self) -> Result<DateRange> {
        DateRange::parse(self.after.as_deref(), self.before.as_deref())
    }
}

/// Optional `[after, before)` date window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateRange {
    /// Parses `YYYY-MM-DD` bounds.
    ///
    /// # Errors
    /// Returns error if a bound is malformed or `after` is not before `before`.
    pub fn parse(after: Option<&str>, before: Option<&str>) -> Result<Self> {
        let range = Self {
            after: after.map(parse_date).transpose()?,
            before: before.map(parse_date).transpose()?,
        };

        if let (Some(a), Some(b)) = (range.after, range.before) {
            if a >= b {
                return Err(AppError::config(format!(
                    "Date range is empty: after {a} is not before {b}"
                )));
            }
        }

        Ok(range)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| AppError::config(format!("Invalid date '{value}' (expected YYYY-MM-DD): {e}")))
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".collab-archiver")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Checks every option once, before any request is made.
    ///
    /// # Errors
    /// Returns a configuration error describing the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if self.output.dir.as_os_str().is_empty() {
            return Err(AppError::config("output.dir must not be empty"));
        }

        check_page_size("chat.page_size", self.chat.page_size, 1000)?;
        check_page_size("email.page_size", self.email.page_size, 500)?;
        check_page_size("calendar.page_size", self.calendar.page_size, 2500)?;

        check_limit("chat.max_messages", self.chat.max_messages)?;
        check_limit("email.max_results", self.email.max_results)?;
        check_limit("calendar.max_results", self.calendar.max_results)?;

        if self.email.batch_size == 0 {
            return Err(AppError::config("email.batch_size must be at least 1"));
        }
        if self.calendar.batch_size == 0 {
            return Err(AppError::config("calendar.batch_size must be at least 1"));
        }

        match self.email.mode {
            EmailMode::Labels if self.email.labels.iter().all(|l| l.trim().is_empty()) => {
                return Err(AppError::config(
                    "email.mode = \"labels\" requires at least one entry in email.labels",
                ));
            }
            EmailMode::Query
                if self
                    .email
                    .query
                    .as_deref()
                    .is_none_or(|q| q.trim().is_empty()) =>
            {
                return Err(AppError::config(
                    "email.mode = \"query\" requires email.query",
                ));
            }
            _ => {}
        }

        DateRange::parse(self.email.after.as_deref(), self.email.before.as_deref())?;
        self.calendar.window()?;

        if self.calendar.calendars.iter().all(|c| c.trim().is_empty()) {
            return Err(AppError::config("calendar.calendars must not be empty"));
        }

        Ok(())
    }
}

fn check_page_size(name: &str, value: u32, max: u32) -> Result<()> {
    if value == 0 || value > max {
        return Err(AppError::config(format!(
            "{name} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}

fn check_limit(name: &str, value: Option<usize>) -> Result<()> {
    if value == Some(0) {
        return Err(AppError::config(format!("{name} must be at least 1 when set")));
    }
    Ok(())
}

/// Reads an access token from the named environment variable.
///
/// # Errors
/// Returns a configuration error when the variable is unset or blank.
pub fn access_token(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::config(format!(
            "No access token found. Set the {env_var} environment variable"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chat.delay_ms, 1000);
        assert_eq!(config.email.delay_ms, 100);
        assert_eq!(config.email.batch_size, 100);
        assert_eq!(config.calendar.calendars, vec!["primary".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_email_mode_from_str() {
        assert_eq!("Inbox".parse::<EmailMode>(), Ok(EmailMode::Inbox));
        assert_eq!("label".parse::<EmailMode>(), Ok(EmailMode::Labels));
        assert_eq!("search".parse::<EmailMode>(), Ok(EmailMode::Query));
        assert!("spam".parse::<EmailMode>().is_err());
    }

    #[test]
    fn test_advanced_options_only_apply_to_all_and_query() {
        let mut email = EmailConfig {
            mode: EmailMode::Inbox,
            exclude_promotions: Some(false),
            include_html: Some(true),
            ..EmailConfig::default()
        };
        assert_eq!(
            email.options(),
            EmailOptions {
                exclude_promotions: true,
                include_html: false
            }
        );
        assert_eq!(
            email.ignored_overrides(),
            vec!["exclude_promotions", "include_html"]
        );

        email.mode = EmailMode::All;
        assert_eq!(
            email.options(),
            EmailOptions {
                exclude_promotions: false,
                include_html: true
            }
        );
        assert!(email.ignored_overrides().is_empty());
    }

    #[test]
    fn test_search_query_composition() {
        let email = EmailConfig {
            mode: EmailMode::Query,
            query: Some("from:boss@example.com".into()),
            after: Some("2024-01-01".into()),
            before: Some("2024-02-01".into()),
            exclude_promotions: Some(true),
            ..EmailConfig::default()
        };
        assert_eq!(
            email.search_query().unwrap(),
            "from:boss@example.com after:2024/01/01 before:2024/02/01 -category:promotions"
        );

        let sent = EmailConfig {
            mode: EmailMode::Sent,
            query: Some("ignored".into()),
            ..EmailConfig::default()
        };
        assert_eq!(sent.search_query().unwrap(), "");
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let mut config = AppConfig::default();
        config.email.mode = EmailMode::Labels;
        assert!(config.validate().is_err());
        config.email.labels = vec!["Work".into()];
        assert!(config.validate().is_ok());

        config.email.batch_size = 0;
        assert!(config.validate().is_err());
        config.email.batch_size = 50;

        config.calendar.after = Some("2024-05-01".into());
        config.calendar.before = Some("2024-04-01".into());
        assert!(config.validate().is_err());
        config.calendar.before = Some("not-a-date".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_access_token_missing() {
        let err = access_token("COLLAB_ARCHIVER_TEST_UNSET_TOKEN").unwrap_err();
        assert!(err.to_string().contains("COLLAB_ARCHIVER_TEST_UNSET_TOKEN"));
    }
}
