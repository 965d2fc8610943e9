//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# collab-archiver configuration
# Access tokens are read from the environment variables named below.

[output]
# Directory that receives the archive files
dir = "archives"

[chat]
token_env = "SLACK_TOKEN"
# Messages per page and pause between pages (milliseconds)
page_size = 200
delay_ms = 1000
# Conversation names to archive (empty = all visible conversations)
conversations = []
types = "public_channel,private_channel,mpim,im"
include_threads = false
include_markup = false
# max_messages = 1000

[email]
token_env = "GMAIL_TOKEN"
# One of: inbox, sent, all, labels, query
mode = "inbox"
labels = []
# query = "from:someone@example.com"
# after = "2024-01-01"
# before = "2025-01-01"
# Only honoured in "all" and "query" modes:
# exclude_promotions = true
# include_html = false
page_size = 100
delay_ms = 100
batch_size = 100
# max_results = 500

[calendar]
token_env = "GCAL_TOKEN"
calendars = ["primary"]
# after = "2024-01-01"
# before = "2025-01-01"
page_size = 250
delay_ms = 100
batch_size = 100
include_markup = false
"#;

/// Load configuration from `path`, or the default location when `None`.
/// A missing file yields the built-in defaults.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        if path.is_some() {
            return Err(AppError::config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Render the effective configuration as TOML.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })
}

/// Write the commented default configuration file.
///
/// Returns `false` when a file already exists and `force` is not set.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io(format!("Failed to write config file: {}", path.display()), e))?;

    tracing::info!(path = %path.display(), "Created default configuration");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmailMode;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.chat.delay_ms, 1000);
        assert_eq!(config.email.mode, EmailMode::Inbox);
        assert_eq!(config.calendar.calendars, vec!["primary".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_write_default_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&config_path, false).unwrap());
        assert!(!write_default_config(&config_path, false).unwrap());

        let loaded = load_config(Some(config_path.as_path())).unwrap();
        assert_eq!(loaded.email.batch_size, 100);
    }

    #[test]
    fn test_render_round_trips() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.email.mode = EmailMode::Query;
        config.email.query = Some("has:attachment".into());
        fs::write(&config_path, render_config(&config).unwrap()).unwrap();

        let loaded = load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.email.mode, EmailMode::Query);
        assert_eq!(loaded.email.query.as_deref(), Some("has:attachment"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[email]\nmode = \"sent\"\n").unwrap();

        let loaded = load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.email.mode, EmailMode::Sent);
        assert_eq!(loaded.chat.page_size, 200);
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("absent.toml").as_path())).is_err());
    }
}
