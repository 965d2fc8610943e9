//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool. Flags given
//! on the command line override the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{AppConfig, EmailMode};

/// Collab Archiver - Export chat, email and calendar history into flat text files.
///
/// Access tokens are read from the environment (SLACK_TOKEN, GMAIL_TOKEN,
/// GCAL_TOKEN by default).
#[derive(Parser, Debug)]
#[command(name = "collab-archive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: ~/.collab-archiver/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every archiving command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Output directory for archive files.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pause between API requests in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive chat conversations, one file per conversation.
    Chat {
        #[command(flatten)]
        run: RunArgs,

        /// Conversation to archive (repeatable; default: all).
        #[arg(short, long = "conversation")]
        conversations: Vec<String>,

        /// Include thread replies.
        #[arg(long)]
        threads: bool,

        /// Keep markup verbatim between marker lines.
        #[arg(long)]
        markup: bool,

        /// Stop after this many messages per conversation.
        #[arg(long)]
        max_messages: Option<usize>,
    },

    /// Archive email in batches of N messages per file.
    Email {
        #[command(flatten)]
        run: RunArgs,

        /// Mailbox slice: inbox, sent, all, labels, query.
        #[arg(short, long)]
        mode: Option<EmailMode>,

        /// Label to archive in labels mode (repeatable).
        #[arg(short, long = "label")]
        labels: Vec<String>,

        /// Search expression for query mode.
        #[arg(short, long)]
        query: Option<String>,

        /// Only messages on or after this date (YYYY-MM-DD).
        #[arg(long)]
        after: Option<String>,

        /// Only messages before this date (YYYY-MM-DD).
        #[arg(long)]
        before: Option<String>,

        /// Skip promotional mail (all and query modes only).
        #[arg(long)]
        exclude_promotions: Option<bool>,

        /// Keep HTML bodies verbatim (all and query modes only).
        #[arg(long)]
        include_html: Option<bool>,

        /// Messages per output file.
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Stop after this many messages per collection.
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Archive calendar events grouped by month.
    Calendar {
        #[command(flatten)]
        run: RunArgs,

        /// Calendar id to archive (repeatable; default from config).
        #[arg(short, long = "calendar")]
        calendars: Vec<String>,

        /// Only events on or after this date (YYYY-MM-DD).
        #[arg(long)]
        after: Option<String>,

        /// Only events before this date (YYYY-MM-DD).
        #[arg(long)]
        before: Option<String>,

        /// Events per output file.
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Keep description markup verbatim between marker lines.
        #[arg(long)]
        markup: bool,

        /// Stop after this many events per calendar.
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Write a commented default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration.
    ShowConfig,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) -> Option<u64> {
        if let Some(dir) = &self.output {
            config.output.dir.clone_from(dir);
        }
        self.delay_ms
    }
}

impl Commands {
    /// Applies command-line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        match self {
            Self::Chat {
                run,
                conversations,
                threads,
                markup,
                max_messages,
            } => {
                if let Some(delay) = run.apply(config) {
                    config.chat.delay_ms = delay;
                }
                let chat = &mut config.chat;
                if !conversations.is_empty() {
                    chat.conversations.clone_from(conversations);
                }
                chat.include_threads |= *threads;
                chat.include_markup |= *markup;
                if max_messages.is_some() {
                    chat.max_messages = *max_messages;
                }
            }
            Self::Email {
                run,
                mode,
                labels,
                query,
                after,
                before,
                exclude_promotions,
                include_html,
                batch_size,
                max_results,
            } => {
                if let Some(delay) = run.apply(config) {
                    config.email.delay_ms = delay;
                }
                let email = &mut config.email;
                if let Some(mode) = mode {
                    email.mode = *mode;
                }
                if !labels.is_empty() {
                    email.labels.clone_from(labels);
                }
                override_opt(&mut email.query, query.as_ref());
                override_opt(&mut email.after, after.as_ref());
                override_opt(&mut email.before, before.as_ref());
                override_opt(&mut email.exclude_promotions, exclude_promotions.as_ref());
                override_opt(&mut email.include_html, include_html.as_ref());
                override_opt(&mut email.max_results, max_results.as_ref());
                if let Some(size) = batch_size {
                    email.batch_size = *size;
                }
            }
            Self::Calendar {
                run,
                calendars,
                after,
                before,
                batch_size,
                markup,
                max_results,
            } => {
                if let Some(delay) = run.apply(config) {
                    config.calendar.delay_ms = delay;
                }
                let calendar = &mut config.calendar;
                if !calendars.is_empty() {
                    calendar.calendars.clone_from(calendars);
                }
                override_opt(&mut calendar.after, after.as_ref());
                override_opt(&mut calendar.before, before.as_ref());
                override_opt(&mut calendar.max_results, max_results.as_ref());
                if let Some(size) = batch_size {
                    calendar.batch_size = *size;
                }
                calendar.include_markup |= *markup;
            }
            Self::InitConfig { .. } | Self::ShowConfig => {}
        }
    }
}

fn override_opt<T: Clone>(target: &mut Option<T>, value: Option<&T>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_email_overrides() {
        let cli = parse(&[
            "collab-archive",
            "-vv",
            "email",
            "--mode",
            "query",
            "-q",
            "has:attachment",
            "--exclude-promotions",
            "false",
            "--batch-size",
            "25",
            "-o",
            "out",
        ]);
        assert_eq!(cli.verbose, 2);

        let mut config = AppConfig::default();
        cli.command.apply_overrides(&mut config);
        assert_eq!(config.email.mode, EmailMode::Query);
        assert_eq!(config.email.query.as_deref(), Some("has:attachment"));
        assert_eq!(config.email.exclude_promotions, Some(false));
        assert_eq!(config.email.batch_size, 25);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(config.email.delay_ms, 100);
    }

    #[test]
    fn test_chat_overrides_keep_file_values() {
        let cli = parse(&["collab-archive", "chat", "-c", "general", "-c", "ops", "--threads"]);

        let mut config = AppConfig::default();
        config.chat.max_messages = Some(10);
        cli.command.apply_overrides(&mut config);
        assert_eq!(config.chat.conversations, vec!["general", "ops"]);
        assert!(config.chat.include_threads);
        assert_eq!(config.chat.max_messages, Some(10));
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = parse(&["collab-archive", "calendar", "--config", "/tmp/c.toml", "--delay-ms", "5"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));

        let mut config = AppConfig::default();
        cli.command.apply_overrides(&mut config);
        assert_eq!(config.calendar.delay_ms, 5);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["collab-archive", "email", "--mode", "spam"]).is_err());
    }
}
