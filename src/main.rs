//! Collab Archiver - Export chat, email and calendar history into flat text files.
//!
//! Each command pulls one service through its paginated API, normalizes the
//! message bodies and writes grouped plain-text archive files.
//!
//!   collab-archive init-config              # write ~/.collab-archiver/config.toml
//!   collab-archive chat -c general --threads
//!   collab-archive email --mode sent -b 50
//!   collab-archive calendar --after 2024-01-01

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_report_table, format_report_totals, CalendarArchiver, ChatArchiver, EmailArchiver,
    ThreadPacer,
};
use cli::{Cli, Commands};
use domain::{access_token, AppConfig, ArchiveReport};
use infrastructure::{
    load_config, render_config, write_default_config, ApiClient, CalendarClient, DirectorySink,
    GmailClient, SlackClient, CALENDAR_API_URL, GMAIL_API_URL, SLACK_API_URL,
};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config_path = cli.config.as_deref();

    match &cli.command {
        Commands::Chat { .. } => {
            let config = prepare_config(config_path, &cli.command)?;
            print_report(&cmd_chat(&config)?, &config.output.dir);
        }
        Commands::Email { .. } => {
            let config = prepare_config(config_path, &cli.command)?;
            print_report(&cmd_email(&config)?, &config.output.dir);
        }
        Commands::Calendar { .. } => {
            let config = prepare_config(config_path, &cli.command)?;
            print_report(&cmd_calendar(&config)?, &config.output.dir);
        }
        Commands::InitConfig { force } => {
            cmd_init_config(config_path, *force)?;
        }
        Commands::ShowConfig => {
            cmd_show_config(config_path)?;
        }
    }

    Ok(())
}

/// Load the file configuration, apply command-line overrides and validate.
fn prepare_config(path: Option<&Path>, command: &Commands) -> domain::Result<AppConfig> {
    let mut config = load_config(path)?;
    command.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Archive chat conversations.
fn cmd_chat(config: &AppConfig) -> domain::Result<ArchiveReport> {
    let token = access_token(&config.chat.token_env)?;
    let http = ApiClient::new("Slack", SLACK_API_URL, token)?;
    let client = SlackClient::new(http, config.chat.page_size, config.chat.types.clone());

    let mut sink = DirectorySink::create(&config.output.dir)?;
    let mut archiver = ChatArchiver::new(client, config.chat.clone());
    archiver.run(&mut sink, &mut ThreadPacer)
}

/// Archive mail in fixed-size batches.
fn cmd_email(config: &AppConfig) -> domain::Result<ArchiveReport> {
    let token = access_token(&config.email.token_env)?;
    let http = ApiClient::new("Gmail", GMAIL_API_URL, token)?;
    let client = GmailClient::new(http, config.email.page_size);

    let mut sink = DirectorySink::create(&config.output.dir)?;
    let mut archiver = EmailArchiver::new(client, config.email.clone());
    archiver.run(&mut sink, &mut ThreadPacer)
}

/// Archive calendar events grouped by month.
fn cmd_calendar(config: &AppConfig) -> domain::Result<ArchiveReport> {
    let token = access_token(&config.calendar.token_env)?;
    let http = ApiClient::new("Google Calendar", CALENDAR_API_URL, token)?;
    let client = CalendarClient::new(http, config.calendar.page_size);

    let mut sink = DirectorySink::create(&config.output.dir)?;
    let mut archiver = CalendarArchiver::new(client, config.calendar.clone());
    archiver.run(&mut sink, &mut ThreadPacer)
}

/// Write the default configuration file.
fn cmd_init_config(path: Option<&Path>, force: bool) -> domain::Result<()> {
    let path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if write_default_config(&path, force)? {
        println!(
            "{} {}",
            "✓ Wrote configuration:".green(),
            path.display().to_string().cyan()
        );
    } else {
        println!(
            "{} {} {}",
            "Configuration already exists:".yellow(),
            path.display().to_string().cyan(),
            "(use --force to overwrite)".dimmed()
        );
    }

    Ok(())
}

/// Print the effective configuration.
fn cmd_show_config(path: Option<&Path>) -> domain::Result<()> {
    let config = load_config(path)?;
    print!("{}", render_config(&config)?);
    Ok(())
}

fn print_report(report: &ArchiveReport, dir: &Path) {
    if report.collections.is_empty() {
        println!("{}", "Nothing to archive.".yellow());
        return;
    }

    println!("{}", format_report_table(report));
    println!();
    println!("{}", format_report_totals(report));
    println!(
        "{} {}",
        "Output directory:".dimmed(),
        dir.display().to_string().cyan()
    );
}

/// Setup logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
