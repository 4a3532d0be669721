//! `emailtool` - send or draft an email described by a JSON file.
//!
//! Diagnostics go to stderr through `tracing`; stdout carries only the
//! final status line.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use emailtool_core::{DEFAULT_CONFIG_FILE, EmailConfig, Mailer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Send or draft an email configured in a JSON file.
#[derive(Debug, Parser)]
#[command(name = "emailtool", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "EMAILTOOL_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Save to the Drafts folder regardless of `Email.DraftOnly`.
    #[arg(long, conflicts_with = "send")]
    draft: bool,

    /// Send regardless of `Email.DraftOnly`.
    #[arg(long)]
    send: bool,
}

impl Cli {
    /// Mode override from the command line, if any.
    const fn draft_override(&self) -> Option<bool> {
        match (self.draft, self.send) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emailtool=info,emailtool_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(status) => {
            println!("{status}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            ExitCode::FAILURE
        }
    }
}

/// The single line printed to stderr when a run fails.
fn failure_message(err: &anyhow::Error) -> String {
    format!("Error: {err:#}")
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let mut config = EmailConfig::load(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config.display()
        )
    })?;

    if let Some(draft_only) = cli.draft_override() {
        config.content.draft_only = draft_only;
    }
    info!(draft_only = config.content.draft_only, "Starting emailtool");

    let outcome = Mailer::default().run(&config).await?;
    Ok(outcome.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["emailtool"]);
        assert_eq!(cli.draft_override(), None);
    }

    #[test]
    fn test_mode_overrides() {
        let cli = Cli::parse_from(["emailtool", "--draft", "--config", "other.json"]);
        assert_eq!(cli.draft_override(), Some(true));
        assert_eq!(cli.config, PathBuf::from("other.json"));

        let cli = Cli::parse_from(["emailtool", "--send"]);
        assert_eq!(cli.draft_override(), Some(false));
    }

    #[test]
    fn test_failure_message_includes_context_chain() {
        let err = anyhow::anyhow!("missing Sender.Host")
            .context("failed to load configuration from appsettings.json");

        assert_eq!(
            failure_message(&err),
            "Error: failed to load configuration from appsettings.json: missing Sender.Host"
        );
    }

    #[test]
    fn test_draft_and_send_conflict() {
        assert!(Cli::try_parse_from(["emailtool", "--draft", "--send"]).is_err());
    }
}
