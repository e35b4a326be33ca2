//! # FedBot
//!
//! Watches a Salesforce support queue and posts alerts to a Slack channel.
//!
//! Usage:
//!   fedbot                          # Config from ~/.fedbot/config.toml
//!   fedbot --config ./fedbot.toml   # Custom config file
//!   fedbot --verbose                # Debug logging

mod bot;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fedbot_channels::{LogNotifier, SlackNotifier};
use fedbot_core::{FedBotConfig, Notifier, Result as CoreResult, RuleCategory};
use fedbot_crm::SalesforceClient;
use fedbot_scheduler::{Job, JobAction, LedgerDb, SchedulerEngine, run_scheduler};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::bot::Bot;

#[derive(Parser)]
#[command(name = "fedbot", version, about = "🚨 FedBot: Salesforce queue alerts for Slack")]
struct Cli {
    /// Config file (default: ~/.fedbot/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<FedBotConfig> {
    let mut config = match path {
        Some(p) => FedBotConfig::load_from(p)?,
        None => FedBotConfig::load()?,
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &FedBotConfig) -> Result<SchedulerEngine> {
    let poll = config.schedule.poll_secs;
    let mut engine = SchedulerEngine::new();
    engine.add_job(Job::interval(JobAction::RefreshSnapshot, poll).starting_now())?;
    for category in RuleCategory::ALL {
        engine.add_job(Job::interval(JobAction::CheckRule(category), poll))?;
    }
    if config.report.owners.is_empty() {
        tracing::info!("📊 No report owners configured, idle report disabled");
    } else {
        engine.add_job(Job::cron(JobAction::IdleReport, &config.schedule.report_cron))?;
    }
    Ok(engine)
}

/// Entries per rule category, e.g. `priority-escalation=3, ...`.
fn ledger_summary(ledger: &LedgerDb) -> CoreResult<String> {
    let counts = RuleCategory::ALL
        .into_iter()
        .map(|category| -> CoreResult<String> {
            Ok(format!("{category}={}", ledger.count(category)?))
        })
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(counts.join(", "))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = if cli.verbose {
        "fedbot=debug,fedbot_core=debug,fedbot_crm=debug,fedbot_channels=debug,fedbot_scheduler=debug,fedbot_rules=debug"
    } else {
        "fedbot=info,fedbot_core=info,fedbot_crm=info,fedbot_channels=info,fedbot_scheduler=info,fedbot_rules=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_ref()).context("Invalid configuration")?;

    let ledger_path = config.ledger_path();
    let ledger = Arc::new(
        LedgerDb::open(&ledger_path)
            .with_context(|| format!("Cannot open ledger at {}", ledger_path.display()))?,
    );
    tracing::info!("🗄️ Ledger: {} ({})", ledger_path.display(), ledger_summary(&ledger)?);

    let source = Arc::new(SalesforceClient::new(config.salesforce.clone(), config.http_timeout_secs)?);
    let notifier: Arc<dyn Notifier> = if config.slack.dry_run {
        tracing::info!("📢 Dry run: messages are logged, not posted");
        Arc::new(LogNotifier::new())
    } else {
        Arc::new(SlackNotifier::new(&config.slack, config.http_timeout_secs)?)
    };

    let engine = build_engine(&config)?;
    for job in engine.list_jobs() {
        tracing::info!(
            "📅 Job '{}' next run {}",
            job.name,
            job.next_run.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
        );
    }

    let bot = Arc::new(Bot::new(&config, source, notifier, ledger));
    tracing::info!(
        "🚨 FedBot watching queue {} → {}",
        config.salesforce.queue_name,
        config.slack.channel
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("🛑 Ctrl-C received, shutting down");
    };
    run_scheduler(
        Arc::new(Mutex::new(engine)),
        bot,
        config.schedule.tick_secs,
        shutdown,
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["fedbot", "--config", "/etc/fedbot.toml", "-v"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fedbot.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_ledger_summary() {
        use fedbot_core::Ledger;

        let ledger = LedgerDb::open_in_memory().unwrap();
        ledger.record(RuleCategory::CommitmentBreach, "1").unwrap();
        ledger.record(RuleCategory::CommitmentBreach, "2").unwrap();
        assert_eq!(
            ledger_summary(&ledger).unwrap(),
            "priority-escalation=0, commitment-breach=2, entitlement-mismatch=0"
        );
    }

    #[test]
    fn test_engine_jobs() {
        let mut config = FedBotConfig::default();
        let engine = build_engine(&config).unwrap();
        let names: Vec<&str> = engine.list_jobs().iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            ["refresh-snapshot", "check-priority", "check-commitment", "check-entitlement"]
        );

        config.report.owners = vec!["Alex Doe".into()];
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.job_count(), 5);
        assert_eq!(engine.list_jobs()[4].name, "idle-report");
    }
}
