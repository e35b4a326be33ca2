//! FedBot configuration system.
//!
//! Settings come from a TOML file (every field has a default) and
//! credentials from environment variables, which always win over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FedBotError, Result};

pub const ENV_SF_USERNAME: &str = "FEDBOT_SF_USERNAME";
pub const ENV_SF_PASSWORD: &str = "FEDBOT_SF_PASSWORD";
pub const ENV_SF_SECURITY_TOKEN: &str = "FEDBOT_SF_SECURITY_TOKEN";
pub const ENV_SLACK_TOKEN: &str = "FEDBOT_SLACK_TOKEN";
pub const ENV_LEDGER_PATH: &str = "FEDBOT_DB";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FedBotConfig {
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub salesforce: SalesforceConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_http_timeout() -> u64 { 30 }

impl Default for FedBotConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            salesforce: SalesforceConfig::default(),
            slack: SlackConfig::default(),
            ledger: LedgerConfig::default(),
            schedule: ScheduleConfig::default(),
            rules: RulesConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl FedBotConfig {
    /// Load config from the default path (~/.fedbot/config.toml), or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FedBotError::Config(format!("Failed to read config {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FedBotError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FedBot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fedbot")
    }

    /// Overlay credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay credentials using `lookup` for each variable name.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_SF_USERNAME) {
            self.salesforce.username = v;
        }
        if let Some(v) = non_empty(ENV_SF_PASSWORD) {
            self.salesforce.password = v;
        }
        if let Some(v) = non_empty(ENV_SF_SECURITY_TOKEN) {
            self.salesforce.security_token = v;
        }
        if let Some(v) = non_empty(ENV_SLACK_TOKEN) {
            self.slack.bot_token = v;
        }
        if let Some(v) = non_empty(ENV_LEDGER_PATH) {
            self.ledger.path = v;
        }
    }

    /// Ledger database path with `~` expanded.
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.ledger.path).to_string())
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.salesforce.queue_owner_id.trim().is_empty() {
            return Err(FedBotError::Config("salesforce.queue_owner_id is required".into()));
        }
        if self.schedule.tick_secs == 0 || self.schedule.poll_secs == 0 {
            return Err(FedBotError::Config(
                "schedule.tick_secs and schedule.poll_secs must be positive".into(),
            ));
        }
        if self.schedule.report_cron.split_whitespace().count() != 5 {
            return Err(FedBotError::Config(format!(
                "schedule.report_cron '{}' needs 5 fields: MIN HOUR DOM MON DOW",
                self.schedule.report_cron
            )));
        }
        if self.rules.entitlement_keyword.trim().is_empty() {
            return Err(FedBotError::Config("rules.entitlement_keyword must not be empty".into()));
        }
        if self.rules.commitment_window_minutes <= 0.0 {
            return Err(FedBotError::Config(
                "rules.commitment_window_minutes must be positive".into(),
            ));
        }

        let sf = &self.salesforce;
        let mut missing = Vec::new();
        if sf.username.is_empty() {
            missing.push(ENV_SF_USERNAME);
        }
        if sf.password.is_empty() {
            missing.push(ENV_SF_PASSWORD);
        }
        if !self.slack.dry_run && self.slack.bot_token.is_empty() {
            missing.push(ENV_SLACK_TOKEN);
        }
        if !missing.is_empty() {
            return Err(FedBotError::Config(format!(
                "missing credentials: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// Salesforce (case source) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesforceConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Owner id of the monitored queue.
    #[serde(default)]
    pub queue_owner_id: String,
    /// Queue name used in alert text.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    /// Base URL for case links. Defaults to the instance URL returned at login.
    #[serde(default)]
    pub link_base: Option<String>,
    #[serde(default, skip_serializing)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub security_token: String,
}

fn default_login_url() -> String { "https://login.salesforce.com".into() }
fn default_api_version() -> String { "59.0".into() }
fn default_queue_name() -> String { "FED-WS1-ATL-POD".into() }

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            api_version: default_api_version(),
            queue_owner_id: String::new(),
            queue_name: default_queue_name(),
            link_base: None,
            username: String::new(),
            password: String::new(),
            security_token: String::new(),
        }
    }
}

/// Slack (notifier) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default = "default_slack_channel")]
    pub channel: String,
    #[serde(default = "default_slack_api")]
    pub api_url: String,
    #[serde(default, skip_serializing)]
    pub bot_token: String,
    /// Log messages instead of posting them.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_slack_channel() -> String { "#fed-support".into() }
fn default_slack_api() -> String { "https://slack.com/api".into() }

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: default_slack_channel(),
            api_url: default_slack_api(),
            bot_token: String::new(),
            dry_run: false,
        }
    }
}

/// Ledger (deduplication store) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_ledger_path() -> String { "~/.fedbot/ledger.db".into() }

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { path: default_ledger_path() }
    }
}

/// Job cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Scheduler tick resolution.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Cadence of the snapshot refresh and every rule check.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    /// Cron expression (local time) for the idle-time report.
    #[serde(default = "default_report_cron")]
    pub report_cron: String,
}

fn default_tick_secs() -> u64 { 5 }
fn default_poll_secs() -> u64 { 30 }
fn default_report_cron() -> String { "0 17 * * *".into() }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            poll_secs: default_poll_secs(),
            report_cron: default_report_cron(),
        }
    }
}

/// What rule jobs do when the latest snapshot refresh failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshFailurePolicy {
    /// Evaluate the previous snapshot again.
    UseStale,
    /// Skip rule evaluation until a refresh succeeds.
    #[default]
    Skip,
}

/// Rule thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Highest priority level (inclusive) that escalates. 2 = "1 - Critical" and "2 - High".
    #[serde(default = "default_escalation_level")]
    pub escalation_max_level: u8,
    #[serde(default = "default_commitment_window")]
    pub commitment_window_minutes: f64,
    #[serde(default = "default_entitlement_keyword")]
    pub entitlement_keyword: String,
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,
    #[serde(default)]
    pub on_refresh_failure: RefreshFailurePolicy,
}

fn default_escalation_level() -> u8 { 2 }
fn default_commitment_window() -> f64 { 60.0 }
fn default_entitlement_keyword() -> String { "federal".into() }
fn default_description_limit() -> usize { 200 }

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            escalation_max_level: default_escalation_level(),
            commitment_window_minutes: default_commitment_window(),
            entitlement_keyword: default_entitlement_keyword(),
            description_limit: default_description_limit(),
            on_refresh_failure: RefreshFailurePolicy::default(),
        }
    }
}

/// Idle-time report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Case owners covered by the report. Empty disables the report.
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_days: f64,
}

fn default_idle_threshold() -> f64 { 2.0 }

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            owners: Vec::new(),
            idle_threshold_days: default_idle_threshold(),
        }
    }
}
