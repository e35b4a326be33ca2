//! # FedBot Core
//!
//! Shared configuration, data model, error type and the collaborator
//! traits (`CaseSource`, `Notifier`, `Ledger`) every other crate builds on.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{FedBotConfig, RefreshFailurePolicy};
pub use error::{FedBotError, Result};
pub use traits::{CaseSource, Ledger, Notifier};
pub use types::{
    Alert, CaseRecord, CommitmentStatus, Message, MessageFormat, Priority, RuleCategory, Snapshot,
};
