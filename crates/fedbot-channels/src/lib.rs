//! # FedBot Channels
//! Notifier implementations for the alert destination.

pub mod log;
pub mod slack;

pub use log::LogNotifier;
pub use slack::SlackNotifier;
