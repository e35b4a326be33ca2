//! Log-only notifier for dry runs.
//! Writes each message to the log and keeps a short in-memory history.

use async_trait::async_trait;
use fedbot_core::{Message, Notifier, Result};
use std::sync::Mutex;

/// Max messages kept in history.
const HISTORY_LIMIT: usize = 100;

/// Notifier that never leaves the process.
#[derive(Default)]
pub struct LogNotifier {
    history: Mutex<Vec<Message>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        tracing::info!("📢 [dry-run] {}", message.text.replace('\n', " ⏎ "));
        if let Ok(mut history) = self.history.lock() {
            history.push(message.clone());
            // Ring buffer, newest entries kept
            if history.len() > HISTORY_LIMIT {
                history.remove(0);
            }
        }
        Ok(())
    }
}
