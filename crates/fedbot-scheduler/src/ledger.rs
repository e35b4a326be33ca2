//! SQLite-backed deduplication ledger and delivery log.
//! One table keyed by (category, case_number); every write is a single
//! immediately committed statement.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fedbot_core::{FedBotError, Ledger, Result, RuleCategory};

/// Outcome of one notifier call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// A row of the delivery log.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    pub id: i64,
    pub source: String,
    pub case_number: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SQLite persistence for the ledger.
pub struct LedgerDb {
    conn: Mutex<rusqlite::Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> FedBotError + '_ {
    move |e| FedBotError::Ledger(format!("{context}: {e}"))
}

impl LedgerDb {
    /// Open or create the ledger database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path).map_err(db_err("DB open"))?;
        Self::from_connection(conn)
    }

    /// In-memory ledger (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(db_err("DB open"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: rusqlite::Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|e| FedBotError::Ledger(format!("connection lock poisoned: {e}")))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            -- Which case already fired which rule
            CREATE TABLE IF NOT EXISTS ledger (
                category TEXT NOT NULL,         -- 'priority-escalation', 'commitment-breach', 'entitlement-mismatch'
                case_number TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (category, case_number)
            );

            -- Outcome of every notifier call
            CREATE TABLE IF NOT EXISTS deliveries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,           -- rule category or 'idle-report'
                case_number TEXT,
                status TEXT NOT NULL,           -- 'sent', 'failed'
                error TEXT,
                created_at TEXT NOT NULL
            );
         ",
            )
            .map_err(db_err("Migration"))?;
        Ok(())
    }

    /// Number of cases recorded under `category`.
    pub fn count(&self, category: RuleCategory) -> Result<usize> {
        let n: i64 = self
            .lock()?
            .query_row(
                "SELECT COUNT(*) FROM ledger WHERE category = ?1",
                [category.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err("Count ledger"))?;
        Ok(n as usize)
    }

    // ─── Delivery log ──────────────────────────────────────

    /// Append one delivery outcome.
    pub fn record_delivery(
        &self,
        source: &str,
        case_number: Option<&str>,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO deliveries (source, case_number, status, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![source, case_number, status.as_str(), error, Utc::now().to_rfc3339()],
        )
        .map_err(db_err("Save delivery"))?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent deliveries, newest first.
    pub fn recent_deliveries(&self, limit: usize) -> Result<Vec<DeliveryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, source, case_number, status, error, created_at
                 FROM deliveries ORDER BY id DESC LIMIT ?1",
            )
            .map_err(db_err("Prepare deliveries"))?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                let created_at: String = row.get(5)?;
                Ok(DeliveryRecord {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    case_number: row.get(2)?,
                    status: row.get(3)?,
                    error: row.get(4)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(db_err("Query deliveries"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Read deliveries"))
    }
}

impl Ledger for LedgerDb {
    fn contains(&self, category: RuleCategory, case_number: &str) -> Result<bool> {
        let found: i64 = self
            .lock()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM ledger WHERE category = ?1 AND case_number = ?2)",
                rusqlite::params![category.as_str(), case_number],
                |row| row.get(0),
            )
            .map_err(db_err("Query ledger"))?;
        Ok(found != 0)
    }

    fn record(&self, category: RuleCategory, case_number: &str) -> Result<bool> {
        let inserted = self
            .lock()?
            .execute(
                "INSERT OR IGNORE INTO ledger (category, case_number, recorded_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![category.as_str(), case_number, Utc::now().to_rfc3339()],
            )
            .map_err(db_err("Insert ledger"))?;
        if inserted == 1 {
            tracing::debug!("💾 Ledger: recorded {} under {}", case_number, category);
        }
        Ok(inserted == 1)
    }

    fn recorded(&self, category: RuleCategory) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT case_number FROM ledger WHERE category = ?1 ORDER BY recorded_at, rowid")
            .map_err(db_err("Prepare ledger"))?;
        let rows = stmt
            .query_map([category.as_str()], |row| row.get::<_, String>(0))
            .map_err(db_err("Query ledger"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("Read ledger"))
    }
}
