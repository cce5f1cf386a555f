#![forbid(unsafe_code)]

use rusqlite::{Connection, Error as SqliteError, Transaction};
use thiserror::Error;

/// Errors raised while creating the ledger schema.
#[derive(Debug, Error)]
pub enum LedgerSchemaError {
    /// A migration step failed.
    #[error("ledger schema step `{step}` failed: {source}")]
    Migration {
        /// Human-readable step name.
        step: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: SqliteError,
    },
}

const STEPS: &[(&str, &str)] = &[
    (
        "create interaction_logs",
        "CREATE TABLE IF NOT EXISTS interaction_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL CHECK (length(trim(user_id)) > 0),
            action TEXT NOT NULL,
            place_id TEXT,
            reason TEXT,
            lat REAL,
            lng REAL,
            created_at INTEGER NOT NULL
        )",
    ),
    (
        "index interaction_logs by user",
        "CREATE INDEX IF NOT EXISTS idx_interaction_logs_user
            ON interaction_logs (user_id, action)",
    ),
    (
        "index interaction_logs by place",
        "CREATE INDEX IF NOT EXISTS idx_interaction_logs_place
            ON interaction_logs (place_id, action)",
    ),
    (
        "create user_state",
        "CREATE TABLE IF NOT EXISTS user_state (
            user_id TEXT PRIMARY KEY,
            lat REAL NOT NULL,
            lng REAL NOT NULL,
            updated_at INTEGER NOT NULL
        ) WITHOUT ROWID",
    ),
    (
        "create user_bookmarks",
        "CREATE TABLE IF NOT EXISTS user_bookmarks (
            user_id TEXT NOT NULL,
            place_id TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, place_id)
        ) WITHOUT ROWID",
    ),
    (
        "create user_blacklist",
        "CREATE TABLE IF NOT EXISTS user_blacklist (
            user_id TEXT NOT NULL,
            place_id TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, place_id)
        ) WITHOUT ROWID",
    ),
    (
        "create recommendation_log",
        "CREATE TABLE IF NOT EXISTS recommendation_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            place_id TEXT NOT NULL,
            shown_at INTEGER NOT NULL
        )",
    ),
    (
        "index recommendation_log",
        "CREATE INDEX IF NOT EXISTS idx_recommendation_log_user_place
            ON recommendation_log (user_id, place_id, shown_at)",
    ),
    (
        "create conversation_sessions",
        "CREATE TABLE IF NOT EXISTS conversation_sessions (
            user_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            place_id TEXT,
            reason TEXT,
            updated_at INTEGER NOT NULL
        ) WITHOUT ROWID",
    ),
];

/// Create every ledger table and index inside one transaction.
///
/// Idempotent: reopening an existing ledger leaves its rows untouched.
pub(crate) fn initialise_schema(connection: &mut Connection) -> Result<(), LedgerSchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| LedgerSchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;
    for &(step, sql) in STEPS {
        run_migration_step(&transaction, step, sql)?;
    }
    transaction
        .commit()
        .map_err(|source| LedgerSchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), LedgerSchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| LedgerSchemaError::Migration { step, source })
}
