//! Adapters for the café recommendation engine.
//!
//! Responsibilities:
//! - Persist feedback, impressions, and dialogue state in `SQLite`.
//! - Call the Gemini API for embeddings and intent classification.
//! - Guard embedding calls with retry and a circuit breaker.
//! - Load venue, review, and gazetteer snapshots from JSON.
//!
//! Boundaries:
//! - Do not encode ranking or sourcing rules (live in `cafe-scorer` and
//!   `cafe-engine`).
//! - Convert raw documents through the typed boundary in `cafe-core`.
//!
//! Invariants:
//! - Thread-safe by default where feasible.
//! - No global mutable state.

pub mod gemini;
mod ledger;
pub mod resilience;
pub mod snapshot;

pub use ledger::{LedgerOpenError, LedgerSchemaError, SqliteLedger};
pub use resilience::{CircuitBreaker, ResilientEmbedder, RetryPolicy};
pub use snapshot::{GazetteerDocument, SnapshotError, load_gazetteer, load_store};
