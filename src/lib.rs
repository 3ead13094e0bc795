// Price Reconcile - Core Library
// Compares a token's daily APR-dataset price against per-day asset snapshots

pub mod config;         // Paths, asset id, tier thresholds
pub mod error;          // Typed reader errors
pub mod sources;        // Primary series + snapshot cache readers
pub mod reconciliation; // Comparison engine + run statistics
pub mod report;         // Fixed-width text report, CSV export

// Re-export commonly used types
pub use config::{Config, ZeroPricePolicy};
pub use error::{SourceError, SourceResult};
pub use sources::{
    AprDataFile, DailyRecord, PrimarySource, SecondarySource, SnapshotCache,
};
pub use reconciliation::{
    AgreementTier, ComparisonRow, Deviation, MaxDeviation, ReconciliationEngine,
    ReconciliationReport, RunSummary, SnapshotLookup,
};
pub use report::{export_csv, write_csv, write_report};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
