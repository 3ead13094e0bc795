// 📂 Source Readers - The two price series being reconciled
//
// Primary:   one aggregated JSON file, { "daily_apr": [ {date, price, source}, ... ] }
// Secondary: one snapshot per day, <root>/<YYYY>/<MM>/<YYYY-MM-DD>.assets.json
//            mapping asset id -> { "price": ..., ... }

use crate::error::{SourceError, SourceResult};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::PathBuf;
use tracing::debug;

// ============================================================================
// CORE TYPES
// ============================================================================

/// DailyRecord - One day of the authoritative series
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,

    #[serde(rename = "token_price_usd", alias = "tuna_price_usd", alias = "price")]
    pub price: Decimal,

    /// Provenance label ("oracle", "pool", ...)
    #[serde(
        rename = "token_price_source",
        alias = "tuna_price_source",
        alias = "price_source"
    )]
    pub price_source: String,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, price: Decimal, price_source: &str) -> Self {
        DailyRecord {
            date,
            price,
            price_source: price_source.to_string(),
        }
    }
}

/// Top-level shape of the APR dataset; other top-level keys are ignored
#[derive(Debug, Deserialize)]
struct AprDataset {
    daily_apr: Vec<DailyRecord>,
}

// ============================================================================
// READER TRAITS
// ============================================================================

/// PrimarySource - Supplies the full series that drives iteration
pub trait PrimarySource {
    /// Fails with a fatal error if the series cannot be produced;
    /// there are no partial results.
    fn read_primary_series(&self) -> SourceResult<Vec<DailyRecord>>;
}

/// SecondarySource - Sparse per-date lookup
pub trait SecondarySource {
    /// `Ok(None)` when the date has no snapshot or the asset is not in it.
    /// `Err(DataCorrupt)` only when an existing snapshot cannot be read.
    fn read_secondary_price(&self, date: NaiveDate, asset_id: &str) -> SourceResult<Option<Decimal>>;
}

// ============================================================================
// PRIMARY: APR DATA FILE
// ============================================================================

pub struct AprDataFile {
    path: PathBuf,
}

impl AprDataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AprDataFile { path: path.into() }
    }

    fn unavailable(&self, reason: impl ToString) -> SourceError {
        SourceError::DataUnavailable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl PrimarySource for AprDataFile {
    fn read_primary_series(&self) -> SourceResult<Vec<DailyRecord>> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let dataset: AprDataset =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| self.unavailable(e))?;

        validate_series(&dataset.daily_apr)?;
        Ok(dataset.daily_apr)
    }
}

/// Largest price the report can print with 8 fraction digits
/// (price * 10^8 must fit Decimal's 96-bit mantissa)
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_661_992_960, 1_808_227_885, 5, false, 0); // 1e20

/// Dates strictly ascending (which also rules out duplicates),
/// prices within [0, MAX_PRICE]
pub fn validate_series(records: &[DailyRecord]) -> SourceResult<()> {
    for pair in records.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(SourceError::InvalidSeries(format!(
                "date {} follows {} (dates must be unique and ascending)",
                pair[1].date, pair[0].date
            )));
        }
    }

    if let Some(bad) = records.iter().find(|r| r.price.is_sign_negative() && !r.price.is_zero()) {
        return Err(SourceError::InvalidSeries(format!(
            "negative price {} on {}",
            bad.price, bad.date
        )));
    }

    if let Some(bad) = records.iter().find(|r| r.price > MAX_PRICE) {
        return Err(SourceError::InvalidSeries(format!(
            "price {} on {} exceeds {}",
            bad.price, bad.date, MAX_PRICE
        )));
    }

    Ok(())
}

// ============================================================================
// SECONDARY: SNAPSHOT CACHE
// ============================================================================

pub struct SnapshotCache {
    root: PathBuf,
}

impl SnapshotCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SnapshotCache { root: root.into() }
    }

    /// `<root>/2024/01/2024-01-05.assets.json`
    pub fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{}.assets.json", date.format("%Y-%m-%d")))
    }
}

impl SecondarySource for SnapshotCache {
    fn read_secondary_price(&self, date: NaiveDate, asset_id: &str) -> SourceResult<Option<Decimal>> {
        let path = self.snapshot_path(date);
        let corrupt = |reason: String| SourceError::DataCorrupt {
            path: path.clone(),
            reason,
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%date, path = %path.display(), "no snapshot for date");
                return Ok(None);
            }
            Err(e) => return Err(corrupt(e.to_string())),
        };

        // Parse loosely so one malformed neighbour entry does not hide our asset
        let snapshot: Value =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
        let assets = snapshot
            .as_object()
            .ok_or_else(|| corrupt("snapshot root is not a JSON object".to_string()))?;

        let Some(entry) = assets.get(asset_id) else {
            debug!(%date, asset_id, "asset not present in snapshot");
            return Ok(None);
        };

        match entry.get("price") {
            None | Some(Value::Null) => Ok(None),
            Some(price) => serde_json::from_value::<Decimal>(price.clone())
                .map(Some)
                .map_err(|e| corrupt(format!("unreadable price for {}: {}", asset_id, e))),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
