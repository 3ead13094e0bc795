// ⚖️ Reconciliation Engine - Compare primary vs snapshot prices day by day
//
// For every primary date (and ONLY primary dates):
//   delta     = secondary - primary
//   delta_pct = delta / primary * 100
//
// Tiers:  |pct| <= tight -> AgreeTight, |pct| <= loose -> AgreeLoose, else Disagree
// Counts are cumulative: a tight row is also "within loose".

use crate::config::{Config, ZeroPricePolicy};
use crate::error::SourceResult;
use crate::report::fmt_signed;
use crate::sources::{DailyRecord, PrimarySource, SecondarySource};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

// ============================================================================
// AGREEMENT TIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementTier {
    AgreeTight,
    AgreeLoose,
    Disagree,

    /// Zero primary price under `ZeroPricePolicy::Exclude`
    Undefined,
}

impl AgreementTier {
    /// Status column in the text report
    pub fn symbol(&self) -> &'static str {
        match self {
            AgreementTier::AgreeTight => "OK",
            AgreementTier::AgreeLoose => "~",
            AgreementTier::Disagree => "X",
            AgreementTier::Undefined => "?",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgreementTier::AgreeTight => "agree_tight",
            AgreementTier::AgreeLoose => "agree_loose",
            AgreementTier::Disagree => "disagree",
            AgreementTier::Undefined => "undefined",
        }
    }
}

/// Outcome of the snapshot lookup for one date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotLookup {
    Found,
    Missing,
    Corrupt,
}

// ============================================================================
// COMPARISON ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub date: NaiveDate,
    pub price_a: Decimal,
    pub price_source: String,
    pub price_b: Option<Decimal>,
    pub delta: Option<Decimal>,

    /// None when there is no secondary price, when price_a is zero,
    /// or when the ratio does not fit in a Decimal
    pub delta_pct: Option<Decimal>,

    /// None when there is no secondary price
    pub tier: Option<AgreementTier>,
    pub lookup: SnapshotLookup,
}

impl ComparisonRow {
    /// Percentage used for display and max tracking.
    /// A zero-price row counted under `CountAsZero` reads as 0%;
    /// an overflowed ratio has no displayable value.
    pub fn classified_pct(&self) -> Option<Decimal> {
        match (self.tier, self.delta_pct) {
            (None | Some(AgreementTier::Undefined), _) => None,
            (Some(_), Some(pct)) => Some(pct),
            (Some(_), None) if self.price_a.is_zero() => Some(Decimal::ZERO),
            (Some(_), None) => None,
        }
    }
}

/// Result of `delta / base * 100`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deviation {
    Pct(Decimal),
    /// Base is zero
    Undefined,
    /// Base is non-zero but the ratio exceeds Decimal's range
    Overflow,
}

pub fn deviation_pct(delta: Decimal, base: Decimal) -> Deviation {
    if base.is_zero() {
        return Deviation::Undefined;
    }
    delta
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Deviation::Overflow, Deviation::Pct)
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MaxDeviation {
    pub date: NaiveDate,
    /// Signed
    pub delta_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_comparisons: usize,
    pub within_tight: usize,
    pub within_loose: usize,
    pub disagreements: usize,

    /// Primary dates with no snapshot / no asset entry
    pub missing: usize,
    /// Primary dates whose snapshot exists but could not be read
    pub corrupt: usize,
    /// Zero-price rows left out under `ZeroPricePolicy::Exclude`
    pub excluded_zero_price: usize,

    pub max_deviation: Option<MaxDeviation>,
    pub tight_threshold_pct: Decimal,
    pub loose_threshold_pct: Decimal,
}

impl RunSummary {
    pub fn new(tight_threshold_pct: Decimal, loose_threshold_pct: Decimal) -> Self {
        RunSummary {
            total_comparisons: 0,
            within_tight: 0,
            within_loose: 0,
            disagreements: 0,
            missing: 0,
            corrupt: 0,
            excluded_zero_price: 0,
            max_deviation: None,
            tight_threshold_pct,
            loose_threshold_pct,
        }
    }

    /// Fold one row into the running counters
    pub fn record(&mut self, row: &ComparisonRow) {
        match row.lookup {
            SnapshotLookup::Missing => self.missing += 1,
            SnapshotLookup::Corrupt => self.corrupt += 1,
            SnapshotLookup::Found => {}
        }

        let Some(tier) = row.tier else {
            return;
        };

        match tier {
            AgreementTier::Undefined => {
                self.excluded_zero_price += 1;
                return;
            }
            AgreementTier::AgreeTight => {
                self.within_tight += 1;
                self.within_loose += 1;
            }
            AgreementTier::AgreeLoose => self.within_loose += 1,
            AgreementTier::Disagree => self.disagreements += 1,
        }
        self.total_comparisons += 1;

        // Overflowed ratios have no value to compare
        let Some(pct) = row.classified_pct() else {
            return;
        };

        // Strict '>' keeps the first date on ties
        let current = self
            .max_deviation
            .as_ref()
            .map(|m| m.delta_pct.abs())
            .unwrap_or(Decimal::ZERO);
        if pct.abs() > current {
            self.max_deviation = Some(MaxDeviation {
                date: row.date,
                delta_pct: pct,
            });
        }
    }

    /// count / total * 100, None when nothing was compared
    pub fn share_pct(&self, count: usize) -> Option<Decimal> {
        if self.total_comparisons == 0 {
            return None;
        }
        Decimal::from(count as u64)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(Decimal::from(self.total_comparisons as u64)))
    }

    pub fn within_tight_pct(&self) -> Option<Decimal> {
        self.share_pct(self.within_tight)
    }

    pub fn within_loose_pct(&self) -> Option<Decimal> {
        self.share_pct(self.within_loose)
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub asset_id: String,
    pub rows: Vec<ComparisonRow>,
    pub summary: RunSummary,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        let max = match &self.summary.max_deviation {
            Some(m) => format!("{}% on {}", fmt_signed(m.delta_pct, 2), m.date),
            None => "none".to_string(),
        };
        format!(
            "Reconciliation for {}: {} dates, {} comparisons, {} within {}%, {} within {}%, max deviation {}",
            self.asset_id,
            self.rows.len(),
            self.summary.total_comparisons,
            self.summary.within_tight,
            self.summary.tight_threshold_pct.normalize(),
            self.summary.within_loose,
            self.summary.loose_threshold_pct.normalize(),
            max
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Asset looked up in every snapshot
    pub asset_id: String,

    /// Inclusive upper bound of AgreeTight (default: 1%)
    pub tight_threshold_pct: Decimal,

    /// Inclusive upper bound of AgreeLoose (default: 5%)
    pub loose_threshold_pct: Decimal,

    pub zero_price_policy: ZeroPricePolicy,
}

impl ReconciliationEngine {
    pub fn new(asset_id: &str) -> Self {
        ReconciliationEngine {
            asset_id: asset_id.to_string(),
            tight_threshold_pct: Decimal::ONE,
            loose_threshold_pct: Decimal::from(5),
            zero_price_policy: ZeroPricePolicy::CountAsZero,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        ReconciliationEngine {
            asset_id: config.asset_id.clone(),
            tight_threshold_pct: config.tight_threshold_pct,
            loose_threshold_pct: config.loose_threshold_pct,
            zero_price_policy: config.zero_price_policy,
        }
    }

    pub fn with_thresholds(mut self, tight_pct: Decimal, loose_pct: Decimal) -> Self {
        self.tight_threshold_pct = tight_pct;
        self.loose_threshold_pct = loose_pct;
        self
    }

    pub fn with_zero_price_policy(mut self, policy: ZeroPricePolicy) -> Self {
        self.zero_price_policy = policy;
        self
    }

    pub fn classify(&self, delta_pct: Decimal) -> AgreementTier {
        let magnitude = delta_pct.abs();
        if magnitude <= self.tight_threshold_pct {
            AgreementTier::AgreeTight
        } else if magnitude <= self.loose_threshold_pct {
            AgreementTier::AgreeLoose
        } else {
            AgreementTier::Disagree
        }
    }

    /// Load the primary series and reconcile it.
    ///
    /// Only a primary load failure is returned as an error; snapshot
    /// problems degrade to "no data" for their date.
    pub fn reconcile<P, S>(&self, primary: &P, secondary: &S) -> SourceResult<ReconciliationReport>
    where
        P: PrimarySource,
        S: SecondarySource,
    {
        let records = primary.read_primary_series()?;
        info!(records = records.len(), asset_id = %self.asset_id, "loaded primary series");

        let report = self.reconcile_records(&records, secondary);
        info!(
            comparisons = report.summary.total_comparisons,
            missing = report.summary.missing,
            corrupt = report.summary.corrupt,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Iteration order and date coverage come from `records` alone;
    /// the secondary source is only ever probed for these dates.
    pub fn reconcile_records<S: SecondarySource>(
        &self,
        records: &[DailyRecord],
        secondary: &S,
    ) -> ReconciliationReport {
        let mut summary = RunSummary::new(self.tight_threshold_pct, self.loose_threshold_pct);
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let row = self.compare_record(record, secondary);
            summary.record(&row);
            rows.push(row);
        }

        ReconciliationReport {
            asset_id: self.asset_id.clone(),
            rows,
            summary,
        }
    }

    pub fn compare_record<S: SecondarySource>(&self, record: &DailyRecord, secondary: &S) -> ComparisonRow {
        let (price_b, lookup) = match secondary.read_secondary_price(record.date, &self.asset_id) {
            Ok(Some(price)) => (Some(price), SnapshotLookup::Found),
            Ok(None) => (None, SnapshotLookup::Missing),
            Err(e) => {
                warn!(date = %record.date, error = %e, "snapshot unreadable, treating as no data");
                (None, SnapshotLookup::Corrupt)
            }
        };

        let mut row = ComparisonRow {
            date: record.date,
            price_a: record.price,
            price_source: record.price_source.clone(),
            price_b,
            delta: None,
            delta_pct: None,
            tier: None,
            lookup,
        };

        let Some(price_b) = price_b else {
            return row;
        };

        let delta = price_b - record.price;
        row.delta = Some(delta);

        row.tier = Some(match deviation_pct(delta, record.price) {
            Deviation::Pct(pct) => {
                row.delta_pct = Some(pct);
                self.classify(pct)
            }
            Deviation::Undefined => match self.zero_price_policy {
                ZeroPricePolicy::CountAsZero => self.classify(Decimal::ZERO),
                ZeroPricePolicy::Exclude => AgreementTier::Undefined,
            },
            Deviation::Overflow => {
                warn!(date = %record.date, %delta, price = %record.price, "deviation out of range");
                AgreementTier::Disagree
            }
        });
        row
    }
}

// ============================================================================
// TESTS
// ============================================================================
