// 🧾 Report Rendering - Fixed-width text report + optional CSV export
//
// Prices and deltas: 8 fraction digits. Percentages: 2. Summary shares: 1.
// Non-negative signed values carry an explicit '+'.

use crate::reconciliation::{AgreementTier, ComparisonRow, ReconciliationReport, RunSummary};
use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

const RULE_WIDTH: usize = 100;
const NA: &str = "N/A";

// ============================================================================
// NUMBER FORMATTING
// ============================================================================

/// Exact only while value * 10^dp fits the 96-bit mantissa (about 7.9e28);
/// beyond that `rescale` drops digits. Primary prices are capped at
/// `sources::MAX_PRICE` for this reason.
fn fixed(value: Decimal, dp: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded.to_string()
}

/// Unsigned fixed-point, e.g. `1.00500000`
pub fn fmt_price(value: Decimal) -> String {
    fixed(value, 8)
}

/// Always signed: `+0.50`, `-3.00`. A value that rounds to zero prints as `+0.00`.
pub fn fmt_signed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "+" };
    format!("{}{}", sign, fixed(rounded.abs(), dp))
}

fn fmt_share(count: usize, summary: &RunSummary, share: Option<Decimal>) -> String {
    match share {
        Some(pct) => format!("{}/{} ({}%)", count, summary.total_comparisons, fixed(pct, 1)),
        None => format!("{}/{} ({})", count, summary.total_comparisons, NA),
    }
}

// ============================================================================
// TEXT REPORT
// ============================================================================

pub fn write_report<W: Write>(out: &mut W, report: &ReconciliationReport, token_symbol: &str) -> Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);

    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "{} Price Comparison: APR Data vs Assets Snapshots",
        token_symbol
    )?;
    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "{:<12} {:<15} {:<10} {:<15} {:<12} {:<9} {}",
        "Date", "APR Price", "Source", "Assets Price", "Delta", "Delta %", "Status"
    )?;
    writeln!(out, "{}", thin)?;

    for row in &report.rows {
        writeln!(out, "{}", format_row(row))?;
    }

    writeln!(out, "{}", thin)?;
    write_summary(out, &report.summary)?;
    writeln!(out, "{}", rule)?;

    Ok(())
}

pub fn format_row(row: &ComparisonRow) -> String {
    let primary = format!("${}", fmt_price(row.price_a));

    let (secondary, delta) = match (row.price_b, row.delta) {
        (Some(price_b), Some(delta)) => (format!("${}", fmt_price(price_b)), fmt_signed(delta, 8)),
        _ => (NA.to_string(), NA.to_string()),
    };

    let pct = match row.classified_pct() {
        Some(pct) => format!("{}%", fmt_signed(pct, 2)),
        None => NA.to_string(),
    };

    let status = row.tier.map(|t| t.symbol()).unwrap_or("");

    format!(
        "{:<12} {:<15} {:<10} {:<15} {:<12} {:<9} {}",
        row.date.format("%Y-%m-%d").to_string(),
        primary,
        row.price_source,
        secondary,
        delta,
        pct,
        status
    )
    .trim_end()
    .to_string()
}

pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "Summary Statistics:")?;
    writeln!(out, "Total comparisons: {}", summary.total_comparisons)?;
    writeln!(
        out,
        "Matches within {}%: {}",
        summary.tight_threshold_pct.normalize(),
        fmt_share(summary.within_tight, summary, summary.within_tight_pct())
    )?;
    writeln!(
        out,
        "Matches within {}%: {}",
        summary.loose_threshold_pct.normalize(),
        fmt_share(summary.within_loose, summary, summary.within_loose_pct())
    )?;
    writeln!(
        out,
        "Disagreements (>{}%): {}",
        summary.loose_threshold_pct.normalize(),
        summary.disagreements
    )?;

    match &summary.max_deviation {
        Some(max) => writeln!(out, "Maximum delta: {}% on {}", fmt_signed(max.delta_pct, 2), max.date)?,
        None => writeln!(out, "Maximum delta: {}", NA)?,
    }

    writeln!(out, "Dates without snapshot data: {}", summary.missing)?;
    if summary.corrupt > 0 {
        writeln!(out, "Unreadable snapshots: {}", summary.corrupt)?;
    }
    if summary.excluded_zero_price > 0 {
        writeln!(out, "Excluded (zero APR price): {}", summary.excluded_zero_price)?;
    }

    Ok(())
}

// ============================================================================
// CSV EXPORT
// ============================================================================

/// One CSV line per row; empty cells mean "no data"
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    price_a: String,
    price_source: &'a str,
    price_b: Option<String>,
    delta: Option<String>,
    delta_pct: Option<String>,
    tier: Option<&'static str>,
}

impl<'a> From<&'a ComparisonRow> for CsvRow<'a> {
    fn from(row: &'a ComparisonRow) -> Self {
        CsvRow {
            date: row.date.format("%Y-%m-%d").to_string(),
            price_a: fmt_price(row.price_a),
            price_source: &row.price_source,
            price_b: row.price_b.map(fmt_price),
            delta: row.delta.map(|d| fmt_signed(d, 8)),
            delta_pct: row.classified_pct().map(|p| fmt_signed(p, 2)),
            tier: row.tier.map(|t: AgreementTier| t.label()),
        }
    }
}

pub fn write_csv<W: Write>(writer: W, rows: &[ComparisonRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(CsvRow::from(row))
            .with_context(|| format!("Failed to write CSV row for {}", row.date))?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_csv(path: &Path, rows: &[ComparisonRow]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    write_csv(file, rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroPricePolicy;
    use crate::error::SourceResult;
    use crate::reconciliation::ReconciliationEngine;
    use crate::sources::{DailyRecord, SecondarySource};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const ASSET: &str = "TUNAfXDZEdQizTMTh3uEvNvYqJmqFHZbEJt8joP4cyx";

    struct MapSnapshots(HashMap<NaiveDate, Decimal>);

    impl SecondarySource for MapSnapshots {
        fn read_secondary_price(&self, date: NaiveDate, _asset_id: &str) -> SourceResult<Option<Decimal>> {
            Ok(self.0.get(&date).copied())
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn two_day_report() -> ReconciliationReport {
        let records = vec![
            DailyRecord::new(date("2024-01-01"), dec!(1.00), "oracle"),
            DailyRecord::new(date("2024-01-02"), dec!(2.00), "oracle"),
        ];
        let snapshots = MapSnapshots(HashMap::from([(date("2024-01-01"), dec!(1.005))]));
        ReconciliationEngine::new(ASSET).reconcile_records(&records, &snapshots)
    }

    fn render(report: &ReconciliationReport) -> String {
        let mut out = Vec::new();
        write_report(&mut out, report, "TUNA").unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_fmt_price() {
        assert_eq!(fmt_price(dec!(1)), "1.00000000");
        assert_eq!(fmt_price(dec!(1.005)), "1.00500000");
        assert_eq!(fmt_price(dec!(0.123456789)), "0.12345679");
    }

    #[test]
    fn test_fmt_signed() {
        assert_eq!(fmt_signed(dec!(0.005), 8), "+0.00500000");
        assert_eq!(fmt_signed(dec!(0.5), 2), "+0.50");
        assert_eq!(fmt_signed(dec!(-3), 2), "-3.00");
        assert_eq!(fmt_signed(dec!(0), 2), "+0.00");
        assert_eq!(fmt_signed(dec!(-0.001), 2), "+0.00");
        assert_eq!(fmt_signed(dec!(-12.345), 2), "-12.35");
    }

    #[test]
    fn test_row_with_secondary() {
        let report = two_day_report();
        let line = format_row(&report.rows[0]);

        assert!(line.starts_with("2024-01-01"));
        assert!(line.contains("$1.00000000"));
        assert!(line.contains("oracle"));
        assert!(line.contains("$1.00500000"));
        assert!(line.contains("+0.00500000"));
        assert!(line.contains("+0.50%"));
        assert!(line.ends_with("OK"));
    }

    #[test]
    fn test_row_without_secondary() {
        let report = two_day_report();
        let line = format_row(&report.rows[1]);

        assert!(line.starts_with("2024-01-02"));
        assert!(line.contains("$2.00000000"));
        assert_eq!(line.matches("N/A").count(), 3);
        assert!(!line.contains("OK"));
    }

    #[test]
    fn test_rows_are_fixed_width() {
        let report = two_day_report();
        let first = format_row(&report.rows[0]);
        let second = format_row(&report.rows[1]);

        // Secondary price column starts at the same offset on both rows
        assert_eq!(first.find("$1.005"), second.find("N/A"));
    }

    #[test]
    fn test_full_report_summary() {
        let text = render(&two_day_report());

        assert!(text.contains("TUNA Price Comparison"));
        assert!(text.contains("Total comparisons: 1"));
        assert!(text.contains("Matches within 1%: 1/1 (100.0%)"));
        assert!(text.contains("Matches within 5%: 1/1 (100.0%)"));
        assert!(text.contains("Maximum delta: +0.50% on 2024-01-01"));
        assert!(text.contains("Dates without snapshot data: 1"));
        assert!(!text.contains("Unreadable snapshots"));
    }

    #[test]
    fn test_summary_with_no_comparisons() {
        let records = vec![DailyRecord::new(date("2024-01-01"), dec!(1), "oracle")];
        let report = ReconciliationEngine::new(ASSET).reconcile_records(&records, &MapSnapshots(HashMap::new()));

        let text = render(&report);

        assert!(text.contains("Total comparisons: 0"));
        assert!(text.contains("Matches within 1%: 0/0 (N/A)"));
        assert!(text.contains("Matches within 5%: 0/0 (N/A)"));
        assert!(text.contains("Maximum delta: N/A"));
    }

    #[test]
    fn test_share_rounds_to_one_digit() {
        let records = vec![
            DailyRecord::new(date("2024-01-01"), dec!(1), "oracle"),
            DailyRecord::new(date("2024-01-02"), dec!(1), "oracle"),
            DailyRecord::new(date("2024-01-03"), dec!(1), "oracle"),
        ];
        let snapshots = MapSnapshots(HashMap::from([
            (date("2024-01-01"), dec!(1)),
            (date("2024-01-02"), dec!(1.03)),
            (date("2024-01-03"), dec!(1.5)),
        ]));
        let report = ReconciliationEngine::new(ASSET).reconcile_records(&records, &snapshots);

        let text = render(&report);

        assert!(text.contains("Matches within 1%: 1/3 (33.3%)"));
        assert!(text.contains("Matches within 5%: 2/3 (66.7%)"));
        assert!(text.contains("Disagreements (>5%): 1"));
        assert!(text.contains("Maximum delta: +50.00% on 2024-01-03"));
    }

    #[test]
    fn test_zero_price_rows() {
        let records = vec![DailyRecord::new(date("2024-01-01"), dec!(0), "pool")];
        let snapshots = MapSnapshots(HashMap::from([(date("2024-01-01"), dec!(5))]));

        let counted = ReconciliationEngine::new(ASSET).reconcile_records(&records, &snapshots);
        assert!(format_row(&counted.rows[0]).contains("+0.00%"));

        let excluded = ReconciliationEngine::new(ASSET)
            .with_zero_price_policy(ZeroPricePolicy::Exclude)
            .reconcile_records(&records, &snapshots);
        let line = format_row(&excluded.rows[0]);
        assert!(line.contains("+5.00000000"));
        assert!(line.contains("N/A"));
        assert!(line.ends_with('?'));
        assert!(render(&excluded).contains("Excluded (zero APR price): 1"));
    }

    #[test]
    fn test_out_of_range_deviation_row() {
        let records = vec![DailyRecord::new(date("2024-01-01"), dec!(0.00000000000000000001), "pool")];
        let snapshots = MapSnapshots(HashMap::from([(date("2024-01-01"), dec!(10000000))]));
        let report = ReconciliationEngine::new(ASSET).reconcile_records(&records, &snapshots);

        let line = format_row(&report.rows[0]);
        assert!(line.contains("+10000000.00000000"));
        assert!(!line.contains("+0.00%"));
        assert!(line.ends_with('X'));

        let text = render(&report);
        assert!(text.contains("Matches within 1%: 0/1 (0.0%)"));
        assert!(text.contains("Disagreements (>5%): 1"));
    }

    #[test]
    fn test_csv_export() {
        let report = two_day_report();
        let mut out = Vec::new();
        write_csv(&mut out, &report.rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "date,price_a,price_source,price_b,delta,delta_pct,tier");
        assert_eq!(
            lines[1],
            "2024-01-01,1.00000000,oracle,1.00500000,+0.00500000,+0.50,agree_tight"
        );
        assert_eq!(lines[2], "2024-01-02,2.00000000,oracle,,,,");
    }

    #[test]
    fn test_export_csv_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comparison.csv");

        export_csv(&path, &two_day_report().rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
