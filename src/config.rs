// ⚙️ Configuration - Paths, asset of interest and tier thresholds
//
// Everything the readers and the engine need is passed in explicitly.
// Values come from defaults, then an optional TOML file, then CLI overrides.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_PRIMARY_PATH: &str = "static/data/apr_data.json";
pub const DEFAULT_SNAPSHOT_DIR: &str =
    "../solana_analytics/cache/G9XfJoY81n8A9bZKaJFhJYomRrcvFkuJ22em2g8rZuCh";
pub const DEFAULT_ASSET_ID: &str = "TUNAfXDZEdQizTMTh3uEvNvYqJmqFHZbEJt8joP4cyx";
pub const DEFAULT_TOKEN_SYMBOL: &str = "TUNA";

// ============================================================================
// ZERO PRICE POLICY
// ============================================================================

/// What to do with a comparable row whose primary price is zero
/// (percentage deviation is undefined there).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPricePolicy {
    /// Count the row, classify it as 0% deviation
    #[default]
    CountAsZero,

    /// Show the row but keep it out of every counter
    Exclude,
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aggregated APR dataset (authoritative date sequence)
    pub primary_path: PathBuf,

    /// Root of the year/month partitioned snapshot cache
    pub snapshot_dir: PathBuf,

    /// Asset identifier looked up in every snapshot
    pub asset_id: String,

    /// Display name used in the report title
    pub token_symbol: String,

    pub tight_threshold_pct: Decimal,
    pub loose_threshold_pct: Decimal,
    pub zero_price_policy: ZeroPricePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            primary_path: PathBuf::from(DEFAULT_PRIMARY_PATH),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            asset_id: DEFAULT_ASSET_ID.to_string(),
            token_symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
            tight_threshold_pct: Decimal::ONE,
            loose_threshold_pct: Decimal::from(5),
            zero_price_policy: ZeroPricePolicy::CountAsZero,
        }
    }
}

impl Config {
    /// Load a TOML config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tight_threshold_pct.is_sign_negative() || self.loose_threshold_pct.is_sign_negative() {
            bail!("Tier thresholds must be non-negative");
        }
        if self.tight_threshold_pct > self.loose_threshold_pct {
            bail!(
                "tight_threshold_pct ({}) must not exceed loose_threshold_pct ({})",
                self.tight_threshold_pct,
                self.loose_threshold_pct
            );
        }
        if self.asset_id.trim().is_empty() {
            bail!("asset_id must not be empty");
        }
        Ok(())
    }
}
