//! Dashboard configuration
//!
//! Every field has a default matching the behavior analysts are used to, so a
//! config file only needs the keys it overrides.

use crate::error::DashboardResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Header prefix spreadsheet exporters give to columns with an empty label
pub const DEFAULT_SYNTHETIC_PREFIX: &str = "Unnamed";

/// Number of named parties kept in a severity ranking
pub const DEFAULT_SEVERITY_TOP_N: usize = 10;

/// Configuration shared by every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Columns whose header starts with this prefix are dropped on ingest
    pub synthetic_column_prefix: String,

    /// Cell text (after trimming) treated as missing in key columns
    pub null_tokens: Vec<String>,

    /// `chrono` formats tried in order when parsing inception/expiry dates
    pub date_formats: Vec<String>,

    /// How many parties a severity ranking keeps
    pub severity_top_n: usize,

    /// Risk category order for the premium breakdown
    pub premium_risk_order: Vec<String>,

    /// Risk category order for the claim breakdown
    pub claim_risk_order: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            synthetic_column_prefix: DEFAULT_SYNTHETIC_PREFIX.to_string(),
            null_tokens: vec!["nan".to_string(), "None".to_string()],
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y/%m/%d".to_string(),
                "%m/%d/%Y".to_string(),
            ],
            severity_top_n: DEFAULT_SEVERITY_TOP_N,
            premium_risk_order: ["C", "B", "D", "A"].iter().map(|s| s.to_string()).collect(),
            claim_risk_order: ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DashboardConfig {
    /// Load a config from a JSON file; missing keys keep their defaults
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> DashboardResult<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Load a config from any reader
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> DashboardResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Whether a trimmed cell should be read as missing
    pub fn is_null_token(&self, value: &str) -> bool {
        value.is_empty() || self.null_tokens.iter().any(|t| t == value)
    }
}
