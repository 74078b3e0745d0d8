//! Column normalization: one rename table drives every source sheet

use super::data::{KeyColumn, Measure, Source};
use super::loader::RawTable;
use crate::config::DashboardConfig;
use log::{debug, warn};
use std::collections::HashSet;

/// Source header → canonical header, per upload slot
const PREMIUM_RENAMES: &[(&str, Measure)] = &[
    ("PREMI IDR", Measure::PremiumGross),
    ("AKUISISI", Measure::AcquisitionCost),
    ("PREMI REAS IDR", Measure::ReinsurancePremium),
    ("KOMISI REAS IDR", Measure::ReinsuranceCommission),
];

const CLAIM_RENAMES: &[(&str, Measure)] = &[
    ("CLAIM AMOUNT (IDR)", Measure::PaidClaim),
    ("KLAIM REAS", Measure::ReinsuranceClaimRecovery),
];

const OUTSTANDING_RENAMES: &[(&str, Measure)] = &[
    ("Gross OS Klaim", Measure::OutstandingClaim),
    ("Reas", Measure::ReinsuranceOutstandingRecovery),
];

/// Rename table for one source sheet
#[derive(Debug, Clone, Copy)]
pub struct SourceMapping {
    pub source: Source,
    pub renames: &'static [(&'static str, Measure)],
}

impl SourceMapping {
    pub fn for_source(source: Source) -> Self {
        let renames = match source {
            Source::Premium => PREMIUM_RENAMES,
            Source::Claim => CLAIM_RENAMES,
            Source::OutstandingClaim => OUTSTANDING_RENAMES,
        };
        Self { source, renames }
    }

    /// Canonical name for a header; unrecognized headers pass through
    pub fn canonical_name<'a>(&self, header: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| *from == header)
            .map(|(_, measure)| measure.header())
            .unwrap_or(header)
    }
}

/// A sheet with canonical headers, tagged with the slot it was uploaded to
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub source: Source,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Key columns read from the sheet that this table does not carry
    pub fn missing_key_columns(&self) -> Vec<KeyColumn> {
        KeyColumn::ALL
            .into_iter()
            .filter(|c| c.is_read_from_sheet())
            .filter(|c| self.column_index(c.source_header()).is_none())
            .collect()
    }
}

fn is_synthetic(header: &str, config: &DashboardConfig) -> bool {
    header.is_empty() || header.starts_with(config.synthetic_column_prefix.as_str())
}

/// Normalize one raw sheet into canonical column names
///
/// Synthetic empty-label columns are dropped, known headers renamed, duplicate
/// names collapsed to their first occurrence, and any measure column the sheet
/// lacks is appended with absent cells.
pub fn normalize(raw: &RawTable, source: Source, config: &DashboardConfig) -> NormalizedTable {
    let mapping = SourceMapping::for_source(source);

    let mut kept: Vec<(usize, String)> = Vec::with_capacity(raw.headers.len());
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, header) in raw.headers.iter().enumerate() {
        let header = header.trim();
        if is_synthetic(header, config) {
            debug!("{}: dropping synthetic column '{}'", source, header);
            continue;
        }
        let name = mapping.canonical_name(header).to_string();
        if !seen.insert(name.clone()) {
            warn!("{}: duplicate column '{}' after renaming, keeping the first", source, name);
            continue;
        }
        kept.push((idx, name));
    }

    let mut headers: Vec<String> = kept.iter().map(|(_, name)| name.clone()).collect();
    let added: Vec<&str> = Measure::ALL
        .iter()
        .map(|m| m.header())
        .filter(|h| !seen.contains(*h))
        .collect();
    headers.extend(added.iter().map(|h| h.to_string()));

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            // Rows may be shorter than the header when the table was built by hand
            let mut cells: Vec<String> = kept
                .iter()
                .map(|(idx, _)| row.get(*idx).cloned().unwrap_or_default())
                .collect();
            cells.resize(headers.len(), String::new());
            cells
        })
        .collect();

    NormalizedTable { source, headers, rows }
}
