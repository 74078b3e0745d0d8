//! Merge the three normalized sheets into one deduplicated ledger

use super::data::{source_headers, CanonicalRecord, KeyColumn, Measure, RecordKey, Source};
use super::normalize::NormalizedTable;
use crate::config::DashboardConfig;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// A key column that none of the uploaded sheets carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaWarning {
    pub column: KeyColumn,
    pub header: String,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' is missing from every uploaded sheet; its values show as empty",
            self.header
        )
    }
}

/// Row counts and recoverable problems seen while merging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub premium_rows: usize,
    pub claim_rows: usize,
    pub outstanding_rows: usize,
    pub merged_rows: usize,
    pub duplicates_removed: usize,
    /// Part of `duplicates_removed`: rows whose date cells differed as text but
    /// compared equal once parsed (same date in another format, or both unparseable)
    pub date_text_collapses: usize,
    /// Non-empty date or amount cells that could not be parsed and were read as missing
    pub parse_failures: usize,
}

impl IngestSummary {
    pub fn input_rows(&self) -> usize {
        self.premium_rows + self.claim_rows + self.outstanding_rows
    }

    fn count_input(&mut self, source: Source, rows: usize) {
        match source {
            Source::Premium => self.premium_rows += rows,
            Source::Claim => self.claim_rows += rows,
            Source::OutstandingClaim => self.outstanding_rows += rows,
        }
    }
}

/// The deduplicated ledger; immutable once built
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedLedger {
    records: Vec<CanonicalRecord>,
    summary: IngestSummary,
    warnings: Vec<SchemaWarning>,
}

impl MergedLedger {
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the ledger back out as one normalized table per source
    ///
    /// Feeding these tables to `merge_tables` reproduces the same ledger.
    pub fn to_normalized_tables(&self) -> Vec<NormalizedTable> {
        let headers: Vec<String> = source_headers().iter().map(|h| h.to_string()).collect();
        Source::ALL
            .into_iter()
            .map(|source| NormalizedTable {
                source,
                headers: headers.clone(),
                rows: self
                    .records
                    .iter()
                    .filter(|r| r.source == source)
                    .map(CanonicalRecord::to_cells)
                    .collect(),
            })
            .collect()
    }
}

/// Merge the premium, claim and outstanding-claim tables, in that order
pub fn merge(
    premium: &NormalizedTable,
    claim: &NormalizedTable,
    outstanding: &NormalizedTable,
    config: &DashboardConfig,
) -> MergedLedger {
    merge_refs(&[premium, claim, outstanding], config)
}

/// Stack any number of normalized tables and drop repeated key tuples
///
/// The first occurrence of a key tuple wins, so input order matters. The
/// source is part of the key: a claim row never collapses into a premium row.
pub fn merge_tables(tables: &[NormalizedTable], config: &DashboardConfig) -> MergedLedger {
    let refs: Vec<&NormalizedTable> = tables.iter().collect();
    merge_refs(&refs, config)
}

fn merge_refs(tables: &[&NormalizedTable], config: &DashboardConfig) -> MergedLedger {
    let mut summary = IngestSummary::default();
    // Key of each kept row, with the date text it was read from
    let mut seen: HashMap<RecordKey, DateText> = HashMap::new();
    let mut records = Vec::new();

    for table in tables.iter().copied() {
        summary.count_input(table.source, table.len());
        let reader = RowReader::new(table, config);

        for row in &table.rows {
            let (record, date_text) = reader.read(row, &mut summary.parse_failures);
            match seen.entry(record.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(date_text);
                    records.push(record);
                }
                Entry::Occupied(kept) => {
                    summary.duplicates_removed += 1;
                    if *kept.get() != date_text {
                        summary.date_text_collapses += 1;
                        debug!(
                            "{}: dropped row with dates {:?}, same key as a kept row with dates {:?}",
                            record.source,
                            date_text,
                            kept.get()
                        );
                    }
                }
            }
        }
    }

    summary.merged_rows = records.len();
    let warnings = schema_warnings(tables);

    info!(
        "Merged ledger has {} rows after deduplication ({} premium, {} claim, {} outstanding; {} duplicates removed)",
        summary.merged_rows,
        summary.premium_rows,
        summary.claim_rows,
        summary.outstanding_rows,
        summary.duplicates_removed,
    );
    if summary.date_text_collapses > 0 {
        info!(
            "{} of the duplicates differed only in how their dates were written",
            summary.date_text_collapses
        );
    }
    if summary.parse_failures > 0 {
        warn!("{} cells could not be parsed and were read as missing", summary.parse_failures);
    }
    for warning in &warnings {
        warn!("Schema mismatch: {}", warning);
    }

    MergedLedger { records, summary, warnings }
}

/// Key columns absent from every table
fn schema_warnings(tables: &[&NormalizedTable]) -> Vec<SchemaWarning> {
    if tables.is_empty() {
        return Vec::new();
    }
    let missing: Vec<Vec<KeyColumn>> = tables.iter().map(|t| t.missing_key_columns()).collect();
    KeyColumn::ALL
        .into_iter()
        .filter(|c| missing.iter().all(|m| m.contains(c)))
        .map(|column| SchemaWarning {
            column,
            header: column.public_header().to_string(),
        })
        .collect()
}

/// Trimmed inception and expiry cell text, as read before parsing
type DateText = [Option<String>; 2];

/// Column positions of one table, resolved once
struct RowReader<'a> {
    source: Source,
    config: &'a DashboardConfig,
    keys: Vec<(KeyColumn, Option<usize>)>,
    measures: Vec<(Measure, Option<usize>)>,
}

impl<'a> RowReader<'a> {
    fn new(table: &NormalizedTable, config: &'a DashboardConfig) -> Self {
        let keys = KeyColumn::ALL
            .into_iter()
            .filter(|c| c.is_read_from_sheet())
            .map(|c| (c, table.column_index(c.source_header())))
            .collect();
        let measures = Measure::ALL
            .into_iter()
            .map(|m| (m, table.column_index(m.header())))
            .collect();
        Self { source: table.source, config, keys, measures }
    }

    fn read(&self, row: &[String], parse_failures: &mut usize) -> (CanonicalRecord, DateText) {
        let mut record = CanonicalRecord::empty(self.source);
        let mut date_text: DateText = [None, None];

        for (column, idx) in &self.keys {
            let text = idx.and_then(|i| row.get(i)).and_then(|cell| self.key_text(cell));
            match column {
                KeyColumn::InceptionDate => {
                    record.inception_date = self.date(text.as_deref(), parse_failures);
                    date_text[0] = text;
                }
                KeyColumn::ExpiryDate => {
                    record.expiry_date = self.date(text.as_deref(), parse_failures);
                    date_text[1] = text;
                }
                other => record.set_text(*other, text),
            }
        }

        for (measure, idx) in &self.measures {
            let value = idx
                .and_then(|i| row.get(i))
                .and_then(|cell| self.amount(cell, parse_failures));
            record.set_measure(*measure, value);
        }

        (record, date_text)
    }

    /// Trimmed key text; blanks and null tokens are missing
    fn key_text(&self, cell: &str) -> Option<String> {
        let trimmed = cell.trim();
        if self.config.is_null_token(trimmed) {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn date(&self, text: Option<&str>, parse_failures: &mut usize) -> Option<NaiveDate> {
        let text = text?;
        let parsed = parse_date(text, &self.config.date_formats);
        if parsed.is_none() {
            debug!("{}: unparseable date '{}'", self.source, text);
            *parse_failures += 1;
        }
        parsed
    }

    fn amount(&self, cell: &str, parse_failures: &mut usize) -> Option<f64> {
        let trimmed = cell.trim();
        if self.config.is_null_token(trimmed) {
            return None;
        }
        let parsed = parse_amount(trimmed);
        if parsed.is_none() {
            debug!("{}: unparseable amount '{}'", self.source, trimmed);
            *parse_failures += 1;
        }
        parsed
    }
}

/// Parse a date with the first matching format; date-time formats keep only the date
pub fn parse_date(text: &str, formats: &[String]) -> Option<NaiveDate> {
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(text, fmt).ok().map(|dt| dt.date()))
    })
}

/// Parse an amount, accepting comma thousands separators; non-finite values are rejected
///
/// Commas are only stripped when they group the integer part in threes, so a
/// comma used as a decimal mark (`1,5`) is a parse failure rather than `15`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let value = match text.parse::<f64>() {
        Ok(v) => v,
        Err(_) if has_thousands_grouping(text) => text.replace(',', "").parse::<f64>().ok()?,
        Err(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// `-?\d{1,3}(,\d{3})+(\.\d+)?`
fn has_thousands_grouping(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let mut groups = int_part.split(',');
    let leading_ok = groups.next().is_some_and(|g| all_digits(g) && g.len() <= 3);
    let rest: Vec<&str> = groups.collect();

    leading_ok
        && !rest.is_empty()
        && rest.iter().all(|g| g.len() == 3 && all_digits(*g))
        && frac_part.map_or(true, all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::loader::RawTable;
    use crate::ledger::normalize::normalize;
    use approx::assert_relative_eq;

    fn config() -> DashboardConfig {
        DashboardConfig::default()
    }

    fn premium_sheet() -> NormalizedTable {
        let raw = RawTable::from_strs(
            &["UY", "TOC_MOD", "INSURED NAME", "NO POLIS", "INCEPTION DATE", "PREMI IDR"],
            &[
                &["2021", "FIRE", "PT A", "P1", "2021-01-01", "100"],
                &["2021", "FIRE", "PT B", "P2", "2021-02-01", "200"],
            ],
        );
        normalize(&raw, Source::Premium, &config())
    }

    fn claim_sheet() -> NormalizedTable {
        let raw = RawTable::from_strs(
            &["UY", "TOC_MOD", "INSURED NAME", "NO KLAIM", "CLAIM AMOUNT (IDR)"],
            &[&["2021", "FIRE", "PT C", "K1", "50"]],
        );
        normalize(&raw, Source::Claim, &config())
    }

    fn outstanding_sheet() -> NormalizedTable {
        let raw = RawTable::from_strs(
            &["UY", "TOC_MOD", "INSURED NAME", "NO KLAIM", "Gross OS Klaim", "Reas"],
            &[&["2021", "FIRE", "PT D", "K2", "20", ""]],
        );
        normalize(&raw, Source::OutstandingClaim, &config())
    }

    #[test]
    fn test_merge_stacks_in_source_order() {
        let ledger = merge(&premium_sheet(), &claim_sheet(), &outstanding_sheet(), &config());

        assert_eq!(ledger.len(), 4);
        let sources: Vec<Source> = ledger.records().iter().map(|r| r.source).collect();
        assert_eq!(
            sources,
            vec![Source::Premium, Source::Premium, Source::Claim, Source::OutstandingClaim]
        );
        assert_eq!(ledger.records()[0].toc.as_deref(), Some("FIRE"));
        assert_relative_eq!(ledger.records()[1].amount(Measure::PremiumGross), 200.0);
        assert_relative_eq!(ledger.records()[3].amount(Measure::OutstandingClaim), 20.0);
        assert_eq!(ledger.records()[3].measure(Measure::ReinsuranceOutstandingRecovery), None);
    }

    #[test]
    fn test_same_source_duplicates_collapse() {
        let premium = premium_sheet();
        let ledger = merge_tables(
            &[premium.clone(), premium, claim_sheet(), outstanding_sheet()],
            &config(),
        );

        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.summary().duplicates_removed, 2);
        assert_eq!(ledger.summary().premium_rows, 4);
    }

    #[test]
    fn test_cross_source_rows_never_collapse() {
        let raw = RawTable::from_strs(&["UY", "NO POLIS"], &[&["2021", "P1"]]);
        let premium = normalize(&raw, Source::Premium, &config());
        let claim = normalize(&raw, Source::Claim, &config());
        let outstanding = normalize(&raw, Source::OutstandingClaim, &config());

        let ledger = merge(&premium, &claim, &outstanding, &config());
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_first_occurrence_wins() {
        // Same key tuple, different amounts: only the first amount survives
        let raw = RawTable::from_strs(
            &["NO POLIS", "PREMI IDR"],
            &[&["P1", "100"], &[" P1 ", "999"]],
        );
        let premium = normalize(&raw, Source::Premium, &config());
        let empty = |source| normalize(&RawTable::from_strs(&["NO POLIS"], &[]), source, &config());

        let ledger = merge(&premium, &empty(Source::Claim), &empty(Source::OutstandingClaim), &config());
        assert_eq!(ledger.len(), 1);
        assert_relative_eq!(ledger.records()[0].amount(Measure::PremiumGross), 100.0);
    }

    #[test]
    fn test_key_text_normalization() {
        let raw = RawTable::from_strs(
            &["UY", "TOC_MOD", "Kategori Okupasi", "NO KLAIM"],
            &[&["  2022 ", "nan", "None", "   "]],
        );
        let claim = normalize(&raw, Source::Claim, &config());
        let ledger = merge_tables(&[claim], &config());
        let record = &ledger.records()[0];

        assert_eq!(record.underwriting_year.as_deref(), Some("2022"));
        assert_eq!(record.toc, None);
        assert_eq!(record.occupation_category, None);
        assert_eq!(record.claim_number, None);
    }

    #[test]
    fn test_unparseable_values_become_missing() {
        let raw = RawTable::from_strs(
            &["INCEPTION DATE", "EXPIRY DATE", "PREMI IDR"],
            &[&["not a date", "12/31/2021", "abc"]],
        );
        let premium = normalize(&raw, Source::Premium, &config());
        let ledger = merge_tables(&[premium], &config());
        let record = &ledger.records()[0];

        assert_eq!(record.inception_date, None);
        assert_eq!(record.expiry_date, NaiveDate::from_ymd_opt(2021, 12, 31));
        assert_eq!(record.measure(Measure::PremiumGross), None);
        assert_eq!(ledger.summary().parse_failures, 2);
    }

    #[test]
    fn test_schema_warning_for_column_absent_everywhere() {
        let ledger = merge(&premium_sheet(), &claim_sheet(), &outstanding_sheet(), &config());
        let missing: Vec<KeyColumn> = ledger.warnings().iter().map(|w| w.column).collect();

        assert!(missing.contains(&KeyColumn::AccidentYear));
        assert!(missing.contains(&KeyColumn::CertificateNumber));
        // Present on at least one sheet
        assert!(!missing.contains(&KeyColumn::ClaimNumber));
        assert!(!missing.contains(&KeyColumn::PolicyNumber));
        assert!(!missing.contains(&KeyColumn::Source));
    }

    #[test]
    fn test_empty_inputs_merge_to_empty_ledger() {
        let empty = |source| normalize(&RawTable::from_strs(&["UY"], &[]), source, &config());
        let ledger = merge(
            &empty(Source::Premium),
            &empty(Source::Claim),
            &empty(Source::OutstandingClaim),
            &config(),
        );
        assert!(ledger.is_empty());
        assert_eq!(ledger.summary().input_rows(), 0);
    }

    #[test]
    fn test_remerge_is_idempotent() {
        let premium = premium_sheet();
        let ledger = merge_tables(
            &[premium.clone(), premium, claim_sheet(), outstanding_sheet()],
            &config(),
        );
        let again = merge_tables(&ledger.to_normalized_tables(), &config());

        assert_eq!(again.records(), ledger.records());
        assert_eq!(again.summary().duplicates_removed, 0);
    }

    #[test]
    fn test_collapses_on_date_text_are_counted() {
        let raw = RawTable::from_strs(
            &["NO POLIS", "INCEPTION DATE", "PREMI IDR"],
            &[
                &["P1", "TBD", "100"],
                &["P1", "N/A", "200"],
                &["P2", "2021-01-01", "10"],
                &["P2", "2021-01-01 00:00:00", "20"],
                &["P3", "2021-05-05", "30"],
                &["P3", "2021-05-05", "30"],
            ],
        );
        let premium = normalize(&raw, Source::Premium, &config());
        let ledger = merge_tables(&[premium], &config());

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.summary().duplicates_removed, 3);
        // The exact repeat of P3 is an ordinary duplicate
        assert_eq!(ledger.summary().date_text_collapses, 2);
        assert_relative_eq!(ledger.records()[0].amount(Measure::PremiumGross), 100.0);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1234.5"), Some(1234.5));
        assert_eq!(parse_amount("1,234.5"), Some(1234.5));
        assert_eq!(parse_amount("-20"), Some(-20.0));
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("x"), None);
    }

    #[test]
    fn test_parse_amount_rejects_comma_decimals() {
        assert_eq!(parse_amount("1,5"), None);
        assert_eq!(parse_amount("12,34"), None);
        assert_eq!(parse_amount("1,2,3"), None);
        assert_eq!(parse_amount("1,234,5"), None);
        assert_eq!(parse_amount("1234,567"), None);
        assert_eq!(parse_amount("1,234."), None);

        assert_eq!(parse_amount("1,234,567"), Some(1234567.0));
        assert_eq!(parse_amount("-12,345.75"), Some(-12345.75));
    }

    #[test]
    fn test_comma_decimal_cell_counts_as_parse_failure() {
        let raw = RawTable::from_strs(&["NO POLIS", "PREMI IDR"], &[&["P1", "1,5"], &["P2", "2,500"]]);
        let premium = normalize(&raw, Source::Premium, &config());
        let ledger = merge_tables(&[premium], &config());

        assert_eq!(ledger.records()[0].measure(Measure::PremiumGross), None);
        assert_relative_eq!(ledger.records()[1].amount(Measure::PremiumGross), 2500.0);
        assert_eq!(ledger.summary().parse_failures, 1);
    }

    #[test]
    fn test_parse_date_formats() {
        let formats = config().date_formats;
        let expected = NaiveDate::from_ymd_opt(2023, 3, 9);
        assert_eq!(parse_date("2023-03-09", &formats), expected);
        assert_eq!(parse_date("2023-03-09 00:00:00", &formats), expected);
        assert_eq!(parse_date("2023/03/09", &formats), expected);
        assert_eq!(parse_date("03/09/2023", &formats), expected);
        assert_eq!(parse_date("09.03.2023", &formats), None);
    }
}
