//! Full dashboard pass: sheets → normalized tables → ledger → report
//!
//! The runner holds only configuration. Every call rebuilds the ledger from
//! the sheets it is given, so there is no state to invalidate between runs.
//!
//! # Example
//! ```ignore
//! let runner = DashboardRunner::new();
//! let sheets = SourceSheets::from_paths(Some(premium), Some(claim), Some(os))?;
//!
//! match runner.run(&sheets, &FilterSelection::all()) {
//!     PipelineOutcome::Ready(report) => println!("{:?}", report.loss_ratio),
//!     PipelineOutcome::Idle { missing } => println!("waiting for {:?}", missing),
//! }
//! ```

use crate::analytics::{DashboardReport, FilterSelection};
use crate::config::DashboardConfig;
use crate::error::DashboardResult;
use crate::ledger::{load_sheet, merge, normalize, MergedLedger, RawTable, Source};
use log::debug;
use std::path::Path;

/// The three upload slots; any of them may still be empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSheets {
    pub premium: Option<RawTable>,
    pub claim: Option<RawTable>,
    pub outstanding: Option<RawTable>,
}

impl SourceSheets {
    pub fn new(premium: RawTable, claim: RawTable, outstanding: RawTable) -> Self {
        Self {
            premium: Some(premium),
            claim: Some(claim),
            outstanding: Some(outstanding),
        }
    }

    /// Load whichever sheets have a path; a `None` path leaves the slot empty
    pub fn from_paths<P: AsRef<Path>>(
        premium: Option<P>,
        claim: Option<P>,
        outstanding: Option<P>,
    ) -> DashboardResult<Self> {
        Ok(Self {
            premium: premium.map(load_sheet).transpose()?,
            claim: claim.map(load_sheet).transpose()?,
            outstanding: outstanding.map(load_sheet).transpose()?,
        })
    }

    pub fn get(&self, source: Source) -> Option<&RawTable> {
        match source {
            Source::Premium => self.premium.as_ref(),
            Source::Claim => self.claim.as_ref(),
            Source::OutstandingClaim => self.outstanding.as_ref(),
        }
    }

    /// Slots still waiting for an upload
    pub fn missing(&self) -> Vec<Source> {
        Source::ALL.into_iter().filter(|s| self.get(*s).is_none()).collect()
    }
}

/// Result of one pass
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Not every sheet is uploaded yet; nothing to show
    Idle { missing: Vec<Source> },
    Ready(Box<DashboardReport>),
}

impl PipelineOutcome {
    pub fn report(&self) -> Option<&DashboardReport> {
        match self {
            PipelineOutcome::Ready(report) => Some(report),
            PipelineOutcome::Idle { .. } => None,
        }
    }
}

/// Runs the dashboard pipeline with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct DashboardRunner {
    config: DashboardConfig,
}

impl DashboardRunner {
    /// Runner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DashboardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Normalize and merge the sheets; `None` until all three are present
    pub fn build_ledger(&self, sheets: &SourceSheets) -> Option<MergedLedger> {
        let (premium, claim, outstanding) = match (&sheets.premium, &sheets.claim, &sheets.outstanding) {
            (Some(p), Some(c), Some(o)) => (p, c, o),
            _ => {
                debug!("Waiting for uploads: {:?}", sheets.missing());
                return None;
            }
        };

        let premium = normalize(premium, Source::Premium, &self.config);
        let claim = normalize(claim, Source::Claim, &self.config);
        let outstanding = normalize(outstanding, Source::OutstandingClaim, &self.config);
        Some(merge(&premium, &claim, &outstanding, &self.config))
    }

    /// Aggregate an already merged ledger for one selection
    pub fn report(&self, ledger: &MergedLedger, selection: &FilterSelection) -> DashboardReport {
        DashboardReport::build(ledger, selection, &self.config)
    }

    /// Full pass from sheets to report
    pub fn run(&self, sheets: &SourceSheets, selection: &FilterSelection) -> PipelineOutcome {
        match self.build_ledger(sheets) {
            Some(ledger) => PipelineOutcome::Ready(Box::new(self.report(&ledger, selection))),
            None => PipelineOutcome::Idle { missing: sheets.missing() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{grouped_sum, loss_ratio, CategoryOrder, DateRange, LossRatio};
    use crate::ledger::{merge_tables, CanonicalRecord, DateField, KeyColumn, Measure, RecordKey};
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const PREMIUM_HEADERS: &[&str] = &[
        "Unnamed: 0", "UY", "TOC_MOD", "Kategori Okupasi", "Kategori Risiko Okupasi",
        "INSURED NAME", "NO POLIS", "INCEPTION DATE", "EXPIRY DATE", "PREMI IDR", "AKUISISI",
    ];
    const CLAIM_HEADERS: &[&str] = &[
        "UY", "TOC_MOD", "Kategori Okupasi", "Kategori Risiko Okupasi", "INSURED NAME",
        "NO POLIS", "NO KLAIM", "INCEPTION DATE", "EXPIRY DATE", "CLAIM AMOUNT (IDR)", "KLAIM REAS",
    ];
    const OUTSTANDING_HEADERS: &[&str] = &[
        "UY", "TOC_MOD", "Kategori Okupasi", "Kategori Risiko Okupasi", "INSURED NAME",
        "NO POLIS", "NO KLAIM", "INCEPTION DATE", "EXPIRY DATE", "Gross OS Klaim", "Reas",
    ];

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::from_strs(headers, rows)
    }

    fn worked_example() -> SourceSheets {
        SourceSheets::new(
            sheet(
                PREMIUM_HEADERS,
                &[
                    &["0", "2021", "FIRE", "Office", "A", "PT A", "P1", "2021-01-01", "2022-01-01", "100", "0"],
                    &["1", "2021", "FIRE", "Office", "A", "PT B", "P2", "2021-03-01", "2022-03-01", "200", "0"],
                ],
            ),
            sheet(
                CLAIM_HEADERS,
                &[&["2021", "FIRE", "Office", "A", "PT C", "P3", "K1", "2021-01-01", "2022-01-01", "50", "0"]],
            ),
            sheet(
                OUTSTANDING_HEADERS,
                &[&["2021", "FIRE", "Office", "A", "PT D", "P4", "K2", "2021-01-01", "2022-01-01", "20", ""]],
            ),
        )
    }

    #[test]
    fn test_idle_until_all_sheets_present() {
        let runner = DashboardRunner::new();
        let mut sheets = worked_example();
        sheets.claim = None;

        let outcome = runner.run(&sheets, &FilterSelection::all());
        assert_eq!(outcome, PipelineOutcome::Idle { missing: vec![Source::Claim] });
        assert!(outcome.report().is_none());

        let outcome = runner.run(&SourceSheets::default(), &FilterSelection::all());
        assert_eq!(
            outcome,
            PipelineOutcome::Idle { missing: vec![Source::Premium, Source::Claim, Source::OutstandingClaim] }
        );
    }

    #[test]
    fn test_worked_example_loss_ratio() {
        let runner = DashboardRunner::new();
        let outcome = runner.run(&worked_example(), &FilterSelection::all());
        let report = outcome.report().unwrap();

        assert_eq!(report.filtered_rows(), 4);
        assert_relative_eq!(report.totals.premium_gross, 300.0);
        assert_relative_eq!(report.totals.paid_claim, 50.0);
        assert_relative_eq!(report.totals.outstanding_claim, 20.0);
        assert_relative_eq!(report.loss_ratio.value().unwrap(), 70.0 / 300.0, epsilon = 1e-12);
    }

    #[test]
    fn test_double_premium_upload_collapses() {
        let runner = DashboardRunner::new();
        let mut sheets = worked_example();
        let once = runner.build_ledger(&sheets).unwrap();

        let premium = sheets.premium.take().unwrap();
        let mut doubled = premium.clone();
        doubled.rows.extend(premium.rows);
        sheets.premium = Some(doubled);
        let twice = runner.build_ledger(&sheets).unwrap();

        assert_eq!(twice.len(), once.len());
        assert_eq!(twice.records(), once.records());
        assert_eq!(twice.summary().duplicates_removed, 2);
    }

    #[test]
    fn test_short_row_pushed_after_construction() {
        let runner = DashboardRunner::new();
        let mut sheets = worked_example();
        if let Some(premium) = sheets.premium.as_mut() {
            premium.rows.push(vec!["2".to_string(), "2022".to_string()]);
        }

        let outcome = runner.run(&sheets, &FilterSelection::all());
        let report = outcome.report().unwrap();
        assert_eq!(report.filtered_rows(), 5);
        assert_eq!(report.underwriting_year.keys(), vec!["2021", "2022"]);
        assert_relative_eq!(report.totals.premium_gross, 300.0);
    }

    #[test]
    fn test_one_bound_date_range_keeps_ledger() {
        let runner = DashboardRunner::new();
        let range = DateRange { start: chrono::NaiveDate::from_ymd_opt(2021, 2, 1), end: None };
        let selection = FilterSelection::all().with_date_range(DateField::Inception, range);

        let report = runner.run(&worked_example(), &selection);
        assert_eq!(report.report().unwrap().filtered_rows(), 4);
    }

    #[test]
    fn test_empty_sheets_produce_empty_report() {
        let runner = DashboardRunner::new();
        let sheets = SourceSheets::new(
            sheet(PREMIUM_HEADERS, &[]),
            sheet(CLAIM_HEADERS, &[]),
            sheet(OUTSTANDING_HEADERS, &[]),
        );
        let outcome = runner.run(&sheets, &FilterSelection::all());
        let report = outcome.report().unwrap();

        assert_eq!(report.filtered_rows(), 0);
        assert!(report.underwriting_year.rows.is_empty());
        assert!(report.premium_severity.is_empty());
        assert_eq!(report.claim_frequency, 0);
        assert_eq!(report.incurred_average, None);
        assert_eq!(report.loss_ratio, LossRatio::Undefined);
    }

    #[test]
    fn test_schema_warnings_reach_the_report() {
        let runner = DashboardRunner::new();
        let outcome = runner.run(&worked_example(), &FilterSelection::all());
        let report = outcome.report().unwrap();

        let missing: Vec<KeyColumn> = report.warnings.iter().map(|w| w.column).collect();
        assert_eq!(missing, vec![KeyColumn::AccidentYear, KeyColumn::CertificateNumber]);
        // The ledger still renders
        assert_eq!(report.filtered_rows(), 4);
    }

    // ---- property tests ----

    const DATES: &[&str] = &["2020-01-15", "2021-06-30", "2022-12-31", "not a date", ""];

    fn arb_row(with_claim: bool) -> impl Strategy<Value = Vec<String>> {
        (
            prop::sample::select(vec!["2020", "2021", "2022"]),
            prop::sample::select(vec!["FIRE", "PAR", "EQ", ""]),
            prop::sample::select(vec!["Office", "Factory", "nan"]),
            prop::sample::select(vec!["A", "B", "C", "D"]),
            prop::sample::select(vec!["PT A", "PT B", "PT C", "None"]),
            prop::sample::select(vec!["P1", "P2"]),
            prop::sample::select(vec!["K1", "K2", ""]),
            prop::sample::select(DATES.to_vec()),
            prop::sample::select(DATES.to_vec()),
            0u32..1000,
            0u32..100,
        )
            .prop_map(move |(uy, toc, occ, risk, name, pol, claim, inc, exp, a, b)| {
                let mut row = vec!["0".to_string()];
                row.extend([uy, toc, occ, risk, name, pol].iter().map(|s| s.to_string()));
                if with_claim {
                    row.push(claim.to_string());
                }
                row.extend([inc, exp].iter().map(|s| s.to_string()));
                row.push(a.to_string());
                row.push(b.to_string());
                row
            })
    }

    fn arb_sheets() -> impl Strategy<Value = SourceSheets> {
        (
            prop::collection::vec(arb_row(false), 0..25),
            prop::collection::vec(arb_row(true), 0..25),
            prop::collection::vec(arb_row(true), 0..25),
        )
            .prop_map(|(p, c, o)| {
                let strip = |rows: Vec<Vec<String>>| -> Vec<Vec<String>> {
                    rows.into_iter().map(|r| r[1..].to_vec()).collect()
                };
                let headers = |h: &[&str]| h.iter().map(|s| s.to_string()).collect::<Vec<_>>();
                SourceSheets::new(
                    RawTable::new(headers(PREMIUM_HEADERS), p),
                    RawTable::new(headers(CLAIM_HEADERS), strip(c)),
                    RawTable::new(headers(OUTSTANDING_HEADERS), strip(o)),
                )
            })
    }

    fn arb_selection() -> impl Strategy<Value = FilterSelection> {
        (
            prop::sample::subsequence(vec!["FIRE", "PAR", "EQ"], 0..=3),
            prop::sample::subsequence(vec!["Office", "Factory"], 0..=2),
            prop::sample::subsequence(vec!["A", "B", "C", "D"], 0..=4),
            any::<bool>(),
            prop::option::of(0usize..3),
            prop::option::of(0usize..3),
        )
            .prop_map(|(tocs, occs, risks, expiry, start, end)| {
                let pick = |i: Option<usize>| i.and_then(|i| crate::ledger::merge::parse_date(DATES[i], &DashboardConfig::default().date_formats));
                let field = if expiry { DateField::Expiry } else { DateField::Inception };
                FilterSelection::all()
                    .with_tocs(tocs)
                    .with_occupation_categories(occs)
                    .with_risk_categories(risks)
                    .with_date_range(field, DateRange { start: pick(start), end: pick(end) })
            })
    }

    fn keys(records: &[CanonicalRecord]) -> HashSet<RecordKey> {
        records.iter().map(CanonicalRecord::key).collect()
    }

    proptest! {
        #[test]
        fn prop_merged_rows_never_exceed_input(sheets in arb_sheets()) {
            let ledger = DashboardRunner::new().build_ledger(&sheets).unwrap();
            let input: usize = Source::ALL.iter().map(|s| sheets.get(*s).unwrap().len()).sum();

            prop_assert!(ledger.len() <= input);
            prop_assert_eq!(ledger.summary().input_rows(), input);
            prop_assert_eq!(keys(ledger.records()).len(), ledger.len());
        }

        #[test]
        fn prop_deduplication_is_idempotent(sheets in arb_sheets()) {
            let config = DashboardConfig::default();
            let ledger = DashboardRunner::new().build_ledger(&sheets).unwrap();
            let again = merge_tables(&ledger.to_normalized_tables(), &config);

            prop_assert_eq!(again.records(), ledger.records());
        }

        #[test]
        fn prop_filtered_is_subset(sheets in arb_sheets(), selection in arb_selection()) {
            let runner = DashboardRunner::new();
            let ledger = runner.build_ledger(&sheets).unwrap();
            let report = runner.report(&ledger, &selection);

            let all = keys(ledger.records());
            prop_assert!(report.records.iter().all(|r| all.contains(&r.key())));
            prop_assert!(report.filtered_rows() <= ledger.len());
        }

        #[test]
        fn prop_grand_total_is_sum_of_rows(sheets in arb_sheets()) {
            let ledger = DashboardRunner::new().build_ledger(&sheets).unwrap();
            for dimension in [KeyColumn::UnderwritingYear, KeyColumn::Toc, KeyColumn::RiskCategory] {
                let summary = grouped_sum(ledger.records(), dimension, &CategoryOrder::Ascending);
                for measure in Measure::ALL {
                    let sum: f64 = summary.rows.iter().map(|r| r.totals.get(measure)).sum();
                    prop_assert!((summary.grand_total.get(measure) - sum).abs() <= 1e-6 * sum.abs().max(1.0));
                }
            }
        }

        #[test]
        fn prop_loss_ratio_is_scale_invariant(sheets in arb_sheets(), k in 1u32..1000) {
            let ledger = DashboardRunner::new().build_ledger(&sheets).unwrap();
            let scaled: Vec<CanonicalRecord> = ledger
                .records()
                .iter()
                .cloned()
                .map(|mut r| {
                    for measure in Measure::ALL {
                        r.set_measure(measure, r.measure(measure).map(|v| v * k as f64));
                    }
                    r
                })
                .collect();

            match (loss_ratio(ledger.records()), loss_ratio(&scaled)) {
                (LossRatio::Defined(a), LossRatio::Defined(b)) => {
                    prop_assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
                }
                (LossRatio::Undefined, LossRatio::Undefined) => {}
                (a, b) => prop_assert!(false, "scaling changed definedness: {:?} vs {:?}", a, b),
            }
        }

        #[test]
        fn prop_incurred_average_needs_claim_numbers(sheets in arb_sheets()) {
            let runner = DashboardRunner::new();
            let ledger = runner.build_ledger(&sheets).unwrap();
            let report = runner.report(&ledger, &FilterSelection::all());

            prop_assert_eq!(report.incurred_average.is_none(), report.claim_frequency == 0);
        }
    }
}
