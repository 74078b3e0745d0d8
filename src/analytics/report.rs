//! Everything the presentation layer draws, computed in one pass

use super::aggregate::{
    claim_frequency, grouped_sum, incurred_average, severity_ranking, CategoryBreakdown,
    CategoryOrder, GroupedSummary, LossRatio, MeasureTotals, SeverityEntry,
};
use super::filter::{apply, FilterOptions, FilterSelection};
use crate::config::DashboardConfig;
use crate::ledger::{CanonicalRecord, IngestSummary, KeyColumn, Measure, MergedLedger, SchemaWarning};
use log::info;
use serde::Serialize;

/// One measure broken down by TOC, occupation category and risk category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdowns {
    pub toc: CategoryBreakdown,
    pub occupation: CategoryBreakdown,
    pub risk: CategoryBreakdown,
}

impl CategoryBreakdowns {
    fn compute(records: &[CanonicalRecord], measure: Measure, risk_order: &[String]) -> Self {
        let by = |dimension, order: &CategoryOrder| grouped_sum(records, dimension, order).breakdown(measure);
        Self {
            toc: by(KeyColumn::Toc, &CategoryOrder::Ascending),
            occupation: by(KeyColumn::OccupationCategory, &CategoryOrder::Ascending),
            risk: by(KeyColumn::RiskCategory, &CategoryOrder::Explicit(risk_order.to_vec())),
        }
    }
}

/// Aggregate results for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub ingest: IngestSummary,
    pub warnings: Vec<SchemaWarning>,
    pub filter_options: FilterOptions,
    pub selection: FilterSelection,

    /// Filtered ledger rows, in ledger order
    pub records: Vec<CanonicalRecord>,

    pub underwriting_year: GroupedSummary,
    pub totals: MeasureTotals,

    /// Top insured names by gross premium, smallest first
    pub premium_severity: Vec<SeverityEntry>,
    /// Top insured names by paid claim, smallest first
    pub claim_severity: Vec<SeverityEntry>,

    pub claim_frequency: usize,
    /// `None` when no filtered record carries a claim number
    pub incurred_average: Option<f64>,
    pub loss_ratio: LossRatio,

    pub premium_breakdowns: CategoryBreakdowns,
    pub claim_breakdowns: CategoryBreakdowns,
}

impl DashboardReport {
    pub fn build(ledger: &MergedLedger, selection: &FilterSelection, config: &DashboardConfig) -> Self {
        let records = apply(ledger.records(), selection);
        info!("Filtered ledger has {} of {} rows", records.len(), ledger.len());

        let totals = MeasureTotals::of(&records);

        Self {
            ingest: ledger.summary().clone(),
            warnings: ledger.warnings().to_vec(),
            filter_options: FilterOptions::from_ledger(ledger.records()),
            selection: selection.clone(),
            underwriting_year: grouped_sum(&records, KeyColumn::UnderwritingYear, &CategoryOrder::Ascending),
            totals,
            premium_severity: severity_ranking(&records, Measure::PremiumGross, config.severity_top_n),
            claim_severity: severity_ranking(&records, Measure::PaidClaim, config.severity_top_n),
            claim_frequency: claim_frequency(&records),
            incurred_average: incurred_average(&records),
            loss_ratio: LossRatio::from_totals(&totals),
            premium_breakdowns: CategoryBreakdowns::compute(&records, Measure::PremiumGross, &config.premium_risk_order),
            claim_breakdowns: CategoryBreakdowns::compute(&records, Measure::PaidClaim, &config.claim_risk_order),
            records,
        }
    }

    pub fn filtered_rows(&self) -> usize {
        self.records.len()
    }
}
