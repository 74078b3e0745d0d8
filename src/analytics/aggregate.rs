//! Aggregate queries over a filtered ledger
//!
//! Every function here is read-only: it takes the filtered records and
//! returns a fresh result. Absent measure cells count as zero.

use crate::ledger::{CanonicalRecord, KeyColumn, Measure};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sum of each measure over a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeasureTotals {
    pub premium_gross: f64,
    pub acquisition_cost: f64,
    pub reinsurance_premium: f64,
    pub reinsurance_commission: f64,
    pub paid_claim: f64,
    pub reinsurance_claim_recovery: f64,
    pub outstanding_claim: f64,
    pub reinsurance_outstanding_recovery: f64,
}

impl MeasureTotals {
    /// Column-wise sum over records
    pub fn of<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        let mut totals = Self::default();
        for record in records {
            totals.add_record(record);
        }
        totals
    }

    pub fn get(&self, measure: Measure) -> f64 {
        match measure {
            Measure::PremiumGross => self.premium_gross,
            Measure::AcquisitionCost => self.acquisition_cost,
            Measure::ReinsurancePremium => self.reinsurance_premium,
            Measure::ReinsuranceCommission => self.reinsurance_commission,
            Measure::PaidClaim => self.paid_claim,
            Measure::ReinsuranceClaimRecovery => self.reinsurance_claim_recovery,
            Measure::OutstandingClaim => self.outstanding_claim,
            Measure::ReinsuranceOutstandingRecovery => self.reinsurance_outstanding_recovery,
        }
    }

    fn get_mut(&mut self, measure: Measure) -> &mut f64 {
        match measure {
            Measure::PremiumGross => &mut self.premium_gross,
            Measure::AcquisitionCost => &mut self.acquisition_cost,
            Measure::ReinsurancePremium => &mut self.reinsurance_premium,
            Measure::ReinsuranceCommission => &mut self.reinsurance_commission,
            Measure::PaidClaim => &mut self.paid_claim,
            Measure::ReinsuranceClaimRecovery => &mut self.reinsurance_claim_recovery,
            Measure::OutstandingClaim => &mut self.outstanding_claim,
            Measure::ReinsuranceOutstandingRecovery => &mut self.reinsurance_outstanding_recovery,
        }
    }

    pub fn add_record(&mut self, record: &CanonicalRecord) {
        for measure in Measure::ALL {
            *self.get_mut(measure) += record.amount(measure);
        }
    }

    pub fn add(&mut self, other: &MeasureTotals) {
        for measure in Measure::ALL {
            *self.get_mut(measure) += other.get(measure);
        }
    }

    /// (paid + outstanding) - (claim recovery + outstanding recovery)
    pub fn net_incurred(&self) -> f64 {
        (self.paid_claim + self.outstanding_claim)
            - (self.reinsurance_claim_recovery + self.reinsurance_outstanding_recovery)
    }

    /// gross premium - acquisition - reinsurance premium + reinsurance commission
    pub fn net_premium(&self) -> f64 {
        self.premium_gross - self.acquisition_cost - self.reinsurance_premium
            + self.reinsurance_commission
    }
}

/// Row order of a grouped table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOrder {
    /// Ascending by key text
    Ascending,
    /// Listed keys first in the given order, then any others ascending
    Explicit(Vec<String>),
}

/// One group of a grouped-sum table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub key: String,
    pub totals: MeasureTotals,
}

/// Grouped sums for one dimension, with a Grand Total row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedSummary {
    pub dimension: KeyColumn,
    pub rows: Vec<GroupRow>,
    /// Column-wise sum of `rows`
    pub grand_total: MeasureTotals,
}

/// A (group, measure, value) triple for grouped bar charts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongFormPoint {
    pub key: String,
    pub measure: Measure,
    pub value: f64,
}

/// One slice of a single-measure breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySlice {
    pub key: String,
    pub value: f64,
}

/// A single measure broken down by one dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub dimension: KeyColumn,
    pub measure: Measure,
    pub slices: Vec<CategorySlice>,
}

impl GroupedSummary {
    pub fn row(&self, key: &str) -> Option<&GroupRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.key.as_str()).collect()
    }

    /// Melt into one point per group and measure; the Grand Total is left out
    pub fn long_form(&self) -> Vec<LongFormPoint> {
        self.rows
            .iter()
            .flat_map(|row| {
                Measure::ALL.into_iter().map(move |measure| LongFormPoint {
                    key: row.key.clone(),
                    measure,
                    value: row.totals.get(measure),
                })
            })
            .collect()
    }

    /// Keep one measure, preserving row order
    pub fn breakdown(&self, measure: Measure) -> CategoryBreakdown {
        CategoryBreakdown {
            dimension: self.dimension,
            measure,
            slices: self
                .rows
                .iter()
                .map(|row| CategorySlice { key: row.key.clone(), value: row.totals.get(measure) })
                .collect(),
        }
    }
}

/// Sum every measure per distinct value of `dimension`
///
/// Records with a missing key form no group, so they are also left out of the
/// Grand Total.
pub fn grouped_sum(
    records: &[CanonicalRecord],
    dimension: KeyColumn,
    order: &CategoryOrder,
) -> GroupedSummary {
    let mut groups: BTreeMap<&str, MeasureTotals> = BTreeMap::new();
    for record in records {
        if let Some(key) = record.text(dimension) {
            groups.entry(key).or_default().add_record(record);
        }
    }

    let mut rows: Vec<GroupRow> = groups
        .into_iter()
        .map(|(key, totals)| GroupRow { key: key.to_string(), totals })
        .collect();

    if let CategoryOrder::Explicit(sequence) = order {
        let rank = |key: &str| sequence.iter().position(|s| s == key).unwrap_or(sequence.len());
        // Stable: keys outside the sequence keep their ascending order
        rows.sort_by_key(|row| rank(&row.key));
    }

    let mut grand_total = MeasureTotals::default();
    for row in &rows {
        grand_total.add(&row.totals);
    }

    GroupedSummary { dimension, rows, grand_total }
}

/// A named party and the amount attributed to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityEntry {
    pub name: String,
    pub amount: f64,
}

/// The `top_n` insured names by summed `measure`, returned smallest first
///
/// Parties are ranked by amount descending with ties broken by name
/// ascending; the returned list is that ranking reversed.
pub fn severity_ranking(records: &[CanonicalRecord], measure: Measure, top_n: usize) -> Vec<SeverityEntry> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        if let Some(name) = record.insured_name.as_deref() {
            *totals.entry(name).or_insert(0.0) += record.amount(measure);
        }
    }

    let mut ranked: Vec<SeverityEntry> = totals
        .into_iter()
        .map(|(name, amount)| SeverityEntry { name: name.to_string(), amount })
        .collect();
    ranked.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    ranked.truncate(top_n);
    ranked.reverse();
    ranked
}

/// Number of records carrying a claim number
pub fn claim_frequency(records: &[CanonicalRecord]) -> usize {
    records.iter().filter(|r| r.claim_number.is_some()).count()
}

/// Paid + outstanding - claim recovery for one record
pub fn incurred(record: &CanonicalRecord) -> f64 {
    record.amount(Measure::PaidClaim) + record.amount(Measure::OutstandingClaim)
        - record.amount(Measure::ReinsuranceClaimRecovery)
}

/// Mean incurred over records with a claim number; `None` when there are none
pub fn incurred_average(records: &[CanonicalRecord]) -> Option<f64> {
    let (sum, count) = records
        .iter()
        .filter(|r| r.claim_number.is_some())
        .fold((0.0, 0usize), |(sum, count), r| (sum + incurred(r), count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Net loss ratio, or `Undefined` when net premium is exactly zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum LossRatio {
    Defined(f64),
    Undefined,
}

impl LossRatio {
    pub fn from_totals(totals: &MeasureTotals) -> Self {
        let denominator = totals.net_premium();
        if denominator == 0.0 {
            LossRatio::Undefined
        } else {
            LossRatio::Defined(totals.net_incurred() / denominator)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            LossRatio::Defined(v) => Some(*v),
            LossRatio::Undefined => None,
        }
    }
}

/// Loss ratio over the summed measures of `records`
pub fn loss_ratio(records: &[CanonicalRecord]) -> LossRatio {
    LossRatio::from_totals(&MeasureTotals::of(records))
}
