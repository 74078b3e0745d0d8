//! Filter selection applied to the merged ledger

use crate::ledger::{CanonicalRecord, DateField, KeyColumn};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive date range; only applied when both bounds are set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    /// Both bounds, or `None` when the range is unset
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start.zip(self.end)
    }
}

/// What the analyst picked in the filter panel
///
/// An empty category set means "all values"; filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub tocs: BTreeSet<String>,
    pub occupation_categories: BTreeSet<String>,
    pub risk_categories: BTreeSet<String>,
    pub date_field: DateField,
    pub date_range: DateRange,
}

impl FilterSelection {
    /// Selection that keeps every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_tocs<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tocs = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_occupation_categories<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.occupation_categories = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_risk_categories<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.risk_categories = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_range(mut self, field: DateField, range: DateRange) -> Self {
        self.date_field = field;
        self.date_range = range;
        self
    }

    /// Whether a record passes every active predicate
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        accepts(&self.tocs, record.toc.as_deref())
            && accepts(&self.occupation_categories, record.occupation_category.as_deref())
            && accepts(&self.risk_categories, record.occupation_risk_category.as_deref())
            && self.date_matches(record)
    }

    fn date_matches(&self, record: &CanonicalRecord) -> bool {
        match self.date_range.bounds() {
            Some((start, end)) => record
                .date(self.date_field)
                .is_some_and(|date| start <= date && date <= end),
            None => true,
        }
    }
}

/// Set membership; an empty set accepts everything, a missing value only then
fn accepts(selected: &BTreeSet<String>, value: Option<&str>) -> bool {
    selected.is_empty() || value.is_some_and(|v| selected.contains(v))
}

/// Records passing the selection, in ledger order
pub fn apply(records: &[CanonicalRecord], selection: &FilterSelection) -> Vec<CanonicalRecord> {
    records
        .iter()
        .filter(|record| selection.matches(record))
        .cloned()
        .collect()
}

/// Values available in the filter panel for a given ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub tocs: Vec<String>,
    pub occupation_categories: Vec<String>,
    pub risk_categories: Vec<String>,
    /// Earliest and latest inception date
    pub inception_bounds: Option<(NaiveDate, NaiveDate)>,
    /// Earliest and latest expiry date
    pub expiry_bounds: Option<(NaiveDate, NaiveDate)>,
}

impl FilterOptions {
    pub fn from_ledger(records: &[CanonicalRecord]) -> Self {
        Self {
            tocs: distinct(records, KeyColumn::Toc),
            occupation_categories: distinct(records, KeyColumn::OccupationCategory),
            risk_categories: distinct(records, KeyColumn::RiskCategory),
            inception_bounds: date_bounds(records, DateField::Inception),
            expiry_bounds: date_bounds(records, DateField::Expiry),
        }
    }

    pub fn date_bounds(&self, field: DateField) -> Option<(NaiveDate, NaiveDate)> {
        match field {
            DateField::Inception => self.inception_bounds,
            DateField::Expiry => self.expiry_bounds,
        }
    }
}

/// Sorted distinct non-missing values of a text column
fn distinct(records: &[CanonicalRecord], column: KeyColumn) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.text(column))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn date_bounds(records: &[CanonicalRecord], field: DateField) -> Option<(NaiveDate, NaiveDate)> {
    let dates = records.iter().filter_map(|r| r.date(field));
    let min = dates.clone().min()?;
    let max = dates.max()?;
    Some((min, max))
}
