//! Loss Ratio Dashboard - ledger merge and loss ratio analytics by occupation category
//!
//! This library provides:
//! - Loading premium, claim and outstanding-claim sheets
//! - Column normalization across the three sheet layouts
//! - A deduplicated canonical ledger
//! - Filtering by TOC, occupation, risk category and date range
//! - Grouped sums, severity rankings, claim statistics and the net loss ratio

pub mod config;
pub mod error;
pub mod ledger;
pub mod analytics;
pub mod pipeline;

// Re-export commonly used types
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use ledger::{CanonicalRecord, DateField, Measure, MergedLedger, RawTable, Source};
pub use analytics::{DashboardReport, DateRange, FilterSelection, LossRatio};
pub use pipeline::{DashboardRunner, PipelineOutcome, SourceSheets};
