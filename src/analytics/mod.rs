//! Filtering and aggregation over the merged ledger

pub mod filter;
pub mod aggregate;
pub mod report;

pub use filter::{apply, DateRange, FilterOptions, FilterSelection};
pub use aggregate::{
    claim_frequency, grouped_sum, incurred, incurred_average, loss_ratio, severity_ranking,
    CategoryBreakdown, CategoryOrder, CategorySlice, GroupRow, GroupedSummary, LongFormPoint,
    LossRatio, MeasureTotals, SeverityEntry,
};
pub use report::{CategoryBreakdowns, DashboardReport};
