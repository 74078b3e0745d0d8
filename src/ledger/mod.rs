//! Source sheet loading, column normalization and ledger merging

mod data;
pub mod loader;
pub mod normalize;
pub mod merge;

pub use data::{
    public_headers, source_headers, CanonicalRecord, DateField, KeyColumn, Measure, RecordKey,
    Source, OUTPUT_DATE_FORMAT,
};
pub use loader::{load_sheet, load_sheet_from_reader, RawTable};
pub use normalize::{normalize, NormalizedTable, SourceMapping};
pub use merge::{merge, merge_tables, IngestSummary, MergedLedger, SchemaWarning};
