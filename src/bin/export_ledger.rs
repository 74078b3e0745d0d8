//! Export the merged ledger to CSV
//!
//! Writes one row per deduplicated record with the public column names and
//! `%Y-%m-%d` dates. Category and date flags narrow the export the same way
//! the dashboard filter panel does.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use loss_ratio_dashboard::ledger::public_headers;
use loss_ratio_dashboard::{
    DashboardConfig, DashboardRunner, DateField, DateRange, FilterSelection, SourceSheets,
};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateFieldArg {
    Inception,
    Expiry,
}

impl From<DateFieldArg> for DateField {
    fn from(arg: DateFieldArg) -> Self {
        match arg {
            DateFieldArg::Inception => DateField::Inception,
            DateFieldArg::Expiry => DateField::Expiry,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "export_ledger", version, about = "Write the merged, deduplicated ledger as CSV")]
struct Cli {
    /// Premium sheet (CSV export)
    #[arg(long)]
    premium: PathBuf,

    /// Claim sheet (CSV export)
    #[arg(long)]
    claim: PathBuf,

    /// Outstanding-claim sheet (CSV export)
    #[arg(long)]
    outstanding: PathBuf,

    /// Output CSV path
    #[arg(long, short)]
    output: PathBuf,

    /// Optional JSON config
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_delimiter = ',')]
    toc: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    occupation: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    risk: Vec<String>,

    /// Date column the date range applies to
    #[arg(long, value_enum, default_value_t = DateFieldArg::Inception)]
    date_field: DateFieldArg,

    /// Range start (YYYY-MM-DD, inclusive); ignored without --to
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Range end (YYYY-MM-DD, inclusive); ignored without --from
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl Cli {
    fn selection(&self) -> FilterSelection {
        FilterSelection::all()
            .with_tocs(self.toc.iter().cloned())
            .with_occupation_categories(self.occupation.iter().cloned())
            .with_risk_categories(self.risk.iter().cloned())
            .with_date_range(self.date_field.into(), DateRange { start: self.from, end: self.to })
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    let runner = DashboardRunner::with_config(config);

    let sheets = SourceSheets::from_paths(Some(&args.premium), Some(&args.claim), Some(&args.outstanding))
        .context("Failed to load source sheets")?;
    let Some(ledger) = runner.build_ledger(&sheets) else {
        bail!("All three sheets are required");
    };

    let report = runner.report(&ledger, &args.selection());

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    writer.write_record(public_headers())?;
    for record in &report.records {
        writer.write_record(record.to_cells())?;
    }
    writer.flush()?;

    println!(
        "Wrote {} of {} ledger rows to {}",
        report.filtered_rows(),
        ledger.len(),
        args.output.display()
    );
    for warning in ledger.warnings() {
        eprintln!("WARNING: {}", warning);
    }

    Ok(())
}
