//! Loss Ratio Dashboard CLI
//!
//! Loads the premium, claim and outstanding-claim sheets, applies the filter
//! flags and prints the dashboard tables. `--json` writes the full report.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use loss_ratio_dashboard::analytics::{CategoryBreakdown, GroupedSummary, SeverityEntry};
use loss_ratio_dashboard::{
    DashboardConfig, DashboardReport, DashboardRunner, DateField, DateRange, FilterSelection,
    LossRatio, Measure, PipelineOutcome, SourceSheets,
};
use std::fs::File;
use std::io::BufWriter;
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

#[derive(Debug, Parser)]
#[command(version, about = "Loss ratio analysis by occupation category")]
struct Args {
    /// Premium sheet (CSV export)
    #[arg(long)]
    premium: Option<PathBuf>,

    /// Claim sheet (CSV export)
    #[arg(long)]
    claim: Option<PathBuf>,

    /// Outstanding-claim sheet (CSV export)
    #[arg(long)]
    outstanding: Option<PathBuf>,

    /// JSON config overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep only these TOC codes (comma separated)
    #[arg(long, value_delimiter = ',')]
    toc: Vec<String>,

    /// Keep only these occupation categories (comma separated)
    #[arg(long, value_delimiter = ',')]
    occupation: Vec<String>,

    /// Keep only these occupancy risk categories (comma separated)
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

    /// Write the full report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Args {
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
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    let runner = DashboardRunner::with_config(config);

    let sheets = SourceSheets::from_paths(
        args.premium.as_deref(),
        args.claim.as_deref(),
        args.outstanding.as_deref(),
    )
    .context("Failed to load source sheets")?;

    let report = match runner.run(&sheets, &args.selection()) {
        PipelineOutcome::Ready(report) => report,
        PipelineOutcome::Idle { missing } => {
            let names: Vec<&str> = missing.iter().map(|s| s.label()).collect();
            println!("Waiting for uploads: {}", names.join(", "));
            return Ok(());
        }
    };

    print_report(&report);

    if let Some(path) = &args.json {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &*report)?;
        println!("\nFull report written to: {}", path.display());
    }

    Ok(())
}

fn print_report(report: &DashboardReport) {
    println!("Loss Ratio Dashboard");
    println!("====================\n");

    let ingest = &report.ingest;
    println!("Premium rows:      {:>10}", format_thousands(ingest.premium_rows as f64, 0));
    println!("Claim rows:        {:>10}", format_thousands(ingest.claim_rows as f64, 0));
    println!("OS claim rows:     {:>10}", format_thousands(ingest.outstanding_rows as f64, 0));
    println!("Merged (deduped):  {:>10}", format_thousands(ingest.merged_rows as f64, 0));
    println!("Shown after filter:{:>10}", format_thousands(report.filtered_rows() as f64, 0));
    if ingest.date_text_collapses > 0 {
        println!(
            "Duplicates that differed only in date text: {} of {}",
            ingest.date_text_collapses, ingest.duplicates_removed
        );
    }
    if ingest.parse_failures > 0 {
        println!("Unparseable cells read as empty: {}", ingest.parse_failures);
    }
    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    println!("\nSummary by Underwriting Year (UY)");
    print_grouped(&report.underwriting_year);

    println!("\nTop premium sources");
    print_severity(&report.premium_severity);
    println!("\nTop claimants");
    print_severity(&report.claim_severity);

    println!("\nClaim frequency:          {}", report.claim_frequency);
    println!("Average claim incurred:   {}", format_incurred(report.incurred_average));
    println!("Loss ratio:               {}", format_loss_ratio(report.loss_ratio));

    println!("\nSummary by premium");
    for breakdown in [
        &report.premium_breakdowns.toc,
        &report.premium_breakdowns.occupation,
        &report.premium_breakdowns.risk,
    ] {
        print_breakdown(breakdown);
    }
    println!("\nSummary by claim");
    for breakdown in [
        &report.claim_breakdowns.toc,
        &report.claim_breakdowns.occupation,
        &report.claim_breakdowns.risk,
    ] {
        print_breakdown(breakdown);
    }
}

fn print_grouped(summary: &GroupedSummary) {
    let header: Vec<String> = Measure::ALL.iter().map(|m| format!("{:>24}", m.header())).collect();
    println!("{:<12}{}", summary.dimension.public_header(), header.join(""));

    let line = |key: &str, values: Vec<String>| println!("{:<12}{}", key, values.join(""));
    for row in &summary.rows {
        line(&row.key, Measure::ALL.iter().map(|m| format!("{:>24}", format_thousands(row.totals.get(*m), 2))).collect());
    }
    line(
        "Grand Total",
        Measure::ALL.iter().map(|m| format!("{:>24}", format_thousands(summary.grand_total.get(*m), 2))).collect(),
    );
}

fn print_severity(entries: &[SeverityEntry]) {
    if entries.is_empty() {
        println!("  no data");
    }
    // Largest first on the console; the report keeps them smallest first for bar charts
    for entry in entries.iter().rev() {
        println!("  {:<40} {:>10}", entry.name, simplify_number(entry.amount));
    }
}

fn print_breakdown(breakdown: &CategoryBreakdown) {
    let total: f64 = breakdown.slices.iter().map(|s| s.value).sum();
    println!("  {}", breakdown.dimension.public_header());
    for slice in &breakdown.slices {
        let share = if total != 0.0 { slice.value / total * 100.0 } else { 0.0 };
        println!("    {:<30} {:>24} {:>7.1}%", slice.key, format_thousands(slice.value, 2), share);
    }
}

fn format_incurred(value: Option<f64>) -> String {
    match value {
        // Dot thousands separators, as the underwriting team reads them
        Some(v) => format_thousands(v, 0).replace(',', "."),
        None => "no data".to_string(),
    }
}

fn format_loss_ratio(ratio: LossRatio) -> String {
    match ratio {
        LossRatio::Defined(v) => format!("{:.2}%", v * 100.0),
        LossRatio::Undefined => "undefined (net premium is zero)".to_string(),
    }
}

/// Comma thousands separators with a fixed number of decimals
fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Compact T/B/M notation for chart labels
fn simplify_number(value: f64) -> String {
    if value >= 1e12 {
        format!("{:.1} T", value / 1e12)
    } else if value >= 1e9 {
        format!("{:.1} B", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.1} M", value / 1e6)
    } else {
        format_thousands(value, 0)
    }
}
