//! Canonical ledger record and the column vocabulary shared by every source sheet

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used whenever a date is written back out as text
pub const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Which uploaded sheet a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    Premium,
    Claim,
    OutstandingClaim,
}

impl Source {
    /// Merge order: premium rows first, then claims, then outstanding claims
    pub const ALL: [Source; 3] = [Source::Premium, Source::Claim, Source::OutstandingClaim];

    /// Label written into the source column of the merged ledger
    pub fn label(&self) -> &'static str {
        match self {
            Source::Premium => "Premi",
            Source::Claim => "Klaim",
            Source::OutstandingClaim => "OS Klaim",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity columns of the ledger; together they form the deduplication key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyColumn {
    AccidentYear,
    UnderwritingYear,
    Toc,
    OccupationCategory,
    RiskCategory,
    InsuredName,
    PolicyNumber,
    CertificateNumber,
    ClaimNumber,
    InceptionDate,
    ExpiryDate,
    Source,
}

impl KeyColumn {
    pub const ALL: [KeyColumn; 12] = [
        KeyColumn::AccidentYear,
        KeyColumn::UnderwritingYear,
        KeyColumn::Toc,
        KeyColumn::OccupationCategory,
        KeyColumn::RiskCategory,
        KeyColumn::InsuredName,
        KeyColumn::PolicyNumber,
        KeyColumn::CertificateNumber,
        KeyColumn::ClaimNumber,
        KeyColumn::InceptionDate,
        KeyColumn::ExpiryDate,
        KeyColumn::Source,
    ];

    /// Header as it appears in the uploaded sheets
    pub fn source_header(&self) -> &'static str {
        match self {
            KeyColumn::AccidentYear => "AY",
            KeyColumn::UnderwritingYear => "UY",
            KeyColumn::Toc => "TOC_MOD",
            KeyColumn::OccupationCategory => "Kategori Okupasi",
            KeyColumn::RiskCategory => "Kategori Risiko Okupasi",
            KeyColumn::InsuredName => "INSURED NAME",
            KeyColumn::PolicyNumber => "NO POLIS",
            KeyColumn::CertificateNumber => "NO SERTIFIKAT",
            KeyColumn::ClaimNumber => "NO KLAIM",
            KeyColumn::InceptionDate => "INCEPTION DATE",
            KeyColumn::ExpiryDate => "EXPIRY DATE",
            KeyColumn::Source => "Sumber Data",
        }
    }

    /// Header used once the ledger is merged (the treaty class is published as `TOC`)
    pub fn public_header(&self) -> &'static str {
        match self {
            KeyColumn::Toc => "TOC",
            other => other.source_header(),
        }
    }

    /// Source column is filled from the upload slot, never read from the sheet
    pub fn is_read_from_sheet(&self) -> bool {
        !matches!(self, KeyColumn::Source)
    }
}

/// Numeric columns summed by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    PremiumGross,
    AcquisitionCost,
    ReinsurancePremium,
    ReinsuranceCommission,
    PaidClaim,
    ReinsuranceClaimRecovery,
    OutstandingClaim,
    ReinsuranceOutstandingRecovery,
}

impl Measure {
    pub const ALL: [Measure; 8] = [
        Measure::PremiumGross,
        Measure::AcquisitionCost,
        Measure::ReinsurancePremium,
        Measure::ReinsuranceCommission,
        Measure::PaidClaim,
        Measure::ReinsuranceClaimRecovery,
        Measure::OutstandingClaim,
        Measure::ReinsuranceOutstandingRecovery,
    ];

    /// Canonical header after normalization
    pub fn header(&self) -> &'static str {
        match self {
            Measure::PremiumGross => "Premi Gross",
            Measure::AcquisitionCost => "Akuisisi",
            Measure::ReinsurancePremium => "Premi Reas",
            Measure::ReinsuranceCommission => "Komisi Reas",
            Measure::PaidClaim => "Paid Claim",
            Measure::ReinsuranceClaimRecovery => "Recovery Klaim Reas",
            Measure::OutstandingClaim => "OS Claim",
            Measure::ReinsuranceOutstandingRecovery => "Recovery OS Claim Reas",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One row of the merged ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Accident year (AY)
    pub accident_year: Option<String>,

    /// Underwriting year (UY)
    pub underwriting_year: Option<String>,

    /// Treaty / class-of-business code
    pub toc: Option<String>,

    pub occupation_category: Option<String>,

    /// Occupancy risk level, typically a single letter A-D
    pub occupation_risk_category: Option<String>,

    pub insured_name: Option<String>,
    pub policy_number: Option<String>,
    pub certificate_number: Option<String>,
    pub claim_number: Option<String>,

    pub inception_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,

    pub source: Source,

    /// Measures in `Measure::ALL` order; `None` is an absent cell.
    /// Serialized as an object keyed by `Measure::header()`.
    #[serde(with = "measure_fields")]
    pub measures: [Option<f64>; 8],
}

impl CanonicalRecord {
    /// Record with only the source set
    pub fn empty(source: Source) -> Self {
        Self {
            accident_year: None,
            underwriting_year: None,
            toc: None,
            occupation_category: None,
            occupation_risk_category: None,
            insured_name: None,
            policy_number: None,
            certificate_number: None,
            claim_number: None,
            inception_date: None,
            expiry_date: None,
            source,
            measures: [None; 8],
        }
    }

    pub fn measure(&self, measure: Measure) -> Option<f64> {
        self.measures[measure.index()]
    }

    /// Measure with an absent cell read as zero
    pub fn amount(&self, measure: Measure) -> f64 {
        self.measure(measure).unwrap_or(0.0)
    }

    pub fn set_measure(&mut self, measure: Measure, value: Option<f64>) {
        self.measures[measure.index()] = value;
    }

    /// Text value of a non-date key column
    pub fn text(&self, column: KeyColumn) -> Option<&str> {
        match column {
            KeyColumn::AccidentYear => self.accident_year.as_deref(),
            KeyColumn::UnderwritingYear => self.underwriting_year.as_deref(),
            KeyColumn::Toc => self.toc.as_deref(),
            KeyColumn::OccupationCategory => self.occupation_category.as_deref(),
            KeyColumn::RiskCategory => self.occupation_risk_category.as_deref(),
            KeyColumn::InsuredName => self.insured_name.as_deref(),
            KeyColumn::PolicyNumber => self.policy_number.as_deref(),
            KeyColumn::CertificateNumber => self.certificate_number.as_deref(),
            KeyColumn::ClaimNumber => self.claim_number.as_deref(),
            KeyColumn::Source => Some(self.source.label()),
            KeyColumn::InceptionDate | KeyColumn::ExpiryDate => None,
        }
    }

    pub fn set_text(&mut self, column: KeyColumn, value: Option<String>) {
        match column {
            KeyColumn::AccidentYear => self.accident_year = value,
            KeyColumn::UnderwritingYear => self.underwriting_year = value,
            KeyColumn::Toc => self.toc = value,
            KeyColumn::OccupationCategory => self.occupation_category = value,
            KeyColumn::RiskCategory => self.occupation_risk_category = value,
            KeyColumn::InsuredName => self.insured_name = value,
            KeyColumn::PolicyNumber => self.policy_number = value,
            KeyColumn::CertificateNumber => self.certificate_number = value,
            KeyColumn::ClaimNumber => self.claim_number = value,
            // Dates are parsed separately and the source comes from the upload slot
            KeyColumn::InceptionDate | KeyColumn::ExpiryDate | KeyColumn::Source => {}
        }
    }

    pub fn date(&self, field: DateField) -> Option<NaiveDate> {
        match field {
            DateField::Inception => self.inception_date,
            DateField::Expiry => self.expiry_date,
        }
    }

    /// Full identity tuple used for deduplication
    pub fn key(&self) -> RecordKey {
        RecordKey {
            accident_year: self.accident_year.clone(),
            underwriting_year: self.underwriting_year.clone(),
            toc: self.toc.clone(),
            occupation_category: self.occupation_category.clone(),
            occupation_risk_category: self.occupation_risk_category.clone(),
            insured_name: self.insured_name.clone(),
            policy_number: self.policy_number.clone(),
            certificate_number: self.certificate_number.clone(),
            claim_number: self.claim_number.clone(),
            inception_date: self.inception_date,
            expiry_date: self.expiry_date,
            source: self.source,
        }
    }

    /// Cells in `KeyColumn::ALL` then `Measure::ALL` order; missing values are empty
    pub fn to_cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(KeyColumn::ALL.len() + Measure::ALL.len());
        for column in KeyColumn::ALL {
            let cell = match column {
                KeyColumn::InceptionDate => format_date(self.inception_date),
                KeyColumn::ExpiryDate => format_date(self.expiry_date),
                other => self.text(other).unwrap_or_default().to_string(),
            };
            cells.push(cell);
        }
        for value in self.measures {
            cells.push(value.map(|v| v.to_string()).unwrap_or_default());
        }
        cells
    }
}

/// Serde adapter writing the measure array as named fields
mod measure_fields {
    use super::Measure;
    use serde::de::Error;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(measures: &[Option<f64>; 8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Measure::ALL.len()))?;
        for measure in Measure::ALL {
            map.serialize_entry(measure.header(), &measures[measure.index()])?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[Option<f64>; 8], D::Error> {
        let fields: HashMap<String, Option<f64>> = HashMap::deserialize(deserializer)?;
        let mut measures = [None; 8];
        for (name, value) in fields {
            let measure = Measure::ALL
                .into_iter()
                .find(|m| m.header() == name)
                .ok_or_else(|| D::Error::custom(format!("unknown measure '{}'", name)))?;
            measures[measure.index()] = value;
        }
        Ok(measures)
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(OUTPUT_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Headers matching `CanonicalRecord::to_cells`, using the merged ledger's public names
pub fn public_headers() -> Vec<&'static str> {
    KeyColumn::ALL
        .iter()
        .map(|c| c.public_header())
        .chain(Measure::ALL.iter().map(|m| m.header()))
        .collect()
}

/// Headers matching `CanonicalRecord::to_cells`, using the upload sheets' names
pub fn source_headers() -> Vec<&'static str> {
    KeyColumn::ALL
        .iter()
        .map(|c| c.source_header())
        .chain(Measure::ALL.iter().map(|m| m.header()))
        .collect()
}

/// Identity of a ledger row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub accident_year: Option<String>,
    pub underwriting_year: Option<String>,
    pub toc: Option<String>,
    pub occupation_category: Option<String>,
    pub occupation_risk_category: Option<String>,
    pub insured_name: Option<String>,
    pub policy_number: Option<String>,
    pub certificate_number: Option<String>,
    pub claim_number: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub source: Source,
}

/// Which date column the date-range filter looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateField {
    #[default]
    Inception,
    Expiry,
}
