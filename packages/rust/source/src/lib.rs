//! Bulk record source: reads contact rows from CSV.
//!
//! The header row must name every column in [`REQUIRED_HEADERS`]. Any
//! malformed input is fatal to the run and reported with its line number.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use leadflow_shared::{InputRecord, LeadflowError, Result};

/// Column names the source must provide, in canonical order.
pub const REQUIRED_HEADERS: [&str; 6] =
    ["First Name", "Last Name", "Job Title", "Company", "Email", "Phone"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "Job Title")]
    job_title: String,
    #[serde(rename = "Company")]
    company: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Phone")]
    phone: String,
}

impl From<CsvRow> for InputRecord {
    fn from(row: CsvRow) -> Self {
        Self {
            first_name: row.first_name,
            last_name: row.last_name,
            job_title: row.job_title,
            company: row.company,
            email: row.email,
            phone: row.phone,
        }
    }
}

/// Read every record from the CSV file at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_records(path: &Path) -> Result<Vec<InputRecord>> {
    let file = std::fs::File::open(path).map_err(|e| LeadflowError::io(path, e))?;
    let records = read_records_from(file)?;
    info!(count = records.len(), "records loaded");
    Ok(records)
}

/// Read every record from any CSV reader.
pub fn read_records_from<R: Read>(reader: R) -> Result<Vec<InputRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| LeadflowError::source(format!("unreadable header row: {e}")))?
        .clone();

    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !headers.iter().any(|found| found == *h))
        .collect();
    if !missing.is_empty() {
        return Err(LeadflowError::source(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        let raw = result.map_err(|e| LeadflowError::source(format!("malformed row: {e}")))?;
        let line = raw.position().map(|p| p.line()).unwrap_or_default();

        let row: CsvRow = raw
            .deserialize(Some(&headers))
            .map_err(|e| LeadflowError::source(format!("line {line}: {e}")))?;

        if row.email.is_empty() {
            return Err(LeadflowError::source(format!("line {line}: Email is empty")));
        }

        records.push(InputRecord::from(row));
    }

    Ok(records)
}
