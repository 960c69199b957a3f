use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::EnrichedObservation;

#[derive(Serialize)]
struct ExportRow {
    date: NaiveDate,
    balance: f64,
    monthly_active_count: u64,
    daily_active_count: u64,
    balance_delta_1d: Option<f64>,
    balance_pct_change_1d: Option<f64>,
    balance_per_mau: Option<f64>,
    dau_mau_ratio_pct: Option<f64>,
}

impl From<&EnrichedObservation> for ExportRow {
    fn from(observation: &EnrichedObservation) -> Self {
        Self {
            date: observation.date,
            balance: observation.balance,
            monthly_active_count: observation.monthly_active_count,
            daily_active_count: observation.daily_active_count,
            balance_delta_1d: observation.balance_delta_1d,
            balance_pct_change_1d: observation.balance_pct_change_1d,
            balance_per_mau: observation.balance_per_mau,
            dau_mau_ratio_pct: observation.dau_mau_ratio_pct,
        }
    }
}

const HEADER: [&str; 8] = [
    "date",
    "balance",
    "monthly_active_count",
    "daily_active_count",
    "balance_delta_1d",
    "balance_pct_change_1d",
    "balance_per_mau",
    "dau_mau_ratio_pct",
];

/// Writes rows as CSV; undefined values become empty cells.
///
/// The header is written even when `rows` is empty.
pub fn write_csv<W: Write>(rows: &[EnrichedObservation], writer: W) -> anyhow::Result<usize> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(HEADER)?;
    for row in rows {
        csv_writer.serialize(ExportRow::from(row))?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}

pub fn default_file_name(start: NaiveDate, end: NaiveDate) -> String {
    format!("datos_rem_{start}_{end}.csv")
}
