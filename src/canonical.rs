use chrono::NaiveDate;

use crate::error::AnalysisError;
use crate::models::{DailyObservation, RawRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validates raw rows and returns them as observations sorted by date.
///
/// Rows may arrive in any order but must already be unique per date; a repeated
/// date is reported as an integrity violation instead of being merged.
pub fn canonicalize(records: &[RawRecord]) -> Result<Vec<DailyObservation>, AnalysisError> {
    let mut observations = Vec::with_capacity(records.len());

    for (row, record) in records.iter().enumerate() {
        observations.push(validate(row, record)?);
    }

    observations.sort_by_key(|observation| observation.date);
    ensure_strictly_increasing(&observations)?;

    tracing::debug!(count = observations.len(), "canonicalized daily observations");
    Ok(observations)
}

/// Checks the ordering contract of a series that skipped `canonicalize`.
pub fn ensure_strictly_increasing(observations: &[DailyObservation]) -> Result<(), AnalysisError> {
    for pair in observations.windows(2) {
        if pair[1].date == pair[0].date {
            return Err(AnalysisError::Integrity {
                date: pair[1].date,
                reason: "duplicate date".to_string(),
            });
        }
        if pair[1].date < pair[0].date {
            return Err(AnalysisError::Integrity {
                date: pair[1].date,
                reason: format!("out of order after {}", pair[0].date),
            });
        }
    }
    Ok(())
}

/// Parses a raw date cell the way every stage of the pipeline reads it.
pub fn parse_date(raw: &str) -> chrono::ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
}

fn validate(row: usize, record: &RawRecord) -> Result<DailyObservation, AnalysisError> {
    let invalid = |reason: String| AnalysisError::Validation { row, reason };

    let date = parse_date(&record.date)
        .map_err(|err| invalid(format!("malformed date {:?}: {err}", record.date)))?;

    if !record.balance.is_finite() {
        return Err(invalid(format!("balance on {date} is not a finite number")));
    }
    if record.balance < 0.0 {
        return Err(invalid(format!("negative balance {} on {date}", record.balance)));
    }

    let monthly_active_count = u64::try_from(record.monthly_active_count)
        .map_err(|_| invalid(format!("negative monthly active count on {date}")))?;
    let daily_active_count = u64::try_from(record.daily_active_count)
        .map_err(|_| invalid(format!("negative daily active count on {date}")))?;

    Ok(DailyObservation {
        date,
        balance: record.balance,
        monthly_active_count,
        daily_active_count,
    })
}
