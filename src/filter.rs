use chrono::NaiveDate;

use crate::models::EnrichedObservation;

/// The contiguous run of rows with `start <= date <= end`.
///
/// An inverted or empty range yields an empty slice.
pub fn slice(
    series: &[EnrichedObservation],
    start: NaiveDate,
    end: NaiveDate,
) -> &[EnrichedObservation] {
    if start > end {
        return &[];
    }
    let lower = series.partition_point(|observation| observation.date < start);
    let upper = series.partition_point(|observation| observation.date <= end);
    &series[lower..upper]
}
