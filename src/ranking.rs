use chrono::{Duration, NaiveDate};

use crate::models::{Direction, EnrichedObservation, MetricField, WindowEntry, WindowPosition};

/// Returns the `n` observations with the most extreme value of `field`.
///
/// Rows where `field` is undefined never rank. Ties go to the earlier date.
pub fn top_n_by(
    series: &[EnrichedObservation],
    field: MetricField,
    n: usize,
    direction: Direction,
) -> Vec<&EnrichedObservation> {
    let mut ranked: Vec<(f64, &EnrichedObservation)> = series
        .iter()
        .filter_map(|observation| observation.value(field).map(|value| (value, observation)))
        .collect();

    ranked.sort_by(|(a, left), (b, right)| {
        let by_value = match direction {
            Direction::Max => b.total_cmp(a),
            Direction::Min => a.total_cmp(b),
        };
        by_value.then(left.date.cmp(&right.date))
    });

    ranked.into_iter().take(n).map(|(_, observation)| observation).collect()
}

/// Rows within `radius_days` calendar days of `instant`, inclusive on both ends.
pub fn window_around(
    series: &[EnrichedObservation],
    instant: NaiveDate,
    radius_days: u32,
) -> Vec<WindowEntry<'_>> {
    let radius = Duration::days(i64::from(radius_days));
    let start = instant.checked_sub_signed(radius).unwrap_or(NaiveDate::MIN);
    let end = instant.checked_add_signed(radius).unwrap_or(NaiveDate::MAX);

    crate::filter::slice(series, start, end)
        .iter()
        .map(|observation| WindowEntry {
            observation,
            position: match observation.date.cmp(&instant) {
                std::cmp::Ordering::Less => WindowPosition::Before,
                std::cmp::Ordering::Equal => WindowPosition::At,
                std::cmp::Ordering::Greater => WindowPosition::After,
            },
        })
        .collect()
}
