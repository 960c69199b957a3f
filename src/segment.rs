use chrono::NaiveDate;

use crate::metrics::{mean_defined, ratio};
use crate::models::{ComparativeImpact, EnrichedObservation, ImpactAnalysis, SegmentSummary};

/// Splits an ordered series into rows strictly before `cutoff` and rows on or after it.
pub fn split_at_cutoff(
    series: &[EnrichedObservation],
    cutoff: NaiveDate,
) -> (&[EnrichedObservation], &[EnrichedObservation]) {
    let boundary = series.partition_point(|observation| observation.date < cutoff);
    series.split_at(boundary)
}

/// Aggregates a segment; `None` for an empty segment.
pub fn summarize(segment: &[EnrichedObservation]) -> Option<SegmentSummary> {
    let first = segment.first()?;
    let last = segment.last()?;

    let total_growth_pct = ratio(last.balance, first.balance).map(|value| (value - 1.0) * 100.0);

    Some(SegmentSummary {
        count: segment.len(),
        first_date: first.date,
        last_date: last.date,
        first_balance: first.balance,
        last_balance: last.balance,
        mean_delta_1d: mean_defined(segment.iter().map(|o| o.balance_delta_1d)),
        mean_pct_change_1d: mean_defined(segment.iter().map(|o| o.balance_pct_change_1d)),
        total_growth_pct,
    })
}

pub fn compare(
    before: Option<&SegmentSummary>,
    after: Option<&SegmentSummary>,
) -> Option<ComparativeImpact> {
    let (before, after) = (before?, after?);

    let velocity_change_abs = match (before.mean_delta_1d, after.mean_delta_1d) {
        (Some(b), Some(a)) => Some(a - b),
        _ => None,
    };

    let (velocity_change_rel_pct, growth_rate_change_pp) =
        match (before.mean_pct_change_1d, after.mean_pct_change_1d) {
            (Some(b), Some(a)) => (ratio(a, b).map(|value| (value - 1.0) * 100.0), Some(a - b)),
            _ => (None, None),
        };

    Some(ComparativeImpact {
        velocity_change_abs,
        velocity_change_rel_pct,
        growth_rate_change_pp,
    })
}

pub fn analyze_impact(series: &[EnrichedObservation], cutoff: NaiveDate) -> ImpactAnalysis {
    let (before, after) = split_at_cutoff(series, cutoff);
    let before = summarize(before);
    let after = summarize(after);
    let impact = compare(before.as_ref(), after.as_ref());

    if after.is_none() {
        tracing::warn!(%cutoff, "no observations on or after cutoff; impact not yet measurable");
    }

    ImpactAnalysis {
        cutoff,
        before,
        after,
        impact,
    }
}
