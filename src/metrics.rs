use chrono::Datelike;

use crate::models::{
    DailyObservation, EnrichedObservation, MonthlySummary, SeriesOverview, VelocitySummary,
};

pub const DEFAULT_PER_MAU_SCALE: f64 = 1_000_000.0;

const ROLLING_WINDOW: usize = 7;
const WEEK_LOOKBACK: usize = 7;
const MONTH_LOOKBACK: usize = 30;

/// `numerator / denominator`, or `None` when the result would not be a finite number.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

/// Arithmetic mean of the defined values only.
pub fn mean_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    ratio(sum, count as f64)
}

fn pct_change(current: f64, previous: f64) -> Option<f64> {
    ratio(current, previous).map(|value| (value - 1.0) * 100.0)
}

/// Derives every metric for an ordered series in one forward pass.
///
/// Lookbacks count positions, not calendar days, so a gap in the dates shifts
/// the comparison row instead of producing an error.
pub fn enrich(observations: &[DailyObservation], per_mau_scale: f64) -> Vec<EnrichedObservation> {
    let mut enriched: Vec<EnrichedObservation> = Vec::with_capacity(observations.len());

    for (index, observation) in observations.iter().enumerate() {
        let balance = observation.balance;
        let lookback = |positions: usize| index.checked_sub(positions).map(|i| observations[i].balance);

        let previous = lookback(1);
        let week_ago = lookback(WEEK_LOOKBACK);
        let month_ago = lookback(MONTH_LOOKBACK);

        let window_start = (index + 1).saturating_sub(ROLLING_WINDOW);
        let window = &observations[window_start..=index];
        let balance_ma_7d =
            window.iter().map(|o| o.balance).sum::<f64>() / window.len() as f64;

        let balance_pct_change_1d = previous.and_then(|p| pct_change(balance, p));
        let growth_rate_ma_7d = mean_defined(
            enriched[window_start..]
                .iter()
                .map(|o| o.balance_pct_change_1d)
                .chain(std::iter::once(balance_pct_change_1d)),
        );

        let mau = observation.monthly_active_count as f64;

        enriched.push(EnrichedObservation {
            date: observation.date,
            balance,
            monthly_active_count: observation.monthly_active_count,
            daily_active_count: observation.daily_active_count,
            balance_delta_1d: previous.map(|p| balance - p),
            balance_pct_change_1d,
            balance_delta_7d: week_ago.map(|p| balance - p),
            balance_pct_change_7d: week_ago.and_then(|p| pct_change(balance, p)),
            balance_delta_30d: month_ago.map(|p| balance - p),
            balance_pct_change_30d: month_ago.and_then(|p| pct_change(balance, p)),
            balance_ma_7d,
            growth_rate_ma_7d,
            balance_per_mau: ratio(balance, mau).map(|value| value * per_mau_scale),
            dau_mau_ratio_pct: ratio(observation.daily_active_count as f64, mau)
                .map(|value| value * 100.0),
        });
    }

    tracing::debug!(count = enriched.len(), "enriched daily observations");
    enriched
}

pub fn overview(series: &[EnrichedObservation]) -> Option<SeriesOverview> {
    let first = series.first()?;
    let last = series.last()?;

    let balance_per_mau_change = match (first.balance_per_mau, last.balance_per_mau) {
        (Some(initial), Some(current)) => Some(current - initial),
        _ => None,
    };

    Some(SeriesOverview {
        first_date: first.date,
        last_date: last.date,
        initial_balance: first.balance,
        current_balance: last.balance,
        total_growth: last.balance - first.balance,
        total_growth_pct: pct_change(last.balance, first.balance),
        initial_mau: first.monthly_active_count,
        current_mau: last.monthly_active_count,
        mau_change: last.monthly_active_count as i64 - first.monthly_active_count as i64,
        initial_balance_per_mau: first.balance_per_mau,
        current_balance_per_mau: last.balance_per_mau,
        balance_per_mau_change,
    })
}

pub fn velocity(series: &[EnrichedObservation]) -> VelocitySummary {
    let mean_of = |pick: fn(&EnrichedObservation) -> Option<f64>| mean_defined(series.iter().map(pick));

    VelocitySummary {
        mean_delta_1d: mean_of(|o| o.balance_delta_1d),
        mean_pct_change_1d: mean_of(|o| o.balance_pct_change_1d),
        mean_delta_7d: mean_of(|o| o.balance_delta_7d),
        mean_pct_change_7d: mean_of(|o| o.balance_pct_change_7d),
        mean_delta_30d: mean_of(|o| o.balance_delta_30d),
        mean_pct_change_30d: mean_of(|o| o.balance_pct_change_30d),
    }
}

/// Groups the series by calendar month, in series order.
pub fn monthly(series: &[EnrichedObservation]) -> Vec<MonthlySummary> {
    series
        .chunk_by(|a, b| (a.date.year(), a.date.month()) == (b.date.year(), b.date.month()))
        .map(|month| {
            let first = &month[0];
            let last = &month[month.len() - 1];
            let mean_balance =
                month.iter().map(|o| o.balance).sum::<f64>() / month.len() as f64;

            MonthlySummary {
                year: first.date.year(),
                month: first.date.month(),
                first_balance: first.balance,
                last_balance: last.balance,
                mean_balance,
                mean_delta_1d: mean_defined(month.iter().map(|o| o.balance_delta_1d)),
                total_growth: last.balance - first.balance,
                growth_pct: pct_change(last.balance, first.balance),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;

    pub(crate) fn series_from(start: NaiveDate, balances: &[f64]) -> Vec<DailyObservation> {
        balances
            .iter()
            .enumerate()
            .map(|(offset, &balance)| DailyObservation {
                date: start + Duration::days(offset as i64),
                balance,
                monthly_active_count: 100,
                daily_active_count: 25,
            })
            .collect()
    }

    pub(crate) fn scenario() -> Vec<EnrichedObservation> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let balances = [100.0, 110.0, 105.0, 120.0, 130.0, 125.0, 140.0, 150.0, 90.0, 200.0];
        enrich(&series_from(start, &balances), DEFAULT_PER_MAU_SCALE)
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|value| (value - expected).abs() < 1e-9)
    }

    #[test]
    fn first_row_has_no_lookback_metrics() {
        let series = scenario();
        let first = &series[0];
        assert_eq!(first.balance_delta_1d, None);
        assert_eq!(first.balance_pct_change_1d, None);
        assert_eq!(first.balance_delta_7d, None);
        assert_eq!(first.growth_rate_ma_7d, None);
        assert_eq!(first.balance_ma_7d, 100.0);
    }

    #[test]
    fn daily_and_weekly_changes() {
        let series = scenario();
        assert!(close(series[8].balance_delta_1d, -60.0));
        assert!(close(series[1].balance_pct_change_1d, 10.0));
        assert_eq!(series[6].balance_delta_7d, None);
        assert!(close(series[7].balance_delta_7d, 50.0));
        assert!(close(series[7].balance_pct_change_7d, 50.0));
        assert!(series.iter().all(|o| o.balance_delta_30d.is_none()));
    }

    #[test]
    fn rolling_mean_uses_available_rows() {
        let series = scenario();
        assert!((series[1].balance_ma_7d - 105.0).abs() < 1e-9);
        let expected = (110.0 + 105.0 + 120.0 + 130.0 + 125.0 + 140.0 + 150.0) / 7.0;
        assert!((series[7].balance_ma_7d - expected).abs() < 1e-9);
    }

    #[test]
    fn growth_rate_average_skips_undefined_entries() {
        let series = scenario();
        assert!(close(series[1].growth_rate_ma_7d, 10.0));
        let expected = (10.0 + (105.0 / 110.0 - 1.0) * 100.0) / 2.0;
        assert!(close(series[2].growth_rate_ma_7d, expected));
    }

    #[test]
    fn zero_previous_balance_leaves_pct_change_undefined() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let series = enrich(&series_from(start, &[0.0, 50.0, 75.0]), DEFAULT_PER_MAU_SCALE);
        assert_eq!(series[1].balance_pct_change_1d, None);
        assert!(close(series[1].balance_delta_1d, 50.0));
        assert!(close(series[2].growth_rate_ma_7d, 50.0));
        assert!(series
            .iter()
            .filter_map(|o| o.growth_rate_ma_7d)
            .all(f64::is_finite));
    }

    #[test]
    fn all_undefined_window_yields_undefined_growth_rate() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let series = enrich(&series_from(start, &[0.0, 0.0, 0.0]), DEFAULT_PER_MAU_SCALE);
        assert!(series.iter().all(|o| o.growth_rate_ma_7d.is_none()));
    }

    #[test]
    fn zero_mau_only_affects_its_own_date() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut observations = series_from(start, &[10.0, 20.0, 30.0]);
        observations[1].monthly_active_count = 0;
        let series = enrich(&observations, DEFAULT_PER_MAU_SCALE);

        assert_eq!(series[1].balance_per_mau, None);
        assert_eq!(series[1].dau_mau_ratio_pct, None);
        assert!(close(series[0].balance_per_mau, 100_000.0));
        assert!(close(series[2].balance_per_mau, 300_000.0));
        assert!(close(series[2].dau_mau_ratio_pct, 25.0));

        let mean = mean_defined(series.iter().map(|o| o.balance_per_mau));
        assert!(close(mean, 200_000.0));
    }

    #[test]
    fn thirty_day_lookback() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let balances: Vec<f64> = (0..31).map(|i| 100.0 + i as f64).collect();
        let series = enrich(&series_from(start, &balances), DEFAULT_PER_MAU_SCALE);
        assert_eq!(series[29].balance_delta_30d, None);
        assert!(close(series[30].balance_delta_30d, 30.0));
        assert!(close(series[30].balance_pct_change_30d, 30.0));
    }

    #[test]
    fn overview_reports_growth_and_mau() {
        let series = scenario();
        let summary = overview(&series).unwrap();
        assert_eq!(summary.total_growth, 100.0);
        assert!(close(summary.total_growth_pct, 100.0));
        assert_eq!(summary.mau_change, 0);
        assert!(close(summary.balance_per_mau_change, 1_000_000.0));
        assert!(overview(&[]).is_none());
    }

    #[test]
    fn velocity_means_exclude_undefined_rows() {
        let summary = velocity(&scenario());
        assert!(close(summary.mean_delta_1d, 100.0 / 9.0));
        assert!(close(summary.mean_delta_7d, (50.0 - 20.0 + 95.0) / 3.0));
        assert_eq!(summary.mean_delta_30d, None);
    }

    #[test]
    fn monthly_groups_by_calendar_month() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        let series = enrich(&series_from(start, &[100.0, 110.0, 120.0, 90.0]), DEFAULT_PER_MAU_SCALE);
        let months = monthly(&series);

        assert_eq!(months.len(), 2);
        assert_eq!((months[0].year, months[0].month), (2025, 1));
        assert_eq!(months[0].total_growth, 10.0);
        assert!(close(months[0].mean_delta_1d, 10.0));
        assert_eq!(months[1].month, 2);
        assert_eq!(months[1].first_balance, 120.0);
        assert!(close(months[1].growth_pct, -25.0));
    }
}
