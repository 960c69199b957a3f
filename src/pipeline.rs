use crate::canonical;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::metrics;
use crate::models::{EnrichedObservation, RawRecord};
use crate::source::{self, SourceConfig};

/// Validates and enriches raw rows. Any invalid row aborts the whole run.
pub fn build_series(
    records: &[RawRecord],
    config: &AnalysisConfig,
) -> Result<Vec<EnrichedObservation>, AnalysisError> {
    let observations = canonical::canonicalize(records)?;
    Ok(metrics::enrich(&observations, config.per_mau_scale))
}

pub async fn load_series(
    source: &SourceConfig,
    config: &AnalysisConfig,
) -> Result<Vec<EnrichedObservation>, AnalysisError> {
    let records = source::fetch_daily_observations(source).await?;
    let series = build_series(&records, config)?;

    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        tracing::info!(rows = series.len(), from = %first.date, to = %last.date, "series ready");
    } else {
        tracing::warn!("data source returned no observations");
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::WindowPosition;
    use crate::{filter, ranking, segment};

    fn records(balances: &[f64]) -> Vec<RawRecord> {
        balances
            .iter()
            .enumerate()
            .rev()
            .map(|(offset, &balance)| RawRecord {
                date: format!("2025-01-{:02}", offset + 1),
                balance,
                monthly_active_count: 100,
                daily_active_count: 30,
            })
            .collect()
    }

    #[test]
    fn runs_end_to_end_around_cutoff() {
        let balances = [100.0, 110.0, 105.0, 120.0, 130.0, 125.0, 140.0, 150.0, 90.0, 200.0];
        let config = AnalysisConfig {
            cutoff: NaiveDate::from_ymd_opt(2025, 1, 9).unwrap(),
            window_radius_days: 2,
            ..AnalysisConfig::default()
        };

        let series = build_series(&records(&balances), &config).unwrap();
        assert_eq!(series.len(), 10);

        let analysis = segment::analyze_impact(&series, config.cutoff);
        assert_eq!(analysis.before.as_ref().unwrap().count, 8);
        assert_eq!(analysis.after.as_ref().unwrap().count, 2);

        let window = ranking::window_around(&series, config.cutoff, config.window_radius_days);
        let positions: Vec<WindowPosition> = window.iter().map(|entry| entry.position).collect();
        assert_eq!(
            positions,
            vec![
                WindowPosition::Before,
                WindowPosition::Before,
                WindowPosition::At,
                WindowPosition::After
            ]
        );

        let last_two = filter::slice(&series, config.cutoff, NaiveDate::MAX);
        assert_eq!(last_two.len(), 2);
    }

    #[test]
    fn negative_balance_aborts_without_partial_results() {
        let config = AnalysisConfig::default();
        let result = build_series(&records(&[10.0, -1.0, 12.0]), &config);
        assert!(matches!(result, Err(AnalysisError::Validation { .. })));
    }

    #[test]
    fn empty_source_yields_empty_series() {
        let series = build_series(&[], &AnalysisConfig::default()).unwrap();
        assert!(series.is_empty());
        assert!(segment::analyze_impact(&series, AnalysisConfig::default().cutoff)
            .impact
            .is_none());
    }
}
