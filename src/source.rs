use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::canonical;
use crate::error::IngestionError;
use crate::models::RawRecord;

/// Rows newer than this many days are still settling upstream and are skipped.
const SETTLEMENT_LAG_DAYS: i32 = 2;

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub cache_path: Option<PathBuf>,
    pub database_url: Option<String>,
}

/// Loads daily rows, preferring the cached file and falling back to the live source.
///
/// The returned rows are unique per date; when a date repeats, the last row wins.
pub async fn fetch_daily_observations(config: &SourceConfig) -> Result<Vec<RawRecord>, IngestionError> {
    let records = match &config.cache_path {
        Some(path) if path.exists() => {
            let records = read_cache(path)?;
            tracing::info!(path = %path.display(), rows = records.len(), "loaded cached observations");
            records
        }
        cache => {
            if let Some(path) = cache {
                tracing::warn!(path = %path.display(), "cache file not found, querying live source");
            }
            let url = config.database_url.as_deref().ok_or_else(|| {
                IngestionError::Unavailable(
                    "no cache file and DATABASE_URL is not set".to_string(),
                )
            })?;
            let pool = connect(url).await?;
            let records = fetch_live(&pool).await?;
            tracing::info!(rows = records.len(), "loaded observations from live source");
            records
        }
    };

    Ok(dedupe_last_wins(records))
}

pub fn read_cache(path: &Path) -> Result<Vec<RawRecord>, IngestionError> {
    let cache_error = |source| IngestionError::Cache {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(cache_error)?;
    reader
        .deserialize::<RawRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(cache_error)
}

/// Keeps the last row per calendar date. Rows with an unreadable date are passed
/// through untouched so validation can report them.
pub fn dedupe_last_wins(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let total = records.len();
    let mut by_date: BTreeMap<NaiveDate, RawRecord> = BTreeMap::new();
    let mut unparsed = Vec::new();
    for record in records {
        match canonical::parse_date(&record.date) {
            Ok(date) => {
                by_date.insert(date, record);
            }
            Err(_) => unparsed.push(record),
        }
    }

    let kept = by_date.len() + unparsed.len();
    if kept < total {
        tracing::debug!(dropped = total - kept, "dropped superseded rows");
    }
    by_date.into_values().chain(unparsed).collect()
}

pub async fn connect(database_url: &str) -> Result<PgPool, IngestionError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Daily totals with the monthly-active count accumulated within each calendar month.
pub async fn fetch_live(pool: &PgPool) -> Result<Vec<RawRecord>, IngestionError> {
    let rows = sqlx::query(
        r#"
        SELECT
          activity_date::text AS activity_date,
          balance,
          SUM(new_monthly_actives) OVER (
            PARTITION BY date_trunc('month', activity_date)
            ORDER BY activity_date
            ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
          )::bigint AS monthly_actives,
          daily_actives
        FROM rem_analysis.daily_activity
        WHERE activity_date <= CURRENT_DATE - $1::int
        ORDER BY activity_date
        "#,
    )
    .bind(SETTLEMENT_LAG_DAYS)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(RawRecord {
            date: row.try_get("activity_date")?,
            balance: row.try_get("balance")?,
            monthly_active_count: row.try_get("monthly_actives")?,
            daily_active_count: row.try_get("daily_actives")?,
        });
    }

    Ok(records)
}

/// Upserts daily rows from a CSV file; a re-imported date replaces the stored row.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        activity_date: NaiveDate,
        balance: f64,
        new_monthly_actives: i64,
        daily_actives: i64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut upserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let result = sqlx::query(
            r#"
            INSERT INTO rem_analysis.daily_activity
            (activity_date, balance, new_monthly_actives, daily_actives)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (activity_date) DO UPDATE
            SET balance = EXCLUDED.balance,
                new_monthly_actives = EXCLUDED.new_monthly_actives,
                daily_actives = EXCLUDED.daily_actives,
                updated_at = now()
            "#,
        )
        .bind(row.activity_date)
        .bind(row.balance)
        .bind(row.new_monthly_actives)
        .bind(row.daily_actives)
        .execute(pool)
        .await?;

        upserted += result.rows_affected() as usize;
    }

    Ok(upserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, balance: f64) -> RawRecord {
        RawRecord {
            date: date.to_string(),
            balance,
            monthly_active_count: 1,
            daily_active_count: 1,
        }
    }

    #[test]
    fn later_rows_replace_earlier_ones() {
        let records = vec![raw("2025-01-02", 1.0), raw("2025-01-01", 5.0), raw("2025-01-02", 7.0)];
        let deduped = dedupe_last_wins(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].date, "2025-01-01");
        assert_eq!(deduped[1].balance, 7.0);
    }

    #[test]
    fn differently_spelled_dates_collapse_to_one_row() {
        let records = vec![raw("2025-01-01", 1.0), raw("2025-1-1", 2.0), raw("2025-01-02", 3.0)];
        let deduped = dedupe_last_wins(records);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].date, "2025-1-1");
        assert_eq!(deduped[0].balance, 2.0);
        assert!(canonical::canonicalize(&deduped).is_ok());
    }

    #[test]
    fn unreadable_dates_reach_validation() {
        let records = vec![raw("2025-01-01", 1.0), raw("yesterday", 2.0)];
        let deduped = dedupe_last_wins(records);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[1].date, "yesterday");
        assert!(matches!(
            canonical::canonicalize(&deduped),
            Err(crate::error::AnalysisError::Validation { row: 1, .. })
        ));
    }

    #[tokio::test]
    async fn bad_connection_string_is_a_database_error() {
        assert!(matches!(
            connect("not-a-url").await,
            Err(IngestionError::Database(_))
        ));
    }

    #[test]
    fn reads_cached_csv() {
        let path = std::env::temp_dir().join(format!("rem-impact-cache-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "date,balance,monthly_active_count,daily_active_count\n\
             2025-01-01,100.5,40,12\n\
             2025-01-02,101.0,42,9\n",
        )
        .unwrap();

        let records = read_cache(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].balance, 100.5);
        assert_eq!(records[1].monthly_active_count, 42);
    }

    #[test]
    fn unparseable_cache_is_an_ingestion_error() {
        let path = std::env::temp_dir().join(format!("rem-impact-bad-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "date,balance,monthly_active_count,daily_active_count\n2025-01-01,lots,1,1\n",
        )
        .unwrap();

        let result = read_cache(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(IngestionError::Cache { .. })));
    }

    #[tokio::test]
    async fn missing_cache_without_database_is_unavailable() {
        let config = SourceConfig {
            cache_path: Some(PathBuf::from("/nonexistent/rem-impact.csv")),
            database_url: None,
        };
        assert!(matches!(
            fetch_daily_observations(&config).await,
            Err(IngestionError::Unavailable(_))
        ));
    }
}
