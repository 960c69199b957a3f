use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A daily row as handed over by a data source, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "fecha")]
    pub date: String,
    #[serde(alias = "saldo_rem")]
    pub balance: f64,
    #[serde(alias = "mau_rem")]
    pub monthly_active_count: i64,
    #[serde(alias = "dau_rem")]
    pub daily_active_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub balance: f64,
    pub monthly_active_count: u64,
    pub daily_active_count: u64,
}

/// A daily observation together with the metrics derived from the series up to it.
///
/// Every derived field is `None` when its lookback row does not exist or its
/// denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedObservation {
    pub date: NaiveDate,
    pub balance: f64,
    pub monthly_active_count: u64,
    pub daily_active_count: u64,
    pub balance_delta_1d: Option<f64>,
    pub balance_pct_change_1d: Option<f64>,
    pub balance_delta_7d: Option<f64>,
    pub balance_pct_change_7d: Option<f64>,
    pub balance_delta_30d: Option<f64>,
    pub balance_pct_change_30d: Option<f64>,
    pub balance_ma_7d: f64,
    pub growth_rate_ma_7d: Option<f64>,
    pub balance_per_mau: Option<f64>,
    pub dau_mau_ratio_pct: Option<f64>,
}

impl EnrichedObservation {
    pub fn value(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::Balance => Some(self.balance),
            MetricField::BalanceDelta1d => self.balance_delta_1d,
            MetricField::BalancePctChange1d => self.balance_pct_change_1d,
            MetricField::BalanceDelta7d => self.balance_delta_7d,
            MetricField::BalancePctChange7d => self.balance_pct_change_7d,
            MetricField::BalanceMa7d => Some(self.balance_ma_7d),
            MetricField::GrowthRateMa7d => self.growth_rate_ma_7d,
            MetricField::BalancePerMau => self.balance_per_mau,
            MetricField::DauMauRatioPct => self.dau_mau_ratio_pct,
        }
    }
}

/// Numeric columns of an enriched observation that can be ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MetricField {
    Balance,
    BalanceDelta1d,
    BalancePctChange1d,
    BalanceDelta7d,
    BalancePctChange7d,
    BalanceMa7d,
    GrowthRateMa7d,
    BalancePerMau,
    DauMauRatioPct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Direction {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPosition {
    Before,
    At,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEntry<'a> {
    pub observation: &'a EnrichedObservation,
    pub position: WindowPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub first_balance: f64,
    pub last_balance: f64,
    pub mean_delta_1d: Option<f64>,
    pub mean_pct_change_1d: Option<f64>,
    pub total_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativeImpact {
    pub velocity_change_abs: Option<f64>,
    pub velocity_change_rel_pct: Option<f64>,
    pub growth_rate_change_pp: Option<f64>,
}

impl ComparativeImpact {
    pub fn velocity_decreased(&self) -> Option<bool> {
        self.velocity_change_abs.map(|change| change < 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAnalysis {
    pub cutoff: NaiveDate,
    pub before: Option<SegmentSummary>,
    pub after: Option<SegmentSummary>,
    pub impact: Option<ComparativeImpact>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOverview {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub total_growth: f64,
    pub total_growth_pct: Option<f64>,
    pub initial_mau: u64,
    pub current_mau: u64,
    pub mau_change: i64,
    pub initial_balance_per_mau: Option<f64>,
    pub current_balance_per_mau: Option<f64>,
    pub balance_per_mau_change: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VelocitySummary {
    pub mean_delta_1d: Option<f64>,
    pub mean_pct_change_1d: Option<f64>,
    pub mean_delta_7d: Option<f64>,
    pub mean_pct_change_7d: Option<f64>,
    pub mean_delta_30d: Option<f64>,
    pub mean_pct_change_30d: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub first_balance: f64,
    pub last_balance: f64,
    pub mean_balance: f64,
    pub mean_delta_1d: Option<f64>,
    pub total_growth: f64,
    pub growth_pct: Option<f64>,
}
