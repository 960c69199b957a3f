use chrono::NaiveDate;

use crate::metrics::DEFAULT_PER_MAU_SCALE;

pub const DEFAULT_CACHE_FILE: &str = "datos_saldo_detallado.csv";

/// Date the interest-rate reduction took effect.
pub fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 21).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    pub cutoff: NaiveDate,
    pub window_radius_days: u32,
    pub top_n: usize,
    pub per_mau_scale: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            window_radius_days: 7,
            top_n: 10,
            per_mau_scale: DEFAULT_PER_MAU_SCALE,
        }
    }
}
