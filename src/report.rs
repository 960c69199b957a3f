use std::fmt::Write;

use crate::config::AnalysisConfig;
use crate::metrics;
use crate::models::{
    Direction, EnrichedObservation, MetricField, SegmentSummary, WindowPosition,
};
use crate::ranking;
use crate::segment;

/// Formats a defined value, or `n/a` when undefined.
pub fn fmt_opt(value: Option<f64>, decimals: usize, suffix: &str) -> String {
    match value {
        Some(value) => format!("{value:.decimals$}{suffix}"),
        None => "n/a".to_string(),
    }
}

/// Like `fmt_opt`, with an explicit sign for changes.
pub fn fmt_delta(value: Option<f64>, decimals: usize, suffix: &str) -> String {
    match value {
        Some(value) => format!("{value:+.decimals$}{suffix}"),
        None => "n/a".to_string(),
    }
}

fn write_segment(output: &mut String, label: &str, summary: Option<&SegmentSummary>) {
    let _ = writeln!(output, "### {label}");
    match summary {
        None => {
            let _ = writeln!(output, "No observations in this period.");
        }
        Some(summary) => {
            let _ = writeln!(
                output,
                "- Days analyzed: {} ({} to {})",
                summary.count, summary.first_date, summary.last_date
            );
            let _ = writeln!(output, "- Initial balance: {:.0}M", summary.first_balance);
            let _ = writeln!(output, "- Final balance: {:.0}M", summary.last_balance);
            let _ = writeln!(
                output,
                "- Total growth: {}",
                fmt_delta(summary.total_growth_pct, 2, "%")
            );
            let _ = writeln!(
                output,
                "- Daily velocity: {} ({})",
                fmt_delta(summary.mean_delta_1d, 0, "M/day"),
                fmt_delta(summary.mean_pct_change_1d, 3, "%/day")
            );
        }
    }
    let _ = writeln!(output);
}

fn write_ranking(output: &mut String, title: &str, rows: &[&EnrichedObservation]) {
    let _ = writeln!(output, "### {title}");
    if rows.is_empty() {
        let _ = writeln!(output, "No daily changes recorded.");
    }
    for row in rows {
        let _ = writeln!(
            output,
            "- {}: balance {:.0}M, change {} ({})",
            row.date,
            row.balance,
            fmt_delta(row.balance_delta_1d, 0, "M"),
            fmt_delta(row.balance_pct_change_1d, 2, "%")
        );
    }
    let _ = writeln!(output);
}

pub fn build_report(series: &[EnrichedObservation], config: &AnalysisConfig) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Interest-Bearing Account Balance Report");

    let Some(overview) = metrics::overview(series) else {
        let _ = writeln!(output, "No observations available.");
        return output;
    };

    let _ = writeln!(
        output,
        "Generated for {} to {} (rate reduction on {})",
        overview.first_date, overview.last_date, config.cutoff
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Current balance: {:.0}M ({:+.0}M since {})",
        overview.current_balance, overview.total_growth, overview.first_date
    );
    let _ = writeln!(
        output,
        "- Total growth: {}",
        fmt_delta(overview.total_growth_pct, 1, "%")
    );
    let _ = writeln!(
        output,
        "- MAU: {} ({:+})",
        overview.current_mau, overview.mau_change
    );
    let _ = writeln!(
        output,
        "- Balance per MAU: {} (change {})",
        fmt_opt(overview.current_balance_per_mau, 0, ""),
        fmt_delta(overview.balance_per_mau_change, 0, "")
    );
    let _ = writeln!(output);

    let velocity = metrics::velocity(series);
    let _ = writeln!(output, "## Growth Velocity");
    let _ = writeln!(
        output,
        "- Daily: {} ({})",
        fmt_delta(velocity.mean_delta_1d, 0, "M"),
        fmt_delta(velocity.mean_pct_change_1d, 3, "%")
    );
    let _ = writeln!(
        output,
        "- Weekly: {} ({})",
        fmt_delta(velocity.mean_delta_7d, 0, "M"),
        fmt_delta(velocity.mean_pct_change_7d, 2, "%")
    );
    let _ = writeln!(
        output,
        "- Monthly: {} ({})",
        fmt_delta(velocity.mean_delta_30d, 0, "M"),
        fmt_delta(velocity.mean_pct_change_30d, 2, "%")
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Monthly Summary");
    let _ = writeln!(
        output,
        "| Month | Initial | Final | Average | Avg daily change | Growth | Growth % |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for month in metrics::monthly(series) {
        let _ = writeln!(
            output,
            "| {}-{:02} | {:.0}M | {:.0}M | {:.0}M | {} | {:+.0}M | {} |",
            month.year,
            month.month,
            month.first_balance,
            month.last_balance,
            month.mean_balance,
            fmt_delta(month.mean_delta_1d, 0, "M"),
            month.total_growth,
            fmt_delta(month.growth_pct, 2, "%")
        );
    }
    let _ = writeln!(output);

    let analysis = segment::analyze_impact(series, config.cutoff);
    let _ = writeln!(output, "## Rate Reduction Impact");
    write_segment(&mut output, "Before", analysis.before.as_ref());
    write_segment(&mut output, "After", analysis.after.as_ref());

    match &analysis.impact {
        None => {
            let _ = writeln!(output, "Impact not yet measurable.");
        }
        Some(impact) => {
            let _ = writeln!(
                output,
                "- Change in daily velocity: {} ({})",
                fmt_delta(impact.velocity_change_abs, 0, "M/day"),
                fmt_delta(impact.velocity_change_rel_pct, 2, "%")
            );
            let _ = writeln!(
                output,
                "- Change in daily growth rate: {}",
                fmt_delta(impact.growth_rate_change_pp, 3, " pp")
            );
            let verdict = match impact.velocity_decreased() {
                Some(true) => "Growth velocity decreased.",
                Some(false) => "Growth velocity held or increased.",
                None => "Growth velocity change is undefined.",
            };
            let _ = writeln!(output, "- {verdict}");
        }
    }
    let _ = writeln!(output);

    let window = ranking::window_around(series, config.cutoff, config.window_radius_days);
    let _ = writeln!(
        output,
        "## Daily Change Within {} Days of {}",
        config.window_radius_days, config.cutoff
    );
    if window.is_empty() {
        let _ = writeln!(output, "No observations near the cutoff.");
    }
    for entry in &window {
        let tag = match entry.position {
            WindowPosition::Before => "before",
            WindowPosition::At => "cutoff",
            WindowPosition::After => "after",
        };
        let _ = writeln!(
            output,
            "- {} [{}]: balance {:.0}M, change {} ({})",
            entry.observation.date,
            tag,
            entry.observation.balance,
            fmt_delta(entry.observation.balance_delta_1d, 0, "M"),
            fmt_delta(entry.observation.balance_pct_change_1d, 2, "%")
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Top Events");
    let increases =
        ranking::top_n_by(series, MetricField::BalanceDelta1d, config.top_n, Direction::Max);
    let decreases =
        ranking::top_n_by(series, MetricField::BalanceDelta1d, config.top_n, Direction::Min);
    write_ranking(&mut output, "Largest Increases", &increases);
    write_ranking(&mut output, "Largest Decreases", &decreases);

    output
}
