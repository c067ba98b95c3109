//! Chain diagnostics for scalar traces and move acceptance.

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use super::types::{MoveCounts, SamplerReport};
use crate::inference::ProposalStats;
use crate::utils::usize_to_f64;

/// Lag-`k` autocorrelation for a scalar chain.
#[must_use]
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    if series.is_empty() || lag >= series.len() {
        return 0.0;
    }

    let n = series.len() - lag;
    let mean = series.iter().sum::<f64>() / usize_to_f64(series.len());

    let denominator = series
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>();
    if denominator <= 0.0 {
        return 0.0;
    }

    let numerator = (0..n)
        .map(|idx| (series[idx] - mean) * (series[idx + lag] - mean))
        .sum::<f64>();
    numerator / denominator
}

/// Effective sample size with the autocorrelation sum truncated at the
/// first non-positive lag.
#[must_use]
pub fn effective_sample_size(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return usize_to_f64(n);
    }

    let mut rho_sum = 0.0;
    for lag in 1..n {
        let rho = autocorrelation(series, lag);
        if rho <= 0.0 {
            break;
        }
        rho_sum += rho;
    }

    usize_to_f64(n) / (2.0f64.mul_add(rho_sum, 1.0)).max(1.0)
}

/// Per-move acceptance table for both phases of a run.
#[must_use]
pub fn render_acceptance_table(report: &SamplerReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["phase", "add", "remove", "swap", "null"]
                .iter()
                .map(|h| Cell::new(*h))
                .collect::<Vec<_>>(),
        );
    for (phase, counts) in [("adaption", report.adaption), ("sampling", report.sampling)] {
        table.add_row(acceptance_row(phase, counts));
    }
    table.to_string()
}

fn acceptance_row(phase: &str, counts: MoveCounts) -> Vec<Cell> {
    let mut row = vec![Cell::new(phase)];
    row.extend(
        [counts.add, counts.remove, counts.swap, counts.null]
            .into_iter()
            .map(acceptance_cell),
    );
    row
}

fn acceptance_cell(stats: ProposalStats) -> Cell {
    if stats.proposed == 0 {
        Cell::new("-")
    } else {
        Cell::new(format!(
            "{:.3} ({}/{})",
            stats.acceptance_rate(),
            stats.accepted,
            stats.proposed
        ))
    }
}
