//! Posterior draws, in-memory storage and summaries.

use comfy_table::{
    Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED,
};
use num_traits::ToPrimitive;

use super::diagnostics::effective_sample_size;
use super::output::{ResultsHeader, SampleSink};
use super::types::RjmcmcError;
use crate::utils::usize_to_f64;

/// A single recorded iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorDraw {
    pub iteration: usize,
    pub inclusion: Vec<bool>,
    pub model_dimension: usize,
    pub intercept: f64,
    /// Zero for excluded covariates.
    pub coefficients: Vec<f64>,
    pub log_dispersion: Option<f64>,
    pub log_tau: Option<f64>,
    pub hierarchical_log_sds: Vec<f64>,
    pub cluster_log_sd: Option<f64>,
    pub cluster_intercepts: Vec<f64>,
    pub log_likelihood: f64,
}

impl PosteriorDraw {
    /// Values in results-file column order.
    #[must_use]
    pub fn row_values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(
            self.coefficients.len()
                + self.hierarchical_log_sds.len()
                + self.cluster_intercepts.len()
                + 5,
        );
        values.extend(self.log_dispersion);
        values.extend(self.log_tau);
        values.push(self.intercept);
        values.extend_from_slice(&self.coefficients);
        values.extend_from_slice(&self.hierarchical_log_sds);
        if let Some(log_sd) = self.cluster_log_sd {
            values.push(log_sd);
            values.extend_from_slice(&self.cluster_intercepts);
        }
        values.push(self.log_likelihood);
        values
    }
}

/// Posterior draw collection.
#[derive(Debug, Clone, Default)]
pub struct PosteriorSamples {
    pub covariate_names: Vec<String>,
    pub draws: Vec<PosteriorDraw>,
}

impl PosteriorSamples {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.draws.len()
    }
}

impl SampleSink for PosteriorSamples {
    fn begin(&mut self, header: &ResultsHeader) -> Result<(), RjmcmcError> {
        self.covariate_names.clone_from(&header.covariate_names);
        self.draws.clear();
        Ok(())
    }

    fn record(&mut self, draw: &PosteriorDraw) -> Result<(), RjmcmcError> {
        self.draws.push(draw.clone());
        Ok(())
    }
}

/// Scalar posterior summary statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
}

/// Per-covariate selection summary.
#[derive(Debug, Clone, Default)]
pub struct CovariateSummary {
    pub name: String,
    pub inclusion_probability: f64,
    /// Model-averaged effect, counting excluded draws as zero.
    pub model_averaged: ParameterSummary,
    /// Effect over the draws that include the covariate.
    pub conditional: Option<ParameterSummary>,
}

/// Posterior summary over every recorded draw.
#[derive(Debug, Clone, Default)]
pub struct PosteriorSummary {
    pub covariates: Vec<CovariateSummary>,
    pub intercept: ParameterSummary,
    pub model_dimension: ParameterSummary,
    pub log_likelihood: ParameterSummary,
    pub log_likelihood_ess: f64,
    pub draw_count: usize,
}

/// Compute inclusion probabilities and effect summaries.
#[must_use]
pub fn summarize_posterior(samples: &PosteriorSamples) -> PosteriorSummary {
    let draw_count = samples.len();
    if draw_count == 0 {
        return PosteriorSummary::default();
    }

    let covariate_count = samples
        .draws
        .first()
        .map_or(0, |draw| draw.coefficients.len());
    let covariates = (0..covariate_count)
        .map(|index| {
            let values: Vec<f64> = samples
                .draws
                .iter()
                .map(|draw| draw.coefficients[index])
                .collect();
            let included: Vec<f64> = samples
                .draws
                .iter()
                .filter(|draw| draw.inclusion[index])
                .map(|draw| draw.coefficients[index])
                .collect();
            CovariateSummary {
                name: samples
                    .covariate_names
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| format!("X{}", index + 1)),
                inclusion_probability: usize_to_f64(included.len()) / usize_to_f64(draw_count),
                model_averaged: summarize_scalar(&values),
                conditional: (!included.is_empty()).then(|| summarize_scalar(&included)),
            }
        })
        .collect();

    let intercepts: Vec<f64> = samples.draws.iter().map(|draw| draw.intercept).collect();
    let dimensions: Vec<f64> = samples
        .draws
        .iter()
        .map(|draw| usize_to_f64(draw.model_dimension))
        .collect();
    let log_likelihoods: Vec<f64> = samples
        .draws
        .iter()
        .map(|draw| draw.log_likelihood)
        .collect();

    PosteriorSummary {
        covariates,
        intercept: summarize_scalar(&intercepts),
        model_dimension: summarize_scalar(&dimensions),
        log_likelihood: summarize_scalar(&log_likelihoods),
        log_likelihood_ess: effective_sample_size(&log_likelihoods),
        draw_count,
    }
}

/// Render the per-covariate summary, highlighting covariates with
/// inclusion probability of at least one half.
#[must_use]
pub fn render_posterior_table(summary: &PosteriorSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["covariate", "pip", "mean", "sd", "q2.5", "q97.5", "mean | incl"]
                .iter()
                .map(|h| Cell::new(*h))
                .collect::<Vec<_>>(),
        );
    for covariate in &summary.covariates {
        let pip = Cell::new(format!("{:.3}", covariate.inclusion_probability));
        let pip = if covariate.inclusion_probability >= 0.5 {
            pip.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            pip
        };
        table.add_row(vec![
            Cell::new(&covariate.name),
            pip,
            Cell::new(format!("{:.4}", covariate.model_averaged.mean)),
            Cell::new(format!("{:.4}", covariate.model_averaged.std_dev)),
            Cell::new(format!("{:.4}", covariate.model_averaged.q025)),
            Cell::new(format!("{:.4}", covariate.model_averaged.q975)),
            Cell::new(
                covariate
                    .conditional
                    .map_or_else(|| "-".to_string(), |value| format!("{:.4}", value.mean)),
            ),
        ]);
    }
    table.to_string()
}

#[must_use]
fn summarize_scalar(values: &[f64]) -> ParameterSummary {
    if values.is_empty() {
        return ParameterSummary::default();
    }

    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n.max(1.0);

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    ParameterSummary {
        mean,
        std_dev: variance.sqrt(),
        q025: percentile(&sorted, 0.025),
        q50: percentile(&sorted, 0.5),
        q975: percentile(&sorted, 0.975),
    }
}

#[must_use]
fn percentile(sorted_values: &[f64], probability: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }

    let clamped = probability.clamp(0.0, 1.0);
    let last = sorted_values.len() - 1;
    let position = clamped * usize_to_f64(last);
    let lower = position.floor().to_usize().unwrap_or(0);
    let upper = position.ceil().to_usize().unwrap_or(last);

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - usize_to_f64(lower);
        (1.0 - weight).mul_add(sorted_values[lower], weight * sorted_values[upper])
    }
}
