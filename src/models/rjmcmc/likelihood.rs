//! Likelihood families and numerical-stability helpers.

use super::priors::ConjugatePrior;
use super::state::ModelState;
use super::sufficient::{ConjugateFit, ConjugateModel, SufficientStatistics};
use super::types::LikelihoodFamily;
use crate::input::CovariateData;
use crate::utils::usize_to_f64;

const EPS_PROBABILITY: f64 = 1.0e-12;
/// Bound applied to every log-scale parameter before exponentiation.
pub const LOG_SCALE_LIMIT: f64 = 50.0;
/// Bound applied to linear-predictor values.
pub const LINEAR_PREDICTOR_LIMIT: f64 = 1.0e8;
const WEIBULL_EXPONENT_LIMIT: f64 = 250.0;

/// Stable logistic transform.
#[must_use]
pub fn logistic_stable(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

/// Bound probability away from exact 0 and 1.
#[must_use]
pub fn clamp_probability(probability: f64) -> f64 {
    probability.clamp(EPS_PROBABILITY, 1.0 - EPS_PROBABILITY)
}

#[must_use]
pub fn clamp_log_scale(value: f64) -> f64 {
    value.clamp(-LOG_SCALE_LIMIT, LOG_SCALE_LIMIT)
}

#[must_use]
pub fn clamp_linear_predictor(value: f64) -> f64 {
    value.clamp(-LINEAR_PREDICTOR_LIMIT, LINEAR_PREDICTOR_LIMIT)
}

/// Bernoulli log-likelihood of a 0/1 outcome under a logit link.
#[must_use]
pub fn logistic_log_likelihood(outcome: f64, linear_predictor: f64) -> f64 {
    let p = clamp_probability(logistic_stable(clamp_linear_predictor(linear_predictor)));
    if outcome > 0.5 { p.ln() } else { (-p).ln_1p() }
}

/// Weibull proportional-hazards log-likelihood of one possibly censored time.
#[must_use]
pub fn weibull_log_likelihood(time: f64, event: bool, linear_predictor: f64, log_shape: f64) -> f64 {
    let log_shape = clamp_log_scale(log_shape);
    let shape = log_shape.exp();
    let eta = clamp_linear_predictor(linear_predictor);
    let log_time = time.ln();
    let cumulative_hazard = shape.mul_add(log_time, eta).min(WEIBULL_EXPONENT_LIMIT).exp();
    let log_hazard = if event {
        log_shape + (shape - 1.0).mul_add(log_time, eta)
    } else {
        0.0
    };
    log_hazard - cumulative_hazard
}

/// Gaussian log-likelihood from a residual sum of squares.
#[must_use]
pub fn gaussian_log_likelihood(n_observations: usize, rss: f64, log_variance: f64) -> f64 {
    let log_variance = clamp_log_scale(log_variance);
    let n = usize_to_f64(n_observations);
    -0.5 * n * (std::f64::consts::TAU.ln() + log_variance) - rss / (2.0 * log_variance.exp())
}

/// Closed set of likelihoods, dispatched by match.
#[derive(Debug, Clone)]
pub enum LikelihoodModel {
    Logistic,
    Weibull,
    Gaussian,
    GaussianMarginal(SufficientStatistics),
    Conjugate(ConjugateModel),
}

impl LikelihoodModel {
    /// Build the likelihood for `data.likelihood`, caching cross-products for
    /// the sufficient-statistic families.
    #[must_use]
    pub fn new(data: &CovariateData, conjugate: ConjugatePrior) -> Self {
        match data.likelihood {
            LikelihoodFamily::Logistic => Self::Logistic,
            LikelihoodFamily::Weibull => Self::Weibull,
            LikelihoodFamily::Gaussian => Self::Gaussian,
            LikelihoodFamily::GaussianMarginal => {
                Self::GaussianMarginal(SufficientStatistics::from_data(data))
            }
            LikelihoodFamily::Conjugate => Self::Conjugate(ConjugateModel::new(data, conjugate)),
        }
    }

    #[must_use]
    pub const fn family(&self) -> LikelihoodFamily {
        match self {
            Self::Logistic => LikelihoodFamily::Logistic,
            Self::Weibull => LikelihoodFamily::Weibull,
            Self::Gaussian => LikelihoodFamily::Gaussian,
            Self::GaussianMarginal(_) => LikelihoodFamily::GaussianMarginal,
            Self::Conjugate(_) => LikelihoodFamily::Conjugate,
        }
    }

    /// Coefficient variance ratio `tau` at `state` for the conjugate family.
    #[must_use]
    pub fn tau(&self, state: &ModelState) -> f64 {
        match self {
            Self::Conjugate(model) => state.log_tau.map_or_else(
                || model.prior().coefficient_variance_ratio,
                |log_tau| clamp_log_scale(log_tau).exp(),
            ),
            _ => f64::NAN,
        }
    }

    /// Log-likelihood of `data` at `state`; the marginal likelihood for the
    /// conjugate family.
    #[must_use]
    pub fn log_likelihood(&self, state: &ModelState, data: &CovariateData) -> f64 {
        let value = match self {
            Self::Logistic => state
                .linear_predictor
                .iter()
                .enumerate()
                .map(|(row, eta)| logistic_log_likelihood(data.outcome[(row, 0)], *eta))
                .sum(),
            Self::Weibull => {
                let log_shape = state.log_dispersion.unwrap_or(0.0);
                let events = data.event_indicator.as_deref().unwrap_or(&[]);
                state
                    .linear_predictor
                    .iter()
                    .enumerate()
                    .map(|(row, eta)| {
                        let event = events.get(row).copied().unwrap_or(false);
                        weibull_log_likelihood(data.outcome[(row, 0)], event, *eta, log_shape)
                    })
                    .sum()
            }
            Self::Gaussian => {
                let rss = state
                    .linear_predictor
                    .iter()
                    .enumerate()
                    .map(|(row, eta)| (data.outcome[(row, 0)] - clamp_linear_predictor(*eta)).powi(2))
                    .sum();
                gaussian_log_likelihood(
                    data.n_observations(),
                    rss,
                    state.log_dispersion.unwrap_or(0.0),
                )
            }
            Self::GaussianMarginal(statistics) => {
                let rss = statistics.residual_sum_of_squares(
                    &state.inclusion,
                    state.intercept,
                    &state.coefficients,
                );
                gaussian_log_likelihood(
                    statistics.n_observations(),
                    rss,
                    state.log_dispersion.unwrap_or(0.0),
                )
            }
            Self::Conjugate(model) => {
                model.log_marginal_likelihood(&state.inclusion, self.tau(state))
            }
        };
        if value.is_nan() { f64::NEG_INFINITY } else { value }
    }

    /// Intercept and coefficients to report for `state`.
    ///
    /// The conjugate family reports the conditional posterior mean given the
    /// inclusion pattern and `tau`; every other family reports the sampled values.
    #[must_use]
    pub fn reported_coefficients(&self, state: &ModelState) -> (f64, Vec<f64>) {
        match self {
            Self::Conjugate(model) => {
                let ConjugateFit { posterior_mean, .. } =
                    model.fit(&state.inclusion, self.tau(state));
                let mut coefficients = vec![0.0; state.coefficients.len()];
                for (slot, covariate) in state.included_covariates().into_iter().enumerate() {
                    coefficients[covariate] = posterior_mean[slot + 1];
                }
                (posterior_mean[0], coefficients)
            }
            _ => (state.intercept, state.coefficients.clone()),
        }
    }
}
