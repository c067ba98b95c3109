//! Prior specifications and log-density helpers for the variable-selection model.

use statrs::function::beta::ln_beta;
use statrs::function::factorial::{ln_binomial, ln_factorial};
use statrs::function::gamma::ln_gamma;

use super::likelihood::{LOG_SCALE_LIMIT, clamp_log_scale};
use super::state::ModelState;
use super::types::RjmcmcError;
use crate::input::CovariateData;
use crate::utils::usize_to_f64;

/// Prior over which covariates are included, one hyperparameter set per
/// model-space partition.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpacePrior {
    /// Poisson(`rate`) prior on the number of included covariates per
    /// partition, spread evenly over the configurations of each size. The
    /// rates are the prior mean model sizes.
    Poisson { rates: Vec<f64> },
    /// Beta-binomial prior with `(a, b)` per partition.
    BetaBinomial { hyperparameters: Vec<(f64, f64)> },
}

impl Default for ModelSpacePrior {
    fn default() -> Self {
        Self::BetaBinomial {
            hyperparameters: vec![(1.0, 1.0)],
        }
    }
}

impl ModelSpacePrior {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Poisson { .. } => "Poisson",
            Self::BetaBinomial { .. } => "BetaBinomial",
        }
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        match self {
            Self::Poisson { rates } => rates.len(),
            Self::BetaBinomial { hyperparameters } => hyperparameters.len(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Poisson { rates } => {
                !rates.is_empty() && rates.iter().all(|rate| rate.is_finite() && *rate > 0.0)
            }
            Self::BetaBinomial { hyperparameters } => {
                !hyperparameters.is_empty()
                    && hyperparameters
                        .iter()
                        .all(|(a, b)| a.is_finite() && b.is_finite() && *a > 0.0 && *b > 0.0)
            }
        }
    }

    /// Hyperparameters flattened in header order.
    #[must_use]
    pub fn hyperparameter_values(&self) -> Vec<f64> {
        match self {
            Self::Poisson { rates } => rates.clone(),
            Self::BetaBinomial { hyperparameters } => hyperparameters
                .iter()
                .flat_map(|(a, b)| [*a, *b])
                .collect(),
        }
    }

    /// Log prior of one inclusion configuration with `included` of `size`
    /// covariates switched on in `partition`.
    #[must_use]
    pub fn log_configuration_prior(&self, partition: usize, included: usize, size: usize) -> f64 {
        self.log_model_size_prior(partition, included, size)
            - ln_binomial(as_u64(size), as_u64(included))
    }

    /// Log prior on the number of included covariates in `partition`.
    #[must_use]
    pub fn log_model_size_prior(&self, partition: usize, included: usize, size: usize) -> f64 {
        let k = usize_to_f64(included);
        match self {
            Self::Poisson { rates } => {
                let rate = rates[partition];
                k * rate.ln() - rate - ln_factorial(as_u64(included))
            }
            Self::BetaBinomial { hyperparameters } => {
                let (a, b) = hyperparameters[partition];
                let excluded = usize_to_f64(size.saturating_sub(included));
                ln_binomial(as_u64(size), as_u64(included)) + ln_beta(a + k, b + excluded)
                    - ln_beta(a, b)
            }
        }
    }
}

/// Prior on a positive scale parameter sampled on the log scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalePrior {
    /// Uniform on the natural value.
    Uniform { lower: f64, upper: f64 },
    /// Uniform on the log value.
    LogUniform { lower: f64, upper: f64 },
    /// Inverse-gamma on the variance (for SDs) or on the value itself.
    InverseGamma { shape: f64, scale: f64 },
}

impl ScalePrior {
    #[must_use]
    pub fn is_valid(self) -> bool {
        match self {
            Self::Uniform { lower, upper } => lower >= 0.0 && lower < upper && upper.is_finite(),
            Self::LogUniform { lower, upper } => {
                lower.is_finite() && upper.is_finite() && lower < upper
            }
            Self::InverseGamma { shape, scale } => {
                shape.is_finite() && scale.is_finite() && shape > 0.0 && scale > 0.0
            }
        }
    }

    /// Log density of `log_sd`, with the inverse-gamma case placed on the
    /// variance `exp(2 * log_sd)`.
    #[must_use]
    pub fn log_density_of_log_sd(self, log_sd: f64) -> f64 {
        match self {
            Self::Uniform { lower, upper } => log_uniform_density(log_sd.exp(), lower, upper) + log_sd,
            Self::LogUniform { lower, upper } => log_uniform_density(log_sd, lower, upper),
            Self::InverseGamma { shape, scale } => {
                let log_variance = 2.0 * log_sd;
                log_inverse_gamma_density_of_log(log_variance, shape, scale)
                    + log_variance
                    + std::f64::consts::LN_2
            }
        }
    }

    /// Log density of `log_value` when the prior is placed on `exp(log_value)`.
    #[must_use]
    pub fn log_density_of_log_value(self, log_value: f64) -> f64 {
        match self {
            Self::Uniform { lower, upper } => {
                log_uniform_density(log_value.exp(), lower, upper) + log_value
            }
            Self::LogUniform { lower, upper } => log_uniform_density(log_value, lower, upper),
            Self::InverseGamma { shape, scale } => {
                log_inverse_gamma_density_of_log(log_value, shape, scale) + log_value
            }
        }
    }
}

/// Normal prior on a coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoefficientPrior {
    /// Fixed standard deviation.
    Informative { sd: f64 },
    /// Standard deviation shared with a hierarchical partition and sampled.
    Hierarchical { partition: usize },
}

/// Hierarchical coefficient-prior partition with an unknown SD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HierarchicalPartition {
    pub prior: ScalePrior,
    pub initial_sd: f64,
}

impl Default for HierarchicalPartition {
    fn default() -> Self {
        Self {
            prior: ScalePrior::Uniform {
                lower: 0.05,
                upper: 2.0,
            },
            initial_sd: 0.5,
        }
    }
}

/// Hyperparameters of the normal-inverse-gamma conjugate model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConjugatePrior {
    /// Inverse-gamma shape `a` of the residual variance.
    pub residual_shape: f64,
    /// Inverse-gamma scale `b` of the residual variance.
    pub residual_scale: f64,
    /// Intercept prior variance as a multiple of the residual variance.
    pub intercept_variance_ratio: f64,
    /// Coefficient prior variance `tau` as a multiple of the residual variance.
    pub coefficient_variance_ratio: f64,
    /// When set, `log tau` is sampled under this prior (placed on `tau`).
    pub tau_prior: Option<ScalePrior>,
}

impl Default for ConjugatePrior {
    fn default() -> Self {
        Self {
            residual_shape: 0.01,
            residual_scale: 0.01,
            intercept_variance_ratio: 1.0e4,
            coefficient_variance_ratio: 1.0,
            tau_prior: None,
        }
    }
}

impl ConjugatePrior {
    #[must_use]
    pub fn is_valid(self) -> bool {
        [
            self.residual_shape,
            self.residual_scale,
            self.intercept_variance_ratio,
            self.coefficient_variance_ratio,
        ]
        .iter()
        .all(|value| value.is_finite() && *value > 0.0)
            && self.tau_prior.is_none_or(ScalePrior::is_valid)
    }
}

/// Prior hyperparameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorConfig {
    /// Variance of the Normal(0, variance) intercept prior.
    pub intercept_variance: f64,
    pub model_space: ModelSpacePrior,
    /// One entry per covariate; empty means every covariate uses
    /// hierarchical partition 0.
    pub coefficient_priors: Vec<CoefficientPrior>,
    pub hierarchical_partitions: Vec<HierarchicalPartition>,
    /// Prior on the Weibull shape or Gaussian residual variance.
    pub dispersion: ScalePrior,
    /// Prior on the random-intercept SD.
    pub cluster_sd: ScalePrior,
    pub conjugate: ConjugatePrior,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            intercept_variance: 1_000.0,
            model_space: ModelSpacePrior::default(),
            coefficient_priors: Vec::new(),
            hierarchical_partitions: vec![HierarchicalPartition::default()],
            dispersion: ScalePrior::LogUniform {
                lower: -20.0,
                upper: 20.0,
            },
            cluster_sd: ScalePrior::LogUniform {
                lower: -10.0,
                upper: 10.0,
            },
            conjugate: ConjugatePrior::default(),
        }
    }
}

impl PriorConfig {
    /// # Errors
    ///
    /// Returns `RjmcmcError::InvalidPriorConfig` naming the first invalid block.
    pub fn validate(&self) -> Result<(), RjmcmcError> {
        if !(self.intercept_variance.is_finite() && self.intercept_variance > 0.0) {
            return Err(RjmcmcError::InvalidPriorConfig("intercept variance must be positive"));
        }
        if !self.model_space.is_valid() {
            return Err(RjmcmcError::InvalidPriorConfig(
                "model-space hyperparameters must be positive",
            ));
        }
        if self.coefficient_priors.iter().any(|prior| match prior {
            CoefficientPrior::Informative { sd } => !(sd.is_finite() && *sd > 0.0),
            CoefficientPrior::Hierarchical { .. } => false,
        }) {
            return Err(RjmcmcError::InvalidPriorConfig(
                "informative coefficient SDs must be positive",
            ));
        }
        if self
            .hierarchical_partitions
            .iter()
            .any(|partition| !partition.prior.is_valid() || !(partition.initial_sd > 0.0))
        {
            return Err(RjmcmcError::InvalidPriorConfig(
                "invalid hierarchical coefficient-prior partition",
            ));
        }
        if !self.dispersion.is_valid() {
            return Err(RjmcmcError::InvalidPriorConfig("invalid dispersion prior"));
        }
        if !self.cluster_sd.is_valid() {
            return Err(RjmcmcError::InvalidPriorConfig("invalid random-intercept SD prior"));
        }
        if !self.conjugate.is_valid() {
            return Err(RjmcmcError::InvalidPriorConfig("invalid conjugate hyperparameters"));
        }
        Ok(())
    }
}

/// Prior configuration resolved against the data it will be applied to.
#[derive(Debug, Clone)]
pub struct PriorModel {
    intercept_variance: f64,
    model_space: ModelSpacePrior,
    partition_sizes: Vec<usize>,
    coefficient_priors: Vec<CoefficientPrior>,
    hierarchical: Vec<HierarchicalPartition>,
    dispersion: Option<ScalePrior>,
    cluster_sd: Option<ScalePrior>,
    tau: Option<ScalePrior>,
    integrates_coefficients: bool,
}

impl PriorModel {
    /// # Errors
    ///
    /// Returns `RjmcmcError` if the configuration is invalid or does not
    /// match the data's covariates and partitions.
    pub fn new(config: &PriorConfig, data: &CovariateData) -> Result<Self, RjmcmcError> {
        config.validate()?;
        let family = data.likelihood;
        if config.model_space.partition_count() != data.partition_count() {
            return Err(RjmcmcError::ModelSpacePartitionMismatch {
                expected: data.partition_count(),
                found: config.model_space.partition_count(),
            });
        }

        let integrates_coefficients = family.integrates_coefficients();
        let (coefficient_priors, hierarchical) = if integrates_coefficients {
            (Vec::new(), Vec::new())
        } else {
            let priors = resolve_coefficient_priors(config, data.n_covariates())?;
            (priors, config.hierarchical_partitions.clone())
        };

        Ok(Self {
            intercept_variance: config.intercept_variance,
            model_space: config.model_space.clone(),
            partition_sizes: data.partition_sizes(),
            coefficient_priors,
            hierarchical,
            dispersion: family.has_dispersion().then_some(config.dispersion),
            cluster_sd: data.clusters.as_ref().map(|_| config.cluster_sd),
            tau: if integrates_coefficients {
                config.conjugate.tau_prior
            } else {
                None
            },
            integrates_coefficients,
        })
    }

    #[must_use]
    pub const fn model_space(&self) -> &ModelSpacePrior {
        &self.model_space
    }

    #[must_use]
    pub fn hierarchical_partitions(&self) -> &[HierarchicalPartition] {
        &self.hierarchical
    }

    #[must_use]
    pub fn coefficient_priors(&self) -> &[CoefficientPrior] {
        &self.coefficient_priors
    }

    /// Number of covariates with a fixed prior SD.
    #[must_use]
    pub fn informative_count(&self) -> usize {
        self.coefficient_priors
            .iter()
            .filter(|prior| matches!(prior, CoefficientPrior::Informative { .. }))
            .count()
    }

    #[must_use]
    pub const fn samples_tau(&self) -> bool {
        self.tau.is_some()
    }

    /// Log initial values of the hierarchical SDs.
    #[must_use]
    pub fn initial_hierarchical_log_sds(&self) -> Vec<f64> {
        self.hierarchical
            .iter()
            .map(|partition| partition.initial_sd.ln())
            .collect()
    }

    /// Prior variance of coefficient `covariate` at `state`.
    #[must_use]
    pub fn coefficient_variance(&self, covariate: usize, state: &ModelState) -> f64 {
        match self.coefficient_priors[covariate] {
            CoefficientPrior::Informative { sd } => sd * sd,
            CoefficientPrior::Hierarchical { partition } => {
                (2.0 * clamp_log_scale(state.hierarchical_log_sds[partition])).exp()
            }
        }
    }

    /// Sum of the model-space prior over partitions.
    #[must_use]
    pub fn log_model_space_prior(&self, partition_dimensions: &[usize]) -> f64 {
        partition_dimensions
            .iter()
            .zip(&self.partition_sizes)
            .enumerate()
            .map(|(partition, (included, size))| {
                self.model_space
                    .log_configuration_prior(partition, *included, *size)
            })
            .sum()
    }

    /// Joint log prior of every sampled quantity in `state`.
    #[must_use]
    pub fn log_prior(&self, state: &ModelState) -> f64 {
        let mut total = self.log_model_space_prior(&state.partition_dimensions);

        if !self.integrates_coefficients {
            total += log_zero_mean_normal_density(state.intercept, self.intercept_variance);
            for covariate in state.included_covariates() {
                total += log_zero_mean_normal_density(
                    state.coefficients[covariate],
                    self.coefficient_variance(covariate, state),
                );
            }
            for (partition, log_sd) in self.hierarchical.iter().zip(&state.hierarchical_log_sds) {
                total += partition.prior.log_density_of_log_sd(*log_sd);
            }
        }

        if let (Some(prior), Some(log_dispersion)) = (self.dispersion, state.log_dispersion) {
            total += prior.log_density_of_log_value(log_dispersion);
        }

        if let (Some(prior), Some(effects)) = (self.cluster_sd, &state.clusters) {
            let variance = (2.0 * clamp_log_scale(effects.log_sd)).exp();
            total += effects
                .intercepts
                .iter()
                .map(|value| log_zero_mean_normal_density(*value, variance))
                .sum::<f64>();
            total += prior.log_density_of_log_sd(effects.log_sd);
        }

        if let (Some(prior), Some(log_tau)) = (self.tau, state.log_tau) {
            total += prior.log_density_of_log_value(log_tau);
        }

        total
    }
}

fn resolve_coefficient_priors(
    config: &PriorConfig,
    covariates: usize,
) -> Result<Vec<CoefficientPrior>, RjmcmcError> {
    let priors = if config.coefficient_priors.is_empty() {
        vec![CoefficientPrior::Hierarchical { partition: 0 }; covariates]
    } else if config.coefficient_priors.len() == covariates {
        config.coefficient_priors.clone()
    } else {
        return Err(RjmcmcError::CoefficientPriorCountMismatch {
            expected: covariates,
            found: config.coefficient_priors.len(),
        });
    };

    for (covariate, prior) in priors.iter().enumerate() {
        if let CoefficientPrior::Hierarchical { partition } = prior
            && *partition >= config.hierarchical_partitions.len()
        {
            return Err(RjmcmcError::UnknownHierarchicalPartition {
                covariate,
                partition: *partition,
            });
        }
    }
    Ok(priors)
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Log-density for `Uniform(low, high)`.
#[must_use]
pub fn log_uniform_density(value: f64, low: f64, high: f64) -> f64 {
    if low.partial_cmp(&high) != Some(std::cmp::Ordering::Less) {
        return f64::NAN;
    }
    if (low..=high).contains(&value) {
        -(high - low).ln()
    } else {
        f64::NEG_INFINITY
    }
}

/// Log-density for an inverse-gamma distribution.
#[must_use]
pub fn log_inverse_gamma_density(value: f64, shape: f64, scale: f64) -> f64 {
    if !(value > 0.0 && shape > 0.0 && scale > 0.0) {
        return f64::NEG_INFINITY;
    }

    shape.mul_add(scale.ln(), -ln_gamma(shape)) - (shape + 1.0).mul_add(value.ln(), scale / value)
}

/// Inverse-gamma log-density evaluated at `exp(log_value)` without leaving log space.
#[must_use]
pub fn log_inverse_gamma_density_of_log(log_value: f64, shape: f64, scale: f64) -> f64 {
    if !(shape > 0.0 && scale > 0.0) {
        return f64::NEG_INFINITY;
    }
    let log_value = log_value.clamp(-2.0 * LOG_SCALE_LIMIT, 2.0 * LOG_SCALE_LIMIT);
    shape.mul_add(scale.ln(), -ln_gamma(shape))
        - (shape + 1.0).mul_add(log_value, scale * (-log_value).exp())
}

/// Log-density for `Normal(0, variance)`.
#[must_use]
pub fn log_zero_mean_normal_density(value: f64, variance: f64) -> f64 {
    if variance <= 0.0 {
        return f64::NEG_INFINITY;
    }
    -0.5 * (std::f64::consts::TAU.ln() + variance.ln() + value * value / variance)
}
