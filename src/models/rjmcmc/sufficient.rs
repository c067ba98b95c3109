//! Cached cross-products for Gaussian likelihoods and the conjugate marginal.

use faer::Mat;
use statrs::function::gamma::ln_gamma;

use super::priors::ConjugatePrior;
use crate::input::CovariateData;
use crate::models::matrix_ops::{select_square, select_values};
use crate::utils::{
    cholesky_solve, cholesky_with_jitter, dot, log_determinant_from_cholesky, usize_to_f64,
};

/// Cross-products of `Z = [1, X]` with itself and with the outcome.
///
/// Index 0 of `gram` and `zty` is the intercept column.
#[derive(Debug, Clone)]
pub struct SufficientStatistics {
    gram: Mat<f64>,
    zty: Vec<f64>,
    yty: f64,
    n_observations: usize,
}

impl SufficientStatistics {
    #[must_use]
    pub fn from_data(data: &CovariateData) -> Self {
        let n = data.n_observations();
        let columns = data.n_covariates() + 1;
        let design = augmented_design(data, &(0..columns).collect::<Vec<_>>());
        let gram = design.transpose() * &design;
        let zty = (0..columns)
            .map(|col| (0..n).map(|row| design[(row, col)] * data.outcome[(row, 0)]).sum())
            .collect();
        let yty = (0..n).map(|row| data.outcome[(row, 0)].powi(2)).sum();
        Self {
            gram,
            zty,
            yty,
            n_observations: n,
        }
    }

    #[must_use]
    pub const fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// Gram-matrix indices of the intercept and every included covariate.
    #[must_use]
    pub fn active_indices(inclusion: &[bool]) -> Vec<usize> {
        std::iter::once(0)
            .chain(
                inclusion
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, included)| included.then_some(idx + 1)),
            )
            .collect()
    }

    /// Residual sum of squares at intercept `intercept` and `coefficients`,
    /// using only the included columns.
    #[must_use]
    pub fn residual_sum_of_squares(
        &self,
        inclusion: &[bool],
        intercept: f64,
        coefficients: &[f64],
    ) -> f64 {
        let active = Self::active_indices(inclusion);
        let beta = active
            .iter()
            .map(|idx| if *idx == 0 { intercept } else { coefficients[idx - 1] })
            .collect::<Vec<_>>();
        let mut quadratic = 0.0;
        for (a, row) in active.iter().enumerate() {
            for (b, col) in active.iter().enumerate() {
                quadratic += beta[a] * self.gram[(*row, *col)] * beta[b];
            }
        }
        let cross = dot(&beta, &select_values(&self.zty, &active));
        2.0f64.mul_add(-cross, self.yty + quadratic).max(0.0)
    }
}

/// Normal-inverse-gamma model with coefficients and residual variance
/// integrated out.
#[derive(Debug, Clone)]
pub struct ConjugateModel {
    statistics: SufficientStatistics,
    prior: ConjugatePrior,
}

/// Marginal likelihood together with the conditional posterior mean.
#[derive(Debug, Clone, PartialEq)]
pub struct ConjugateFit {
    pub log_marginal_likelihood: f64,
    /// Posterior mean of `[alpha, beta_included...]`.
    pub posterior_mean: Vec<f64>,
}

impl ConjugateModel {
    #[must_use]
    pub fn new(data: &CovariateData, prior: ConjugatePrior) -> Self {
        Self {
            statistics: SufficientStatistics::from_data(data),
            prior,
        }
    }

    #[must_use]
    pub const fn prior(&self) -> ConjugatePrior {
        self.prior
    }

    #[must_use]
    pub fn log_marginal_likelihood(&self, inclusion: &[bool], tau: f64) -> f64 {
        self.fit(inclusion, tau).log_marginal_likelihood
    }

    /// Marginal likelihood from the cached Gram matrix.
    #[must_use]
    pub fn fit(&self, inclusion: &[bool], tau: f64) -> ConjugateFit {
        let active = SufficientStatistics::active_indices(inclusion);
        conjugate_fit(
            &select_square(&self.statistics.gram, &active),
            &select_values(&self.statistics.zty, &active),
            self.statistics.yty,
            self.statistics.n_observations,
            self.prior,
            tau,
        )
    }
}

/// Marginal likelihood with `Z'Z` rebuilt from the rows of `data`.
#[must_use]
pub fn log_marginal_likelihood_direct(
    data: &CovariateData,
    inclusion: &[bool],
    prior: ConjugatePrior,
    tau: f64,
) -> f64 {
    let active = SufficientStatistics::active_indices(inclusion);
    let design = augmented_design(data, &active);
    let gram = design.transpose() * &design;
    let n = data.n_observations();
    let zty = (0..active.len())
        .map(|col| (0..n).map(|row| design[(row, col)] * data.outcome[(row, 0)]).sum())
        .collect::<Vec<f64>>();
    let yty = (0..n).map(|row| data.outcome[(row, 0)].powi(2)).sum();
    conjugate_fit(&gram, &zty, yty, n, prior, tau).log_marginal_likelihood
}

fn conjugate_fit(
    gram: &Mat<f64>,
    zty: &[f64],
    yty: f64,
    n_observations: usize,
    prior: ConjugatePrior,
    tau: f64,
) -> ConjugateFit {
    let dim = gram.nrows();
    let precision_diagonal = (0..dim)
        .map(|idx| {
            if idx == 0 {
                1.0 / prior.intercept_variance_ratio
            } else {
                1.0 / tau
            }
        })
        .collect::<Vec<_>>();
    let posterior_precision = Mat::from_fn(dim, dim, |row, col| {
        if row == col {
            gram[(row, col)] + precision_diagonal[row]
        } else {
            gram[(row, col)]
        }
    });

    let Some(lower) = cholesky_with_jitter(&posterior_precision) else {
        return ConjugateFit {
            log_marginal_likelihood: f64::NEG_INFINITY,
            posterior_mean: vec![0.0; dim],
        };
    };
    let posterior_mean = cholesky_solve(&lower, zty);
    let residual = (yty - dot(zty, &posterior_mean)).max(0.0);

    let n = usize_to_f64(n_observations);
    let a = prior.residual_shape;
    let b = prior.residual_scale;
    let log_prior_precision = precision_diagonal.iter().map(|value| value.ln()).sum::<f64>();
    let log_marginal_likelihood = -0.5 * n * std::f64::consts::TAU.ln()
        + 0.5 * log_prior_precision
        - 0.5 * log_determinant_from_cholesky(&lower)
        + a.mul_add(b.ln(), -ln_gamma(a))
        + ln_gamma(0.5f64.mul_add(n, a))
        - 0.5f64.mul_add(n, a) * 0.5f64.mul_add(residual, b).ln();

    ConjugateFit {
        log_marginal_likelihood,
        posterior_mean,
    }
}

/// `[1, X_active]` where `active` uses Gram indexing (0 is the intercept).
fn augmented_design(data: &CovariateData, active: &[usize]) -> Mat<f64> {
    Mat::from_fn(data.n_observations(), active.len(), |row, col| {
        if active[col] == 0 {
            1.0
        } else {
            data.design_matrix[(row, active[col] - 1)]
        }
    })
}
