//! Exhaustive scoring of small models under the conjugate likelihood.

use tracing::debug;

use super::output::ModelScore;
use super::priors::ConjugatePrior;
use super::sufficient::log_marginal_likelihood_direct;
use super::types::{LikelihoodFamily, RjmcmcError};
use crate::input::CovariateData;

/// Largest model dimension that can be enumerated.
pub const MAX_SCORED_DIMENSION: usize = 4;

/// Marginal likelihood of the null model and of every model with between one
/// and `max_dimension` non-fixed covariates.
///
/// Scores are ordered by dimension and then lexicographically by covariate
/// index. Fixed covariates are included in every scored model.
///
/// # Errors
///
/// Returns `RjmcmcError` if the data are not conjugate or `max_dimension`
/// exceeds [`MAX_SCORED_DIMENSION`].
pub fn score_models_up_to(
    data: &CovariateData,
    prior: ConjugatePrior,
    tau: f64,
    max_dimension: usize,
) -> Result<Vec<ModelScore>, RjmcmcError> {
    if data.likelihood != LikelihoodFamily::Conjugate {
        return Err(RjmcmcError::ModelScoresRequireConjugate);
    }
    if max_dimension > MAX_SCORED_DIMENSION {
        return Err(RjmcmcError::InvalidModelScoreDimension {
            requested: max_dimension,
            max: MAX_SCORED_DIMENSION,
        });
    }
    if max_dimension == 0 {
        return Ok(Vec::new());
    }

    let fixed = data.fixed_covariates;
    let mut inclusion = vec![false; data.n_covariates()];
    inclusion[..fixed].fill(true);

    let mut scores = vec![ModelScore {
        covariates: Vec::new(),
        log_likelihood: log_marginal_likelihood_direct(data, &inclusion, prior, tau),
    }];

    let free = data.free_covariates();
    for dimension in 1..=max_dimension.min(free) {
        let mut combination = (0..dimension).collect::<Vec<_>>();
        loop {
            for offset in &combination {
                inclusion[fixed + offset] = true;
            }
            scores.push(ModelScore {
                covariates: combination
                    .iter()
                    .map(|offset| data.covariate_names[fixed + offset].clone())
                    .collect(),
                log_likelihood: log_marginal_likelihood_direct(data, &inclusion, prior, tau),
            });
            for offset in &combination {
                inclusion[fixed + offset] = false;
            }
            if !advance_combination(&mut combination, free) {
                break;
            }
        }
        debug!(dimension, models = scores.len(), "scored all models of dimension");
    }
    Ok(scores)
}

/// Step to the next `k`-subset of `0..n` in lexicographic order.
fn advance_combination(combination: &mut [usize], n: usize) -> bool {
    let k = combination.len();
    for position in (0..k).rev() {
        if combination[position] < n - k + position {
            combination[position] += 1;
            for next in position + 1..k {
                combination[next] = combination[next - 1] + 1;
            }
            return true;
        }
    }
    false
}
