//! Mutable sampler state shared by the current and proposed positions.

use super::types::MoveType;
use crate::input::CovariateData;

/// Random intercepts and their log standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterEffects {
    pub intercepts: Vec<f64>,
    pub log_sd: f64,
}

/// One position of the chain.
///
/// Coefficients of excluded covariates are held at zero. `model_dimension`
/// and `partition_dimensions` are derived from `inclusion` after every
/// structural change and never edited directly. For row-wise likelihoods
/// `linear_predictor` caches `alpha + X beta + u` and is updated in place by
/// the mutation helpers; it is empty for sufficient-statistic families.
#[derive(Debug, PartialEq)]
pub struct ModelState {
    pub inclusion: Vec<bool>,
    pub model_dimension: usize,
    pub partition_dimensions: Vec<usize>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub log_dispersion: Option<f64>,
    pub hierarchical_log_sds: Vec<f64>,
    pub clusters: Option<ClusterEffects>,
    pub log_tau: Option<f64>,
    pub linear_predictor: Vec<f64>,
    pub log_likelihood: f64,
    pub log_prior: f64,
    pub acceptance_probability: f64,
    pub proposal_accepted: bool,
    pub move_type: MoveType,
}

impl Clone for ModelState {
    fn clone(&self) -> Self {
        Self {
            inclusion: self.inclusion.clone(),
            model_dimension: self.model_dimension,
            partition_dimensions: self.partition_dimensions.clone(),
            intercept: self.intercept,
            coefficients: self.coefficients.clone(),
            log_dispersion: self.log_dispersion,
            hierarchical_log_sds: self.hierarchical_log_sds.clone(),
            clusters: self.clusters.clone(),
            log_tau: self.log_tau,
            linear_predictor: self.linear_predictor.clone(),
            log_likelihood: self.log_likelihood,
            log_prior: self.log_prior,
            acceptance_probability: self.acceptance_probability,
            proposal_accepted: self.proposal_accepted,
            move_type: self.move_type,
        }
    }

    // Copies into the existing buffers; called twice per iteration.
    fn clone_from(&mut self, source: &Self) {
        self.inclusion.clone_from(&source.inclusion);
        self.model_dimension = source.model_dimension;
        self.partition_dimensions
            .clone_from(&source.partition_dimensions);
        self.intercept = source.intercept;
        self.coefficients.clone_from(&source.coefficients);
        self.log_dispersion = source.log_dispersion;
        self.hierarchical_log_sds
            .clone_from(&source.hierarchical_log_sds);
        match (&mut self.clusters, &source.clusters) {
            (Some(target), Some(origin)) => {
                target.intercepts.clone_from(&origin.intercepts);
                target.log_sd = origin.log_sd;
            }
            (target, origin) => target.clone_from(origin),
        }
        self.log_tau = source.log_tau;
        self.linear_predictor.clone_from(&source.linear_predictor);
        self.log_likelihood = source.log_likelihood;
        self.log_prior = source.log_prior;
        self.acceptance_probability = source.acceptance_probability;
        self.proposal_accepted = source.proposal_accepted;
        self.move_type = source.move_type;
    }
}

impl ModelState {
    /// State with the given inclusion pattern and every continuous value at zero.
    ///
    /// The linear-predictor cache is allocated only when `track_linear_predictor`
    /// is set.
    #[must_use]
    pub fn new(data: &CovariateData, inclusion: Vec<bool>, track_linear_predictor: bool) -> Self {
        let linear_predictor = if track_linear_predictor {
            vec![0.0; data.n_observations()]
        } else {
            Vec::new()
        };
        let mut state = Self {
            coefficients: vec![0.0; inclusion.len()],
            inclusion,
            model_dimension: 0,
            partition_dimensions: vec![0; data.partition_count()],
            intercept: 0.0,
            log_dispersion: None,
            hierarchical_log_sds: Vec::new(),
            clusters: None,
            log_tau: None,
            linear_predictor,
            log_likelihood: f64::NEG_INFINITY,
            log_prior: f64::NEG_INFINITY,
            acceptance_probability: 0.0,
            proposal_accepted: false,
            move_type: MoveType::Null,
        };
        state.refresh_dimensions(data);
        state
    }

    #[must_use]
    pub const fn tracks_linear_predictor(&self) -> bool {
        !self.linear_predictor.is_empty()
    }

    /// Indices of every included covariate, fixed ones first.
    #[must_use]
    pub fn included_covariates(&self) -> Vec<usize> {
        self.inclusion
            .iter()
            .enumerate()
            .filter_map(|(idx, included)| included.then_some(idx))
            .collect()
    }

    /// Included covariates that may be removed.
    #[must_use]
    pub fn removable_covariates(&self, fixed_covariates: usize) -> Vec<usize> {
        (fixed_covariates..self.inclusion.len())
            .filter(|idx| self.inclusion[*idx])
            .collect()
    }

    /// Excluded covariates that may be added.
    #[must_use]
    pub fn addable_covariates(&self, fixed_covariates: usize) -> Vec<usize> {
        (fixed_covariates..self.inclusion.len())
            .filter(|idx| !self.inclusion[*idx])
            .collect()
    }

    /// Recompute `model_dimension` and `partition_dimensions` from `inclusion`.
    pub fn refresh_dimensions(&mut self, data: &CovariateData) {
        self.partition_dimensions.fill(0);
        self.model_dimension = 0;
        for covariate in data.fixed_covariates..self.inclusion.len() {
            if self.inclusion[covariate] {
                self.model_dimension += 1;
                self.partition_dimensions[data.partition_index(covariate)] += 1;
            }
        }
    }

    pub fn include(&mut self, covariate: usize, value: f64, data: &CovariateData) {
        self.inclusion[covariate] = true;
        self.set_coefficient(covariate, value, data);
        self.refresh_dimensions(data);
    }

    pub fn exclude(&mut self, covariate: usize, data: &CovariateData) {
        self.set_coefficient(covariate, 0.0, data);
        self.inclusion[covariate] = false;
        self.refresh_dimensions(data);
    }

    pub fn set_coefficient(&mut self, covariate: usize, value: f64, data: &CovariateData) {
        let delta = value - self.coefficients[covariate];
        self.coefficients[covariate] = value;
        if self.tracks_linear_predictor() && delta != 0.0 {
            for (row, eta) in self.linear_predictor.iter_mut().enumerate() {
                *eta += delta * data.design_matrix[(row, covariate)];
            }
        }
    }

    pub fn set_intercept(&mut self, value: f64) {
        let delta = value - self.intercept;
        self.intercept = value;
        for eta in &mut self.linear_predictor {
            *eta += delta;
        }
    }

    /// Set one random intercept; a no-op when the state has no clusters.
    pub fn set_cluster_intercept(&mut self, cluster: usize, value: f64, data: &CovariateData) {
        let Some(effects) = self.clusters.as_mut() else {
            return;
        };
        let delta = value - effects.intercepts[cluster];
        effects.intercepts[cluster] = value;
        if self.linear_predictor.is_empty() {
            return;
        }
        if let Some(index) = data.clusters.as_ref() {
            for row in index.rows(cluster) {
                self.linear_predictor[*row] += delta;
            }
        }
    }

    /// Rebuild the linear-predictor cache from scratch.
    pub fn recompute_linear_predictor(&mut self, data: &CovariateData) {
        if !self.tracks_linear_predictor() {
            return;
        }
        let included = self.included_covariates();
        for (row, eta) in self.linear_predictor.iter_mut().enumerate() {
            let mut value = self.intercept;
            for covariate in &included {
                value += data.design_matrix[(row, *covariate)] * self.coefficients[*covariate];
            }
            if let (Some(effects), Some(index)) = (&self.clusters, &data.clusters) {
                value += effects.intercepts[index.cluster_of(row)];
            }
            *eta = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rjmcmc::types::LikelihoodFamily;
    use approx::assert_relative_eq;
    use faer::Mat;

    fn basic_data() -> CovariateData {
        CovariateData::new(
            Mat::from_fn(4, 3, |i, j| match j {
                0 => 1.0,
                1 => if i % 2 == 0 { 1.0 } else { -1.0 },
                _ => f64::from(u32::try_from(i).unwrap_or(0)),
            }),
            Mat::from_fn(4, 1, |i, _| f64::from(u32::try_from(i).unwrap_or(0))),
            LikelihoodFamily::Gaussian,
        )
        .with_fixed_covariates(1)
        .with_partition_splits(vec![2])
        .with_cluster_ids(&[1, 1, 2, 2])
    }

    #[test]
    fn dimensions_follow_inclusion() {
        let data = basic_data();
        let mut state = ModelState::new(&data, vec![true, false, false], true);
        assert_eq!(state.model_dimension, 0);
        state.include(2, 0.5, &data);
        assert_eq!(state.model_dimension, 1);
        assert_eq!(state.partition_dimensions, vec![0, 1]);
        state.include(1, -0.5, &data);
        assert_eq!(state.partition_dimensions, vec![1, 1]);
        state.exclude(2, &data);
        assert_eq!(state.model_dimension, 1);
        assert_eq!(state.removable_covariates(1), vec![1]);
        assert_eq!(state.addable_covariates(1), vec![2]);
    }

    #[test]
    fn incremental_linear_predictor_matches_recompute() {
        let data = basic_data();
        let mut state = ModelState::new(&data, vec![true, false, false], true);
        state.clusters = Some(ClusterEffects {
            intercepts: vec![0.0, 0.0],
            log_sd: 0.0,
        });
        state.set_intercept(0.3);
        state.set_coefficient(0, 1.5, &data);
        state.include(2, -0.25, &data);
        state.set_cluster_intercept(1, 0.7, &data);
        state.include(1, 2.0, &data);
        state.exclude(1, &data);

        let incremental = state.linear_predictor.clone();
        state.recompute_linear_predictor(&data);
        for (lhs, rhs) in incremental.iter().zip(&state.linear_predictor) {
            assert_relative_eq!(*lhs, *rhs, epsilon = 1.0e-12);
        }
        assert_relative_eq!(state.linear_predictor[3], 0.3 + 1.5 - 0.75 + 0.7, epsilon = 1.0e-12);
    }

    #[test]
    fn clone_from_copies_every_field() {
        let data = basic_data();
        let mut source = ModelState::new(&data, vec![true, true, false], true);
        source.include(2, 1.0, &data);
        source.log_dispersion = Some(0.2);
        source.clusters = Some(ClusterEffects {
            intercepts: vec![0.1, -0.1],
            log_sd: -1.0,
        });
        source.move_type = MoveType::Swap;
        let mut target = ModelState::new(&data, vec![true, false, false], true);
        target.clone_from(&source);
        assert_eq!(target, source);
    }

    #[test]
    fn untracked_state_has_empty_cache() {
        let data = basic_data();
        let mut state = ModelState::new(&data, vec![true, false, false], false);
        state.set_intercept(1.0);
        state.include(1, 1.0, &data);
        assert!(state.linear_predictor.is_empty());
        assert!(!state.tracks_linear_predictor());
    }
}
