//! Move selection, proposal generation and adaptive proposal scales.

use rand::RngExt;
use rand::rngs::StdRng;

use super::priors::log_zero_mean_normal_density;
use super::state::ModelState;
use super::types::{MoveProbabilities, MoveType, ProposalTuning};
use crate::input::CovariateData;
use crate::utils::usize_to_f64;

/// Continuous parameter perturbed by a null move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullTarget {
    /// Intercept `alpha`.
    Intercept,
    /// Coefficient of an included covariate, by column index.
    Coefficient(usize),
    /// Log Weibull shape or log Gaussian residual variance.
    Dispersion,
    /// Log prior SD of one hierarchical coefficient partition, by partition index.
    HierarchicalSd(usize),
    /// Log SD of the random intercepts.
    ClusterSd,
    /// One random intercept, chosen uniformly when the move is made.
    ClusterIntercept,
    /// Log of the conjugate coefficient variance ratio `tau`.
    LogTau,
}

/// Random-walk scale tuned by Robbins-Monro updates on the log scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveScale {
    pub log_scale: f64,
    pub updates: usize,
}

impl AdaptiveScale {
    #[must_use]
    pub fn new(scale: f64) -> Self {
        Self {
            log_scale: scale.ln(),
            updates: 0,
        }
    }

    #[must_use]
    pub fn scale(self) -> f64 {
        self.log_scale.exp()
    }

    fn adapt(&mut self, acceptance: f64, tuning: ProposalTuning) {
        self.updates += 1;
        let step = usize_to_f64(self.updates).powf(-tuning.adaptation_decay);
        self.log_scale = step
            .mul_add(acceptance - tuning.target_acceptance, self.log_scale)
            .clamp(tuning.min_scale.ln(), tuning.max_scale.ln());
    }
}

/// Proposal generator owning every adaptive scale.
#[derive(Debug, Clone)]
pub struct ProposalEngine {
    moves: MoveProbabilities,
    tuning: ProposalTuning,
    fixed_covariates: usize,
    free_covariates: usize,
    integrates_coefficients: bool,
    coefficient_scales: Vec<AdaptiveScale>,
    intercept_scale: AdaptiveScale,
    dispersion_scale: AdaptiveScale,
    hierarchical_scales: Vec<AdaptiveScale>,
    cluster_sd_scale: AdaptiveScale,
    cluster_intercept_scale: AdaptiveScale,
    tau_scale: AdaptiveScale,
    last_null_target: Option<NullTarget>,
}

impl ProposalEngine {
    /// `moves` should already reflect whether variable selection and null
    /// moves are enabled for this run.
    #[must_use]
    pub fn new(
        data: &CovariateData,
        moves: MoveProbabilities,
        tuning: ProposalTuning,
        hierarchical_partitions: usize,
    ) -> Self {
        Self {
            moves,
            tuning,
            fixed_covariates: data.fixed_covariates,
            free_covariates: data.free_covariates(),
            integrates_coefficients: data.likelihood.integrates_coefficients(),
            coefficient_scales: vec![
                AdaptiveScale::new(tuning.initial_coefficient_scale);
                data.n_covariates()
            ],
            intercept_scale: AdaptiveScale::new(tuning.initial_intercept_scale),
            dispersion_scale: AdaptiveScale::new(tuning.initial_log_scale),
            hierarchical_scales: vec![
                AdaptiveScale::new(tuning.initial_log_scale);
                hierarchical_partitions
            ],
            cluster_sd_scale: AdaptiveScale::new(tuning.initial_log_scale),
            cluster_intercept_scale: AdaptiveScale::new(tuning.initial_cluster_scale),
            tau_scale: AdaptiveScale::new(tuning.initial_log_scale),
            last_null_target: None,
        }
    }

    #[must_use]
    pub const fn moves(&self) -> MoveProbabilities {
        self.moves
    }

    /// Continuous parameters a null move may perturb at `state`.
    #[must_use]
    pub fn null_targets(&self, state: &ModelState) -> Vec<NullTarget> {
        let mut targets = Vec::new();
        if !self.integrates_coefficients {
            targets.push(NullTarget::Intercept);
            targets.extend(
                state
                    .included_covariates()
                    .into_iter()
                    .map(NullTarget::Coefficient),
            );
            targets.extend((0..state.hierarchical_log_sds.len()).map(NullTarget::HierarchicalSd));
        }
        if state.log_dispersion.is_some() {
            targets.push(NullTarget::Dispersion);
        }
        if state.clusters.is_some() {
            targets.push(NullTarget::ClusterSd);
            targets.push(NullTarget::ClusterIntercept);
        }
        if state.log_tau.is_some() {
            targets.push(NullTarget::LogTau);
        }
        targets
    }

    /// Move probabilities at `state` with impossible moves removed.
    #[must_use]
    pub fn effective_moves(&self, state: &ModelState) -> MoveProbabilities {
        self.moves.effective(
            state.model_dimension,
            self.free_covariates,
            !self.null_targets(state).is_empty(),
        )
    }

    /// Current scale of a null-move target.
    #[must_use]
    pub fn scale(&self, target: NullTarget) -> f64 {
        match target {
            NullTarget::Intercept => self.intercept_scale,
            NullTarget::Coefficient(covariate) => self.coefficient_scales[covariate],
            NullTarget::Dispersion => self.dispersion_scale,
            NullTarget::HierarchicalSd(partition) => self.hierarchical_scales[partition],
            NullTarget::ClusterSd => self.cluster_sd_scale,
            NullTarget::ClusterIntercept => self.cluster_intercept_scale,
            NullTarget::LogTau => self.tau_scale,
        }
        .scale()
    }

    #[must_use]
    pub const fn last_null_target(&self) -> Option<NullTarget> {
        self.last_null_target
    }

    /// Mutate `prop`, which must equal `curr` on entry, and return the log
    /// proposal ratio `log q(curr | prop) - log q(prop | curr)`.
    pub fn propose(
        &mut self,
        curr: &ModelState,
        prop: &mut ModelState,
        data: &CovariateData,
        rng: &mut StdRng,
    ) -> f64 {
        let current_moves = self.effective_moves(curr);
        let move_type = current_moves.select(rng.random::<f64>());
        prop.move_type = move_type;
        self.last_null_target = None;
        match move_type {
            MoveType::Add => self.propose_add(curr, prop, data, current_moves, rng),
            MoveType::Remove => self.propose_remove(curr, prop, data, current_moves, rng),
            MoveType::Swap => self.propose_swap(curr, prop, data, rng),
            MoveType::Null => self.propose_null(curr, prop, data, rng),
        }
    }

    /// Robbins-Monro update of the scale used by the last null move.
    pub fn adapt(&mut self, acceptance_probability: f64) {
        let Some(target) = self.last_null_target else {
            return;
        };
        let tuning = self.tuning;
        let scale = match target {
            NullTarget::Intercept => &mut self.intercept_scale,
            NullTarget::Coefficient(covariate) => &mut self.coefficient_scales[covariate],
            NullTarget::Dispersion => &mut self.dispersion_scale,
            NullTarget::HierarchicalSd(partition) => &mut self.hierarchical_scales[partition],
            NullTarget::ClusterSd => &mut self.cluster_sd_scale,
            NullTarget::ClusterIntercept => &mut self.cluster_intercept_scale,
            NullTarget::LogTau => &mut self.tau_scale,
        };
        scale.adapt(acceptance_probability, tuning);
    }

    fn log_birth_density(&self, covariate: usize, value: f64) -> f64 {
        if self.integrates_coefficients {
            return 0.0;
        }
        let scale = self.coefficient_scales[covariate].scale();
        log_zero_mean_normal_density(value, scale * scale)
    }

    fn draw_birth_value(&self, covariate: usize, rng: &mut StdRng) -> f64 {
        if self.integrates_coefficients {
            return 0.0;
        }
        self.coefficient_scales[covariate].scale() * sample_standard_normal(rng)
    }

    fn propose_add(
        &self,
        curr: &ModelState,
        prop: &mut ModelState,
        data: &CovariateData,
        current_moves: MoveProbabilities,
        rng: &mut StdRng,
    ) -> f64 {
        let addable = curr.addable_covariates(self.fixed_covariates);
        let covariate = addable[rng.random_range(0..addable.len())];
        let value = self.draw_birth_value(covariate, rng);
        prop.include(covariate, value, data);

        let reverse_moves = self.effective_moves(prop);
        let forward = current_moves.probability(MoveType::Add).ln()
            - usize_to_f64(addable.len()).ln()
            + self.log_birth_density(covariate, value);
        let reverse = reverse_moves.probability(MoveType::Remove).ln()
            - usize_to_f64(prop.model_dimension).ln();
        reverse - forward
    }

    fn propose_remove(
        &self,
        curr: &ModelState,
        prop: &mut ModelState,
        data: &CovariateData,
        current_moves: MoveProbabilities,
        rng: &mut StdRng,
    ) -> f64 {
        let removable = curr.removable_covariates(self.fixed_covariates);
        let covariate = removable[rng.random_range(0..removable.len())];
        let value = curr.coefficients[covariate];
        prop.exclude(covariate, data);

        let reverse_moves = self.effective_moves(prop);
        let addable_after = self.free_covariates - prop.model_dimension;
        let forward = current_moves.probability(MoveType::Remove).ln()
            - usize_to_f64(removable.len()).ln();
        let reverse = reverse_moves.probability(MoveType::Add).ln()
            - usize_to_f64(addable_after).ln()
            + self.log_birth_density(covariate, value);
        reverse - forward
    }

    fn propose_swap(
        &self,
        curr: &ModelState,
        prop: &mut ModelState,
        data: &CovariateData,
        rng: &mut StdRng,
    ) -> f64 {
        let removable = curr.removable_covariates(self.fixed_covariates);
        let addable = curr.addable_covariates(self.fixed_covariates);
        let leaving = removable[rng.random_range(0..removable.len())];
        let entering = addable[rng.random_range(0..addable.len())];
        let old_value = curr.coefficients[leaving];
        let new_value = self.draw_birth_value(entering, rng);
        prop.exclude(leaving, data);
        prop.include(entering, new_value, data);
        self.log_birth_density(leaving, old_value) - self.log_birth_density(entering, new_value)
    }

    fn propose_null(
        &mut self,
        curr: &ModelState,
        prop: &mut ModelState,
        data: &CovariateData,
        rng: &mut StdRng,
    ) -> f64 {
        let targets = self.null_targets(curr);
        if targets.is_empty() {
            return 0.0;
        }
        let target = targets[rng.random_range(0..targets.len())];
        let step = self.scale(target) * sample_standard_normal(rng);
        match target {
            NullTarget::Intercept => prop.set_intercept(curr.intercept + step),
            NullTarget::Coefficient(covariate) => {
                prop.set_coefficient(covariate, curr.coefficients[covariate] + step, data);
            }
            NullTarget::Dispersion => {
                prop.log_dispersion = curr.log_dispersion.map(|value| value + step);
            }
            NullTarget::HierarchicalSd(partition) => {
                prop.hierarchical_log_sds[partition] = curr.hierarchical_log_sds[partition] + step;
            }
            NullTarget::ClusterSd => {
                if let Some(effects) = prop.clusters.as_mut() {
                    effects.log_sd += step;
                }
            }
            NullTarget::ClusterIntercept => {
                if let Some(effects) = &curr.clusters {
                    let cluster = rng.random_range(0..effects.intercepts.len());
                    prop.set_cluster_intercept(cluster, effects.intercepts[cluster] + step, data);
                }
            }
            NullTarget::LogTau => {
                prop.log_tau = curr.log_tau.map(|value| value + step);
            }
        }
        self.last_null_target = Some(target);
        0.0
    }
}

/// Metropolis-Hastings acceptance probability from a log ratio; `NaN` maps to zero.
#[must_use]
pub fn acceptance_probability(log_ratio: f64) -> f64 {
    if log_ratio.is_nan() {
        0.0
    } else {
        log_ratio.min(0.0).exp()
    }
}

pub(crate) fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rjmcmc::state::ClusterEffects;
    use crate::models::rjmcmc::types::LikelihoodFamily;
    use faer::Mat;
    use rand::SeedableRng;

    fn basic_data() -> CovariateData {
        CovariateData::new(
            Mat::from_fn(6, 4, |i, j| f64::from(u32::try_from((i + j) % 3).unwrap_or(0))),
            Mat::from_fn(6, 1, |i, _| f64::from(u32::try_from(i % 2).unwrap_or(0))),
            LikelihoodFamily::Logistic,
        )
        .with_fixed_covariates(1)
        .with_cluster_ids(&[1, 1, 2, 2, 3, 3])
    }

    fn basic_state(data: &CovariateData) -> ModelState {
        let mut state = ModelState::new(data, vec![true, false, false, false], true);
        state.hierarchical_log_sds = vec![0.5_f64.ln()];
        state.clusters = Some(ClusterEffects {
            intercepts: vec![0.0; 3],
            log_sd: 0.0,
        });
        state
    }

    #[test]
    fn acceptance_probability_is_bounded() {
        assert!((acceptance_probability(3.0) - 1.0).abs() < f64::EPSILON);
        assert!(acceptance_probability(f64::NEG_INFINITY).abs() < f64::EPSILON);
        assert!(acceptance_probability(f64::NAN).abs() < f64::EPSILON);
        assert!((acceptance_probability(-1.0) - (-1.0_f64).exp()).abs() < 1.0e-12);
    }

    #[test]
    fn null_targets_cover_sampled_parameters() {
        let data = basic_data();
        let engine =
            ProposalEngine::new(&data, MoveProbabilities::default(), ProposalTuning::default(), 1);
        let targets = engine.null_targets(&basic_state(&data));
        assert_eq!(
            targets,
            vec![
                NullTarget::Intercept,
                NullTarget::Coefficient(0),
                NullTarget::HierarchicalSd(0),
                NullTarget::ClusterSd,
                NullTarget::ClusterIntercept,
            ]
        );
    }

    #[test]
    fn add_then_remove_ratios_cancel() {
        let data = basic_data();
        let mut engine = ProposalEngine::new(
            &data,
            MoveProbabilities {
                add: 0.5,
                remove: 0.5,
                swap: 0.0,
                null: 0.0,
            },
            ProposalTuning::default(),
            1,
        );
        let mut rng = StdRng::seed_from_u64(3);
        let curr = basic_state(&data);
        let mut prop = curr.clone();
        // From the null model only an add is possible.
        let forward = engine.propose(&curr, &mut prop, &data, &mut rng);
        assert_eq!(prop.move_type, MoveType::Add);
        assert_eq!(prop.model_dimension, 1);

        let added = prop.removable_covariates(1)[0];
        let mut back = prop.clone();
        let moves = engine.effective_moves(&prop);
        let reverse = engine.propose_remove(&prop, &mut back, &data, moves, &mut rng);
        assert!(!back.inclusion[added]);
        assert!((forward + reverse).abs() < 1.0e-12);
    }

    #[test]
    fn fixed_covariates_never_move() {
        let data = basic_data();
        let mut engine =
            ProposalEngine::new(&data, MoveProbabilities::default(), ProposalTuning::default(), 1);
        let mut rng = StdRng::seed_from_u64(11);
        let mut curr = basic_state(&data);
        let mut prop = curr.clone();
        for _ in 0..500 {
            let _ = engine.propose(&curr, &mut prop, &data, &mut rng);
            assert!(prop.inclusion[0]);
            assert_eq!(
                prop.model_dimension,
                prop.inclusion[1..].iter().filter(|included| **included).count()
            );
            curr.clone_from(&prop);
        }
    }

    #[test]
    fn adaption_only_touches_the_last_null_target() {
        let data = basic_data();
        let mut engine =
            ProposalEngine::new(&data, MoveProbabilities::null_only(), ProposalTuning::default(), 1);
        let mut rng = StdRng::seed_from_u64(5);
        let curr = basic_state(&data);
        let mut prop = curr.clone();
        let _ = engine.propose(&curr, &mut prop, &data, &mut rng);
        let target = engine.last_null_target().expect("null move was proposed");
        let others = engine
            .null_targets(&curr)
            .into_iter()
            .filter(|other| *other != target)
            .map(|other| (other, engine.scale(other)))
            .collect::<Vec<_>>();
        let before = engine.scale(target);
        engine.adapt(1.0);
        assert!(engine.scale(target) > before);
        for (other, scale) in others {
            assert!((engine.scale(other) - scale).abs() < 1.0e-12);
        }
    }

    #[test]
    fn adaptive_scale_respects_bounds() {
        let tuning = ProposalTuning::default();
        let mut scale = AdaptiveScale::new(tuning.max_scale);
        scale.adapt(1.0, tuning);
        assert!((scale.scale() - tuning.max_scale).abs() < 1.0e-9);
        let mut scale = AdaptiveScale::new(tuning.min_scale);
        scale.adapt(0.0, tuning);
        assert!((scale.scale() - tuning.min_scale).abs() < 1.0e-12);
    }
}
