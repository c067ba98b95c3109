//! Core public types for the reversible-jump sampler.

use thiserror::Error;

use super::priors::PriorConfig;
use crate::inference::{InferenceError, McmcConfig, ProposalStats};
use crate::input::InputError;

/// Errors returned by sampler configuration, validation, and execution.
#[derive(Debug, Error)]
pub enum RjmcmcError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InvalidSchedule(#[from] InferenceError),
    #[error("failed to write sampler output: {0}")]
    Io(#[from] std::io::Error),
    #[error("move probabilities must be non-negative and sum to one")]
    InvalidMoveProbabilities,
    #[error("invalid proposal tuning configuration")]
    InvalidProposalTuning,
    #[error("invalid prior configuration: {0}")]
    InvalidPriorConfig(&'static str),
    #[error("model-space prior has {found} partition hyperparameters but the data declare {expected}")]
    ModelSpacePartitionMismatch { expected: usize, found: usize },
    #[error("coefficient prior list has {found} entries but the data have {expected} covariates")]
    CoefficientPriorCountMismatch { expected: usize, found: usize },
    #[error("covariate {covariate} refers to undefined hierarchical prior partition {partition}")]
    UnknownHierarchicalPartition { covariate: usize, partition: usize },
    #[error("random intercepts are not available for the {0} likelihood")]
    ClustersUnsupported(LikelihoodFamily),
    #[error("nothing to sample: no covariates can move and no continuous parameter is free")]
    NothingToSample,
    #[error("initial state has zero prior density or a non-finite likelihood")]
    InvalidInitialState,
    #[error("model scores can only be enumerated for the conjugate likelihood")]
    ModelScoresRequireConjugate,
    #[error("model scores are limited to dimension {max}; requested {requested}")]
    InvalidModelScoreDimension { requested: usize, max: usize },
}

/// Likelihood family tag carried by the covariate data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikelihoodFamily {
    /// Bernoulli outcome with logit link.
    Logistic,
    /// Right-censored survival times, Weibull proportional hazards.
    Weibull,
    /// Linear model with sampled residual variance.
    Gaussian,
    /// Linear model evaluated from cached cross-products instead of rows.
    GaussianMarginal,
    /// Normal-inverse-gamma model with coefficients and variance integrated out.
    Conjugate,
}

impl LikelihoodFamily {
    /// Label written to the results header.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Logistic => "Logistic",
            Self::Weibull => "Weibull",
            Self::Gaussian => "Gaussian",
            Self::GaussianMarginal => "GaussianMarg",
            Self::Conjugate => "GaussianConj",
        }
    }

    /// Whether the family carries a sampled log-scale dispersion parameter.
    #[must_use]
    pub const fn has_dispersion(self) -> bool {
        matches!(self, Self::Weibull | Self::Gaussian | Self::GaussianMarginal)
    }

    /// Whether coefficients are integrated out rather than sampled.
    #[must_use]
    pub const fn integrates_coefficients(self) -> bool {
        matches!(self, Self::Conjugate)
    }

    /// Whether the likelihood is evaluated row by row from a linear predictor.
    #[must_use]
    pub const fn uses_linear_predictor(self) -> bool {
        matches!(self, Self::Logistic | Self::Weibull | Self::Gaussian)
    }
}

impl std::fmt::Display for LikelihoodFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Proposal kind that produced a model state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MoveType {
    Add,
    Remove,
    Swap,
    /// Fixed-dimension random-walk update of a continuous parameter.
    #[default]
    Null,
}

impl MoveType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Remove => "Remove",
            Self::Swap => "Swap",
            Self::Null => "Null",
        }
    }
}

/// Configured probabilities of each move type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveProbabilities {
    pub add: f64,
    pub remove: f64,
    pub swap: f64,
    pub null: f64,
}

impl Default for MoveProbabilities {
    fn default() -> Self {
        Self {
            add: 0.25,
            remove: 0.25,
            swap: 0.25,
            null: 0.25,
        }
    }
}

impl MoveProbabilities {
    /// Only fixed-dimension moves.
    #[must_use]
    pub const fn null_only() -> Self {
        Self {
            add: 0.0,
            remove: 0.0,
            swap: 0.0,
            null: 1.0,
        }
    }

    /// Whether the probabilities are finite, non-negative, and sum to one.
    #[must_use]
    pub fn is_valid(self) -> bool {
        let values = [self.add, self.remove, self.swap, self.null];
        values.iter().all(|value| value.is_finite() && *value >= 0.0)
            && (values.iter().sum::<f64>() - 1.0).abs() < 1.0e-6
    }

    /// Redistribute the null-move mass over the dimension-changing moves.
    #[must_use]
    pub fn without_null(self) -> Self {
        let jump_mass = self.add + self.remove + self.swap;
        if jump_mass <= 0.0 {
            return Self {
                add: 1.0 / 3.0,
                remove: 1.0 / 3.0,
                swap: 1.0 / 3.0,
                null: 0.0,
            };
        }
        Self {
            add: self.add / jump_mass,
            remove: self.remove / jump_mass,
            swap: self.swap / jump_mass,
            null: 0.0,
        }
    }

    /// State-dependent probabilities with impossible moves removed.
    ///
    /// `included` and `free` count non-fixed covariates. If no move is
    /// possible at all the null move receives all mass.
    #[must_use]
    pub fn effective(self, included: usize, free: usize, null_available: bool) -> Self {
        let can_add = included < free;
        let can_remove = included > 0;
        let can_swap = can_add && can_remove;
        let masked = Self {
            add: if can_add { self.add } else { 0.0 },
            remove: if can_remove { self.remove } else { 0.0 },
            swap: if can_swap { self.swap } else { 0.0 },
            null: if null_available { self.null } else { 0.0 },
        };
        let total = masked.add + masked.remove + masked.swap + masked.null;
        if total <= 0.0 {
            return Self::null_only();
        }
        Self {
            add: masked.add / total,
            remove: masked.remove / total,
            swap: masked.swap / total,
            null: masked.null / total,
        }
    }

    #[must_use]
    pub const fn probability(self, move_type: MoveType) -> f64 {
        match move_type {
            MoveType::Add => self.add,
            MoveType::Remove => self.remove,
            MoveType::Swap => self.swap,
            MoveType::Null => self.null,
        }
    }

    /// Categorical draw from a uniform variate in `[0, 1)`.
    #[must_use]
    pub fn select(self, uniform: f64) -> MoveType {
        let mut cumulative = self.add;
        if uniform < cumulative {
            return MoveType::Add;
        }
        cumulative += self.remove;
        if uniform < cumulative {
            return MoveType::Remove;
        }
        cumulative += self.swap;
        if uniform < cumulative {
            return MoveType::Swap;
        }
        if self.null > 0.0 {
            return MoveType::Null;
        }
        // Rounding at the top of the unit interval lands on the last move with mass.
        if self.swap > 0.0 {
            MoveType::Swap
        } else if self.remove > 0.0 {
            MoveType::Remove
        } else {
            MoveType::Add
        }
    }
}

/// Proposal-scale initialisation and Robbins-Monro adaption controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProposalTuning {
    /// Initial random-walk and birth scale for every coefficient.
    pub initial_coefficient_scale: f64,
    /// Initial random-walk scale for the intercept.
    pub initial_intercept_scale: f64,
    /// Initial random-walk scale for log-scale nuisance parameters.
    pub initial_log_scale: f64,
    /// Initial random-walk scale for random intercepts.
    pub initial_cluster_scale: f64,
    /// Acceptance rate the adaption steers each null-move target towards.
    pub target_acceptance: f64,
    /// Step size decays as `updates^(-adaptation_decay)`.
    pub adaptation_decay: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for ProposalTuning {
    fn default() -> Self {
        Self {
            initial_coefficient_scale: 0.5,
            initial_intercept_scale: 0.5,
            initial_log_scale: 0.25,
            initial_cluster_scale: 0.25,
            target_acceptance: 0.44,
            adaptation_decay: 0.6,
            min_scale: 1.0e-4,
            max_scale: 100.0,
        }
    }
}

impl ProposalTuning {
    /// Whether proposal tuning settings are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        let scales = [
            self.initial_coefficient_scale,
            self.initial_intercept_scale,
            self.initial_log_scale,
            self.initial_cluster_scale,
        ];
        self.min_scale > 0.0
            && self.max_scale.is_finite()
            && self.min_scale < self.max_scale
            && scales
                .iter()
                .all(|scale| *scale >= self.min_scale && *scale <= self.max_scale)
            && self.target_acceptance > 0.0
            && self.target_acceptance < 1.0
            && self.adaptation_decay > 0.5
            && self.adaptation_decay <= 1.0
    }
}

/// Which covariates start in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialModel {
    /// Only the fixed covariates.
    #[default]
    NullModel,
    /// Every covariate.
    FullModel,
}

/// Full sampler configuration.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub mcmc: McmcConfig,
    pub moves: MoveProbabilities,
    pub priors: PriorConfig,
    pub tuning: ProposalTuning,
    pub initial_model: InitialModel,
    /// When disabled every covariate is included and only null moves run.
    pub variable_selection: bool,
    /// Score every model up to this dimension before sampling (conjugate only).
    pub model_scores_up_to_dim: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mcmc: McmcConfig::default(),
            moves: MoveProbabilities::default(),
            priors: PriorConfig::default(),
            tuning: ProposalTuning::default(),
            initial_model: InitialModel::default(),
            variable_selection: true,
            model_scores_up_to_dim: 0,
        }
    }
}

impl SamplerConfig {
    /// Data-independent checks; shape checks against the data happen when
    /// the prior model is resolved.
    ///
    /// # Errors
    ///
    /// Returns `RjmcmcError` if any configuration block is invalid.
    pub fn validate(&self) -> Result<(), RjmcmcError> {
        self.mcmc.validate()?;
        if !self.moves.is_valid() {
            return Err(RjmcmcError::InvalidMoveProbabilities);
        }
        if !self.tuning.is_valid() {
            return Err(RjmcmcError::InvalidProposalTuning);
        }
        self.priors.validate()?;
        Ok(())
    }
}

/// Per-move proposal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCounts {
    pub add: ProposalStats,
    pub remove: ProposalStats,
    pub swap: ProposalStats,
    pub null: ProposalStats,
}

impl MoveCounts {
    pub const fn record(&mut self, move_type: MoveType, accepted: bool) {
        match move_type {
            MoveType::Add => self.add.record(accepted),
            MoveType::Remove => self.remove.record(accepted),
            MoveType::Swap => self.swap.record(accepted),
            MoveType::Null => self.null.record(accepted),
        }
    }

    #[must_use]
    pub const fn total(self) -> usize {
        self.add.proposed + self.remove.proposed + self.swap.proposed + self.null.proposed
    }
}

/// Sampler phase, driven by the iteration count only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerPhase {
    Adapting,
    Sampling,
}

/// Output report from a sampler run.
#[derive(Debug, Clone, Default)]
pub struct SamplerReport {
    pub iterations_completed: usize,
    pub retained_draws: usize,
    /// Move counters while proposal scales were adapting.
    pub adaption: MoveCounts,
    /// Move counters after the scales were frozen.
    pub sampling: MoveCounts,
    pub final_log_likelihood: f64,
    pub final_model_dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_move_probabilities_are_valid() {
        assert!(MoveProbabilities::default().is_valid());
        assert!(
            !MoveProbabilities {
                add: 0.5,
                ..MoveProbabilities::default()
            }
            .is_valid()
        );
    }

    #[test]
    fn without_null_redistributes_proportionally() {
        let moves = MoveProbabilities {
            add: 0.2,
            remove: 0.2,
            swap: 0.1,
            null: 0.5,
        }
        .without_null();
        assert!(moves.is_valid());
        assert!((moves.add - 0.4).abs() < 1.0e-12);
        assert!((moves.swap - 0.2).abs() < 1.0e-12);
        assert!(moves.null.abs() < 1.0e-12);
    }

    #[test]
    fn effective_probabilities_drop_impossible_moves() {
        let moves = MoveProbabilities::default();
        let empty = moves.effective(0, 3, true);
        assert!(empty.remove.abs() < 1.0e-12);
        assert!(empty.swap.abs() < 1.0e-12);
        assert!((empty.add - 0.5).abs() < 1.0e-12);
        assert!((empty.null - 0.5).abs() < 1.0e-12);

        let full = moves.effective(3, 3, false);
        assert!((full.remove - 1.0).abs() < 1.0e-12);

        let stuck = moves.effective(0, 0, false);
        assert_eq!(stuck, MoveProbabilities::null_only());
    }

    #[test]
    fn select_walks_the_cumulative_distribution() {
        let moves = MoveProbabilities::default();
        assert_eq!(moves.select(0.1), MoveType::Add);
        assert_eq!(moves.select(0.3), MoveType::Remove);
        assert_eq!(moves.select(0.6), MoveType::Swap);
        assert_eq!(moves.select(0.9), MoveType::Null);
    }

    #[test]
    fn proposal_tuning_defaults_are_valid() {
        assert!(ProposalTuning::default().is_valid());
        assert!(
            !ProposalTuning {
                adaptation_decay: 0.4,
                ..ProposalTuning::default()
            }
            .is_valid()
        );
    }

    #[test]
    fn move_counts_route_by_move_type() {
        let mut counts = MoveCounts::default();
        counts.record(MoveType::Add, true);
        counts.record(MoveType::Null, false);
        counts.record(MoveType::Null, true);
        assert_eq!(counts.add.accepted, 1);
        assert_eq!(counts.null.proposed, 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn family_capabilities() {
        assert!(LikelihoodFamily::Weibull.has_dispersion());
        assert!(!LikelihoodFamily::Logistic.has_dispersion());
        assert!(LikelihoodFamily::Conjugate.integrates_coefficients());
        assert!(!LikelihoodFamily::GaussianMarginal.uses_linear_predictor());
        assert_eq!(LikelihoodFamily::Conjugate.to_string(), "GaussianConj");
    }
}
