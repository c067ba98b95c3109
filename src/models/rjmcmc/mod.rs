//! Reversible-jump Metropolis-Hastings variable selection for GLMs.
//!
//! A single chain explores both the set of included covariates and the
//! continuous parameters of the active model. Supported families are
//! logistic, Weibull (right-censored), Gaussian, Gaussian evaluated from
//! cached sufficient statistics, and the fully conjugate Gaussian model in
//! which the regression coefficients and residual variance are integrated
//! out.
//!
//! Retained draws are streamed to a [`SampleSink`]: either the in-memory
//! [`PosteriorSamples`] or the whitespace-delimited [`TextResultsWriter`].

pub mod diagnostics;
pub mod enumeration;
pub mod likelihood;
pub mod output;
pub mod posterior;
pub mod priors;
pub mod proposal;
pub mod sampler;
pub mod state;
pub mod sufficient;
pub mod types;

pub use diagnostics::{autocorrelation, effective_sample_size, render_acceptance_table};
pub use enumeration::{MAX_SCORED_DIMENSION, score_models_up_to};
pub use likelihood::LikelihoodModel;
pub use output::{ModelScore, ResultsHeader, SampleSink, TextResultsWriter, column_names};
pub use posterior::{
    CovariateSummary, ParameterSummary, PosteriorDraw, PosteriorSamples, PosteriorSummary,
    render_posterior_table, summarize_posterior,
};
pub use priors::{
    CoefficientPrior, ConjugatePrior, HierarchicalPartition, ModelSpacePrior, PriorConfig,
    PriorModel, ScalePrior,
};
pub use proposal::{NullTarget, ProposalEngine, acceptance_probability};
pub use sampler::{Sampler, fit_rjmcmc, write_rjmcmc_results};
pub use state::{ClusterEffects, ModelState};
pub use sufficient::{ConjugateModel, SufficientStatistics, log_marginal_likelihood_direct};
pub use types::{
    InitialModel, LikelihoodFamily, MoveCounts, MoveProbabilities, MoveType, ProposalTuning,
    RjmcmcError, SamplerConfig, SamplerPhase, SamplerReport,
};
