#![forbid(unsafe_code)]

//! # `rjmcmc_glm`
//!
//! Bayesian generalized linear models with reversible-jump variable
//! selection. A single Metropolis-Hastings chain explores which covariates
//! enter the model together with their effects, hierarchical prior scales,
//! dispersion parameters and optional random intercepts.
//!
//! Supported likelihoods are logistic, Weibull with right censoring,
//! Gaussian, Gaussian evaluated from cached sufficient statistics, and the
//! fully conjugate Gaussian model.
//!
//! # Examples
//!
//! ```
//! use faer::Mat;
//! use rjmcmc_glm::{CovariateData, LikelihoodFamily, McmcConfig, SamplerConfig, fit_rjmcmc};
//!
//! fn idx_to_f64(idx: usize) -> f64 {
//!     f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
//! }
//!
//! let design = Mat::from_fn(40, 2, |i, j| (idx_to_f64(i) * (idx_to_f64(j) + 0.3)).sin());
//! let outcome = Mat::from_fn(40, 1, |i, _| 1.5 * design[(i, 0)] + 0.1 * idx_to_f64(i % 3));
//! let data = CovariateData::new(design, outcome, LikelihoodFamily::Gaussian);
//!
//! let config = SamplerConfig {
//!     mcmc: McmcConfig {
//!         iterations: 200,
//!         burn_in: 100,
//!         thin: 10,
//!         adaption_length: 100,
//!         console_output_interval: 100,
//!         seed: 1,
//!     },
//!     ..SamplerConfig::default()
//! };
//! let (samples, report) = fit_rjmcmc(&data, config).expect("valid run");
//! assert_eq!(samples.len(), 10);
//! assert_eq!(report.retained_draws, 10);
//! ```

pub mod inference;
pub mod input;
pub mod models;
pub mod utils;

pub use inference::{InferenceError, McmcConfig, ProposalStats};
pub use input::{ClusterIndex, CovariateData, InputError};
pub mod matrix_ops {
    pub use crate::models::matrix_ops::*;
}

pub use models::rjmcmc::{
    ClusterEffects, CoefficientPrior, ConjugatePrior, CovariateSummary, HierarchicalPartition,
    InitialModel, LikelihoodFamily, MAX_SCORED_DIMENSION, ModelScore, ModelSpacePrior,
    ModelState, MoveCounts, MoveProbabilities, MoveType, ParameterSummary, PosteriorDraw,
    PosteriorSamples, PosteriorSummary, PriorConfig, ProposalTuning, ResultsHeader, RjmcmcError,
    SampleSink, Sampler, SamplerConfig, SamplerPhase, SamplerReport, ScalePrior,
    TextResultsWriter, autocorrelation, effective_sample_size, fit_rjmcmc,
    render_acceptance_table, render_posterior_table, score_models_up_to, summarize_posterior,
    write_rjmcmc_results,
};
