//! Reversible-jump Metropolis-Hastings sampler loop.

use std::io::Write;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use tracing::{debug, info};

use super::enumeration::score_models_up_to;
use super::likelihood::{LikelihoodModel, clamp_probability};
use super::output::{ModelScore, ResultsHeader, SampleSink, TextResultsWriter, column_names};
use super::posterior::{PosteriorDraw, PosteriorSamples};
use super::priors::PriorModel;
use super::proposal::{ProposalEngine, acceptance_probability};
use super::state::{ClusterEffects, ModelState};
use super::types::{
    InitialModel, LikelihoodFamily, MoveProbabilities, RjmcmcError, SamplerConfig, SamplerPhase,
    SamplerReport,
};
use crate::input::CovariateData;
use crate::models::matrix_ops::column_to_vec;
use crate::utils::{mean, usize_to_f64, variance};

const EARLY_FEEDBACK_ITERATIONS: [usize; 4] = [1, 10, 100, 1_000];

/// Single-chain sampler over a borrowed data set.
///
/// Owns the current and proposed states, the RNG and the proposal scales.
/// Every call to [`Sampler::step`] leaves `current` and the internal proposal
/// state equal by value.
#[derive(Debug)]
pub struct Sampler<'a> {
    data: &'a CovariateData,
    config: SamplerConfig,
    likelihood: LikelihoodModel,
    priors: PriorModel,
    proposals: ProposalEngine,
    curr: ModelState,
    prop: ModelState,
    rng: StdRng,
    model_scores: Vec<ModelScore>,
    report: SamplerReport,
}

impl<'a> Sampler<'a> {
    /// Validate `data` and `config`, resolve priors, and build the initial state.
    ///
    /// # Errors
    ///
    /// Returns `RjmcmcError` for invalid data or configuration, unsupported
    /// family/option combinations, a run with nothing to sample, or an
    /// initial state with zero prior density.
    pub fn new(data: &'a CovariateData, config: SamplerConfig) -> Result<Self, RjmcmcError> {
        data.validate()?;
        config.validate()?;
        let family = data.likelihood;
        if data.clusters.is_some() && !family.uses_linear_predictor() {
            return Err(RjmcmcError::ClustersUnsupported(family));
        }

        let priors = PriorModel::new(&config.priors, data)?;
        let likelihood = LikelihoodModel::new(data, config.priors.conjugate);
        let model_scores = if config.model_scores_up_to_dim > 0 {
            score_models_up_to(
                data,
                config.priors.conjugate,
                config.priors.conjugate.coefficient_variance_ratio,
                config.model_scores_up_to_dim,
            )?
        } else {
            Vec::new()
        };

        let moves = run_move_probabilities(&config, family, priors.samples_tau());
        let proposals = ProposalEngine::new(
            data,
            moves,
            config.tuning,
            priors.hierarchical_partitions().len(),
        );

        let mut curr = initial_state(data, &config, &priors);
        let can_jump = config.variable_selection
            && data.free_covariates() > 0
            && moves.add + moves.remove + moves.swap > 0.0;
        if !can_jump && proposals.null_targets(&curr).is_empty() {
            return Err(RjmcmcError::NothingToSample);
        }

        curr.log_likelihood = likelihood.log_likelihood(&curr, data);
        curr.log_prior = priors.log_prior(&curr);
        if !(curr.log_likelihood.is_finite() && curr.log_prior.is_finite()) {
            return Err(RjmcmcError::InvalidInitialState);
        }
        curr.acceptance_probability = 1.0;
        curr.proposal_accepted = true;
        let prop = curr.clone();

        Ok(Self {
            data,
            rng: StdRng::seed_from_u64(config.mcmc.seed),
            config,
            likelihood,
            priors,
            proposals,
            curr,
            prop,
            model_scores,
            report: SamplerReport::default(),
        })
    }

    /// State after the most recent [`Sampler::step`].
    #[must_use]
    pub const fn current(&self) -> &ModelState {
        &self.curr
    }

    /// Proposal engine with its current adapted scales.
    #[must_use]
    pub const fn proposals(&self) -> &ProposalEngine {
        &self.proposals
    }

    /// Resolved priors for this run.
    #[must_use]
    pub const fn priors(&self) -> &PriorModel {
        &self.priors
    }

    /// Likelihood evaluator for the data's family.
    #[must_use]
    pub const fn likelihood(&self) -> &LikelihoodModel {
        &self.likelihood
    }

    /// Brute-force conjugate scores computed in [`Sampler::new`], empty unless requested.
    #[must_use]
    pub fn model_scores(&self) -> &[ModelScore] {
        &self.model_scores
    }

    /// Counters accumulated by [`Sampler::step`] since the last [`Sampler::run`].
    #[must_use]
    pub const fn report(&self) -> &SamplerReport {
        &self.report
    }

    #[must_use]
    pub const fn phase(&self, iteration: usize) -> SamplerPhase {
        if self.config.mcmc.is_adapting(iteration) {
            SamplerPhase::Adapting
        } else {
            SamplerPhase::Sampling
        }
    }

    /// One propose / evaluate / accept-or-reject / adapt cycle.
    ///
    /// Returns whether the proposal was accepted.
    pub fn step(&mut self, iteration: usize) -> bool {
        let log_proposal_ratio =
            self.proposals
                .propose(&self.curr, &mut self.prop, self.data, &mut self.rng);
        self.prop.log_likelihood = self.likelihood.log_likelihood(&self.prop, self.data);
        self.prop.log_prior = self.priors.log_prior(&self.prop);
        let log_ratio = (self.prop.log_likelihood - self.curr.log_likelihood)
            + (self.prop.log_prior - self.curr.log_prior)
            + log_proposal_ratio;
        let acceptance = acceptance_probability(log_ratio);
        self.prop.acceptance_probability = acceptance;

        let accepted = self.rng.random::<f64>() < acceptance;
        let move_type = self.prop.move_type;
        self.prop.proposal_accepted = accepted;
        if accepted {
            self.curr.clone_from(&self.prop);
        } else {
            self.prop.clone_from(&self.curr);
        }

        match self.phase(iteration) {
            SamplerPhase::Adapting => {
                self.proposals.adapt(acceptance);
                self.report.adaption.record(move_type, accepted);
            }
            SamplerPhase::Sampling => self.report.sampling.record(move_type, accepted),
        }
        accepted
    }

    /// Run every configured iteration, streaming retained draws into `sink`.
    ///
    /// # Errors
    ///
    /// Returns `RjmcmcError` as soon as the sink fails.
    pub fn run<S: SampleSink>(&mut self, sink: &mut S) -> Result<SamplerReport, RjmcmcError> {
        let mcmc = self.config.mcmc;
        self.report = SamplerReport::default();
        sink.begin(&self.results_header())?;
        info!(
            family = %self.data.likelihood,
            covariates = self.data.n_covariates(),
            observations = self.data.n_observations(),
            iterations = mcmc.iterations,
            burn_in = mcmc.burn_in,
            thin = mcmc.thin,
            expected_draws = mcmc.retained_draws(),
            "starting reversible-jump sampler"
        );

        let started = Instant::now();
        for iteration in 0..mcmc.iterations {
            self.step(iteration);

            if mcmc.is_adapting(iteration) && EARLY_FEEDBACK_ITERATIONS.contains(&iteration) {
                debug!(
                    iteration,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "early iteration complete"
                );
            }
            if iteration == mcmc.adaption_length {
                debug!(
                    iteration,
                    log_likelihood = self.curr.log_likelihood,
                    null_acceptance = self.report.adaption.null.acceptance_rate(),
                    "proposal adaption finished"
                );
            }
            if mcmc.is_recorded(iteration) {
                sink.record(&self.current_draw(iteration))?;
                self.report.retained_draws += 1;
            }
            if (iteration + 1).is_multiple_of(mcmc.console_output_interval) {
                info!(
                    iteration = iteration + 1,
                    iterations = mcmc.iterations,
                    log_likelihood = self.curr.log_likelihood,
                    model_dimension = self.curr.model_dimension,
                    "iterations complete"
                );
            }
        }
        sink.finish()?;

        self.report.iterations_completed = mcmc.iterations;
        self.report.final_log_likelihood = self.curr.log_likelihood;
        self.report.final_model_dimension = self.curr.model_dimension;
        info!(
            retained_draws = self.report.retained_draws,
            elapsed_secs = started.elapsed().as_secs_f64(),
            add_acceptance = self.report.sampling.add.acceptance_rate(),
            remove_acceptance = self.report.sampling.remove.acceptance_rate(),
            swap_acceptance = self.report.sampling.swap.acceptance_rate(),
            null_acceptance = self.report.sampling.null.acceptance_rate(),
            "sampling complete"
        );
        Ok(self.report.clone())
    }

    /// Header describing this run, including any enumerated model scores.
    #[must_use]
    pub fn results_header(&self) -> ResultsHeader {
        let hierarchical = self.priors.hierarchical_partitions().len();
        let clusters = self.data.number_of_clusters();
        ResultsHeader {
            family: self.data.likelihood,
            model_space_family: self.priors.model_space().label(),
            covariates: self.data.n_covariates(),
            start_rj: self.data.fixed_covariates,
            clusters,
            informative_priors: self.priors.informative_count(),
            hierarchical_partitions: hierarchical,
            model_scores_up_to_dim: self.config.model_scores_up_to_dim,
            model_space_partitions: self.data.partition_count(),
            iterations: self.config.mcmc.iterations,
            burn_in: self.config.mcmc.burn_in,
            thin: self.config.mcmc.thin,
            model_space_hyperparameters: self.priors.model_space().hyperparameter_values(),
            partition_boundaries: self.data.partition_boundaries(),
            model_scores: self.model_scores.clone(),
            covariate_names: self.data.covariate_names.clone(),
            column_names: column_names(
                self.data.likelihood,
                &self.data.covariate_names,
                hierarchical,
                self.priors.samples_tau(),
                clusters,
            ),
        }
    }

    /// Snapshot of the current state as a recorded draw.
    #[must_use]
    pub fn current_draw(&self, iteration: usize) -> PosteriorDraw {
        let (intercept, coefficients) = self.likelihood.reported_coefficients(&self.curr);
        PosteriorDraw {
            iteration,
            inclusion: self.curr.inclusion.clone(),
            model_dimension: self.curr.model_dimension,
            intercept,
            coefficients,
            log_dispersion: self.curr.log_dispersion,
            log_tau: self.curr.log_tau,
            hierarchical_log_sds: self.curr.hierarchical_log_sds.clone(),
            cluster_log_sd: self.curr.clusters.as_ref().map(|effects| effects.log_sd),
            cluster_intercepts: self
                .curr
                .clusters
                .as_ref()
                .map(|effects| effects.intercepts.clone())
                .unwrap_or_default(),
            log_likelihood: self.curr.log_likelihood,
        }
    }
}

/// Run a chain and keep every retained draw in memory.
///
/// # Errors
///
/// Returns `RjmcmcError` if the sampler cannot be built.
pub fn fit_rjmcmc(
    data: &CovariateData,
    config: SamplerConfig,
) -> Result<(PosteriorSamples, SamplerReport), RjmcmcError> {
    let mut sampler = Sampler::new(data, config)?;
    let mut samples = PosteriorSamples::default();
    let report = sampler.run(&mut samples)?;
    Ok((samples, report))
}

/// Run a chain and stream the results file into `writer`.
///
/// # Errors
///
/// Returns `RjmcmcError` if the sampler cannot be built or writing fails.
pub fn write_rjmcmc_results<W: Write>(
    data: &CovariateData,
    config: SamplerConfig,
    writer: W,
) -> Result<(SamplerReport, W), RjmcmcError> {
    let mut sampler = Sampler::new(data, config)?;
    let mut sink = TextResultsWriter::new(writer);
    let report = sampler.run(&mut sink)?;
    Ok((report, sink.into_inner()))
}

fn run_move_probabilities(
    config: &SamplerConfig,
    family: LikelihoodFamily,
    samples_tau: bool,
) -> MoveProbabilities {
    if !config.variable_selection {
        MoveProbabilities::null_only()
    } else if family.integrates_coefficients() && !samples_tau {
        config.moves.without_null()
    } else {
        config.moves
    }
}

fn initial_state(data: &CovariateData, config: &SamplerConfig, priors: &PriorModel) -> ModelState {
    let family = data.likelihood;
    let start_full = !config.variable_selection || config.initial_model == InitialModel::FullModel;
    let inclusion = (0..data.n_covariates())
        .map(|covariate| covariate < data.fixed_covariates || start_full)
        .collect();
    let mut state = ModelState::new(data, inclusion, family.uses_linear_predictor());

    let outcome = column_to_vec(&data.outcome);
    let (intercept, log_dispersion) = match family {
        LikelihoodFamily::Logistic => {
            let p = clamp_probability(mean(&outcome));
            ((p / (1.0 - p)).ln(), None)
        }
        LikelihoodFamily::Weibull => {
            let events = data
                .event_indicator
                .as_deref()
                .map_or(0, |events| events.iter().filter(|event| **event).count());
            let exposure = outcome.iter().sum::<f64>();
            ((usize_to_f64(events.max(1)) / exposure).ln(), Some(0.0))
        }
        LikelihoodFamily::Gaussian | LikelihoodFamily::GaussianMarginal => {
            let spread = variance(&outcome);
            let log_variance = if spread > 0.0 { spread.ln() } else { 0.0 };
            (mean(&outcome), Some(log_variance))
        }
        LikelihoodFamily::Conjugate => (0.0, None),
    };
    state.intercept = intercept;
    state.log_dispersion = log_dispersion;
    state.hierarchical_log_sds = priors.initial_hierarchical_log_sds();
    state.clusters = data.clusters.as_ref().map(|index| ClusterEffects {
        intercepts: vec![0.0; index.n_clusters()],
        log_sd: 0.0,
    });
    if priors.samples_tau() {
        state.log_tau = Some(config.priors.conjugate.coefficient_variance_ratio.ln());
    }
    state.recompute_linear_predictor(data);
    state
}
