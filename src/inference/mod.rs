//! Reusable MCMC schedule and proposal bookkeeping types.

use thiserror::Error;

use crate::utils::usize_to_f64;

/// Errors for the MCMC iteration schedule.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InferenceError {
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("burn-in ({burn_in}) must be smaller than iterations ({iterations})")]
    InvalidBurnIn { burn_in: usize, iterations: usize },
    #[error("thinning interval must be positive")]
    InvalidThinning,
    #[error("console output interval must be positive")]
    InvalidConsoleInterval,
}

/// Iteration schedule for a single chain.
///
/// Iterations are indexed from zero. An iteration `i` is recorded when
/// `i >= burn_in` and `i % thin == 0`; proposal scales adapt while
/// `i <= adaption_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McmcConfig {
    pub iterations: usize,
    pub burn_in: usize,
    pub thin: usize,
    pub adaption_length: usize,
    /// Emit a progress event every `console_output_interval` iterations.
    pub console_output_interval: usize,
    pub seed: u64,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            burn_in: 5_000,
            thin: 10,
            adaption_length: 5_000,
            console_output_interval: 5_000,
            seed: 42,
        }
    }
}

impl McmcConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid.
    pub const fn validate(self) -> Result<(), InferenceError> {
        if self.iterations == 0 {
            return Err(InferenceError::InvalidIterations);
        }
        if self.burn_in >= self.iterations {
            return Err(InferenceError::InvalidBurnIn {
                burn_in: self.burn_in,
                iterations: self.iterations,
            });
        }
        if self.thin == 0 {
            return Err(InferenceError::InvalidThinning);
        }
        if self.console_output_interval == 0 {
            return Err(InferenceError::InvalidConsoleInterval);
        }
        Ok(())
    }

    /// Whether iteration `iteration` still tunes proposal scales.
    #[must_use]
    pub const fn is_adapting(self, iteration: usize) -> bool {
        iteration <= self.adaption_length
    }

    /// Whether iteration `iteration` is written to the sample stream.
    #[must_use]
    pub const fn is_recorded(self, iteration: usize) -> bool {
        iteration >= self.burn_in && iteration.is_multiple_of(self.thin)
    }

    /// Number of recorded draws implied by this configuration.
    #[must_use]
    pub const fn retained_draws(self) -> usize {
        self.iterations.div_ceil(self.thin) - self.burn_in.div_ceil(self.thin)
    }
}

/// Proposal counters for a single Metropolis-Hastings move type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}
