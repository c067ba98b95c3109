//! # Model inputs
//!
//! Defines the covariate container consumed by the sampler: outcome,
//! design matrix, covariate names, the likelihood family tag, and the
//! optional censoring indicator, cluster labels and model-space partitions.
//!
//! # Examples
//!
//! ```
//! use faer::Mat;
//! use rjmcmc_glm::{CovariateData, LikelihoodFamily};
//!
//! fn idx_to_f64(idx: usize) -> f64 {
//!     f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
//! }
//!
//! let design_matrix = Mat::from_fn(4, 2, |i, j| idx_to_f64(i + j));
//! let outcome = Mat::from_fn(4, 1, |i, _| idx_to_f64(i % 2));
//! let data = CovariateData::new(design_matrix, outcome, LikelihoodFamily::Logistic);
//!
//! assert!(data.validate().is_ok());
//! assert_eq!(data.covariate_names, vec!["X1".to_string(), "X2".to_string()]);
//! ```
//!
//! ```
//! use faer::Mat;
//! use rjmcmc_glm::{CovariateData, LikelihoodFamily};
//!
//! let design_matrix = Mat::from_fn(3, 1, |_, _| 1.0);
//! let outcome = Mat::from_fn(3, 1, |_, _| 2.0);
//! let data = CovariateData::new(design_matrix, outcome, LikelihoodFamily::Logistic);
//!
//! assert!(data.validate().is_err());
//! ```

use faer::Mat;
use thiserror::Error;

use crate::models::rjmcmc::types::LikelihoodFamily;
use crate::utils::matrix_is_finite;

pub mod clusters;

pub use clusters::ClusterIndex;

/// Errors returned when validating covariate data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("design matrix must have at least one row")]
    NoObservations,
    #[error("outcome must be a single column matrix")]
    InvalidOutcomeShape,
    #[error("design matrix rows ({rows}) must match outcome rows ({len})")]
    DimensionMismatch { rows: usize, len: usize },
    #[error("covariate name count ({names}) must match design columns ({columns})")]
    NameCountMismatch { names: usize, columns: usize },
    #[error("fixed covariate count ({fixed}) exceeds design columns ({columns})")]
    TooManyFixedCovariates { fixed: usize, columns: usize },
    #[error("model-space partition boundary {boundary} must lie strictly between {lower} and {upper}")]
    InvalidPartitionBoundary {
        boundary: usize,
        lower: usize,
        upper: usize,
    },
    #[error("model-space partition boundaries must be strictly increasing")]
    UnorderedPartitionBoundaries,
    #[error("design matrix contains non-finite values")]
    NonFiniteDesign,
    #[error("outcome contains non-finite values")]
    NonFiniteOutcome,
    #[error("logistic outcome must be coded 0/1")]
    NonBinaryOutcome,
    #[error("Weibull survival times must be strictly positive")]
    NonPositiveSurvivalTime,
    #[error("Weibull likelihood requires an event indicator")]
    MissingEventIndicator,
    #[error("event indicator length ({len}) must match outcome rows ({rows})")]
    InvalidEventIndicatorLength { len: usize, rows: usize },
    #[error("cluster labels length ({labels}) must match outcome rows ({rows})")]
    InvalidClusterLength { labels: usize, rows: usize },
}

/// Covariate data for one sampler run. Immutable once sampling starts.
#[derive(Debug, Clone)]
pub struct CovariateData {
    pub outcome: Mat<f64>,
    pub design_matrix: Mat<f64>,
    pub covariate_names: Vec<String>,
    pub likelihood: LikelihoodFamily,
    /// The first `fixed_covariates` columns are included in every model.
    pub fixed_covariates: usize,
    /// Weibull censoring indicator, `true` when the event was observed.
    pub event_indicator: Option<Vec<bool>>,
    pub clusters: Option<ClusterIndex>,
    /// Interior split points of the model-space partitions; partition `c`
    /// spans `[b_c, b_{c+1})` with `b_0 = fixed_covariates` and a final bound
    /// equal to the number of covariates.
    pub partition_splits: Vec<usize>,
}

impl CovariateData {
    #[must_use]
    pub fn new(design_matrix: Mat<f64>, outcome: Mat<f64>, likelihood: LikelihoodFamily) -> Self {
        let covariate_names = (1..=design_matrix.ncols())
            .map(|idx| format!("X{idx}"))
            .collect();
        Self {
            outcome,
            design_matrix,
            covariate_names,
            likelihood,
            fixed_covariates: 0,
            event_indicator: None,
            clusters: None,
            partition_splits: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_covariate_names(self, covariate_names: Vec<String>) -> Self {
        Self {
            covariate_names,
            ..self
        }
    }

    #[must_use]
    pub fn with_fixed_covariates(mut self, fixed_covariates: usize) -> Self {
        self.fixed_covariates = fixed_covariates;
        self
    }

    #[must_use]
    pub fn with_event_indicator(mut self, event_indicator: Vec<bool>) -> Self {
        self.event_indicator = Some(event_indicator);
        self
    }

    #[must_use]
    pub fn with_cluster_ids(mut self, cluster_ids: &[u64]) -> Self {
        self.clusters = Some(ClusterIndex::from_ids(cluster_ids));
        self
    }

    #[must_use]
    pub fn with_partition_splits(mut self, partition_splits: Vec<usize>) -> Self {
        self.partition_splits = partition_splits;
        self
    }

    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.outcome.nrows()
    }

    #[must_use]
    pub fn n_covariates(&self) -> usize {
        self.design_matrix.ncols()
    }

    /// Covariates eligible for add/remove/swap moves.
    #[must_use]
    pub fn free_covariates(&self) -> usize {
        self.n_covariates().saturating_sub(self.fixed_covariates)
    }

    #[must_use]
    pub fn number_of_clusters(&self) -> usize {
        self.clusters.as_ref().map_or(0, ClusterIndex::n_clusters)
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partition_splits.len() + 1
    }

    /// Model-space partition of a non-fixed covariate.
    #[must_use]
    pub fn partition_index(&self, covariate: usize) -> usize {
        self.partition_splits
            .partition_point(|split| *split <= covariate)
    }

    /// Full list of partition bounds `b_0, ..., b_R`.
    #[must_use]
    pub fn partition_boundaries(&self) -> Vec<usize> {
        let mut boundaries = Vec::with_capacity(self.partition_splits.len() + 2);
        boundaries.push(self.fixed_covariates);
        boundaries.extend_from_slice(&self.partition_splits);
        boundaries.push(self.n_covariates());
        boundaries
    }

    /// Number of covariates in each model-space partition.
    #[must_use]
    pub fn partition_sizes(&self) -> Vec<usize> {
        self.partition_boundaries()
            .windows(2)
            .map(|bounds| bounds[1].saturating_sub(bounds[0]))
            .collect()
    }

    /// Validate shapes and family-specific outcome coding.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if inputs are malformed.
    pub fn validate(&self) -> Result<(), InputError> {
        let rows = self.outcome.nrows();
        if rows == 0 {
            return Err(InputError::NoObservations);
        }
        if self.outcome.ncols() != 1 {
            return Err(InputError::InvalidOutcomeShape);
        }
        if self.design_matrix.nrows() != rows {
            return Err(InputError::DimensionMismatch {
                rows: self.design_matrix.nrows(),
                len: rows,
            });
        }
        if self.covariate_names.len() != self.n_covariates() {
            return Err(InputError::NameCountMismatch {
                names: self.covariate_names.len(),
                columns: self.n_covariates(),
            });
        }
        if self.fixed_covariates > self.n_covariates() {
            return Err(InputError::TooManyFixedCovariates {
                fixed: self.fixed_covariates,
                columns: self.n_covariates(),
            });
        }
        self.validate_partitions()?;
        if !matrix_is_finite(&self.design_matrix) {
            return Err(InputError::NonFiniteDesign);
        }
        if !matrix_is_finite(&self.outcome) {
            return Err(InputError::NonFiniteOutcome);
        }
        self.validate_outcome_coding()?;
        if let Some(clusters) = &self.clusters
            && clusters.n_rows() != rows
        {
            return Err(InputError::InvalidClusterLength {
                labels: clusters.n_rows(),
                rows,
            });
        }
        Ok(())
    }

    fn validate_partitions(&self) -> Result<(), InputError> {
        for split in &self.partition_splits {
            if *split <= self.fixed_covariates || *split >= self.n_covariates() {
                return Err(InputError::InvalidPartitionBoundary {
                    boundary: *split,
                    lower: self.fixed_covariates,
                    upper: self.n_covariates(),
                });
            }
        }
        if self
            .partition_splits
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(InputError::UnorderedPartitionBoundaries);
        }
        Ok(())
    }

    fn validate_outcome_coding(&self) -> Result<(), InputError> {
        let rows = self.outcome.nrows();
        match self.likelihood {
            LikelihoodFamily::Logistic => {
                if (0..rows).any(|i| {
                    let y = self.outcome[(i, 0)];
                    y != 0.0 && y != 1.0
                }) {
                    return Err(InputError::NonBinaryOutcome);
                }
            }
            LikelihoodFamily::Weibull => {
                if (0..rows).any(|i| self.outcome[(i, 0)] <= 0.0) {
                    return Err(InputError::NonPositiveSurvivalTime);
                }
                let events = self
                    .event_indicator
                    .as_ref()
                    .ok_or(InputError::MissingEventIndicator)?;
                if events.len() != rows {
                    return Err(InputError::InvalidEventIndicatorLength {
                        len: events.len(),
                        rows,
                    });
                }
            }
            LikelihoodFamily::Gaussian
            | LikelihoodFamily::GaussianMarginal
            | LikelihoodFamily::Conjugate => {}
        }
        Ok(())
    }
}
