//! Sample sinks and the whitespace-delimited results format.

use std::io::Write;

use super::posterior::PosteriorDraw;
use super::types::{LikelihoodFamily, RjmcmcError};

/// Field names of the first header line.
pub const HEADER_FIELDS: [&str; 12] = [
    "Likelihood",
    "ModelSpacePriorFamily",
    "V",
    "startRJ",
    "R",
    "varsWithFixedPriors",
    "nBetaHyperPriorComp",
    "allModelScoresUpToDim",
    "nRjComp",
    "iterations",
    "burnin",
    "thin",
];

/// Marginal likelihood of one enumerated model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    /// Names of the included non-fixed covariates; empty for the null model.
    pub covariates: Vec<String>,
    pub log_likelihood: f64,
}

impl ModelScore {
    #[must_use]
    pub fn label(&self) -> String {
        if self.covariates.is_empty() {
            "Null".to_string()
        } else {
            self.covariates.join("_AND_")
        }
    }
}

/// Run metadata written ahead of the sample rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsHeader {
    pub family: LikelihoodFamily,
    pub model_space_family: &'static str,
    pub covariates: usize,
    /// Index of the first covariate subject to selection.
    pub start_rj: usize,
    pub clusters: usize,
    pub informative_priors: usize,
    pub hierarchical_partitions: usize,
    pub model_scores_up_to_dim: usize,
    pub model_space_partitions: usize,
    pub iterations: usize,
    pub burn_in: usize,
    pub thin: usize,
    pub model_space_hyperparameters: Vec<f64>,
    pub partition_boundaries: Vec<usize>,
    pub model_scores: Vec<ModelScore>,
    pub covariate_names: Vec<String>,
    pub column_names: Vec<String>,
}

/// Column names for a run, in row order.
#[must_use]
pub fn column_names(
    family: LikelihoodFamily,
    covariate_names: &[String],
    hierarchical_partitions: usize,
    samples_tau: bool,
    clusters: usize,
) -> Vec<String> {
    let mut names =
        Vec::with_capacity(covariate_names.len() + hierarchical_partitions + clusters + 5);
    match family {
        LikelihoodFamily::Weibull => names.push("LogWeibullScale".to_string()),
        LikelihoodFamily::Gaussian | LikelihoodFamily::GaussianMarginal => {
            names.push("LogGaussianResidual".to_string());
        }
        LikelihoodFamily::Logistic | LikelihoodFamily::Conjugate => {}
    }
    if samples_tau {
        names.push("LogTau".to_string());
    }
    names.push("alpha".to_string());
    names.extend(covariate_names.iter().cloned());
    names.extend((1..=hierarchical_partitions).map(|idx| format!("LogBetaPriorSd{idx}")));
    if clusters > 0 {
        names.push("LogRandomInterceptSd".to_string());
        names.extend((1..=clusters).map(|idx| format!("RandomIntercept{idx}")));
    }
    names.push("LogLikelihood".to_string());
    names
}

/// Consumer of recorded draws.
pub trait SampleSink {
    /// Called once before the first draw.
    ///
    /// # Errors
    ///
    /// Returns `RjmcmcError` if the sink cannot accept the header.
    fn begin(&mut self, _header: &ResultsHeader) -> Result<(), RjmcmcError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RjmcmcError` if the draw cannot be stored.
    fn record(&mut self, draw: &PosteriorDraw) -> Result<(), RjmcmcError>;

    /// Called once after the last iteration.
    ///
    /// # Errors
    ///
    /// Returns `RjmcmcError` if buffered output cannot be flushed.
    fn finish(&mut self) -> Result<(), RjmcmcError> {
        Ok(())
    }
}

/// Writes the header block and one line per draw to any writer.
#[derive(Debug)]
pub struct TextResultsWriter<W: Write> {
    writer: W,
}

impl<W: Write> TextResultsWriter<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SampleSink for TextResultsWriter<W> {
    fn begin(&mut self, header: &ResultsHeader) -> Result<(), RjmcmcError> {
        writeln!(self.writer, "{}", HEADER_FIELDS.join(" "))?;
        writeln!(
            self.writer,
            "{} {} {} {} {} {} {} {} {} {} {} {}",
            header.family.label(),
            header.model_space_family,
            header.covariates,
            header.start_rj,
            header.clusters,
            header.informative_priors,
            header.hierarchical_partitions,
            header.model_scores_up_to_dim,
            header.model_space_partitions,
            header.iterations,
            header.burn_in,
            header.thin
        )?;

        let mut hyperparameters = join_values(&header.model_space_hyperparameters);
        if header.model_space_partitions > 1 {
            for boundary in &header.partition_boundaries {
                hyperparameters.push(' ');
                hyperparameters.push_str(&boundary.to_string());
            }
        }
        writeln!(self.writer, "{hyperparameters}")?;

        for score in &header.model_scores {
            writeln!(self.writer, "{} {}", score.label(), score.log_likelihood)?;
        }
        writeln!(self.writer, "{}", header.column_names.join(" "))?;
        Ok(())
    }

    fn record(&mut self, draw: &PosteriorDraw) -> Result<(), RjmcmcError> {
        writeln!(self.writer, "{}", join_values(&draw.row_values()))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RjmcmcError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_header() -> ResultsHeader {
        ResultsHeader {
            family: LikelihoodFamily::Gaussian,
            model_space_family: "BetaBinomial",
            covariates: 3,
            start_rj: 1,
            clusters: 0,
            informative_priors: 1,
            hierarchical_partitions: 1,
            model_scores_up_to_dim: 0,
            model_space_partitions: 2,
            iterations: 100,
            burn_in: 10,
            thin: 5,
            model_space_hyperparameters: vec![1.0, 1.0, 2.0, 0.5],
            partition_boundaries: vec![1, 2, 3],
            model_scores: vec![
                ModelScore {
                    covariates: Vec::new(),
                    log_likelihood: -10.5,
                },
                ModelScore {
                    covariates: vec!["X2".to_string(), "X3".to_string()],
                    log_likelihood: -8.25,
                },
            ],
            covariate_names: vec!["X1".to_string(), "X2".to_string(), "X3".to_string()],
            column_names: column_names(
                LikelihoodFamily::Gaussian,
                &["X1".to_string(), "X2".to_string(), "X3".to_string()],
                1,
                false,
                0,
            ),
        }
    }

    #[test]
    fn column_names_follow_row_layout() {
        let names = column_names(LikelihoodFamily::Weibull, &["a".to_string()], 2, false, 2);
        assert_eq!(
            names,
            vec![
                "LogWeibullScale",
                "alpha",
                "a",
                "LogBetaPriorSd1",
                "LogBetaPriorSd2",
                "LogRandomInterceptSd",
                "RandomIntercept1",
                "RandomIntercept2",
                "LogLikelihood",
            ]
        );
        let names = column_names(LikelihoodFamily::Conjugate, &["a".to_string()], 0, true, 0);
        assert_eq!(names, vec!["LogTau", "alpha", "a", "LogLikelihood"]);
    }

    #[test]
    fn header_block_layout() {
        let mut writer = TextResultsWriter::new(Vec::new());
        writer.begin(&basic_header()).expect("in-memory write");
        writer.finish().expect("in-memory flush");
        let text = String::from_utf8(writer.into_inner()).expect("utf8 output");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            "Likelihood ModelSpacePriorFamily V startRJ R varsWithFixedPriors nBetaHyperPriorComp allModelScoresUpToDim nRjComp iterations burnin thin"
        );
        assert_eq!(lines[1], "Gaussian BetaBinomial 3 1 0 1 1 0 2 100 10 5");
        assert_eq!(lines[2], "1 1 2 0.5 1 2 3");
        assert_eq!(lines[3], "Null -10.5");
        assert_eq!(lines[4], "X2_AND_X3 -8.25");
        assert_eq!(lines[5], "LogGaussianResidual alpha X1 X2 X3 LogBetaPriorSd1 LogLikelihood");
        assert_eq!(lines.len(), 6);
    }
}
