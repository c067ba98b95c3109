use std::fs::File;
use std::io::BufWriter;

use faer::Mat;
use rjmcmc_glm::{
    ConjugatePrior, CovariateData, LikelihoodFamily, PriorConfig, SamplerConfig, ScalePrior,
    score_models_up_to, write_rjmcmc_results,
};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let n = 250;
    let design_matrix = Mat::from_fn(n, 5, |i, j| {
        ((idx_to_f64(i) + 0.5) * (0.53 * idx_to_f64(j) + 1.17)).cos()
    });
    let outcome = Mat::from_fn(n, 1, |i, _| {
        let noise = 0.3 * (idx_to_f64(i) * 78.233).sin();
        0.9f64.mul_add(design_matrix[(i, 0)], 1.5f64.mul_add(design_matrix[(i, 2)], noise))
    });
    // The first covariate is forced into every model.
    let data = CovariateData::new(design_matrix, outcome, LikelihoodFamily::Conjugate)
        .with_fixed_covariates(1);

    let prior = ConjugatePrior::default();
    match score_models_up_to(&data, prior, prior.coefficient_variance_ratio, 2) {
        Ok(scores) => {
            for score in scores {
                println!("{:<12} {:.3}", score.label(), score.log_likelihood);
            }
        }
        Err(error) => eprintln!("scoring failed: {error}"),
    }

    let config = SamplerConfig {
        priors: PriorConfig {
            conjugate: ConjugatePrior {
                tau_prior: Some(ScalePrior::LogUniform {
                    lower: -5.0,
                    upper: 5.0,
                }),
                ..prior
            },
            ..PriorConfig::default()
        },
        model_scores_up_to_dim: 2,
        ..SamplerConfig::default()
    };
    let file = match File::create("conjugate_scores.txt") {
        Ok(file) => BufWriter::new(file),
        Err(error) => {
            eprintln!("cannot create results file: {error}");
            return;
        }
    };
    match write_rjmcmc_results(&data, config, file) {
        Ok((report, _)) => println!(
            "wrote {} draws to conjugate_scores.txt (final model size {})",
            report.retained_draws, report.final_model_dimension
        ),
        Err(error) => eprintln!("sampling failed: {error}"),
    }
}

fn idx_to_f64(idx: usize) -> f64 {
    f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
}
