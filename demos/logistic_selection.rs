use faer::Mat;
use rjmcmc_glm::{
    CovariateData, LikelihoodFamily, McmcConfig, PosteriorSamples, Sampler, SamplerConfig,
    render_acceptance_table, render_posterior_table, summarize_posterior,
};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let n = 400;
    let design_matrix = Mat::from_fn(n, 6, |i, j| {
        ((idx_to_f64(i) + 1.0) * (0.37 * idx_to_f64(j) + 0.91)).sin()
    });
    let outcome = Mat::from_fn(n, 1, |i, _| {
        let eta = 1.2f64.mul_add(design_matrix[(i, 1)], -0.8 * design_matrix[(i, 4)]);
        let noise = (idx_to_f64(i) * 12.9898).sin().abs();
        f64::from(u8::from(noise < 1.0 / (1.0 + (-eta).exp())))
    });
    let names = ["age", "bmi", "smoker", "sbp", "ldl", "hdl"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let data = CovariateData::new(design_matrix, outcome, LikelihoodFamily::Logistic)
        .with_covariate_names(names);

    let config = SamplerConfig {
        mcmc: McmcConfig {
            iterations: 20_000,
            burn_in: 5_000,
            thin: 10,
            adaption_length: 5_000,
            console_output_interval: 5_000,
            seed: 2_024,
        },
        ..SamplerConfig::default()
    };

    let mut sampler = match Sampler::new(&data, config) {
        Ok(sampler) => sampler,
        Err(error) => {
            eprintln!("invalid run: {error}");
            return;
        }
    };
    let mut samples = PosteriorSamples::default();
    match sampler.run(&mut samples) {
        Ok(report) => {
            let summary = summarize_posterior(&samples);
            println!("{}", render_posterior_table(&summary));
            println!("{}", render_acceptance_table(&report));
            println!(
                "log-likelihood ESS: {:.1} of {} draws",
                summary.log_likelihood_ess, summary.draw_count
            );
        }
        Err(error) => eprintln!("sampling failed: {error}"),
    }
}

fn idx_to_f64(idx: usize) -> f64 {
    f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
}
