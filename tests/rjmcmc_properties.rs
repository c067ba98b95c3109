use approx::assert_relative_eq;
use faer::Mat;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rjmcmc_glm::models::rjmcmc::{
    LikelihoodModel, acceptance_probability, log_marginal_likelihood_direct,
};
use rjmcmc_glm::{
    ConjugatePrior, CovariateData, InitialModel, LikelihoodFamily, McmcConfig, ModelSpacePrior,
    ModelState, MoveProbabilities, PosteriorSamples, PriorConfig, Sampler, SamplerConfig,
};

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn simulate(family: LikelihoodFamily, rows: usize, covariates: usize, seed: u64) -> CovariateData {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..rows * covariates)
        .map(|_| sample_standard_normal(&mut rng))
        .collect::<Vec<_>>();
    let uniforms = (0..rows).map(|_| rng.random::<f64>()).collect::<Vec<_>>();
    let design = Mat::from_fn(rows, covariates, |row, col| values[covariates * row + col]);
    let outcome = Mat::from_fn(rows, 1, |row, _| {
        let signal = 0.8 * design[(row, 0)] - 0.4 * design[(row, covariates - 1)];
        match family {
            LikelihoodFamily::Logistic => {
                let probability = 1.0 / (1.0 + (-signal).exp());
                f64::from(u8::from(uniforms[row] < probability))
            }
            LikelihoodFamily::Weibull => {
                -(1.0 - uniforms[row]).min(1.0 - 1.0e-9).ln() / signal.exp()
            }
            _ => signal + uniforms[row] - 0.5,
        }
    });
    let data = CovariateData::new(design, outcome, family);
    if family == LikelihoodFamily::Weibull {
        data.with_event_indicator((0..rows).map(|row| row % 3 != 0).collect())
    } else {
        data
    }
}

fn schedule(iterations: usize, adaption_length: usize) -> McmcConfig {
    McmcConfig {
        iterations,
        burn_in: adaption_length,
        thin: 10,
        adaption_length,
        console_output_interval: iterations,
        seed: 99,
    }
}

const FAMILIES: [LikelihoodFamily; 5] = [
    LikelihoodFamily::Logistic,
    LikelihoodFamily::Weibull,
    LikelihoodFamily::Gaussian,
    LikelihoodFamily::GaussianMarginal,
    LikelihoodFamily::Conjugate,
];

#[test]
fn fixed_covariates_survive_every_move() {
    for family in FAMILIES {
        let data = simulate(family, 40, 5, 3).with_fixed_covariates(2);
        let config = SamplerConfig {
            mcmc: schedule(1_500, 500),
            ..SamplerConfig::default()
        };
        let mut sampler = Sampler::new(&data, config).expect("valid sampler");
        for iteration in 0..1_500 {
            sampler.step(iteration);
            let state = sampler.current();
            assert!(state.inclusion[..2].iter().all(|included| *included), "{family}");
        }
    }
}

#[test]
fn dimensions_track_inclusion() {
    for family in FAMILIES {
        let data = simulate(family, 40, 6, 5).with_partition_splits(vec![3]);
        let config = SamplerConfig {
            mcmc: schedule(1_500, 500),
            priors: PriorConfig {
                model_space: ModelSpacePrior::BetaBinomial {
                    hyperparameters: vec![(1.0, 1.0), (2.0, 3.0)],
                },
                ..PriorConfig::default()
            },
            ..SamplerConfig::default()
        };
        let mut sampler = Sampler::new(&data, config).expect("valid sampler");
        for iteration in 0..1_500 {
            sampler.step(iteration);
            let state = sampler.current();
            let included = state.inclusion.iter().filter(|value| **value).count();
            assert_eq!(state.model_dimension, included, "{family}");
            assert_eq!(state.partition_dimensions.iter().sum::<usize>(), included);
            for (covariate, included) in state.inclusion.iter().enumerate() {
                if !included {
                    assert!(state.coefficients[covariate].abs() < f64::EPSILON);
                }
            }
            assert!(state.log_likelihood.is_finite());
            assert!(state.log_prior.is_finite());
            assert!((0.0..=1.0).contains(&state.acceptance_probability));
        }
    }
}

#[test]
fn acceptance_probability_stays_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10_000 {
        let log_ratio = 200.0f64.mul_add(rng.random::<f64>(), -100.0);
        let probability = acceptance_probability(log_ratio);
        assert!((0.0..=1.0).contains(&probability));
    }
    for log_ratio in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, -0.0] {
        assert!((0.0..=1.0).contains(&acceptance_probability(log_ratio)));
    }
    assert!(acceptance_probability(f64::NAN).abs() < f64::EPSILON);
}

#[test]
fn extreme_coefficients_never_produce_nan() {
    let mut rng = StdRng::seed_from_u64(8);
    for family in FAMILIES {
        let data = simulate(family, 25, 3, 19);
        let model = LikelihoodModel::new(&data, ConjugatePrior::default());
        let mut reference = ModelState::new(&data, vec![true; 3], family.uses_linear_predictor());
        if family.has_dispersion() {
            reference.log_dispersion = Some(0.0);
        }
        reference.recompute_linear_predictor(&data);
        let reference_ll = model.log_likelihood(&reference, &data);

        for _ in 0..200 {
            let mut state = reference.clone();
            let magnitude = 10f64.powf(12.0 * rng.random::<f64>() - 4.0);
            for covariate in 0..3 {
                let sign = if rng.random::<f64>() < 0.5 { -1.0 } else { 1.0 };
                state.set_coefficient(covariate, sign * magnitude, &data);
            }
            if let Some(log_dispersion) = state.log_dispersion.as_mut() {
                *log_dispersion = 200.0f64.mul_add(rng.random::<f64>(), -100.0);
            }
            let value = model.log_likelihood(&state, &data);
            assert!(!value.is_nan(), "{family}");
            let probability = acceptance_probability(value - reference_ll);
            assert!((0.0..=1.0).contains(&probability), "{family}");
        }
    }
}

#[test]
fn null_model_likelihood_is_finite_for_every_family() {
    for family in FAMILIES {
        let data = simulate(family, 25, 3, 13);
        let model = LikelihoodModel::new(&data, ConjugatePrior::default());
        let mut state = ModelState::new(&data, vec![false; 3], family.uses_linear_predictor());
        if family.has_dispersion() {
            state.log_dispersion = Some(0.0);
        }
        assert!(model.log_likelihood(&state, &data).is_finite(), "{family}");
    }
}

#[test]
fn add_then_remove_restores_likelihood() {
    let data = simulate(LikelihoodFamily::Gaussian, 10, 2, 21);
    let model = LikelihoodModel::new(&data, ConjugatePrior::default());
    let mut state = ModelState::new(&data, vec![false; 2], true);
    state.log_dispersion = Some(-0.3);
    state.set_intercept(0.4);
    let before = model.log_likelihood(&state, &data);

    state.include(1, 0.75, &data);
    let during = model.log_likelihood(&state, &data);
    state.exclude(1, &data);
    let after = model.log_likelihood(&state, &data);

    assert!((during - before).abs() > 1.0e-6);
    assert_relative_eq!(before, after, epsilon = 1.0e-10);
}

#[test]
fn adaption_targets_the_configured_acceptance_rate() {
    let data = simulate(LikelihoodFamily::Gaussian, 80, 2, 31);
    let config = SamplerConfig {
        mcmc: McmcConfig {
            iterations: 20_000,
            burn_in: 10_000,
            thin: 10,
            adaption_length: 10_000,
            console_output_interval: 20_000,
            seed: 5,
        },
        variable_selection: false,
        ..SamplerConfig::default()
    };
    let mut sampler = Sampler::new(&data, config).expect("valid sampler");
    let mut samples = PosteriorSamples::default();
    let report = sampler.run(&mut samples).expect("in-memory sink");

    assert_eq!(report.sampling.null.proposed, 20_000 - 10_001);
    let rate = report.sampling.null.acceptance_rate();
    assert!((rate - 0.44).abs() < 0.15, "null acceptance {rate}");
    assert_eq!(report.sampling.add.proposed + report.sampling.remove.proposed, 0);
}

#[test]
fn full_model_start_is_reported() {
    let data = simulate(LikelihoodFamily::Logistic, 60, 4, 41);
    let config = SamplerConfig {
        mcmc: schedule(10, 5),
        initial_model: InitialModel::FullModel,
        ..SamplerConfig::default()
    };
    let sampler = Sampler::new(&data, config).expect("valid sampler");
    assert_eq!(sampler.current().model_dimension, 4);
    assert_relative_eq!(
        sampler.current().intercept,
        {
            let mean = (0..60).map(|row| data.outcome[(row, 0)]).sum::<f64>() / usize_to_f64(60);
            (mean / (1.0 - mean)).ln()
        },
        epsilon = 1.0e-10
    );
}

#[test]
fn conjugate_chain_visits_models_in_posterior_proportion() {
    let rows = 30;
    let mut rng = StdRng::seed_from_u64(61);
    let values = (0..rows * 4)
        .map(|_| sample_standard_normal(&mut rng))
        .collect::<Vec<_>>();
    let noise = (0..rows)
        .map(|_| sample_standard_normal(&mut rng))
        .collect::<Vec<_>>();
    let design = Mat::from_fn(rows, 4, |row, col| values[4 * row + col]);
    let outcome = Mat::from_fn(rows, 1, |row, _| {
        0.25f64.mul_add(design[(row, 2)], 0.35 * design[(row, 0)]) + noise[row]
    });
    let data = CovariateData::new(design, outcome, LikelihoodFamily::Conjugate)
        .with_partition_splits(vec![2]);

    let iterations = 300_000;
    let config = SamplerConfig {
        mcmc: schedule(iterations, 1_000),
        moves: MoveProbabilities {
            add: 0.15,
            remove: 0.15,
            swap: 0.7,
            null: 0.0,
        },
        priors: PriorConfig {
            model_space: ModelSpacePrior::BetaBinomial {
                hyperparameters: vec![(1.0, 4.0), (3.0, 1.0)],
            },
            ..PriorConfig::default()
        },
        ..SamplerConfig::default()
    };
    let mut sampler = Sampler::new(&data, config).expect("valid sampler");

    let pattern = |model: usize| (0..4).map(|bit| (model & (1 << bit)) != 0).collect::<Vec<_>>();
    let log_posterior = (0..16)
        .map(|model| {
            let inclusion = pattern(model);
            let dimensions = [
                inclusion[..2].iter().filter(|value| **value).count(),
                inclusion[2..].iter().filter(|value| **value).count(),
            ];
            log_marginal_likelihood_direct(&data, &inclusion, ConjugatePrior::default(), 1.0)
                + sampler.priors().log_model_space_prior(&dimensions)
        })
        .collect::<Vec<_>>();
    let max_log = log_posterior.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let normaliser = log_posterior
        .iter()
        .map(|value| (value - max_log).exp())
        .sum::<f64>();
    let exact = log_posterior
        .iter()
        .map(|value| (value - max_log).exp() / normaliser)
        .collect::<Vec<_>>();

    let mut visits = [0_usize; 16];
    for iteration in 0..iterations {
        sampler.step(iteration);
        if iteration >= 1_000 {
            let model = sampler
                .current()
                .inclusion
                .iter()
                .enumerate()
                .filter(|(_, included)| **included)
                .map(|(covariate, _)| 1 << covariate)
                .sum::<usize>();
            visits[model] += 1;
        }
    }
    let report = sampler.report();
    assert!(report.sampling.swap.accepted > 0);

    let recorded = usize_to_f64(iterations - 1_000);
    for (model, expected) in exact.iter().enumerate() {
        let observed = usize_to_f64(visits[model]) / recorded;
        assert!(
            (observed - expected).abs() < 0.01,
            "model {model:04b}: observed {observed}, expected {expected}"
        );
    }
}
