//! Shared limit pipeline used by every subcommand.
//!
//! load model -> apply luminosity -> resolve scan range -> build calculator -> summarize
//!
//! Handlers in `app` only print the summaries and write optional exports.

use std::sync::Arc;

use crate::calc::{
    BayesCalculator, ClsCalculator, ExpectedLimitsGenerator, LimitCalculator, WaldCalculator,
};
use crate::domain::{
    BayesSummary, CalculatorKind, ClsSummary, ExpectedBands, ExpectedConfig, ExpectedSummary, LimitConfig, ModelFormat,
    RunInfo, SynthConfig, WaldSummary,
};
use crate::error::AppError;
use crate::io::{read_counted_table, read_poisson_gamma, read_table, write_table};
use crate::models::{CountingModel, Model, MultiPoisson};
use crate::prior::{FlatPrior, PowerPrior, Prior};

/// A loaded model with its resolved scan range.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub model: Arc<Model>,
    pub mu_min: f64,
    pub mu_max: f64,
    pub info: RunInfo,
}

/// Read the input file in the configured format and apply the luminosity.
pub fn load_model(config: &LimitConfig) -> Result<Model, AppError> {
    tracing::info!(path = %config.input.display(), format = ?config.format, "loading model");
    let model = match config.format {
        ModelFormat::MultiPoisson | ModelFormat::Counted => {
            let mut m = if config.format == ModelFormat::Counted {
                read_counted_table(&config.input)?
            } else {
                read_table(&config.input)?
            };
            if let Some(index) = config.draw {
                m = m.single_draw(index)?;
                tracing::info!(index, "evaluating a single ensemble draw");
            }
            if let Some(lumi) = config.lumi {
                m = m.with_luminosity(lumi)?;
            }
            Model::MultiPoisson(m)
        }
        ModelFormat::PoissonGamma => {
            if config.draw.is_some() {
                return Err(AppError::range("A draw index only applies to ensemble inputs."));
            }
            let mut m = read_poisson_gamma(&config.input)?;
            if let Some(lumi) = config.lumi {
                m = m.with_luminosity(lumi)?;
            }
            Model::PoissonGamma(m)
        }
    };
    tracing::info!(model = model.kind_name(), nbins = model.nbins(), "model loaded");
    Ok(model)
}

/// Fill missing range ends from the model's suggestion.
pub fn resolve_range(model: &dyn CountingModel, config: &LimitConfig) -> Result<(f64, f64), AppError> {
    let (lo, hi) = model.suggest_range();
    let mu_min = config.mu_min.unwrap_or(lo);
    let mu_max = config.mu_max.unwrap_or(hi);
    if !(mu_min.is_finite() && mu_max.is_finite() && mu_min >= 0.0 && mu_max > mu_min) {
        return Err(AppError::range(format!(
            "Invalid scan range [{mu_min}, {mu_max}]; need 0 <= mu_min < mu_max."
        )));
    }
    tracing::debug!(mu_min, mu_max, suggested_max = hi, "scan range resolved");
    Ok((mu_min, mu_max))
}

pub fn prepare(config: &LimitConfig) -> Result<Prepared, AppError> {
    let model = load_model(config)?;
    let (mu_min, mu_max) = resolve_range(&model, config)?;
    let info = RunInfo {
        input: config.input.clone(),
        model: model.kind_name().to_string(),
        labels: model.labels().to_vec(),
        counts: model.counts().to_vec(),
        mu_min,
        mu_max,
    };
    Ok(Prepared {
        model: Arc::new(model),
        mu_min,
        mu_max,
        info,
    })
}

fn level(config: &LimitConfig, kind: CalculatorKind) -> f64 {
    config.cl.unwrap_or_else(|| kind.default_cl())
}

fn prior(config: &LimitConfig) -> Result<Arc<dyn Prior>, AppError> {
    match config.prior_power {
        None => Ok(Arc::new(FlatPrior)),
        Some(power) if power.is_finite() => Ok(Arc::new(PowerPrior::new(power))),
        Some(power) => Err(AppError::range(format!("Prior power must be finite, got {power}."))),
    }
}

fn bayes_calculator(p: &Prepared, config: &LimitConfig, cl: f64) -> Result<BayesCalculator<Model>, AppError> {
    let data = p.model.counts().to_vec();
    BayesCalculator::with_prior(p.model.clone(), data, p.mu_min, p.mu_max, cl, prior(config)?)
}

pub fn run_bayes(config: &LimitConfig) -> Result<BayesSummary, AppError> {
    let p = prepare(config)?;
    let cl = level(config, CalculatorKind::Bayes);
    let calc = bayes_calculator(&p, config, cl)?;
    tracing::info!(cl, prior = ?calc.prior(), "posterior built");

    let map_estimate = calc.map_estimate()?;
    let map_uncertainty = calc
        .map_uncertainty(cl)
        .map_err(|e| tracing::warn!(error = %e, "MAP uncertainty unavailable"))
        .ok();
    let z_map = calc
        .zvalue(map_estimate)
        .map_err(|e| tracing::warn!(error = %e, "Z-value at the MAP estimate unavailable"))
        .ok();
    Ok(BayesSummary {
        cl,
        upper_limit: calc.upper_limit()?,
        interval: calc.central_interval(cl)?,
        map_estimate,
        map_uncertainty,
        z_map,
        run: p.info,
    })
}

pub fn run_wald(config: &LimitConfig) -> Result<WaldSummary, AppError> {
    let p = prepare(config)?;
    let cl = level(config, CalculatorKind::Wald);
    let data = p.model.counts().to_vec();
    let calc = WaldCalculator::new(p.model.clone(), data, p.mu_min, p.mu_max, cl)?;
    tracing::info!(estimate = calc.estimate(), uncertainty = calc.uncertainty(), "asymptotic fit done");

    let z0 = calc
        .zvalue(0.0)
        .map_err(|e| tracing::warn!(error = %e, "Z-value against mu=0 unavailable"))
        .ok();
    Ok(WaldSummary {
        cl,
        estimate: calc.estimate(),
        uncertainty: calc.uncertainty(),
        upper_limit: calc.upper_limit()?,
        interval: calc.central_interval(cl)?,
        p0: z0.map(crate::math::std_normal_sf),
        z0,
        run: p.info,
    })
}

pub fn run_cls(config: &LimitConfig) -> Result<ClsSummary, AppError> {
    let p = prepare(config)?;
    let cl = level(config, CalculatorKind::Cls);
    let data = p.model.counts().to_vec();
    let calc = ClsCalculator::new(p.model.clone(), data, p.mu_min, p.mu_max, cl)?;
    let upper_limit = calc.upper_limit()?;
    tracing::info!(upper_limit, "CLs limit found");
    Ok(ClsSummary {
        cl,
        estimate: calc.wald().estimate(),
        uncertainty: calc.wald().uncertainty(),
        upper_limit,
        run: p.info,
    })
}

pub fn run_expected(config: &ExpectedConfig) -> Result<ExpectedSummary, AppError> {
    let p = prepare(&config.limit)?;
    let cl = level(&config.limit, config.method);
    let generator = ExpectedLimitsGenerator::new(config.prob.clone())?;
    let data = p.model.counts().to_vec();

    let (observed_limit, expected) = match config.method {
        CalculatorKind::Bayes => {
            let calc = bayes_calculator(&p, &config.limit, cl)?;
            expected_for(&calc, &generator, config)?
        }
        CalculatorKind::Wald => {
            let calc = WaldCalculator::new(p.model.clone(), data, p.mu_min, p.mu_max, cl)?;
            expected_for(&calc, &generator, config)?
        }
        CalculatorKind::Cls => {
            let calc = ClsCalculator::new(p.model.clone(), data, p.mu_min, p.mu_max, cl)?;
            expected_for(&calc, &generator, config)?
        }
    };

    Ok(ExpectedSummary {
        method: config.method,
        cl,
        true_mu: config.true_mu,
        seed: config.seed,
        observed_limit,
        expected,
        run: p.info,
    })
}

fn expected_for<C: LimitCalculator>(
    calc: &C,
    generator: &ExpectedLimitsGenerator,
    config: &ExpectedConfig,
) -> Result<(f64, ExpectedBands), AppError> {
    let observed = calc.upper_limit()?;
    let limits = generator.run(calc, config.true_mu, config.toys, config.seed)?;
    Ok((observed, limits.bands()))
}

/// Synthesize an ensemble and write it as a table.
pub fn run_synth(config: &SynthConfig) -> Result<MultiPoisson, AppError> {
    let model = crate::synth::synthesize(config)?;
    write_table(&config.output, &model)?;
    tracing::info!(path = %config.output.display(), "ensemble table written");
    Ok(model)
}
