//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - converts them into plain configs
//! - runs the pipeline
//! - prints reports and writes optional JSON exports

use clap::Parser;

use crate::cli::{Cli, Command, ExpectedArgs, LimitArgs, SynthArgs};
use crate::domain::{BinEstimate, ExpectedConfig, LimitConfig, SynthConfig};
use crate::error::AppError;
use crate::io::write_json;

pub mod pipeline;

/// Entry point for the `limits` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    dispatch(cli.command)
}

/// Install the `fmt` subscriber; a second call (tests) is a no-op.
pub fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(command: Command) -> Result<(), AppError> {
    match command {
        Command::Bayes(args) => {
            let config = limit_config_from_args(&args);
            let summary = pipeline::run_bayes(&config)?;
            println!("{}", crate::report::format_bayes(&summary));
            export(&config, &summary)
        }
        Command::Wald(args) => {
            let config = limit_config_from_args(&args);
            let summary = pipeline::run_wald(&config)?;
            println!("{}", crate::report::format_wald(&summary));
            export(&config, &summary)
        }
        Command::Cls(args) => {
            let config = limit_config_from_args(&args);
            let summary = pipeline::run_cls(&config)?;
            println!("{}", crate::report::format_cls(&summary));
            export(&config, &summary)
        }
        Command::Expected(args) => handle_expected(&args),
        Command::Synth(args) => handle_synth(&args),
    }
}

fn handle_expected(args: &ExpectedArgs) -> Result<(), AppError> {
    let config = expected_config_from_args(args);
    let summary = pipeline::run_expected(&config)?;
    println!("{}", crate::report::format_expected(&summary));
    export(&config.limit, &summary)
}

fn handle_synth(args: &SynthArgs) -> Result<(), AppError> {
    let config = synth_config_from_args(args)?;
    let model = pipeline::run_synth(&config)?;
    println!("{}", crate::report::format_synth(&model, &config.output));
    Ok(())
}

fn export<T: serde::Serialize>(config: &LimitConfig, summary: &T) -> Result<(), AppError> {
    if let Some(path) = &config.json {
        write_json(path, summary)?;
        tracing::info!(path = %path.display(), "JSON summary written");
    }
    Ok(())
}

pub fn limit_config_from_args(args: &LimitArgs) -> LimitConfig {
    LimitConfig {
        input: args.input.clone(),
        format: args.model,
        lumi: args.lumi,
        mu_min: args.mu_min,
        mu_max: args.mu_max,
        cl: args.cl,
        prior_power: args.prior_power,
        draw: args.draw,
        json: args.json.clone(),
    }
}

pub fn expected_config_from_args(args: &ExpectedArgs) -> ExpectedConfig {
    ExpectedConfig {
        limit: limit_config_from_args(&args.limit),
        method: args.method,
        true_mu: args.true_mu,
        toys: args.toys,
        seed: args.seed,
        prob: args.prob.clone(),
    }
}

pub fn synth_config_from_args(args: &SynthArgs) -> Result<SynthConfig, AppError> {
    if !args.labels.is_empty() && args.labels.len() != args.bins.len() {
        return Err(AppError::format(format!(
            "{} labels given for {} bins.",
            args.labels.len(),
            args.bins.len()
        )));
    }
    let bins = args
        .bins
        .iter()
        .enumerate()
        .map(|(i, b)| BinEstimate {
            label: args.labels.get(i).cloned().unwrap_or_else(|| format!("bin{}", i + 1)),
            count: b.count,
            response: b.response,
            response_unc: b.response_unc,
            background: b.background,
            background_unc: b.background_unc,
        })
        .collect();
    Ok(SynthConfig {
        bins,
        draws: args.draws,
        seed: args.seed,
        response_correlation: args.correlation,
        output: args.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn synth_args(argv: &[&str]) -> SynthArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Synth(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn synth_labels_default_and_must_match() {
        let args = synth_args(&["limits", "synth", "--bin", "1,1,0,1,0", "--bin", "2,1,0,1,0", "-o", "x.txt"]);
        let config = synth_config_from_args(&args).unwrap();
        assert_eq!(config.bins[1].label, "bin2");
        assert_eq!(config.bins[1].count, 2);

        let args = synth_args(&[
            "limits", "synth", "--bin", "1,1,0,1,0", "--labels", "a,b", "-o", "x.txt",
        ]);
        assert_eq!(synth_config_from_args(&args).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn bayes_command_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "bin1\n0\n1.0\n0.0\n").unwrap();
        let json = dir.path().join("out.json");
        let (input_arg, json_arg) = (input.display().to_string(), json.display().to_string());
        let cli = Cli::try_parse_from([
            "limits", "bayes", input_arg.as_str(), "--mu-max", "20", "--json", json_arg.as_str(),
        ])
        .unwrap();
        dispatch(cli.command).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        let limit = value["upper_limit"].as_f64().unwrap();
        assert!((limit - 2.302585).abs() < 1e-3);
        assert_eq!(value["run"]["counts"][0], 0);
    }
}
