mod args;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use evo_curriculum_core::driver::{has_checkpoint, simulation_time};
use evo_curriculum_core::{
    CurriculumConfig, DriverOptions, Hyperparameters, JsonlDataSource, RunReport, RunState,
    SpecialistRegistry, TrainingLoopDriver,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let hyperparameters = match Hyperparameters::load_from_file(&args.fileini) {
        Ok(hyperparameters) => hyperparameters,
        Err(err) => {
            eprintln!("{err}");
            if err.wants_usage() {
                eprint!("{}", Hyperparameters::usage());
            }
            return ExitCode::from(2);
        }
    };

    match run(&args, hyperparameters) {
        Ok(report) => {
            println!("{}", simulation_time(report.elapsed));
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_registry(args: &Args) -> Result<SpecialistRegistry> {
    let curriculum = match &args.specialists {
        Some(path) => CurriculumConfig::load_from_file(path)
            .with_context(|| format!("failed to load specialists from {}", path.display()))?,
        None => CurriculumConfig::single_main(args.trials),
    };

    let mut registry =
        SpecialistRegistry::new(format!("S{}", args.seed), args.run_dir().join("curriculum"));
    registry.add_specialists(curriculum.into_configs())?;
    Ok(registry)
}

fn run(args: &Args, hyperparameters: Hyperparameters) -> Result<RunReport> {
    let source = JsonlDataSource::open(args.data_dir()).with_context(|| {
        format!(
            "failed to open generation data in {}",
            args.data_dir().display()
        )
    })?;
    let mut registry = build_registry(args)?;

    let mut options = DriverOptions::new(args.seed, args.run_dir());
    if let Some(limit) = args.test_limit {
        options = options.with_test_limit(limit);
    }

    let mut driver = TrainingLoopDriver::new(source, &mut registry, hyperparameters, options)
        .with_progress(|line| println!("{line}"));

    let mut state = if args.resume && has_checkpoint(args.run_dir()) {
        driver.restore().context("failed to resume from checkpoint")?
    } else {
        if args.resume {
            warn!(
                dir = %args.run_dir().display(),
                "no checkpoint found, starting a fresh run"
            );
        }
        RunState::new(args.seed)
    };

    let report = driver.run(&mut state)?;
    info!(
        iterations = report.iterations,
        generations = report.generations_processed,
        full_saves = report.full_saves,
        termination = ?report.termination,
        "run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_curriculum_core::{DriverState, InMemoryDataSource};

    fn args(dir: &std::path::Path, extra: &[&str]) -> Args {
        let fileini = dir.join("evo.ini");
        let filedir = dir.to_string_lossy().to_string();
        let fileini = fileini.to_string_lossy().to_string();
        let mut argv = vec![
            "evo_trainer",
            "-f",
            fileini.as_str(),
            "-d",
            filedir.as_str(),
            "--trials",
            "20",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn record_run(dir: &std::path::Path, generations: u64) {
        let mut store = JsonlDataSource::open(dir).unwrap();
        store
            .import(&InMemoryDataSource::synthetic(3, generations, 20, 2))
            .unwrap();
    }

    #[test]
    fn default_registry_has_single_main_specialist() {
        let dir = tempfile::tempdir().unwrap();
        let registry = build_registry(&args(dir.path(), &[])).unwrap();
        assert_eq!(registry.names(), vec!["main"]);
        assert_eq!(registry.get("main").unwrap().config().generation_trials, 20);
    }

    #[test]
    fn specialists_file_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specialists.toml");
        std::fs::write(
            &path,
            "[family]\nstart_generation = 2\nbatch_sizes = [10, 20]\ngeneration_trials = 20\n",
        )
        .unwrap();
        let registry =
            build_registry(&args(dir.path(), &["--specialists", path.to_str().unwrap()])).unwrap();
        assert_eq!(registry.names(), vec!["sp10", "sp20"]);
    }

    #[test]
    fn limited_run_then_resume() {
        let dir = tempfile::tempdir().unwrap();
        record_run(dir.path(), 6);

        let first = run(&args(dir.path(), &["--test-limit", "3"]), Hyperparameters::default())
            .unwrap();
        assert_eq!(first.termination, DriverState::TerminatedByLimit);
        assert_eq!(first.generations_processed, 2);

        let resumed = run(&args(dir.path(), &["--resume"]), Hyperparameters::default()).unwrap();
        assert_eq!(resumed.termination, DriverState::TerminatedByEnd);
        assert_eq!(resumed.generations_processed, 4);
    }
}
