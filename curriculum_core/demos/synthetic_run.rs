use std::path::PathBuf;

use evo_curriculum_core::config::ConfigError;
use evo_curriculum_core::{
    read_confusion_stream, CurriculumConfig, DriverOptions, Hyperparameters, InMemoryDataSource,
    RunState, SpecialistRegistry, TrainingLoopDriver,
};

const SEED: u64 = 1;
const GENERATIONS: u64 = 1200;
const TRIALS: usize = 50;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let hyperparameters = load_hyperparameters()?;
    let curriculum = load_curriculum()?;
    println!(
        "Loaded hyperparameters: maxmsteps={} samplesize={} saveeach={}m",
        hyperparameters.max_million_steps(),
        hyperparameters.sample_size,
        hyperparameters.save_each_minutes
    );

    let out = PathBuf::from("out/synthetic_run");
    let source = InMemoryDataSource::synthetic(SEED, GENERATIONS, TRIALS, 4);
    let mut registry = SpecialistRegistry::new("synthetic", out.join("curriculum"));
    registry.add_specialists(curriculum.into_configs())?;

    let mut state = RunState::new(SEED);
    let report = TrainingLoopDriver::new(
        &source,
        &mut registry,
        hyperparameters,
        DriverOptions::new(SEED, &out),
    )
    .with_progress(|line| {
        if line.generation % 100 == 0 {
            println!("{line}");
        }
    })
    .run(&mut state)?;

    println!(
        "Processed {} generations in {} iterations",
        report.generations_processed, report.iterations
    );
    for specialist in registry.specialists() {
        let summary = specialist.tracker().summary();
        println!(
            "{:>10}: {} generations, {} refits, postfit accuracy {:.3} (gain {:+.3})",
            specialist.name(),
            summary.generations,
            specialist.fit_count(),
            summary.postfit.accuracy(),
            summary.accuracy_gain()
        );
    }

    let rows = read_confusion_stream(registry.stream_path())?;
    println!("Confusion stream holds {} rows", rows.len());
    Ok(())
}

fn load_hyperparameters() -> Result<Hyperparameters, ConfigError> {
    Hyperparameters::load_from_file("config/evo.ini").or_else(|err| match err {
        ConfigError::MissingFile { .. } => Ok(Hyperparameters::default()),
        other => Err(other),
    })
}

fn load_curriculum() -> Result<CurriculumConfig, ConfigError> {
    CurriculumConfig::load_from_file("config/specialists.toml").or_else(|err| match err {
        ConfigError::MissingFile { .. } => Ok(CurriculumConfig::single_main(TRIALS)),
        other => Err(other),
    })
}
