//! Command-line argument parsing.

use std::path::{Path, PathBuf};

use clap::Parser;

/// Replay a recorded evolution-strategies run through curriculum specialists
#[derive(Parser, Debug)]
#[command(name = "evo_trainer")]
#[command(version)]
#[command(about = "Run curriculum specialists against a generation-indexed evolution run")]
#[command(long_about = None)]
pub struct Args {
    /// Hyperparameter file with an [ALGO] section
    #[arg(short = 'f', long = "fileini", value_name = "FILE")]
    pub fileini: PathBuf,

    /// Seed of the run
    #[arg(short = 's', long, default_value_t = 1)]
    pub seed: u64,

    /// Directory receiving checkpoints and metric streams
    #[arg(short = 'd', long = "filedir", value_name = "DIR", default_value = ".")]
    pub filedir: PathBuf,

    /// Directory holding evolution.jsonl and conditions.jsonl (defaults to --filedir)
    #[arg(long, value_name = "DIR")]
    pub data: Option<PathBuf>,

    /// Conditions expected per generation
    #[arg(long, value_name = "N", default_value_t = 50)]
    pub trials: usize,

    /// TOML file declaring the specialists to register
    #[arg(long, value_name = "FILE")]
    pub specialists: Option<PathBuf>,

    /// Stop once the generation counter reaches N (0 disables the limit)
    #[arg(long = "test-limit", value_name = "N")]
    pub test_limit: Option<u64>,

    /// Continue from the last full checkpoint in --filedir
    #[arg(long)]
    pub resume: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    pub fn data_dir(&self) -> &Path {
        self.data.as_deref().unwrap_or(&self.filedir)
    }

    /// Per-seed directory for checkpoints and streams.
    pub fn run_dir(&self) -> PathBuf {
        self.filedir.join(format!("S{}", self.seed))
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_filedir() {
        let args = Args::try_parse_from(["evo_trainer", "-f", "evo.ini", "-d", "runs"]).unwrap();
        assert_eq!(args.seed, 1);
        assert_eq!(args.trials, 50);
        assert_eq!(args.data_dir(), Path::new("runs"));
        assert_eq!(args.run_dir(), PathBuf::from("runs").join("S1"));
        assert!(args.test_limit.is_none());
        assert!(!args.resume);
        assert_eq!(args.log_filter(), "info");
    }

    #[test]
    fn explicit_options() {
        let args = Args::try_parse_from([
            "evo_trainer",
            "--fileini",
            "evo.ini",
            "--seed",
            "7",
            "--data",
            "recorded",
            "--test-limit",
            "5",
            "--resume",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.seed, 7);
        assert_eq!(args.data_dir(), Path::new("recorded"));
        assert_eq!(args.test_limit, Some(5));
        assert!(args.resume);
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn fileini_is_required() {
        assert!(Args::try_parse_from(["evo_trainer"]).is_err());
    }
}
