//! Run configuration: algorithm hyperparameters and specialist definitions.
//!
//! Hyperparameter files are section-keyed `key = value` text. Only the `[ALGO]`
//! section is interpreted here; sections read by other collaborators (policy,
//! environment) are skipped. Every key of `[ALGO]` must belong to the
//! [`HyperOption`] schema, and all values are checked in a single pass.
//!
//! Specialist definitions live in a separate TOML file deserialized with serde.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::registry::batch_specialists;
use crate::specialist::SpecialistConfig;

const ALGO_SECTION: &str = "ALGO";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .path.display())]
    MissingFile { path: PathBuf },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown hyperparameter '{key}'")]
    UnknownOption { key: String },
    #[error("Invalid value '{value}' for '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}

impl ConfigError {
    /// Whether the caller should show the option schema.
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingFile { .. }
                | ConfigError::UnknownOption { .. }
                | ConfigError::InvalidValue { .. }
        )
    }

    fn invalid(option: HyperOption, value: &str) -> Self {
        ConfigError::InvalidValue {
            key: option.key().to_string(),
            value: value.to_string(),
            expected: option.expected().to_string(),
        }
    }
}

/// Recognized `[ALGO]` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HyperOption {
    MaxMSteps,
    StepSize,
    SampleSize,
    NoiseStdDev,
    WDecay,
    SymSeed,
    SaveEach,
}

impl HyperOption {
    pub const ALL: [HyperOption; 7] = [
        HyperOption::MaxMSteps,
        HyperOption::StepSize,
        HyperOption::SampleSize,
        HyperOption::NoiseStdDev,
        HyperOption::WDecay,
        HyperOption::SymSeed,
        HyperOption::SaveEach,
    ];

    pub fn key(self) -> &'static str {
        match self {
            HyperOption::MaxMSteps => "maxmsteps",
            HyperOption::StepSize => "stepsize",
            HyperOption::SampleSize => "samplesize",
            HyperOption::NoiseStdDev => "noiseStdDev",
            HyperOption::WDecay => "wdecay",
            HyperOption::SymSeed => "symseed",
            HyperOption::SaveEach => "saveeach",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|option| option.key().eq_ignore_ascii_case(key))
    }

    fn expected(self) -> &'static str {
        match self {
            HyperOption::MaxMSteps | HyperOption::SaveEach => "a positive integer",
            HyperOption::SampleSize => "a positive integer",
            HyperOption::StepSize | HyperOption::NoiseStdDev => "a positive number",
            HyperOption::WDecay => "0, 1 or 2",
            HyperOption::SymSeed => "0 or 1",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            HyperOption::MaxMSteps => {
                "maxmsteps [integer]       : max number of (million) steps (default 1)"
            }
            HyperOption::StepSize => "stepsize [float]          : learning stepsize (default 0.01)",
            HyperOption::SampleSize => "samplesize [int]          : popsize/2 (default 20)",
            HyperOption::NoiseStdDev => "noiseStdDev [float]       : samples noise (default 0.02)",
            HyperOption::WDecay => {
                "wdecay [0/2]              : weight decay (default 0), 1 = L1, 2 = L2"
            }
            HyperOption::SymSeed => {
                "symseed [0/1]             : same environmental seed to evaluate symmetrical samples [default 1]"
            }
            HyperOption::SaveEach => {
                "saveeach [integer]        : save file every N minutes (default 60)"
            }
        }
    }
}

/// Weight decay applied by the evolutionary update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightDecay {
    #[default]
    None,
    L1,
    L2,
}

impl WeightDecay {
    pub fn code(self) -> u8 {
        match self {
            WeightDecay::None => 0,
            WeightDecay::L1 => 1,
            WeightDecay::L2 => 2,
        }
    }
}

/// Typed `[ALGO]` hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyperparameters {
    /// Total environment steps budget.
    pub max_steps: u64,
    pub step_size: f64,
    /// Half the population size.
    pub sample_size: usize,
    pub noise_std_dev: f64,
    pub weight_decay: WeightDecay,
    /// Symmetric samples share an environment seed.
    pub symmetric_seed: bool,
    /// Minutes between full checkpoints.
    pub save_each_minutes: u64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            step_size: 0.01,
            sample_size: 20,
            noise_std_dev: 0.02,
            weight_decay: WeightDecay::None,
            symmetric_seed: true,
            save_each_minutes: 60,
        }
    }
}

impl Hyperparameters {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// The option schema, one line per option.
    pub fn usage() -> String {
        let mut text = String::from("available hyperparameters are:\n");
        for option in HyperOption::ALL {
            text.push_str(option.describe());
            text.push('\n');
        }
        text
    }

    pub fn max_million_steps(&self) -> u64 {
        self.max_steps / 1_000_000
    }

    fn apply(&mut self, option: HyperOption, raw: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::invalid(option, raw);
        match option {
            HyperOption::MaxMSteps => {
                let millions: u64 = parse_positive_int(raw).ok_or_else(invalid)?;
                self.max_steps = millions.checked_mul(1_000_000).ok_or_else(invalid)?;
            }
            HyperOption::StepSize => self.step_size = parse_positive_float(raw).ok_or_else(invalid)?,
            HyperOption::SampleSize => {
                self.sample_size = parse_positive_int(raw).ok_or_else(invalid)? as usize
            }
            HyperOption::NoiseStdDev => {
                self.noise_std_dev = parse_positive_float(raw).ok_or_else(invalid)?
            }
            HyperOption::WDecay => {
                self.weight_decay = match raw.parse::<u8>() {
                    Ok(0) => WeightDecay::None,
                    Ok(1) => WeightDecay::L1,
                    Ok(2) => WeightDecay::L2,
                    _ => return Err(invalid()),
                }
            }
            HyperOption::SymSeed => {
                self.symmetric_seed = match raw.parse::<u8>() {
                    Ok(0) => false,
                    Ok(1) => true,
                    _ => return Err(invalid()),
                }
            }
            HyperOption::SaveEach => {
                self.save_each_minutes = parse_positive_int(raw).ok_or_else(invalid)?
            }
        }
        Ok(())
    }
}

fn parse_positive_int(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|v| *v > 0)
}

fn parse_positive_float(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

impl FromStr for Hyperparameters {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut section = String::new();
        let mut saw_algo = false;
        let mut params = Hyperparameters::default();

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed.trim_matches(&['[', ']'][..]).trim().to_string();
                saw_algo |= section.eq_ignore_ascii_case(ALGO_SECTION);
                continue;
            }

            if !section.eq_ignore_ascii_case(ALGO_SECTION) {
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .or_else(|| trimmed.split_once(':'))
                .ok_or_else(|| {
                    ConfigError::Parse(format!("line {}: expected key = value", index + 1))
                })?;
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            let option = HyperOption::from_key(key).ok_or_else(|| ConfigError::UnknownOption {
                key: key.to_string(),
            })?;
            params.apply(option, value)?;
        }

        if !saw_algo {
            warn!("no [{ALGO_SECTION}] section found, using default hyperparameters");
        }
        Ok(params)
    }
}

/// `sp<batch>` family shorthand in a specialists file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub start_generation: u64,
    pub batch_sizes: Vec<usize>,
    pub generation_trials: usize,
    #[serde(default = "default_fit_historical")]
    pub fit_historical: bool,
}

fn default_fit_historical() -> bool {
    true
}

/// Specialists to register, as read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurriculumConfig {
    #[serde(default)]
    pub family: Option<FamilyConfig>,
    #[serde(default)]
    pub specialists: BTreeMap<String, SpecialistConfig>,
}

impl CurriculumConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// The single specialist registered when no file is given.
    pub fn single_main(generation_trials: usize) -> Self {
        let mut specialists = BTreeMap::new();
        specialists.insert(
            "main".to_string(),
            SpecialistConfig::new(1000, 50, 50, generation_trials),
        );
        Self {
            family: None,
            specialists,
        }
    }

    /// Named configurations: family members first, then explicit tables in
    /// name order.
    pub fn into_configs(self) -> Vec<(String, SpecialistConfig)> {
        let mut configs = match self.family {
            Some(f) => batch_specialists(
                f.start_generation,
                &f.batch_sizes,
                f.generation_trials,
                f.fit_historical,
            ),
            None => Vec::new(),
        };
        configs.extend(self.specialists);
        configs
    }
}

impl FromStr for CurriculumConfig {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}
