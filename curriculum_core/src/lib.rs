//! # Evo Curriculum Core
//!
//! Curriculum-learning specialists kept in step with a generation-driven
//! evolution-strategies training loop. Each specialist learns online which
//! environment conditions are currently useful for training, and records
//! how its predictions compare with the observed outcomes before and after
//! every refit.
//!
//! ## Quick Start
//!
//! ```rust
//! use evo_curriculum_core::{Condition, Specialist, SpecialistConfig};
//!
//! let mut specialist = Specialist::configure("sp50", SpecialistConfig::new(1000, 50, 50, 50))?;
//! specialist.set_generation(1000);
//!
//! let conditions: Vec<Condition> = (0..50)
//!     .map(|i| Condition::from_parts(&[i as f64 / 50.0], (i % 2) as f64))
//!     .collect();
//! specialist.ingest(&conditions);
//!
//! let outcome = specialist.process()?.expect("active specialists always report");
//! assert_eq!(outcome.prefit.total(), 50);
//! assert_eq!(outcome.prefit, outcome.postfit);
//! # Ok::<(), evo_curriculum_core::SpecialistError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`specialist`] - Batch windowing and the score/fit/score cycle
//! - [`registry`] - Named specialists sharing one generation counter
//! - [`model`] - Pluggable curriculum models
//! - [`confusion`] - Prefit/postfit confusion bookkeeping
//! - [`driver`] - Generation-indexed training loop and run state
//! - [`data`] - Per-generation data sources
//! - [`config`] - Hyperparameter and specialist configuration
//! - [`checkpoint`] - Deterministic binary snapshots
//! - [`logging`] - JSON line-delimited metric streams

pub mod checkpoint;
pub mod condition;
pub mod config;
pub mod confusion;
pub mod data;
pub mod driver;
pub mod error;
pub mod logging;
pub mod model;
pub mod registry;
pub mod specialist;

pub use checkpoint::{CheckpointError, Checkpointable};
pub use condition::{Condition, EvolutionRecord};
pub use config::{ConfigError, CurriculumConfig, FamilyConfig, Hyperparameters, WeightDecay};
pub use confusion::{ConfusionCounts, ConfusionOutcome, ConfusionRow, ConfusionTracker, TrackerSummary};
pub use data::{DataError, GenerationDataSource, InMemoryDataSource, JsonlDataSource};
pub use driver::{
    DriverError, DriverOptions, DriverState, ProgressLine, RunReport, RunState,
    TrainingLoopDriver, FITNESS_SENTINEL,
};
pub use error::{SpecialistError, SpecialistResult};
pub use logging::{read_confusion_stream, JsonLinesError};
pub use model::{CentroidModel, CurriculumModel, LogisticModel, ModelConfig, ModelError, ModelKind};
pub use registry::{batch_specialists, SpecialistRegistry};
pub use specialist::{BatchWindow, Specialist, SpecialistConfig};
