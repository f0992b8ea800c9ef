//! Error types for specialist and registry operations.
//!
//! Setup-time variants (`Configuration`, `DuplicateName`) are meant to be
//! fatal. `InsufficientData` and `Model` concern a single generation; the
//! registry logs and tolerates them. `Persistence` wraps checkpoint failures of the
//! full-state save/load path.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::model::ModelError;

/// Result type alias for specialist operations
pub type SpecialistResult<T> = Result<T, SpecialistError>;

#[derive(Debug, Error)]
pub enum SpecialistError {
    /// A specialist parameter is out of range.
    #[error("Invalid configuration for parameter '{parameter}' with value '{value}': {reason}")]
    Configuration {
        parameter: String,
        value: String,
        reason: String,
    },

    /// A specialist with this name is already registered.
    #[error("Specialist '{name}' is already registered")]
    DuplicateName { name: String },

    /// No specialist with this name is registered.
    #[error("Unknown specialist '{name}'")]
    UnknownSpecialist { name: String },

    /// The number of conditions ingested for a generation differs from the
    /// configured trial count.
    #[error(
        "Specialist '{name}' expected {expected} conditions for generation {generation}, got {got}"
    )]
    InsufficientData {
        name: String,
        generation: u64,
        expected: usize,
        got: usize,
    },

    /// A confusion outcome arrived for a generation not after the last one.
    #[error("Confusion outcome for generation {got} does not follow generation {last}")]
    OutOfOrder { last: u64, got: u64 },

    /// The curriculum model failed to fit or score.
    #[error("Model failure in specialist '{name}': {source}")]
    Model {
        name: String,
        #[source]
        source: ModelError,
    },

    /// Full-state persistence failed.
    #[error("Persistence failure for '{name}': {source}")]
    Persistence {
        name: String,
        #[source]
        source: CheckpointError,
    },
}

impl SpecialistError {
    pub fn configuration(
        parameter: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        SpecialistError::Configuration {
            parameter: parameter.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        SpecialistError::DuplicateName { name: name.into() }
    }

    pub fn unknown_specialist(name: impl Into<String>) -> Self {
        SpecialistError::UnknownSpecialist { name: name.into() }
    }

    pub fn insufficient_data(
        name: impl Into<String>,
        generation: u64,
        expected: usize,
        got: usize,
    ) -> Self {
        SpecialistError::InsufficientData {
            name: name.into(),
            generation,
            expected,
            got,
        }
    }

    pub fn out_of_order(last: u64, got: u64) -> Self {
        SpecialistError::OutOfOrder { last, got }
    }

    pub fn model(name: impl Into<String>, source: ModelError) -> Self {
        SpecialistError::Model {
            name: name.into(),
            source,
        }
    }

    pub fn persistence(name: impl Into<String>, source: CheckpointError) -> Self {
        SpecialistError::Persistence {
            name: name.into(),
            source,
        }
    }

    /// Whether the error only concerns data quality for one generation.
    pub fn is_tolerable(&self) -> bool {
        matches!(
            self,
            SpecialistError::InsufficientData { .. } | SpecialistError::Model { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display() {
        let err = SpecialistError::configuration("fit_batch_size", 0, "must be > 0");
        let msg = err.to_string();
        assert!(msg.contains("fit_batch_size"));
        assert!(msg.contains("'0'"));
        assert!(msg.contains("must be > 0"));
        assert!(!err.is_tolerable());
    }

    #[test]
    fn insufficient_data_display() {
        let err = SpecialistError::insufficient_data("sp50", 1001, 50, 48);
        let msg = err.to_string();
        assert!(msg.contains("sp50"));
        assert!(msg.contains("1001"));
        assert!(msg.contains("48"));
        assert!(err.is_tolerable());
    }

    #[test]
    fn duplicate_name_display() {
        let err = SpecialistError::duplicate_name("main");
        assert_eq!(err.to_string(), "Specialist 'main' is already registered");
    }

    #[test]
    fn model_error_keeps_source() {
        let err = SpecialistError::model("sp20", ModelError::EmptyBatch);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_tolerable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SpecialistError>();
    }
}
