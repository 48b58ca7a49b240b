//! Custom error types for the render controller.
//!
//! This module defines the primary error type, `RenderError`, used across the crate.
//! Using the `thiserror` crate, it gives one consistent place to describe everything
//! that can go wrong between the settings surface, the compute engine and the display.
//!
//! ## Error Hierarchy
//!
//! `RenderError` splits into two families:
//!
//! - **User input** (`ConfigurationParse`, `ConfigurationField`, `InvalidSessionParams`):
//!   the settings text or a control value was rejected. These are recovered locally,
//!   reported to whoever submitted the input, and never touch engine state or stop the
//!   render loop.
//! - **Contract violations** (`EngineNotInitialized`, `EngineAlreadyInitialized`,
//!   `EngineInit`, `Presentation`, `PassAborted`): the engine and controller disagree about sequencing
//!   or buffer layout. These halt the session with a visible diagnostic and are not
//!   retried.
//!
//! The remaining variants wrap I/O, PNG encoding and configuration loading so that the
//! `?` operator works throughout the crate.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Everything that can go wrong in the render controller.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum RenderError {
    #[error("Configuration parse error: {0}")]
    ConfigurationParse(String),

    #[error("Configuration field error: {field}: {reason}")]
    ConfigurationField { field: String, reason: String },

    #[error("Invalid session parameters: {0}")]
    InvalidSessionParams(String),

    #[error("Compute engine used before initialization completed")]
    EngineNotInitialized,

    #[error("Compute engine already initialized ({0})")]
    EngineAlreadyInitialized(String),

    #[error("Compute engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Presentation error: buffer of {actual} bytes does not match {width}x{height} RGBA ({expected} bytes)")]
    Presentation {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Sampling pass aborted: {0}")]
    PassAborted(String),

    #[error("Render controller is no longer running")]
    ControllerClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image export error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl RenderError {
    /// Shorthand for a field-level configuration rejection.
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RenderError::ConfigurationField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the render loop may keep running after this error.
    ///
    /// Input errors are reported back to the caller; everything else means the
    /// engine/controller contract is broken and the session must stop.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::ConfigurationParse(_)
                | RenderError::ConfigurationField { .. }
                | RenderError::InvalidSessionParams(_)
        )
    }
}

impl From<figment::Error> for RenderError {
    fn from(value: figment::Error) -> Self {
        RenderError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_recoverable() {
        assert!(RenderError::ConfigurationParse("eof".into()).is_recoverable());
        assert!(RenderError::field("width", "must be > 0").is_recoverable());
        assert!(RenderError::InvalidSessionParams("spp".into()).is_recoverable());
    }

    #[test]
    fn contract_violations_are_fatal() {
        assert!(!RenderError::EngineNotInitialized.is_recoverable());
        let err = RenderError::Presentation {
            width: 2,
            height: 2,
            expected: 16,
            actual: 12,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("12 bytes"));
        assert!(err.to_string().contains("2x2"));
    }

    #[test]
    fn field_error_names_the_field() {
        let err = RenderError::field("vfov", "must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration field error: vfov: must be positive"
        );
    }
}
