//! Domain and build errors for the trial engine, plus a stable exit-code mapping
//! used by the CLI.
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("session aborted: {0}")]
    SessionAborted(String),
    #[error("sequence file missing or invalid: {0}")]
    MissingSequence(String),
    #[error("scanner backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("render failure: {0}")]
    RenderFailure(String),
    #[error("input failure: {0}")]
    InputFailure(String),
    #[error("io error: {0}")]
    IoFailure(String),
    /// More trials at a level than the staircase's trial budget. Not fatal:
    /// the run driver logs a warning and reuses the last sampled intensity.
    #[error("staircase exhausted for level: {0}")]
    StaircaseExhausted(String),
    #[error("clock read non-monotonically: {0}")]
    ClockAnomaly(String),
}

impl EngineError {
    /// Stable process exit code for each taxonomy member. `StaircaseExhausted`
    /// never reaches the process boundary; it is logged and the run continues.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::SessionAborted(_) => 2,
            EngineError::MissingSequence(_) => 3,
            EngineError::BackendUnavailable(_) => 4,
            EngineError::RenderFailure(_) | EngineError::InputFailure(_) | EngineError::IoFailure(_) => 5,
            EngineError::StaircaseExhausted(_) => 1,
            EngineError::ClockAnomaly(_) => 6,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing renderer")]
    MissingRenderer,
    #[error("missing input source")]
    MissingInputSource,
    #[error("missing scanner backend")]
    MissingScanner,
    #[error("missing sequence")]
    MissingSequence,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(EngineError::SessionAborted("x".into()).exit_code(), 2);
        assert_eq!(EngineError::MissingSequence("x".into()).exit_code(), 3);
        assert_eq!(EngineError::BackendUnavailable("x".into()).exit_code(), 4);
        assert_eq!(EngineError::RenderFailure("x".into()).exit_code(), 5);
        assert_eq!(EngineError::InputFailure("x".into()).exit_code(), 5);
        assert_eq!(EngineError::IoFailure("x".into()).exit_code(), 5);
        assert_eq!(EngineError::StaircaseExhausted("x".into()).exit_code(), 1);
        assert_eq!(EngineError::ClockAnomaly("x".into()).exit_code(), 6);
    }
}
