//! Error types for scenario construction, execution, and verification.

use std::path::PathBuf;

/// Errors raised while building or running a scenario.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The markdown source could not be read or fetched.
    #[error("markdown source '{source_path}' is unavailable: {reason}")]
    SourceUnavailable { source_path: String, reason: String },

    /// The document has no level-1 heading.
    #[error("no title heading found in document")]
    TitleNotFound,

    /// A `--var` token without `=`.
    #[error("invalid variable '{0}', expected KEY=VALUE")]
    VariableFormat(String),

    /// The shell exited non-zero or could not be started.
    #[error("command exited with '{exit_code}' and the message '{stderr}'")]
    CommandExecution { exit_code: String, stderr: String },

    #[error("expected output does not match regex '{pattern}': {actual}")]
    OutputRegexMismatch { pattern: String, actual: String },

    #[error("expected output is not valid JSON: {0}")]
    OutputNotJson(String),

    #[error(
        "expected output with similarity {threshold:.2} but got {score:.2}\n\
         expected:\n{expected}\nactual:\n{actual}"
    )]
    OutputSimilarityBelowThreshold { threshold: f64, score: f64, expected: String, actual: String },

    /// An expected-output annotation carries a pattern that does not compile.
    #[error("invalid expected output pattern '{pattern}': {reason}")]
    InvalidExpectedOutput { pattern: String, reason: String },

    #[error("invalid environment '{0}', expected one of: local, ci, github-actions, ocd, azure")]
    InvalidEnvironment(String),

    #[error("working directory {} could not be entered: {reason}", path.display())]
    WorkingDirectory { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this error comes from comparing output rather than running the command.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::OutputRegexMismatch { .. }
                | Self::OutputNotJson(_)
                | Self::OutputSimilarityBelowThreshold { .. }
        )
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
