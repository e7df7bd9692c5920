// src/handlers/error.rs
use std::fmt;
use std::path::Path;

/// Conditions that abort a pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Canonical metrics record lacks required keys in strict mode.
    MissingKeys(Vec<String>),
    /// An artifact could not be read or written.
    Artifact { path: String, message: String },
}

impl PipelineError {
    pub fn artifact(path: &Path, message: impl fmt::Display) -> Self {
        PipelineError::Artifact {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::MissingKeys(keys) => {
                write!(f, "missing keys in metrics: {}", keys.join(", "))
            }
            PipelineError::Artifact { path, message } => write!(f, "{}: {}", path, message),
        }
    }
}

impl std::error::Error for PipelineError {}
