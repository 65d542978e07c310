use std::io;

use thiserror::Error;

/// Failure raised while retrieving, parsing or instantiating a binary artifact.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to reach {label}: {source}")]
    Unreachable {
        label: String,
        #[source]
        source: io::Error,
    },
    #[error("{label} is malformed: {reason}")]
    Malformed { label: String, reason: String },
    #[error("{label} targets unsupported binary version {version}")]
    Incompatible { label: String, version: u32 },
    #[error("{label} was rejected: {reason}")]
    Rejected { label: String, reason: String },
}

impl LoadError {
    pub fn malformed(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            label: label.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Name of the artifact that failed to load.
    pub fn label(&self) -> &str {
        match self {
            Self::Unreachable { label, .. }
            | Self::Malformed { label, .. }
            | Self::Incompatible { label, .. }
            | Self::Rejected { label, .. } => label,
        }
    }
}
