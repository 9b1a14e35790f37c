/// Errors raised while folding a probability vector into an accumulator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccumError {
    #[error("shape mismatch: expected {expected} classes, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("empty probability vector")]
    EmptyVector,

    #[error("invalid probability at class {index}: {value}")]
    InvalidProbability { index: usize, value: f64 },

    #[error("degenerate accumulation: class scores sum to {sum}")]
    DegenerateAccumulation { sum: f64 },

    #[error("at least two classes are required for scoring, got {classes}")]
    InsufficientClasses { classes: usize },
}

impl AccumError {
    /// True for input contract violations: the record is rejected and state is unchanged.
    /// The remaining variants only skip the current step.
    pub fn is_fatal_for_record(&self) -> bool {
        matches!(
            self,
            AccumError::ShapeMismatch { .. }
                | AccumError::EmptyVector
                | AccumError::InvalidProbability { .. }
        )
    }
}

/// Configuration loading and patching errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("malformed JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed TOML settings: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}
