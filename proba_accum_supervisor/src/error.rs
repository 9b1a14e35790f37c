use proba_accum_core::{AccumError, ConfigError};

use crate::event::OutputEvent;

/// Supervisor errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("no accumulator registered for source {source_id:?}")]
    UnknownSource { source_id: String },

    #[error("an accumulator is already registered for source {source_id:?}")]
    DuplicateSource { source_id: String },

    #[error("epoch count mismatch: {records} records, {epochs} epochs")]
    EpochCountMismatch { records: usize, epochs: usize },

    #[error("malformed {label} payload: {reason}")]
    MalformedPayload { label: String, reason: String },

    /// Some records of a batch broke the input contract. The rest of the batch
    /// was still processed and everything it produced is in `events`.
    #[error("{count} record(s) rejected for source {source_id:?}", count = .errors.len())]
    Rejected {
        source_id: String,
        /// `(position in batch, reason)` for each rejected record.
        errors: Vec<(usize, SupervisorError)>,
        events: Vec<OutputEvent>,
    },

    #[error(transparent)]
    Accumulation(#[from] AccumError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
