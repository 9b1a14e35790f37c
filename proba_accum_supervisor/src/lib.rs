//! proba_accum_supervisor
//!
//! Outside-world facing orchestration layer for `proba_accum_core`.
//!
//! Responsibilities:
//! - own one `Accumulator` per source
//! - decode classifier records (`ready`, `predict_proba`) and control records
//!   (`reset_{source}_accumulation`, `get_{source}_accumulation`)
//! - emit labeled output events (`predict`, `feedback`, `accumulation`, `ready`)
//!
//! Non-goals:
//! - no IO
//! - no async
//! - no accumulation policy (lives in core)

pub mod adapter;
pub mod error;
pub mod event;
pub mod supervisor;

pub use adapter::{
    ControlCommand,
    ControlRecord,
    ModelInput,
    ModelRecord,
    pair_epochs,
};

pub use error::SupervisorError;
pub use event::OutputEvent;

pub use supervisor::{
    AccumulatorSupervisor,
    RestoreStats,
    SupervisorConfig,
    SupervisorSnapshot,
};
