pub mod error;
pub mod strategy;

pub mod evidence;
pub mod cooldown;
pub mod cfg;
pub mod decide;

pub use error::{AccumError, ConfigError};
pub use strategy::{Accumulation, Scoring, argmax, normalize};

pub use evidence::EvidenceBuffer;
pub use cooldown::{CooldownGuard, RecoveryState, WindowMode};
pub use cfg::{AccumulatorCfg, CfgPatch};
pub use decide::{Accumulator, Decision, Feedback, Step};
