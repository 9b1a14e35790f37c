//proba_accum_core/decide.rs

use serde::{Deserialize, Serialize};

use crate::{
    cfg::{AccumulatorCfg, CfgPatch},
    cooldown::{CooldownGuard, RecoveryState},
    error::{AccumError, ConfigError},
    evidence::EvidenceBuffer,
    strategy::{argmax, normalize},
};

/// Final prediction emitted once the confidence criterion is met.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Microseconds; the epoch onset of the triggering trial when known.
    pub timestamp: i64,
    pub target: usize,
    pub score: f64,
    /// Normalized accumulation snapshot at decision time.
    pub accumulation: Vec<f64>,
    pub iterations: u64,
    pub source: String,
}

/// Continuous, non-terminal view of the normalized scores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub scores: Vec<f64>,
    pub source: String,
}

/// Result of one accepted (or suppressed) trial.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Step {
    pub feedback: Option<Feedback>,
    pub decision: Option<Decision>,
    /// Set when scoring was skipped for a non-fatal reason.
    pub skipped: Option<AccumError>,
}

impl Step {
    pub fn suppressed() -> Self {
        Step::default()
    }
}

/// Probability accumulator for a single source.
///
/// Single owner, strictly sequential: each trial runs to completion before the
/// next one is taken.
#[derive(Clone, Debug)]
pub struct Accumulator {
    cfg: AccumulatorCfg,
    buffer: EvidenceBuffer,
    iterations: u64,
    classes: Option<usize>,
    guard: CooldownGuard,
}

impl Accumulator {
    pub fn new(cfg: AccumulatorCfg) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            buffer: EvidenceBuffer::new(cfg.max_buffer_size),
            guard: CooldownGuard::new(cfg.recovery_us(), cfg.recovery_window),
            iterations: 0,
            classes: None,
            cfg,
        })
    }

    pub fn source(&self) -> &str {
        &self.cfg.source
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.guard.state()
    }

    /// Current configuration as a read-only snapshot.
    pub fn describe(&self) -> AccumulatorCfg {
        self.cfg.clone()
    }

    /// Merge a partial configuration and drop the evidence gathered under the
    /// old one. The cooldown state is kept.
    pub fn configure(&mut self, patch: &CfgPatch) -> Result<(), ConfigError> {
        self.cfg.apply(patch)?;
        self.buffer.set_capacity(self.cfg.max_buffer_size);
        self.guard.set_window(self.cfg.recovery_us());
        self.guard.set_mode(self.cfg.recovery_window);
        self.reset();
        tracing::debug!(source = %self.cfg.source, cfg = ?self.cfg, "accumulation reconfigured");
        Ok(())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.iterations = 0;
        self.classes = None;
    }

    fn check_shape(&self, v: &[f64]) -> Result<(), AccumError> {
        if v.is_empty() {
            return Err(AccumError::EmptyVector);
        }
        if let Some(expected) = self.classes {
            if v.len() != expected {
                return Err(AccumError::ShapeMismatch {
                    expected,
                    got: v.len(),
                });
            }
        }
        if let Some((index, &value)) = v
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(AccumError::InvalidProbability { index, value });
        }
        Ok(())
    }

    /// Fold one trial's probabilities, taken at `timestamp` (microseconds).
    pub fn submit(&mut self, proba: Vec<f64>, timestamp: i64) -> Result<Step, AccumError> {
        self.check_shape(&proba)?;

        // Ignore stale trials
        if !self.guard.check(timestamp) {
            tracing::trace!(source = %self.cfg.source, timestamp, "trial suppressed by cooldown");
            return Ok(Step::suppressed());
        }

        self.classes = Some(proba.len());
        self.buffer.push(proba);
        self.iterations += 1;

        let folded = self.buffer.fold(self.cfg.accumulation);
        let scores = match normalize(&folded) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(source = %self.cfg.source, error = %e, "no decision this step");
                return Err(e);
            }
        };

        let mut step = Step::default();
        if self.cfg.feedback {
            step.feedback = Some(Feedback {
                scores: scores.clone(),
                source: self.cfg.source.clone(),
            });
        }

        // Wait for enough data
        if self.buffer.len() < self.cfg.min_buffer_size {
            return Ok(step);
        }

        let score = match self.cfg.scoring.score(&scores, self.iterations) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(source = %self.cfg.source, error = %e, "scoring skipped");
                step.skipped = Some(e);
                return Ok(step);
            }
        };

        if score >= self.cfg.threshold {
            let target = argmax(&scores).unwrap_or_default();
            let decision = Decision {
                timestamp,
                target,
                score,
                accumulation: scores,
                iterations: self.iterations,
                source: self.cfg.source.clone(),
            };
            tracing::debug!(
                source = %decision.source,
                target,
                score,
                iterations = decision.iterations,
                accumulation = self.cfg.accumulation.name(),
                scoring = self.cfg.scoring.name(),
                "prediction emitted"
            );
            self.buffer.clear();
            self.iterations = 0;
            if self.cfg.recovers_after(target) {
                self.guard.activate(timestamp);
            }
            step.decision = Some(decision);
        }

        Ok(step)
    }
}
