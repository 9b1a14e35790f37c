//! Multi-source accumulator supervisor.
//!
//! This is the outside-world facing orchestration layer around `proba_accum_core`:
//! - owns one `Accumulator` per `source`
//! - routes control records to the accumulator they address
//! - decodes classifier records and folds them in order
//! - turns steps into labeled output events
//!
//! No IO. No async. Accumulators share no state; each is driven sequentially.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use proba_accum_core::{Accumulator, AccumulatorCfg, ConfigError, Step};

use crate::adapter::{ControlCommand, ControlRecord, ModelInput, ModelRecord};
use crate::error::SupervisorError;
use crate::event::OutputEvent;

/// Snapshot of supervisor configuration for storage-agnostic persistence.
///
/// Evidence buffers are never part of a snapshot; restored accumulators start empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisorSnapshot {
    /// Per-source configuration, sorted by source.
    pub configs: Vec<AccumulatorCfg>,
}

/// Simple observability counters returned by restore operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStats {
    /// Number of accumulators created from the snapshot.
    pub applied: usize,
    /// Number of existing accumulators that were replaced.
    pub overwritten: usize,
    /// Number of snapshot entries dropped because their configuration was invalid.
    pub skipped: usize,
}

/// Declarative supervisor setup, one `[[accumulator]]` table per source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    #[serde(rename = "accumulator")]
    pub accumulators: Vec<AccumulatorCfg>,
}

impl SupervisorConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// Owns every accumulator sharing one transport, keyed by `source`.
#[derive(Debug, Default)]
pub struct AccumulatorSupervisor {
    accumulators: BTreeMap<String, Accumulator>,
}

impl AccumulatorSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: SupervisorConfig) -> Result<Self, SupervisorError> {
        let mut sup = Self::new();
        for acc in cfg.accumulators {
            sup.add(acc)?;
        }
        Ok(sup)
    }

    /// Register an accumulator. Its `source` must be unique.
    pub fn add(&mut self, cfg: AccumulatorCfg) -> Result<(), SupervisorError> {
        if self.accumulators.contains_key(&cfg.source) {
            return Err(SupervisorError::DuplicateSource {
                source_id: cfg.source,
            });
        }
        let acc = Accumulator::new(cfg)?;
        self.accumulators.insert(acc.source().to_string(), acc);
        Ok(())
    }

    pub fn remove(&mut self, source: &str) -> Option<Accumulator> {
        self.accumulators.remove(source)
    }

    pub fn get(&self, source: &str) -> Option<&Accumulator> {
        self.accumulators.get(source)
    }

    /// Registered sources, sorted.
    pub fn sources(&self) -> Vec<&str> {
        self.accumulators.keys().map(String::as_str).collect()
    }

    /// Apply control records in order.
    ///
    /// Records not addressed to any registered source are ignored, as are
    /// malformed settings (logged, no state change).
    pub fn handle_control(&mut self, records: &[ControlRecord]) -> Vec<OutputEvent> {
        let mut out = Vec::new();
        for rec in records {
            for (source, acc) in self.accumulators.iter_mut() {
                let cmd = match ControlCommand::parse(rec, source) {
                    None => continue,
                    Some(Ok(cmd)) => cmd,
                    Some(Err(e)) => {
                        tracing::warn!(source = %source, label = %rec.label, error = %e, "ignoring malformed control record");
                        continue;
                    }
                };
                match cmd {
                    ControlCommand::Configure(patch) => {
                        tracing::debug!(source = %source, ?patch, "SET");
                        if let Err(e) = acc.configure(&patch) {
                            tracing::warn!(source = %source, error = %e, "rejected accumulation settings");
                        }
                    }
                    ControlCommand::Describe => {
                        let cfg = acc.describe();
                        tracing::debug!(source = %source, ?cfg, "GET");
                        out.push(OutputEvent::Accumulation(cfg));
                    }
                }
            }
        }
        out
    }

    /// Fold a batch of classifier records into the accumulator for `source`.
    ///
    /// A `ready` record is forwarded and ends the batch. Records with other
    /// labels are skipped. A record that breaks the input contract is dropped
    /// and the batch goes on; if any were dropped the call returns
    /// [`SupervisorError::Rejected`], which carries every event produced.
    pub fn ingest(
        &mut self,
        source: &str,
        records: &[ModelRecord],
    ) -> Result<Vec<OutputEvent>, SupervisorError> {
        let acc = self
            .accumulators
            .get_mut(source)
            .ok_or_else(|| SupervisorError::UnknownSource {
                source_id: source.to_string(),
            })?;

        let mut out = Vec::new();
        let mut errors = Vec::new();
        for (index, rec) in records.iter().enumerate() {
            let input = match rec.decode() {
                Ok(input) => input,
                Err(e) => {
                    tracing::warn!(source = %source, index, error = %e, "rejected classifier record");
                    errors.push((index, e));
                    continue;
                }
            };
            match input {
                ModelInput::Ready => {
                    out.push(OutputEvent::Ready);
                    break;
                }
                ModelInput::Other(label) => {
                    tracing::trace!(source = %source, label = %label, "skipping unrelated record");
                }
                ModelInput::Probabilities(proba) => {
                    match acc.submit(proba, rec.resolved_timestamp()) {
                        Ok(step) => {
                            if let Some(fb) = step.feedback {
                                out.push(OutputEvent::Feedback(fb));
                            }
                            if let Some(d) = step.decision {
                                out.push(OutputEvent::Predict(d));
                            }
                        }
                        Err(e) if e.is_fatal_for_record() => {
                            tracing::warn!(source = %source, index, error = %e, "rejected probability record");
                            errors.push((index, e.into()));
                        }
                        // Already logged by the accumulator; wait for the next record.
                        Err(_) => {}
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(SupervisorError::Rejected {
                source_id: source.to_string(),
                errors,
                events: out,
            })
        }
    }

    /// Fold one already-decoded probability vector into the accumulator for `source`.
    pub fn submit(
        &mut self,
        source: &str,
        proba: Vec<f64>,
        timestamp_us: i64,
    ) -> Result<Step, SupervisorError> {
        let acc = self
            .accumulators
            .get_mut(source)
            .ok_or_else(|| SupervisorError::UnknownSource {
                source_id: source.to_string(),
            })?;
        Ok(acc.submit(proba, timestamp_us)?)
    }

    /// One update cycle: control records first, then the classifier batch.
    pub fn update(
        &mut self,
        control: &[ControlRecord],
        source: &str,
        model: &[ModelRecord],
    ) -> Result<Vec<OutputEvent>, SupervisorError> {
        if !self.accumulators.contains_key(source) {
            return Err(SupervisorError::UnknownSource {
                source_id: source.to_string(),
            });
        }
        let mut out = self.handle_control(control);
        match self.ingest(source, model) {
            Ok(events) => {
                out.extend(events);
                Ok(out)
            }
            Err(SupervisorError::Rejected {
                source_id,
                errors,
                events,
            }) => {
                out.extend(events);
                Err(SupervisorError::Rejected {
                    source_id,
                    errors,
                    events: out,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Export every accumulator's configuration.
    ///
    /// Deterministic ordering: configs are sorted by source.
    pub fn snapshot(&self) -> SupervisorSnapshot {
        SupervisorSnapshot {
            configs: self.accumulators.values().map(Accumulator::describe).collect(),
        }
    }

    /// Replace all accumulators with the ones described by `snap`.
    pub fn restore(&mut self, snap: SupervisorSnapshot) -> RestoreStats {
        self.accumulators.clear();
        self.restore_merge(snap)
    }

    /// Create accumulators from `snap` without dropping the others.
    ///
    /// Snapshot entries replace existing accumulators with the same source.
    pub fn restore_merge(&mut self, snap: SupervisorSnapshot) -> RestoreStats {
        let mut stats = RestoreStats::default();
        for cfg in snap.configs {
            let source = cfg.source.clone();
            match Accumulator::new(cfg) {
                Ok(acc) => {
                    if self.accumulators.insert(source, acc).is_some() {
                        stats.overwritten += 1;
                    }
                    stats.applied += 1;
                }
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "skipping invalid snapshot entry");
                    stats.skipped += 1;
                }
            }
        }
        stats
    }
}
