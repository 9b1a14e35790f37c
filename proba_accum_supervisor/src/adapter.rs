//! Domain adapter layer: convert classifier and control records into accumulator inputs.
//!
//! This module is intentionally small:
//! - No IO
//! - No async
//! - No accumulation policy (lives in core)
//!
//! Records mirror what a dataflow transport delivers: a label, an optional
//! JSON payload and a timestamp in microseconds.

use serde::Deserialize;

use proba_accum_core::{CfgPatch, ConfigError};

use crate::error::SupervisorError;

/// Label of a classifier record carrying class probabilities.
pub const PREDICT_PROBA: &str = "predict_proba";
/// Label of a classifier record announcing the model is fitted.
pub const READY: &str = "ready";

/// A raw record from the classifier stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRecord {
    /// Arrival timestamp (microseconds).
    pub timestamp_us: i64,
    pub label: String,
    /// JSON payload, e.g. `{"result": [0.1, 0.9]}`.
    pub data: Option<String>,
    /// Onset of the epoch the trial was computed on; preferred over `timestamp_us`.
    pub onset_us: Option<i64>,
}

impl ModelRecord {
    pub fn ready(timestamp_us: i64) -> Self {
        Self {
            timestamp_us,
            label: READY.to_string(),
            data: None,
            onset_us: None,
        }
    }

    pub fn predict_proba(timestamp_us: i64, data: impl Into<String>) -> Self {
        Self {
            timestamp_us,
            label: PREDICT_PROBA.to_string(),
            data: Some(data.into()),
            onset_us: None,
        }
    }

    /// Attach the epoch onset.
    pub fn with_onset(mut self, onset_us: i64) -> Self {
        self.onset_us = Some(onset_us);
        self
    }

    /// Timestamp used for cooldown arithmetic and stamped on predictions.
    pub fn resolved_timestamp(&self) -> i64 {
        self.onset_us.unwrap_or(self.timestamp_us)
    }

    pub fn decode(&self) -> Result<ModelInput, SupervisorError> {
        match self.label.as_str() {
            READY => Ok(ModelInput::Ready),
            PREDICT_PROBA => {
                let raw = self.data.as_deref().unwrap_or_default();
                let payload: ProbaPayload =
                    serde_json::from_str(raw).map_err(|e| SupervisorError::MalformedPayload {
                        label: self.label.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(ModelInput::Probabilities(payload.result))
            }
            other => Ok(ModelInput::Other(other.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct ProbaPayload {
    result: Vec<f64>,
}

/// Decoded classifier record.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelInput {
    Ready,
    Probabilities(Vec<f64>),
    Other(String),
}

/// Zip a batch with its per-epoch onsets.
///
/// Both sequences run in lockstep, so their lengths must agree.
pub fn pair_epochs(
    records: Vec<ModelRecord>,
    onsets: &[i64],
) -> Result<Vec<ModelRecord>, SupervisorError> {
    if records.len() != onsets.len() {
        return Err(SupervisorError::EpochCountMismatch {
            records: records.len(),
            epochs: onsets.len(),
        });
    }
    Ok(records
        .into_iter()
        .zip(onsets)
        .map(|(r, &onset)| r.with_onset(onset))
        .collect())
}

/// A raw record from the control stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlRecord {
    pub timestamp_us: i64,
    pub label: String,
    pub data: Option<String>,
}

impl ControlRecord {
    pub fn new(timestamp_us: i64, label: impl Into<String>, data: Option<String>) -> Self {
        Self {
            timestamp_us,
            label: label.into(),
            data,
        }
    }

    /// `reset_{source}_accumulation` with a JSON settings payload.
    pub fn configure(source: &str, settings: impl Into<String>) -> Self {
        Self::new(0, configure_label(source), Some(settings.into()))
    }

    /// `get_{source}_accumulation`.
    pub fn describe(source: &str) -> Self {
        Self::new(0, describe_label(source), None)
    }
}

pub fn configure_label(source: &str) -> String {
    format!("reset_{source}_accumulation")
}

pub fn describe_label(source: &str) -> String {
    format!("get_{source}_accumulation")
}

/// Control command addressed to one accumulator.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCommand {
    Configure(CfgPatch),
    Describe,
}

impl ControlCommand {
    /// Interpret `record` for the accumulator named `source`.
    ///
    /// Returns `None` when the record is not addressed to `source`. A configure
    /// record without a settings payload is malformed.
    pub fn parse(record: &ControlRecord, source: &str) -> Option<Result<Self, ConfigError>> {
        if record.label == configure_label(source) {
            let parsed = match record.data.as_deref() {
                Some(raw) => CfgPatch::from_json(raw).map(ControlCommand::Configure),
                None => Err(ConfigError::Invalid {
                    reason: "missing settings payload".to_string(),
                }),
            };
            Some(parsed)
        } else if record.label == describe_label(source) {
            Some(Ok(ControlCommand::Describe))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onset_wins_over_arrival() {
        let r = ModelRecord::predict_proba(10, "{}").with_onset(3);
        assert_eq!(r.resolved_timestamp(), 3);
        assert_eq!(ModelRecord::ready(10).resolved_timestamp(), 10);
    }

    #[test]
    fn decodes_probabilities() {
        let r = ModelRecord::predict_proba(0, r#"{"result": [0.25, 0.75]}"#);
        assert_eq!(r.decode().unwrap(), ModelInput::Probabilities(vec![0.25, 0.75]));
    }

    #[test]
    fn bad_payload_is_reported() {
        let r = ModelRecord::predict_proba(0, r#"{"proba": []}"#);
        assert!(matches!(r.decode(), Err(SupervisorError::MalformedPayload { .. })));
    }

    #[test]
    fn pair_epochs_checks_lengths() {
        let recs = vec![ModelRecord::ready(0), ModelRecord::ready(1)];
        let err = pair_epochs(recs.clone(), &[5]).unwrap_err();
        assert!(matches!(err, SupervisorError::EpochCountMismatch { records: 2, epochs: 1 }));
        let paired = pair_epochs(recs, &[5, 6]).unwrap();
        assert_eq!(paired[1].resolved_timestamp(), 6);
    }

    #[test]
    fn control_labels_are_source_scoped() {
        let rec = ControlRecord::configure("left", r#"{"threshold": 3}"#);
        assert!(ControlCommand::parse(&rec, "right").is_none());
        let cmd = ControlCommand::parse(&rec, "left").unwrap().unwrap();
        match cmd {
            ControlCommand::Configure(p) => assert_eq!(p.threshold, Some(3.0)),
            other => panic!("unexpected {other:?}"),
        }
        let bare = ControlRecord::new(0, configure_label("left"), None);
        assert!(matches!(
            ControlCommand::parse(&bare, "left"),
            Some(Err(ConfigError::Invalid { .. }))
        ));
        let get = ControlRecord::describe("");
        assert_eq!(get.label, "get__accumulation");
        assert_eq!(ControlCommand::parse(&get, "").unwrap().unwrap(), ControlCommand::Describe);
    }
}
