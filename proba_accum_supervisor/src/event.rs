use serde::{Deserialize, Serialize};

use proba_accum_core::{AccumulatorCfg, Decision, Feedback};

/// Labeled event handed to the downstream consumer.
///
/// Serialized as `{"label": "...", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label", content = "data", rename_all = "snake_case")]
pub enum OutputEvent {
    Predict(Decision),
    Feedback(Feedback),
    /// Answer to a describe request.
    Accumulation(AccumulatorCfg),
    /// Classifier finished fitting; forwarded as-is.
    Ready,
}

impl OutputEvent {
    pub fn label(&self) -> &'static str {
        match self {
            OutputEvent::Predict(_) => "predict",
            OutputEvent::Feedback(_) => "feedback",
            OutputEvent::Accumulation(_) => "accumulation",
            OutputEvent::Ready => "ready",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
