use serde::{Deserialize, Serialize};

use crate::cooldown::WindowMode;
use crate::error::ConfigError;
use crate::strategy::{Accumulation, Scoring};

/// Accumulator settings. Also the payload answered to a describe request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorCfg {
    pub accumulation: Accumulation,
    pub scoring: Scoring,
    /// Score to reach before a prediction is emitted (inclusive).
    pub threshold: f64,
    pub min_buffer_size: usize,
    pub max_buffer_size: usize,
    /// Cooldown after a prediction, in milliseconds. `<= 0` disables it.
    pub recovery: i64,
    pub recovery_window: WindowMode,
    pub feedback: bool,
    /// When set, only predictions of these classes start a cooldown.
    pub classes: Option<Vec<usize>>,
    pub source: String,
}

impl Default for AccumulatorCfg {
    fn default() -> Self {
        Self {
            accumulation: Accumulation::Bayesian,
            scoring: Scoring::Ratio,
            threshold: 2.0,
            min_buffer_size: 0,
            max_buffer_size: 30,
            recovery: 200,
            recovery_window: WindowMode::Sliding,
            feedback: false,
            classes: None,
            source: String::new(),
        }
    }
}

impl AccumulatorCfg {
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buffer_size == 0 {
            return Err(ConfigError::invalid("max_buffer_size must be at least 1"));
        }
        if self.min_buffer_size > self.max_buffer_size {
            return Err(ConfigError::invalid(format!(
                "min_buffer_size ({}) exceeds max_buffer_size ({})",
                self.min_buffer_size, self.max_buffer_size
            )));
        }
        if !self.threshold.is_finite() {
            return Err(ConfigError::invalid("threshold must be finite"));
        }
        Ok(())
    }

    /// Cooldown window in microseconds.
    pub fn recovery_us(&self) -> i64 {
        self.recovery.saturating_mul(1_000)
    }

    /// Whether a prediction of `target` should start a cooldown.
    pub fn recovers_after(&self, target: usize) -> bool {
        match &self.classes {
            None => true,
            Some(classes) => classes.contains(&target),
        }
    }

    /// Merge `patch` into this config. The merged result is validated first;
    /// on error nothing changes.
    pub fn apply(&mut self, patch: &CfgPatch) -> Result<(), ConfigError> {
        let mut next = self.clone();
        if let Some(v) = patch.accumulation {
            next.accumulation = v;
        }
        if let Some(v) = patch.scoring {
            next.scoring = v;
        }
        if let Some(v) = patch.threshold {
            next.threshold = v;
        }
        if let Some(v) = patch.min_buffer_size {
            next.min_buffer_size = v;
        }
        if let Some(v) = patch.max_buffer_size {
            next.max_buffer_size = v;
        }
        if let Some(v) = patch.recovery {
            next.recovery = v;
        }
        if let Some(v) = patch.recovery_window {
            next.recovery_window = v;
        }
        if let Some(v) = patch.feedback {
            next.feedback = v;
        }
        if let Some(v) = &patch.classes {
            next.classes = v.clone();
        }
        if let Some(s) = &patch.source {
            if *s != self.source {
                tracing::warn!(source = %self.source, requested = %s, "source is not patchable; ignoring");
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial update of [`AccumulatorCfg`]. Absent fields are left unchanged.
///
/// `classes` is doubly optional: absent keeps the subset, `null` clears it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfgPatch {
    pub accumulation: Option<Accumulation>,
    pub scoring: Option<Scoring>,
    pub threshold: Option<f64>,
    pub min_buffer_size: Option<usize>,
    pub max_buffer_size: Option<usize>,
    pub recovery: Option<i64>,
    pub recovery_window: Option<WindowMode>,
    pub feedback: Option<bool>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub classes: Option<Option<Vec<usize>>>,
    pub source: Option<String>,
}

impl CfgPatch {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }
}

fn present<'de, D>(d: D) -> Result<Option<Option<Vec<usize>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Vec<usize>>::deserialize(d).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_node_defaults() {
        let cfg = AccumulatorCfg::default();
        assert_eq!(cfg.accumulation, Accumulation::Bayesian);
        assert_eq!(cfg.scoring, Scoring::Ratio);
        assert_eq!(cfg.threshold, 2.0);
        assert_eq!(cfg.max_buffer_size, 30);
        assert_eq!(cfg.recovery_us(), 200_000);
    }

    #[test]
    fn patch_overrides_zero_values() {
        let mut cfg = AccumulatorCfg::default();
        let patch = CfgPatch::from_json(r#"{"recovery": 0, "feedback": false, "min_buffer_size": 0}"#).unwrap();
        cfg.apply(&patch).unwrap();
        assert_eq!(cfg.recovery, 0);
    }

    #[test]
    fn null_classes_clears_subset() {
        let mut cfg = AccumulatorCfg {
            classes: Some(vec![1]),
            ..AccumulatorCfg::default()
        };
        cfg.apply(&CfgPatch::from_json("{}").unwrap()).unwrap();
        assert_eq!(cfg.classes, Some(vec![1]));
        cfg.apply(&CfgPatch::from_json(r#"{"classes": null}"#).unwrap()).unwrap();
        assert_eq!(cfg.classes, None);
    }

    #[test]
    fn invalid_patch_leaves_config_untouched() {
        let mut cfg = AccumulatorCfg::default();
        let patch = CfgPatch {
            max_buffer_size: Some(0),
            threshold: Some(9.0),
            ..CfgPatch::default()
        };
        assert!(cfg.apply(&patch).is_err());
        assert_eq!(cfg, AccumulatorCfg::default());
    }

    #[test]
    fn json_is_validated() {
        let cfg = AccumulatorCfg::from_json(r#"{"accumulation": "sum", "source": "p300"}"#).unwrap();
        assert_eq!(cfg.accumulation, Accumulation::Mean);
        assert_eq!(cfg.threshold, 2.0);
        assert!(matches!(
            AccumulatorCfg::from_json(r#"{"min_buffer_size": 40}"#),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn toml_fills_defaults() {
        let cfg = AccumulatorCfg::from_toml("scoring = \"highest\"\nthreshold = 0.8\nsource = \"cvep\"\n").unwrap();
        assert_eq!(cfg.scoring, Scoring::Highest);
        assert_eq!(cfg.source, "cvep");
        assert_eq!(cfg.max_buffer_size, 30);
    }
}
