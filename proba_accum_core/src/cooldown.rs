use serde::{Deserialize, Serialize};

/// How the suppression deadline behaves while stale trials keep arriving.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Every suppressed trial moves the reference time forward, so a dense
    /// burst of trials postpones recovery indefinitely.
    #[default]
    Sliding,
    /// The reference time stays at the moment of the prediction.
    Fixed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryState {
    #[default]
    Idle,
    Suppressing { until: i64 },
}

/// Suppresses trials for a while after a prediction so one event is not
/// classified twice. Timestamps are in microseconds.
#[derive(Clone, Debug)]
pub struct CooldownGuard {
    window_us: i64,
    mode: WindowMode,
    state: RecoveryState,
}

impl CooldownGuard {
    pub fn new(window_us: i64, mode: WindowMode) -> Self {
        CooldownGuard {
            window_us,
            mode,
            state: RecoveryState::Idle,
        }
    }

    /// Whether the trial at `ts` may be accumulated.
    pub fn check(&mut self, ts: i64) -> bool {
        if self.window_us <= 0 {
            self.state = RecoveryState::Idle;
            return true;
        }
        match self.state {
            RecoveryState::Idle => true,
            RecoveryState::Suppressing { until } => {
                if ts.saturating_sub(until) > self.window_us {
                    self.state = RecoveryState::Idle;
                    true
                } else {
                    if self.mode == WindowMode::Sliding {
                        self.state = RecoveryState::Suppressing { until: ts };
                    }
                    false
                }
            }
        }
    }

    pub fn activate(&mut self, ts: i64) {
        if self.window_us > 0 {
            self.state = RecoveryState::Suppressing { until: ts };
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.state = RecoveryState::Idle;
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn set_window(&mut self, window_us: i64) {
        self.window_us = window_us;
    }

    pub fn set_mode(&mut self, mode: WindowMode) {
        self.mode = mode;
    }
}
