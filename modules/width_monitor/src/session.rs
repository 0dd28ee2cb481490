//! Monitoring session state machine: threshold, debounce and the
//! single-outstanding-action guard
//!
//! Transitions are driven by calibrated measurements arriving on the bus.
//! The machine itself performs no I/O; it returns effects for the module to
//! execute.

use std::time::{Duration, Instant};

use tapegauge_common::commands::monitor::MonitorStatus;
use thiserror::Error;

/// Consecutive below-threshold measurements required before the corrective
/// action fires
pub const DEBOUNCE_COUNT: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("threshold must be a positive number")]
    InvalidThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not monitoring
    Idle,
    /// Monitoring, no active alert
    Armed,
    /// Consecutive below-threshold measurements accumulating
    Alerting,
    /// Corrective action dispatched, awaiting completion
    ActionTriggered,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Armed => "armed",
            SessionState::Alerting => "alerting",
            SessionState::ActionTriggered => "action-triggered",
        }
    }
}

/// Side effects for the caller to execute after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Request a width-low error notification
    AlertLow { length_mm: f64 },

    /// Request a width-low recovery notification
    RecoveredLow,

    /// Dispatch the corrective action; the in-flight guard is already set
    TriggerAction { length_mm: f64 },
}

#[derive(Debug)]
pub struct MonitorSession {
    state: SessionState,
    threshold_mm: Option<f64>,
    trigger_count: u32,
    alert_active: bool,
    action_in_flight: bool,
    /// Action dispatch is suppressed until this deadline after a successful
    /// action, letting the tape settle; measurements keep flowing
    suppress_until: Option<Instant>,
}

impl MonitorSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            threshold_mm: None,
            trigger_count: 0,
            alert_active: false,
            action_in_flight: false,
            suppress_until: None,
        }
    }

    /// Arm monitoring with a threshold. Rejected input mutates nothing.
    pub fn start(&mut self, threshold_mm: f64) -> Result<Vec<SessionEffect>, SessionError> {
        if !threshold_mm.is_finite() || threshold_mm <= 0.0 {
            return Err(SessionError::InvalidThreshold);
        }

        let mut effects = Vec::new();
        if self.alert_active {
            effects.push(SessionEffect::RecoveredLow);
        }
        self.state = SessionState::Armed;
        self.threshold_mm = Some(threshold_mm);
        self.trigger_count = 0;
        self.alert_active = false;
        Ok(effects)
    }

    /// Disarm monitoring, clearing the threshold and counters
    pub fn stop(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if self.alert_active {
            effects.push(SessionEffect::RecoveredLow);
        }
        self.state = SessionState::Idle;
        self.threshold_mm = None;
        self.trigger_count = 0;
        self.alert_active = false;
        self.action_in_flight = false;
        self.suppress_until = None;
        effects
    }

    /// Feed one calibrated measurement through the machine
    pub fn handle_measurement(&mut self, length_mm: f64, now: Instant) -> Vec<SessionEffect> {
        let Some(threshold) = self.threshold_mm else {
            return Vec::new();
        };
        if self.state == SessionState::Idle {
            return Vec::new();
        }

        if self.suppress_until.is_some_and(|deadline| now >= deadline) {
            self.suppress_until = None;
        }

        let mut effects = Vec::new();
        if length_mm < threshold {
            self.trigger_count += 1;
            self.alert_active = true;
            if self.state != SessionState::ActionTriggered {
                self.state = SessionState::Alerting;
            }
            effects.push(SessionEffect::AlertLow { length_mm });

            if self.trigger_count >= DEBOUNCE_COUNT
                && !self.action_in_flight
                && self.suppress_until.is_none()
            {
                self.action_in_flight = true;
                self.state = SessionState::ActionTriggered;
                effects.push(SessionEffect::TriggerAction { length_mm });
            }
        } else {
            if self.alert_active {
                effects.push(SessionEffect::RecoveredLow);
            }
            self.alert_active = false;
            self.trigger_count = 0;
            if self.state != SessionState::ActionTriggered {
                self.state = SessionState::Armed;
            }
        }

        effects
    }

    /// Record completion of a dispatched action. Success clears the alert
    /// episode and opens a settle window; failure re-arms the trigger
    /// immediately (the retained counter lets the next qualifying
    /// measurement retry).
    pub fn action_completed(&mut self, success: bool, now: Instant, settle: Duration) {
        self.action_in_flight = false;
        if self.state == SessionState::ActionTriggered {
            self.state = if self.threshold_mm.is_some() {
                SessionState::Armed
            } else {
                SessionState::Idle
            };
        }
        if success {
            self.trigger_count = 0;
            self.alert_active = false;
            if !settle.is_zero() {
                self.suppress_until = Some(now + settle);
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.state != SessionState::Idle
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            monitoring: self.is_monitoring(),
            state: self.state.as_str().to_string(),
            threshold_mm: self.threshold_mm,
            trigger_count: self.trigger_count,
            action_in_flight: self.action_in_flight,
        }
    }
}
