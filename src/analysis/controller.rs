//! Cooperative run control: pause, resume, stop
//!
//! The pipeline calls `checkpoint()` before every stage. While paused the
//! call waits; once stopped it fails with `AnalysisError::Cancelled`. A stage
//! that already started always runs to completion.

use super::types::AnalysisError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// State of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    Running,
    Paused,
    /// Terminal
    Stopped,
}

/// Shared handle controlling one run.
///
/// Clones share state, so a signal handler or UI task can hold one while
/// the pipeline holds another.
#[derive(Debug, Clone)]
pub struct AnalysisController {
    state: Arc<watch::Sender<ControlState>>,
}

impl AnalysisController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::Running);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn state(&self) -> ControlState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ControlState::Stopped
    }

    /// Running → paused. Returns whether the state changed.
    pub fn pause(&self) -> bool {
        self.transition(ControlState::Running, ControlState::Paused)
    }

    /// Paused → running. Returns whether the state changed.
    pub fn resume(&self) -> bool {
        self.transition(ControlState::Paused, ControlState::Running)
    }

    /// Any state → stopped. Wakes every waiter.
    pub fn stop(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == ControlState::Stopped {
                false
            } else {
                *s = ControlState::Stopped;
                true
            }
        })
    }

    fn transition(&self, from: ControlState, to: ControlState) -> bool {
        self.state.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        })
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state.subscribe()
    }

    /// Gate between stages: returns immediately while running, waits while
    /// paused, fails with `Cancelled` once stopped.
    pub async fn checkpoint(&self) -> Result<(), AnalysisError> {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ControlState::Running => return Ok(()),
                ControlState::Stopped => return Err(AnalysisError::Cancelled),
                ControlState::Paused => {
                    if rx.changed().await.is_err() {
                        return Err(AnalysisError::Cancelled);
                    }
                }
            }
        }
    }
}

impl Default for AnalysisController {
    fn default() -> Self {
        Self::new()
    }
}
