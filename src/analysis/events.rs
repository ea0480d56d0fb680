//! Progress and stage-result notifications
//!
//! Side channel only: observers never influence control flow.

use super::stage::{Stage, StageOutput};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// An event emitted while a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// Before and after every unit of a stage
    Progress {
        stage: Stage,
        /// Whole-run completion, 0–100
        percent: f32,
        message: String,
    },
    /// Stage lifecycle; `output` is set on completion
    StageResult {
        stage: Stage,
        status: StageStatus,
        message: String,
        output: Option<StageOutput>,
    },
}

impl AnalysisEvent {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Progress { stage, .. } | Self::StageResult { stage, .. } => *stage,
        }
    }
}

/// Receives run events
pub trait AnalysisObserver: Send + Sync {
    fn on_event(&self, event: &AnalysisEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {
    fn on_event(&self, _event: &AnalysisEvent) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl AnalysisObserver for LogObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        match event {
            AnalysisEvent::Progress {
                stage,
                percent,
                message,
            } => debug!(stage = %stage, percent = format!("{:.1}", percent), "{}", message),
            AnalysisEvent::StageResult {
                stage,
                status: StageStatus::Error,
                message,
                ..
            } => warn!(stage = %stage, "stage failed: {}", message),
            AnalysisEvent::StageResult {
                stage,
                status,
                message,
                ..
            } => info!(stage = %stage, status = ?status, "{}", message),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AnalysisEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Stage-result statuses in emission order
    pub fn statuses(&self) -> Vec<(Stage, StageStatus)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AnalysisEvent::StageResult { stage, status, .. } => Some((stage, status)),
                AnalysisEvent::Progress { .. } => None,
            })
            .collect()
    }

    /// Progress percentages in emission order
    pub fn percents(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AnalysisEvent::Progress { percent, .. } => Some(percent),
                AnalysisEvent::StageResult { .. } => None,
            })
            .collect()
    }
}

impl AnalysisObserver for RecordingObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
