//! Per-frame vision pipeline.
//!
//! For every new video frame: extract signals, debounce conditions, update
//! rolling levels, publish metrics. Steps never interleave across frames, a
//! frame whose video time has not advanced is skipped, and a frame that
//! cannot be analysed is dropped without disturbing the next one.

use crate::collector::types::DetectorFrame;
use crate::config::Sensitivity;
use crate::core::debounce::{Debouncer, VisionCondition};
use crate::core::signals::{
    extract_observation, frame_confidence, frame_suspicion, Expression, FrameObservation,
    HeadPose, SignalError,
};
use crate::core::suspicion::SuspicionAggregator;
use crate::ledger::{Registration, SharedStrikeLedger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot published after every processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualMetrics {
    pub is_present: bool,
    pub is_looking_at_camera: bool,
    pub current_expression: Expression,
    /// Rolling 0-100
    pub confidence_level: u8,
    pub head_pose: HeadPose,
    pub is_looking_down: bool,
    pub is_talking: bool,
    pub suspected_phone_use: bool,
    /// Rolling 0-100
    pub suspicion_level: u8,
}

/// Camera/model availability.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SensorStatus {
    #[default]
    Initializing,
    Ready,
    /// Persistent until the page is reloaded
    Unavailable(String),
}

/// A debounced condition and what the ledger made of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisionViolation {
    pub condition: VisionCondition,
    pub registration: Registration,
}

/// Result of offering a frame to the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Same video time as the last processed frame
    Stale,
    /// Sensor marked unavailable
    Unavailable,
    /// Frame could not be analysed
    Skipped(SignalError),
    Processed {
        metrics: VisualMetrics,
        violations: Vec<VisionViolation>,
    },
}

/// Vision pipeline for one camera session.
pub struct VisionMonitor {
    debouncer: Debouncer,
    aggregator: SuspicionAggregator,
    ledger: SharedStrikeLedger,
    last_video_time: Option<f64>,
    metrics: VisualMetrics,
    status: SensorStatus,
    feedback: Option<String>,
    confidence_total: u64,
    frames_processed: u64,
    frames_skipped: u64,
}

impl VisionMonitor {
    pub fn new(sensitivity: Sensitivity, ledger: SharedStrikeLedger) -> Self {
        Self {
            debouncer: Debouncer::new(sensitivity),
            aggregator: SuspicionAggregator::new(),
            ledger,
            last_video_time: None,
            metrics: VisualMetrics::default(),
            status: SensorStatus::Initializing,
            feedback: None,
            confidence_total: 0,
            frames_processed: 0,
            frames_skipped: 0,
        }
    }

    /// Run one analysis pass if the frame is new.
    pub fn process(&mut self, frame: &DetectorFrame, now: DateTime<Utc>) -> FrameOutcome {
        if matches!(self.status, SensorStatus::Unavailable(_)) {
            return FrameOutcome::Unavailable;
        }
        if self.last_video_time == Some(frame.video_time) {
            return FrameOutcome::Stale;
        }
        self.last_video_time = Some(frame.video_time);

        let obs = match extract_observation(frame) {
            Ok(obs) => obs,
            Err(e) => {
                self.frames_skipped += 1;
                tracing::warn!(error = %e, video_time = frame.video_time, "skipping frame");
                return FrameOutcome::Skipped(e);
            }
        };
        if self.status == SensorStatus::Initializing {
            tracing::info!("camera pipeline ready");
            self.status = SensorStatus::Ready;
        }

        let violations = self
            .debouncer
            .observe(&obs)
            .into_iter()
            .map(|condition| self.register(condition, now))
            .collect();

        self.aggregator
            .push(frame_confidence(&obs), frame_suspicion(&obs));
        self.metrics = self.publish(&obs);
        self.confidence_total += u64::from(self.metrics.confidence_level);
        self.frames_processed += 1;

        FrameOutcome::Processed {
            metrics: self.metrics.clone(),
            violations,
        }
    }

    fn register(&mut self, condition: VisionCondition, now: DateTime<Utc>) -> VisionViolation {
        let registration =
            self.ledger
                .register_violation(condition.kind(), condition.message(), now);
        if !matches!(registration, Registration::Closed) {
            // Throttled violations still refresh the on-screen hint.
            self.feedback = Some(condition.message().to_string());
        }
        VisionViolation {
            condition,
            registration,
        }
    }

    fn publish(&self, obs: &FrameObservation) -> VisualMetrics {
        VisualMetrics {
            is_present: obs.present,
            is_looking_at_camera: obs.looking_at_camera(),
            current_expression: obs.expression(),
            confidence_level: self.aggregator.confidence_level(),
            head_pose: obs.head_pose,
            is_looking_down: obs.head_down,
            is_talking: obs.talking,
            suspected_phone_use: obs.phone_use,
            suspicion_level: self.aggregator.suspicion_level(),
        }
    }

    /// Record that the camera or model failed to start.
    pub fn mark_unavailable(&mut self, reason: &str) {
        tracing::error!(reason, "camera pipeline unavailable");
        self.status = SensorStatus::Unavailable(reason.to_string());
    }

    pub fn status(&self) -> &SensorStatus {
        &self.status
    }

    pub fn metrics(&self) -> &VisualMetrics {
        &self.metrics
    }

    /// Latest warning text for the candidate.
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Mean of all published confidence levels this session, for final scoring.
    pub fn session_confidence(&self) -> f64 {
        if self.frames_processed == 0 {
            0.0
        } else {
            self.confidence_total as f64 / self.frames_processed as f64
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }
}
