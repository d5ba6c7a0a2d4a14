//! Vision pipeline for the proctoring core.
//!
//! This module contains:
//! - Signal extraction from face-landmark detector frames
//! - Debouncing of per-frame conditions into violations
//! - Rolling confidence and suspicion levels
//! - The per-frame monitor tying them together

pub mod debounce;
pub mod monitor;
pub mod signals;
pub mod suspicion;

// Re-export commonly used types
pub use debounce::{
    looking_away_threshold, missing_face_threshold, rule_for, ConditionRule, Debouncer,
    VisionCondition,
};
pub use monitor::{FrameOutcome, SensorStatus, VisionMonitor, VisionViolation, VisualMetrics};
pub use signals::{
    extract_observation, frame_confidence, frame_suspicion, Expression, FrameObservation,
    HeadPose, SignalError,
};
pub use suspicion::{RollingMean, SuspicionAggregator, ROLLING_CAPACITY};
