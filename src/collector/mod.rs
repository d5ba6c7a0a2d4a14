//! Input collection for a proctored session.
//!
//! This module defines the detector frames and environment events the core
//! consumes, and a channel-backed collector that decouples producers from the
//! single-threaded session loop.

pub mod channel;
pub mod types;

// Re-export commonly used types
pub use channel::{CollectorError, InputCollector, InputSender, CHANNEL_CAPACITY};
pub use types::{
    Blendshapes, DetectorFrame, EnvironmentEvent, InputKind, KeyInput, Landmark, SessionInput,
};
