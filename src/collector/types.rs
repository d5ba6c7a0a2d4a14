//! Input types fed into a proctored session.
//!
//! Two independent sources feed the core: camera frames that have already been
//! run through a face-landmark detector, and environment events raised by the
//! browser shell (fullscreen, visibility, focus, keyboard).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single face-mesh landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Named blendshape scores for one face, each in [0, 1].
pub type Blendshapes = HashMap<String, f32>;

/// Detector output for one video frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorFrame {
    /// Playback time of the source video when the frame was decoded (seconds)
    pub video_time: f64,
    /// One landmark list per detected face
    #[serde(default)]
    pub face_landmarks: Vec<Vec<Landmark>>,
    /// One blendshape map per detected face
    #[serde(default)]
    pub face_blendshapes: Vec<Blendshapes>,
}

impl DetectorFrame {
    /// A frame in which the detector found nobody.
    pub fn empty(video_time: f64) -> Self {
        Self {
            video_time,
            face_landmarks: Vec::new(),
            face_blendshapes: Vec::new(),
        }
    }

    /// Number of faces the detector reported.
    pub fn face_count(&self) -> usize {
        self.face_landmarks.len()
    }
}

/// A key press as reported by the browser shell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyInput {
    /// Key name as reported by the browser (`"F12"`, `"i"`, `"Escape"`)
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyInput {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Default::default()
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            shift: true,
            ..Default::default()
        }
    }

    pub fn alt(key: &str) -> Self {
        Self {
            key: key.to_string(),
            alt: true,
            ..Default::default()
        }
    }

    /// Ctrl on Windows/Linux, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Browser/environment event delivered to the lockdown machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    FullscreenChanged { is_fullscreen: bool },
    VisibilityChanged { hidden: bool },
    FocusLost,
    KeyPressed(KeyInput),
    ContextMenu,
    BeforeUnload,
}

/// What arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum InputKind {
    Frame(DetectorFrame),
    Environment(EnvironmentEvent),
    /// The candidate acknowledged the violation overlay
    DismissOverlay,
}

/// Timestamped input for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInput {
    pub at: DateTime<Utc>,
    pub input: InputKind,
}

impl SessionInput {
    pub fn new(at: DateTime<Utc>, input: InputKind) -> Self {
        Self { at, input }
    }

    pub fn frame(at: DateTime<Utc>, frame: DetectorFrame) -> Self {
        Self::new(at, InputKind::Frame(frame))
    }

    pub fn environment(at: DateTime<Utc>, event: EnvironmentEvent) -> Self {
        Self::new(at, InputKind::Environment(event))
    }
}
