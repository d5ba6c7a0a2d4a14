//! Per-frame signal extraction from face-landmark detector output.
//!
//! Turns one detector frame into a `FrameObservation`: presence, gaze offset,
//! head pose, eye-down and lip-activity scores, and the composite booleans the
//! debouncer watches. Observations are never stored; they are reduced to
//! counters and rolling scores and dropped.

use crate::collector::types::{Blendshapes, DetectorFrame, Landmark};
use serde::{Deserialize, Serialize};

/// Face-mesh landmark indices used by the geometric rules.
pub const NOSE_TIP: usize = 1;
pub const FOREHEAD: usize = 10;
pub const CHIN: usize = 152;
pub const LEFT_EAR: usize = 234;
pub const RIGHT_EAR: usize = 454;

/// Gaze offset below which the candidate is looking left.
pub const GAZE_LEFT_THRESHOLD: f32 = 0.35;
/// Gaze offset above which the candidate is looking right.
pub const GAZE_RIGHT_THRESHOLD: f32 = 0.65;
/// Vertical nose ratio above which the head is tilted down.
pub const HEAD_DOWN_THRESHOLD: f32 = 0.75;
/// Vertical nose ratio below which the head is tilted up.
pub const HEAD_UP_THRESHOLD: f32 = 0.40;
pub const EYES_DOWN_THRESHOLD: f32 = 0.35;
pub const TALKING_THRESHOLD: f32 = 0.6;
pub const SMILE_THRESHOLD: f32 = 0.3;

/// Suspicion weights, summed then capped at 100.
pub const SUSPICION_LOOKING_AWAY: u32 = 30;
pub const SUSPICION_HEAD_DOWN: u32 = 25;
pub const SUSPICION_EYES_DOWN: u32 = 15;
pub const SUSPICION_TALKING: u32 = 20;
pub const SUSPICION_PHONE: u32 = 40;

/// Coarse head orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeadPose {
    #[default]
    Forward,
    Down,
    Left,
    Right,
    Up,
}

/// Facial expression shown in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    #[default]
    Absent,
    Neutral,
    Smiling,
    Speaking,
}

/// Features derived from one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    pub present: bool,
    pub face_count: usize,
    /// Horizontal nose position between the ears (0 = left ear, 1 = right ear)
    pub gaze_offset: f32,
    /// Vertical nose position between forehead and chin
    pub vertical_ratio: f32,
    pub head_pose: HeadPose,
    pub eye_down: f32,
    pub lip_activity: f32,
    pub smile: f32,
    pub looking_away: bool,
    pub head_down: bool,
    pub eyes_down: bool,
    pub talking: bool,
    pub phone_use: bool,
}

impl FrameObservation {
    /// Observation for a frame with no usable face; nothing geometric is derived.
    pub fn no_face(face_count: usize) -> Self {
        Self {
            present: false,
            face_count,
            gaze_offset: 0.5,
            vertical_ratio: 0.5,
            ..Default::default()
        }
    }

    pub fn multiple_faces(&self) -> bool {
        self.face_count > 1
    }

    pub fn looking_at_camera(&self) -> bool {
        self.present && !self.looking_away
    }

    pub fn expression(&self) -> Expression {
        if !self.present {
            Expression::Absent
        } else if self.smile > SMILE_THRESHOLD {
            Expression::Smiling
        } else if self.talking {
            Expression::Speaking
        } else {
            Expression::Neutral
        }
    }
}

/// Errors that make a frame unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Landmarks present but geometrically meaningless (NaN, zero span)
    Degenerate(&'static str),
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::Degenerate(what) => write!(f, "Degenerate landmarks: {what}"),
        }
    }
}

impl std::error::Error for SignalError {}

/// Extract a `FrameObservation` from detector output.
///
/// Geometry is read from the first face; additional faces only raise the
/// face count. A face without the required landmarks is treated as absent.
pub fn extract_observation(frame: &DetectorFrame) -> Result<FrameObservation, SignalError> {
    let face_count = frame.face_count();
    let Some(landmarks) = frame.face_landmarks.first() else {
        return Ok(FrameObservation::no_face(0));
    };
    let Some(points) = key_points(landmarks) else {
        return Ok(FrameObservation::no_face(face_count));
    };

    if !points.iter().all(Landmark::is_finite) {
        return Err(SignalError::Degenerate("non-finite coordinate"));
    }
    let [nose, forehead, chin, left_ear, right_ear] = points;

    let ear_span = (right_ear.x - left_ear.x).abs();
    if ear_span <= f32::EPSILON {
        return Err(SignalError::Degenerate("zero ear span"));
    }
    let face_height = (chin.y - forehead.y).abs();
    if face_height <= f32::EPSILON {
        return Err(SignalError::Degenerate("zero forehead-chin span"));
    }

    let gaze_offset = (nose.x - left_ear.x) / ear_span;
    let vertical_ratio = (nose.y - forehead.y) / face_height;

    let looking_left = gaze_offset < GAZE_LEFT_THRESHOLD;
    let looking_right = gaze_offset > GAZE_RIGHT_THRESHOLD;
    let head_down = vertical_ratio > HEAD_DOWN_THRESHOLD;
    let head_up = vertical_ratio < HEAD_UP_THRESHOLD;

    let head_pose = if head_down {
        HeadPose::Down
    } else if head_up {
        HeadPose::Up
    } else if looking_left {
        HeadPose::Left
    } else if looking_right {
        HeadPose::Right
    } else {
        HeadPose::Forward
    };

    let (eye_down, lip_activity, smile) = match frame.face_blendshapes.first() {
        Some(shapes) => (
            (score(shapes, "eyeLookDownLeft") + score(shapes, "eyeLookDownRight")) / 2.0,
            score(shapes, "jawOpen") + (1.0 - score(shapes, "mouthClose"))
                + score(shapes, "mouthPucker"),
            (score(shapes, "mouthSmileLeft") + score(shapes, "mouthSmileRight")) / 2.0,
        ),
        None => (0.0, 0.0, 0.0),
    };

    let eyes_down = eye_down > EYES_DOWN_THRESHOLD;

    Ok(FrameObservation {
        present: true,
        face_count,
        gaze_offset,
        vertical_ratio,
        head_pose,
        eye_down,
        lip_activity,
        smile,
        looking_away: looking_left || looking_right,
        head_down,
        eyes_down,
        talking: lip_activity > TALKING_THRESHOLD,
        // Either signal alone is ordinary (reading notes, thinking); only both together count.
        phone_use: head_down && eyes_down,
    })
}

/// Per-frame confidence used for the rolling confidence level.
pub fn frame_confidence(obs: &FrameObservation) -> f64 {
    if !obs.present {
        0.0
    } else if obs.looking_away {
        10.0
    } else if obs.phone_use {
        5.0
    } else if obs.head_down {
        20.0
    } else if obs.smile > SMILE_THRESHOLD {
        90.0
    } else {
        70.0
    }
}

/// Per-frame suspicion score in [0, 100].
pub fn frame_suspicion(obs: &FrameObservation) -> f64 {
    let mut score = 0;
    if obs.looking_away {
        score += SUSPICION_LOOKING_AWAY;
    }
    if obs.head_down {
        score += SUSPICION_HEAD_DOWN;
    }
    if obs.eyes_down {
        score += SUSPICION_EYES_DOWN;
    }
    if obs.talking {
        score += SUSPICION_TALKING;
    }
    if obs.phone_use {
        score += SUSPICION_PHONE;
    }
    score.min(100) as f64
}

fn key_points(landmarks: &[Landmark]) -> Option<[Landmark; 5]> {
    Some([
        *landmarks.get(NOSE_TIP)?,
        *landmarks.get(FOREHEAD)?,
        *landmarks.get(CHIN)?,
        *landmarks.get(LEFT_EAR)?,
        *landmarks.get(RIGHT_EAR)?,
    ])
}

fn score(shapes: &Blendshapes, name: &str) -> f32 {
    shapes.get(name).copied().unwrap_or(0.0)
}

/// Builders for synthetic detector frames, shared by unit and integration tests.
pub mod testing {
    use super::*;

    /// Size of a full face mesh.
    pub const MESH_SIZE: usize = 478;

    /// A face with the nose at (`gaze`, `vertical`) inside a unit box spanning
    /// ears x = 0..1 and forehead/chin y = 0..1.
    pub fn face(gaze: f32, vertical: f32) -> Vec<Landmark> {
        let mut mesh = vec![Landmark::new(0.5, 0.5); MESH_SIZE];
        mesh[NOSE_TIP] = Landmark::new(gaze, vertical);
        mesh[FOREHEAD] = Landmark::new(0.5, 0.0);
        mesh[CHIN] = Landmark::new(0.5, 1.0);
        mesh[LEFT_EAR] = Landmark::new(0.0, 0.5);
        mesh[RIGHT_EAR] = Landmark::new(1.0, 0.5);
        mesh
    }

    /// Blendshapes of a quiet, neutral face.
    pub fn neutral_shapes() -> Blendshapes {
        let mut shapes = Blendshapes::new();
        shapes.insert("mouthClose".to_string(), 1.0);
        shapes
    }

    pub fn with_shape(mut shapes: Blendshapes, name: &str, value: f32) -> Blendshapes {
        shapes.insert(name.to_string(), value);
        shapes
    }

    pub fn frame(video_time: f64, gaze: f32, vertical: f32, shapes: Blendshapes) -> DetectorFrame {
        DetectorFrame {
            video_time,
            face_landmarks: vec![face(gaze, vertical)],
            face_blendshapes: vec![shapes],
        }
    }

    /// A candidate looking straight at the camera.
    pub fn attentive(video_time: f64) -> DetectorFrame {
        frame(video_time, 0.5, 0.55, neutral_shapes())
    }

    /// A candidate turned to the side.
    pub fn looking_away(video_time: f64) -> DetectorFrame {
        frame(video_time, 0.2, 0.55, neutral_shapes())
    }
}
