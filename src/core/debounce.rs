//! Debouncing of per-frame conditions into discrete violations.
//!
//! Each monitored condition owns a counter that climbs while the condition
//! holds and decays by one while it does not. A violation fires once the
//! counter exceeds its threshold; the counter then drops to a refractory floor
//! so continuous bad behavior re-fires only after renewed sustained frames.

use crate::config::Sensitivity;
use crate::core::signals::FrameObservation;
use crate::ledger::ViolationKind;
use serde::{Deserialize, Serialize};

/// Missing-face thresholds per tier (frames).
pub const MISSING_FACE_LOW: u32 = 30;
pub const MISSING_FACE_MEDIUM: u32 = 15;
pub const MISSING_FACE_HIGH: u32 = 5;

/// Looking-away thresholds per tier (frames).
pub const LOOKING_AWAY_LOW: u32 = 20;
pub const LOOKING_AWAY_MEDIUM: u32 = 10;
pub const LOOKING_AWAY_HIGH: u32 = 4;

pub const MULTIPLE_FACES_THRESHOLD: u32 = 10;
pub const TALKING_THRESHOLD: u32 = 60;
pub const TALKING_REFRACTORY: u32 = 30;
pub const PHONE_USE_THRESHOLD: u32 = 15;
pub const PHONE_USE_REFRACTORY: u32 = 5;
pub const LOOKING_DOWN_THRESHOLD: u32 = 20;
pub const LOOKING_DOWN_REFRACTORY: u32 = 10;

/// A condition watched by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisionCondition {
    MissingFace,
    LookingAway,
    MultipleFaces,
    /// Head down without the eyes-down signal
    LookingDown,
    Talking,
    PhoneUse,
}

impl VisionCondition {
    pub const ALL: [VisionCondition; 6] = [
        VisionCondition::MissingFace,
        VisionCondition::LookingAway,
        VisionCondition::MultipleFaces,
        VisionCondition::LookingDown,
        VisionCondition::Talking,
        VisionCondition::PhoneUse,
    ];

    /// Whether the condition holds for this frame.
    pub fn holds(&self, obs: &FrameObservation) -> bool {
        match self {
            VisionCondition::MissingFace => !obs.present,
            VisionCondition::LookingAway => obs.present && obs.looking_away,
            VisionCondition::MultipleFaces => obs.multiple_faces(),
            VisionCondition::LookingDown => obs.present && obs.head_down && !obs.phone_use,
            VisionCondition::Talking => obs.present && obs.talking,
            VisionCondition::PhoneUse => obs.present && obs.phone_use,
        }
    }

    /// Ledger category for this condition.
    pub fn kind(&self) -> ViolationKind {
        match self {
            VisionCondition::MissingFace => ViolationKind::FaceMissing,
            VisionCondition::MultipleFaces => ViolationKind::MultipleFaces,
            VisionCondition::LookingAway
            | VisionCondition::LookingDown
            | VisionCondition::Talking
            | VisionCondition::PhoneUse => ViolationKind::Gaze,
        }
    }

    /// Message shown to the candidate.
    pub fn message(&self) -> &'static str {
        match self {
            VisionCondition::MissingFace => "Face not detected. Please stay in front of the camera.",
            VisionCondition::LookingAway => "Please keep your eyes on the screen.",
            VisionCondition::MultipleFaces => "Multiple people detected in the camera view.",
            VisionCondition::LookingDown => "Please keep your head up and face the screen.",
            VisionCondition::Talking => "Sustained talking detected outside of an answer.",
            VisionCondition::PhoneUse => "Possible phone use detected.",
        }
    }
}

/// Firing rule for one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRule {
    /// The counter must exceed this to fire
    pub threshold: u32,
    /// Counter value after firing
    pub refractory_floor: u32,
}

impl ConditionRule {
    const fn new(threshold: u32, refractory_floor: u32) -> Self {
        Self {
            threshold,
            refractory_floor,
        }
    }
}

/// Missing-face threshold for a tier.
pub fn missing_face_threshold(sensitivity: Sensitivity) -> u32 {
    match sensitivity {
        Sensitivity::Low => MISSING_FACE_LOW,
        Sensitivity::Medium => MISSING_FACE_MEDIUM,
        Sensitivity::High => MISSING_FACE_HIGH,
    }
}

/// Looking-away threshold for a tier.
pub fn looking_away_threshold(sensitivity: Sensitivity) -> u32 {
    match sensitivity {
        Sensitivity::Low => LOOKING_AWAY_LOW,
        Sensitivity::Medium => LOOKING_AWAY_MEDIUM,
        Sensitivity::High => LOOKING_AWAY_HIGH,
    }
}

/// Firing rule for a condition at a tier.
pub fn rule_for(condition: VisionCondition, sensitivity: Sensitivity) -> ConditionRule {
    match condition {
        VisionCondition::MissingFace => ConditionRule::new(missing_face_threshold(sensitivity), 0),
        VisionCondition::LookingAway => ConditionRule::new(looking_away_threshold(sensitivity), 0),
        VisionCondition::MultipleFaces => ConditionRule::new(MULTIPLE_FACES_THRESHOLD, 0),
        VisionCondition::LookingDown => {
            ConditionRule::new(LOOKING_DOWN_THRESHOLD, LOOKING_DOWN_REFRACTORY)
        }
        VisionCondition::Talking => ConditionRule::new(TALKING_THRESHOLD, TALKING_REFRACTORY),
        VisionCondition::PhoneUse => ConditionRule::new(PHONE_USE_THRESHOLD, PHONE_USE_REFRACTORY),
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    condition: VisionCondition,
    rule: ConditionRule,
    count: u32,
}

/// Debounces all vision conditions for one camera session.
#[derive(Debug, Clone)]
pub struct Debouncer {
    counters: [Counter; 6],
}

impl Debouncer {
    pub fn new(sensitivity: Sensitivity) -> Self {
        Self {
            counters: VisionCondition::ALL.map(|condition| Counter {
                condition,
                rule: rule_for(condition, sensitivity),
                count: 0,
            }),
        }
    }

    /// Feed one observation; returns the conditions that fired on this frame.
    pub fn observe(&mut self, obs: &FrameObservation) -> Vec<VisionCondition> {
        let mut fired = Vec::new();

        for counter in &mut self.counters {
            if counter.condition.holds(obs) {
                counter.count += 1;
                if counter.count > counter.rule.threshold {
                    tracing::debug!(
                        condition = ?counter.condition,
                        frames = counter.count,
                        "vision condition fired"
                    );
                    fired.push(counter.condition);
                    counter.count = counter.rule.refractory_floor;
                }
            } else {
                counter.count = counter.count.saturating_sub(1);
            }
        }

        fired
    }

    /// Current counter value for a condition.
    pub fn count(&self, condition: VisionCondition) -> u32 {
        self.counters
            .iter()
            .find(|c| c.condition == condition)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}
