//! Strike ledger shared by the vision pipeline and the lockdown machine.
//!
//! One authoritative strike counter and one append-only event list per
//! session. Registration checks the rate limit, increments the counter and
//! decides termination under a single lock, so two sources firing together can
//! never both claim (or both miss) the terminating strike.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Category of a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    Gaze,
    FaceMissing,
    MultipleFaces,
    TabSwitch,
    FullscreenExit,
}

impl ViolationKind {
    /// Whether the violation comes from the camera pipeline.
    pub fn is_vision(&self) -> bool {
        matches!(
            self,
            ViolationKind::Gaze | ViolationKind::FaceMissing | ViolationKind::MultipleFaces
        )
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViolationKind::Gaze => "GAZE",
            ViolationKind::FaceMissing => "FACE_MISSING",
            ViolationKind::MultipleFaces => "MULTIPLE_FACES",
            ViolationKind::TabSwitch => "TAB_SWITCH",
            ViolationKind::FullscreenExit => "FULLSCREEN_EXIT",
        };
        write!(f, "{name}")
    }
}

/// A counted violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEvent {
    /// RFC 3339 timestamp
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub message: String,
}

/// Result of registering a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Appended and counted
    Recorded {
        count: u32,
        vision_count: u32,
        /// True for exactly one registration per session: the one reaching the limit
        terminating: bool,
    },
    /// Inside the rate-limit window of the previous strike; not counted
    Throttled {
        /// When the window closes and a strike can count again
        retry_at: DateTime<Utc>,
    },
    /// The session has already terminated
    Closed,
}

impl Registration {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Registration::Recorded { .. })
    }

    pub fn is_terminating(&self) -> bool {
        matches!(
            self,
            Registration::Recorded {
                terminating: true,
                ..
            }
        )
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    events: Vec<WarningEvent>,
    count: u32,
    vision_count: u32,
    last_strike_at: Option<DateTime<Utc>>,
    terminated: bool,
}

/// Strike counter and event log for one session.
#[derive(Debug)]
pub struct StrikeLedger {
    session_id: String,
    access_id: String,
    max_violations: u32,
    rate_limit: Duration,
    inner: Mutex<LedgerInner>,
}

impl StrikeLedger {
    /// Create a ledger for a session. `max_violations` is clamped to at least 1.
    pub fn new(access_id: &str, max_violations: u32, rate_limit_ms: u64) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            access_id: access_id.to_string(),
            max_violations: max_violations.max(1),
            rate_limit: Duration::milliseconds(rate_limit_ms as i64),
            inner: Mutex::new(LedgerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // A panicked holder cannot leave the counter half-updated; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a violation from either source.
    pub fn register_violation(
        &self,
        kind: ViolationKind,
        message: &str,
        at: DateTime<Utc>,
    ) -> Registration {
        let mut inner = self.lock();

        if inner.terminated {
            return Registration::Closed;
        }

        if let Some(last) = inner.last_strike_at {
            if at - last < self.rate_limit {
                tracing::debug!(%kind, "violation inside rate-limit window, not counted");
                return Registration::Throttled {
                    retry_at: last + self.rate_limit,
                };
            }
        }

        inner.events.push(WarningEvent {
            timestamp: at,
            kind,
            message: message.to_string(),
        });
        inner.count += 1;
        if kind.is_vision() {
            inner.vision_count += 1;
        }
        inner.last_strike_at = Some(at);

        let terminating = inner.count >= self.max_violations;
        if terminating {
            inner.terminated = true;
        }

        tracing::info!(
            %kind,
            strikes = inner.count,
            max = self.max_violations,
            "strike recorded"
        );

        Registration::Recorded {
            count: inner.count,
            vision_count: inner.vision_count,
            terminating,
        }
    }

    pub fn strike_count(&self) -> u32 {
        self.lock().count
    }

    pub fn vision_strike_count(&self) -> u32 {
        self.lock().vision_count
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    /// Copy of all recorded events, oldest first.
    pub fn events(&self) -> Vec<WarningEvent> {
        self.lock().events.clone()
    }

    /// Serializable view of the ledger.
    pub fn export(&self) -> LedgerExport {
        let inner = self.lock();
        LedgerExport {
            session_id: self.session_id.clone(),
            access_id: self.access_id.clone(),
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            max_violations: self.max_violations,
            strike_count: inner.count,
            terminated: inner.terminated,
            events: inner.events.clone(),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let export = self.export();
        let mut out = format!(
            "Session {}\n\
             - Access ID: {}\n\
             - Strikes: {}/{}\n\
             - Terminated: {}",
            export.session_id,
            export.access_id,
            export.strike_count,
            export.max_violations,
            if export.terminated { "yes" } else { "no" }
        );
        for event in &export.events {
            out.push_str(&format!(
                "\n  [{}] {}: {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.kind,
                event.message
            ));
        }
        out
    }

    /// Write the ledger to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.export())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

/// Exported ledger format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    pub session_id: String,
    pub access_id: String,
    pub host: String,
    pub max_violations: u32,
    pub strike_count: u32,
    pub terminated: bool,
    pub events: Vec<WarningEvent>,
}

/// Ledger handle injected into both pipelines.
pub type SharedStrikeLedger = Arc<StrikeLedger>;

/// Create a shared ledger.
pub fn create_shared_ledger(
    access_id: &str,
    max_violations: u32,
    rate_limit_ms: u64,
) -> SharedStrikeLedger {
    Arc::new(StrikeLedger::new(access_id, max_violations, rate_limit_ms))
}
