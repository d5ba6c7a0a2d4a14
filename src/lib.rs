//! Proctor Sentinel - integrity monitoring and environment lockdown for
//! proctored interview sessions.
//!
//! This library turns face-landmark detector output into debounced integrity
//! violations and rolling suspicion levels, enforces fullscreen and focus
//! discipline in the candidate's browser, and terminates the session once
//! the strike limit is reached.
//!
//! # Guarantees
//!
//! - **No single-frame strikes**: every vision condition must hold for a
//!   sustained run of frames before it counts
//! - **One strike per burst**: violations inside the rate-limit window of the
//!   previous strike are not counted
//! - **Termination is final**: the strike counter never decreases and the
//!   controller is told exactly once
//! - **No frames kept**: observations are reduced to counters and dropped
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Proctor Sentinel                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   │
//! │  │ Signals  │──▶│ Debounce │──▶│Suspicion │──▶│ Metrics  │   │
//! │  │ (frame)  │   │(counters)│   │ (30 fr.) │   │          │   │
//! │  └──────────┘   └────┬─────┘   └──────────┘   └──────────┘   │
//! │                      ▼                                        │
//! │                ┌──────────┐   ┌──────────┐                    │
//! │                │  Strike  │◀──│ Lockdown │◀── browser events  │
//! │                │  Ledger  │   │ machine  │                    │
//! │                └────┬─────┘   └──────────┘                    │
//! │                     ▼                                         │
//! │              termination ──▶ blocked_<id>, controller         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use proctor_sentinel::{host, store, Config, ProctorSession};
//!
//! let config = Config::default();
//! let mut session = ProctorSession::new(
//!     "candidate-123",
//!     &config,
//!     Box::new(host::NoopHost),
//!     Box::new(host::NoopSpeech),
//!     Box::new(store::MemoryStore::new()),
//!     Box::new(host::LoggingObserver),
//! );
//! session.start();
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod host;
pub mod ledger;
pub mod lockdown;
pub mod session;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{
    CollectorError, DetectorFrame, EnvironmentEvent, InputCollector, InputKind, KeyInput,
    SessionInput,
};
pub use config::{Config, Sensitivity};
pub use core::{FrameOutcome, VisionMonitor, VisualMetrics};
pub use ledger::{
    create_shared_ledger, SharedStrikeLedger, StrikeLedger, ViolationKind, WarningEvent,
};
pub use lockdown::{Disposition, LockdownMachine, LockdownPhase, LockdownState};
pub use session::{ProctorSession, SessionSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown to candidates before monitoring starts.
pub const PROCTORING_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              PROCTORED INTERVIEW - MONITORING NOTICE             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This interview is monitored for integrity.                      ║
║                                                                  ║
║  ✓ WHAT WE WATCH:                                                ║
║    • Whether your face is visible and facing the screen          ║
║    • Whether other people appear on camera                       ║
║    • Whether you leave fullscreen or switch tabs/windows         ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Camera frames or images of you                              ║
║    • Anything you type outside the interview                     ║
║                                                                  ║
║  Brief slips are tolerated. Sustained violations are recorded    ║
║  as strikes; reaching the strike limit ends the session.         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_contents() {
        assert!(PROCTORING_NOTICE.contains("MONITORING NOTICE"));
        assert!(PROCTORING_NOTICE.contains("NEVER KEEP"));
        assert!(PROCTORING_NOTICE.contains("strike limit"));
    }
}
