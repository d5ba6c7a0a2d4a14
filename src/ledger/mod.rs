//! Strike ledger for a proctored session.
//!
//! Both the camera pipeline and the lockdown machine record violations here;
//! the ledger alone decides when the strike limit has been reached.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_ledger, LedgerExport, Registration, SharedStrikeLedger, StrikeLedger,
    ViolationKind, WarningEvent,
};
