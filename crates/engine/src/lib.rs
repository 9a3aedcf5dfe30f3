//! Threshold-based decision engine and automation run orchestration. The
//! decision itself is a pure function; the runs around it hold the lease,
//! mutate entity state through the gateway, and keep the schedule record
//! consistent with what was actually written.

pub mod decision;
pub mod runs;
pub mod verify;

pub use decision::{decide, Verdict};
pub use runs::{AutomationEngine, RunOutcome, RunStats};
pub use verify::{verify_schedule_access, VerificationItem, VerifyStatus};
