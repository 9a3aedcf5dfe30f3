//! Redis-backed coordination services: the per-scope run lease, the
//! replace-on-write progress channel, and the schedule-record store.
//! Each comes with an in-memory twin for tests and dry runs.

pub mod lease;
pub mod progress;
pub mod store;

pub use lease::{run_scope_key, Lease, LeaseOutcome, LeaseService, LocalLeaseService, RedisLeaseService};
pub use progress::{LocalProgressChannel, ProgressChannel, RedisProgressChannel};
pub use store::{LocalScheduleStore, RedisScheduleStore, ScheduleStore};
