//! Scheduler (C9) cadence table — pure constants consumed by the runtime
//! loop in `apps/server`. Grounded on `device_sync_scheduler.rs`'s cadence
//! constants (a fixed `const` per job rather than a cron parser) and on
//! `DeviceSyncRuntimeState`'s background-task-handle pattern, which the
//! binary crate generalizes from one task to one per row below.

use std::time::Duration;

/// Fixed schedule (spec §4.9). Times-of-day fields are local to the
/// operator's configured timezone; interval fields are wall-clock.
pub const FX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DIRECTORY_REFRESH_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const CURRENT_PRICE_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const REBUILD_ALL_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const LATEST_HOURLY_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Local time-of-day jobs: daily close bars at 18:00, retention purge at
/// 02:00. The runtime loop computes the next fire instant from these.
pub const DAILY_CLOSE_HOUR_LOCAL: u32 = 18;
pub const RETENTION_PURGE_HOUR_LOCAL: u32 = 2;
