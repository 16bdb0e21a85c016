//! Scheduler (C9) runtime loop: one `tokio::time::interval` task per row of
//! the cadence table in `wealthfolio_core::scheduler`, spawned from `main`
//! and joined on shutdown.
//!
//! Grounded on `device_sync_scheduler.rs` for the cadence-constants-as-data
//! shape and on `DeviceSyncRuntimeState` (`apps/tauri/src/context/registry.rs`)
//! for the background-task-handle pattern, generalized here from one handle
//! per job to a `Vec<JoinHandle<()>>`, and from one `cycle_mutex` to a
//! per-`user_id` keyed registry.

use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use wealthfolio_core::ingestion::IngestionJobs;
use wealthfolio_core::portfolio::StatisticBuilder;
use wealthfolio_core::scheduler::{
    CURRENT_PRICE_REFRESH_INTERVAL, DAILY_CLOSE_HOUR_LOCAL, DIRECTORY_REFRESH_INTERVAL, FX_REFRESH_INTERVAL,
    LATEST_HOURLY_INTERVAL, RETENTION_PURGE_HOUR_LOCAL,
};

/// Per-`user_id` mutex registry serializing `rebuild_for_user` against
/// itself across concurrent callers — generalizes `DeviceSyncRuntimeState`'s
/// single `cycle_mutex` to one lock per key.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut registry = self.locks.lock().await;
        registry.entry(user_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Fires the hourly statistic rebuild serialized per user through
/// `locks`, so a job tick never overlaps a still-running rebuild for the
/// same user triggered from elsewhere in the process.
async fn rebuild_all_serialized(builder: &StatisticBuilder, locks: &UserLocks) {
    let user_ids = match builder.user_ids() {
        Ok(ids) => ids,
        Err(err) => {
            log::error!("scheduler: failed to list users for rebuild: {err}");
            return;
        }
    };
    for user_id in user_ids {
        let lock = locks.lock_for(&user_id).await;
        let _guard = lock.lock().await;
        if let Err(err) = builder.rebuild_for_user(&user_id, false).await {
            log::error!("scheduler: rebuild_for_user({user_id}) failed: {err}");
        }
    }
}

/// Seconds until the next local occurrence of `hour:00:00` in `tz`.
fn seconds_until_next_local_hour(tz: Tz, hour: u32) -> u64 {
    let now = tz.from_utc_datetime(&Utc::now().naive_utc());
    let mut target = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("valid hour")
        .and_local_timezone(tz)
        .single()
        .unwrap_or(now);
    if target <= now {
        target += chrono::Duration::days(1);
    }
    (target - now).num_seconds().max(0) as u64
}

pub struct SchedulerRuntime {
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerRuntime {
    /// Spawns every cadence-table job and runs one immediate directory
    /// refresh before returning (spec §4.9: "Startup triggers one
    /// immediate directory refresh").
    pub async fn spawn(
        ingestion: Arc<IngestionJobs>,
        statistic_builder: Arc<StatisticBuilder>,
        scheduler_tz: Tz,
    ) -> Self {
        if let Err(err) = ingestion.directory_refresh().await {
            log::error!("scheduler: startup directory refresh failed: {err}");
        }

        let locks = Arc::new(UserLocks::new());
        let mut handles = Vec::new();

        handles.push(spawn_interval(FX_REFRESH_INTERVAL, {
            let ingestion = ingestion.clone();
            move || {
                let ingestion = ingestion.clone();
                async move {
                    if let Err(err) = ingestion.fx_refresh().await {
                        log::error!("scheduler: fx_refresh failed: {err}");
                    }
                }
            }
        }));

        handles.push(spawn_interval(DIRECTORY_REFRESH_INTERVAL, {
            let ingestion = ingestion.clone();
            move || {
                let ingestion = ingestion.clone();
                async move {
                    if let Err(err) = ingestion.directory_refresh().await {
                        log::error!("scheduler: directory_refresh failed: {err}");
                    }
                }
            }
        }));

        handles.push(spawn_interval(LATEST_HOURLY_INTERVAL, {
            let ingestion = ingestion.clone();
            move || {
                let ingestion = ingestion.clone();
                async move {
                    if let Err(err) = ingestion.latest_hourly(Utc::now()).await {
                        log::error!("scheduler: latest_hourly failed: {err}");
                    }
                }
            }
        }));

        // "Per-user asset current_price refresh" and "rebuild_all()" (spec
        // §4.9 cadence table) share one hourly tick: `rebuild_for_user`'s
        // Phase C already refreshes `current_price` before recomputing the
        // statistic, so a separate job would just repeat that work.
        handles.push(spawn_interval(CURRENT_PRICE_REFRESH_INTERVAL, {
            let statistic_builder = statistic_builder.clone();
            let locks = locks.clone();
            move || {
                let statistic_builder = statistic_builder.clone();
                let locks = locks.clone();
                async move {
                    rebuild_all_serialized(&statistic_builder, &locks).await;
                }
            }
        }));

        handles.push(spawn_daily_at(scheduler_tz, DAILY_CLOSE_HOUR_LOCAL, {
            let ingestion = ingestion.clone();
            move || {
                let ingestion = ingestion.clone();
                async move {
                    if let Err(err) = ingestion.daily_close(Utc::now()).await {
                        log::error!("scheduler: daily_close failed: {err}");
                    }
                }
            }
        }));

        handles.push(spawn_daily_at(scheduler_tz, RETENTION_PURGE_HOUR_LOCAL, {
            let ingestion = ingestion.clone();
            move || {
                let ingestion = ingestion.clone();
                async move {
                    if let Err(err) = ingestion.retention_purge(Utc::now()).await {
                        log::error!("scheduler: retention_purge failed: {err}");
                    }
                }
            }
        }));

        Self { handles }
    }

    pub fn abort(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// A missed tick is skipped, not coalesced (spec §4.9) — `MissedTickBehavior::Skip`.
fn spawn_interval<F, Fut>(period: std::time::Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            job().await;
        }
    })
}

fn spawn_daily_at<F, Fut>(tz: Tz, hour_local: u32, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let wait = seconds_until_next_local_hour(tz, hour_local);
            tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
            job().await;
        }
    })
}
