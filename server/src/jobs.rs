//! Scheduled maintenance jobs.
//!
//! Every server process instance runs the same interval timers; the
//! distributed lock decides which instance actually executes a given tick.
//! Job failures are logged and the loop continues - a bad tick must never
//! kill the scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use crate::db::ClinicStore;
use crate::error::AppError;
use crate::lock::{DistributedLock, LockOutcome};

/// Clinics unseen for this long get flagged by the stale-clinic report.
const STALE_AFTER_HOURS: i64 = 24;

/// Spawn the background job loops.
pub fn spawn_scheduled_jobs(lock: DistributedLock, clinics: Arc<dyn ClinicStore>) {
    tokio::spawn(run_every(
        lock,
        "stale-clinic-report",
        Duration::from_secs(60 * 60),
        Duration::from_secs(120),
        move || {
            let clinics = Arc::clone(&clinics);
            async move { stale_clinic_report(clinics.as_ref()).await }
        },
    ));
}

/// Run `job` on a fixed interval, one process instance per tick.
///
/// A skipped tick means another instance held the lock; that is the
/// expected steady state in a scaled deployment, not an error.
pub async fn run_every<F, Fut>(
    lock: DistributedLock,
    name: &'static str,
    every: Duration,
    ttl: Duration,
    job: F,
) where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), AppError>>,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match lock.with_lock(name, ttl, &job).await {
            LockOutcome::Completed(Ok(())) => {
                tracing::debug!(job = name, "job tick completed");
            }
            LockOutcome::Completed(Err(e)) => {
                tracing::warn!(job = name, error = %e, "job tick failed");
            }
            LockOutcome::Skipped => {
                tracing::debug!(job = name, "job tick skipped, held by another instance");
            }
        }
    }
}

/// Warn about active clinics that have not contacted the hub recently.
async fn stale_clinic_report(clinics: &dyn ClinicStore) -> Result<(), AppError> {
    let now = Utc::now();
    let threshold = now - ChronoDuration::hours(STALE_AFTER_HOURS);

    for clinic in clinics.list().await? {
        if clinic.status != medsync_engine::ClinicStatus::Active {
            continue;
        }
        let stale = match clinic.last_seen_at {
            Some(seen) => seen < threshold,
            None => clinic.created_at < threshold,
        };
        if stale {
            tracing::warn!(
                clinic = %clinic.clinic_id,
                last_seen = ?clinic.last_seen_at,
                "clinic has not synced in over {STALE_AFTER_HOURS} hours"
            );
        }
    }

    Ok(())
}
