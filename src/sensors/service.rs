use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use tokio::{
    sync::Semaphore,
    task::JoinSet,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    db::models::{RoomId, Thing},
    error::FetchError,
    sensor_cache::{SensorCache, SensorReading},
    status::{directory, votes},
    thingworx::ThingWorxClient,
};

/// What happened to one thing's reading during a refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorUpdate {
    /// Connected reading written to the cache.
    Cached(SensorReading),
    /// `lastUpdated` outside the connected window; nothing was cached.
    Stale { last_updated: i64, now: i64 },
}

#[derive(Debug)]
pub struct SensorFailure {
    pub room_id: RoomId,
    pub thing_name: String,
    pub error: FetchError,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub things: usize,
    pub cached: usize,
    pub stale: usize,
    pub failures: Vec<SensorFailure>,
    pub sessions_removed: u64,
}

/// Keeps `SensorCache` populated from ThingWorx and prunes expired sessions.
pub struct SensorService {
    pool: PgPool,
    thingworx: ThingWorxClient,
    cache: SensorCache,
    interval: Duration,
    connected_window_secs: i64,
    max_concurrent_fetches: usize,
}

impl SensorService {
    pub fn new(pool: PgPool, thingworx: ThingWorxClient, cache: SensorCache, config: &Config) -> Self {
        Self {
            pool,
            thingworx,
            cache,
            interval: config.refresh_interval(),
            connected_window_secs: config.connected_window_secs,
            max_concurrent_fetches: config.max_concurrent_fetches,
        }
    }

    /// Runs refresh cycles until `cancel` fires. Spawn this via `tokio::spawn`.
    ///
    /// Cancellation is only observed between cycles; a cycle in progress
    /// finishes its fetches and session cleanup first.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Sensor refresh loop started");
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_once().await {
                Ok(report) => {
                    let cache_entries = self.cache.live_entries().await;
                    info!(
                        things = report.things,
                        cached = report.cached,
                        stale = report.stale,
                        failed = report.failures.len(),
                        sessions_removed = report.sessions_removed,
                        cache_entries,
                        "Refresh cycle complete"
                    )
                }
                Err(e) => error!(error = %format!("{e:#}"), "Refresh cycle aborted"),
            }
        }

        info!("Sensor refresh loop stopped");
    }

    /// One refresh cycle: enumerate things, fetch them all, clean up sessions.
    ///
    /// Fails only when the database cannot be read or written; per-thing
    /// fetch errors are logged and returned in the report.
    pub async fn run_once(&self) -> Result<RefreshReport> {
        let things = self
            .load_things()
            .await
            .context("Failed to enumerate things")?;

        let mut report = self.refresh_all(things).await;
        for failure in &report.failures {
            warn!(
                room_id = failure.room_id,
                thing = %failure.thing_name,
                error = %failure.error,
                "Failed to refresh sensor"
            );
        }

        report.sessions_removed = self
            .clean_up_expired_sessions()
            .await
            .context("Failed to clean up expired sessions")?;

        Ok(report)
    }

    async fn load_things(&self) -> Result<Vec<Thing>> {
        let mut tx = self.pool.begin().await?;
        let things = directory::all_things(&mut tx).await?;
        tx.commit().await?;
        Ok(things)
    }

    /// Fetch every thing with at most `max_concurrent_fetches` requests in
    /// flight, and wait for all of them before reporting.
    pub async fn refresh_all(&self, things: Vec<Thing>) -> RefreshReport {
        let thingworx = self.thingworx.clone();
        let cache = self.cache.clone();
        let window = self.connected_window_secs;

        fan_out(things, self.max_concurrent_fetches, move |thing| {
            let thingworx = thingworx.clone();
            let cache = cache.clone();
            async move {
                refresh_sensor(&thingworx, &cache, window, thing.room_id, &thing.thing_name).await
            }
        })
        .await
    }

    async fn clean_up_expired_sessions(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = votes::delete_expired_sessions(&mut tx, Utc::now()).await?;
        tx.commit().await?;
        if removed > 0 {
            info!(removed, "Expired sessions cleaned up");
        }
        Ok(removed)
    }
}

/// Run `refresh` for every thing as its own task, at most `limit` at once.
///
/// Every thing ends up in the report exactly once; a task that panics is
/// recorded as a failure for the thing it was refreshing.
async fn fan_out<F, Fut>(things: Vec<Thing>, limit: usize, refresh: F) -> RefreshReport
where
    F: Fn(Thing) -> Fut,
    Fut: Future<Output = Result<SensorUpdate, FetchError>> + Send + 'static,
{
    let mut report = RefreshReport {
        things: things.len(),
        ..RefreshReport::default()
    };
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut tasks = JoinSet::new();
    let mut in_flight = HashMap::with_capacity(things.len());

    for thing in things {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let work = refresh(thing.clone());
        let handle = tasks.spawn(async move {
            let result = work.await;
            drop(permit);
            result
        });
        in_flight.insert(handle.id(), thing);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                error!(error = %e, "Sensor refresh task panicked");
                (e.id(), Err(FetchError::Task(e)))
            }
        };
        let Some(thing) = in_flight.remove(&id) else {
            continue;
        };

        match result {
            Ok(SensorUpdate::Cached(_)) => report.cached += 1,
            Ok(SensorUpdate::Stale { .. }) => report.stale += 1,
            Err(error) => report.failures.push(SensorFailure {
                room_id: thing.room_id,
                thing_name: thing.thing_name,
                error,
            }),
        }
    }

    report
}

/// Fetch one thing and cache its reading if it is connected.
///
/// A reading whose `lastUpdated` falls outside the connected window is
/// discarded, so a silent sensor ages out of the cache after one TTL.
pub async fn refresh_sensor(
    thingworx: &ThingWorxClient,
    cache: &SensorCache,
    connected_window_secs: i64,
    room_id: RoomId,
    thing_name: &str,
) -> Result<SensorUpdate, FetchError> {
    let props = thingworx.fetch(thing_name).await?;
    let now = Utc::now().timestamp();
    let reading = SensorReading::new(
        props.temperature,
        props.humidity,
        props.last_updated,
        now,
        connected_window_secs,
    );

    if !reading.is_connected {
        warn!(
            room_id,
            thing = %thing_name,
            now,
            last_updated = props.last_updated,
            "Thing is not connected; discarding reading"
        );
        return Ok(SensorUpdate::Stale { last_updated: props.last_updated, now });
    }

    cache.put(room_id, thing_name, reading.clone()).await;
    Ok(SensorUpdate::Cached(reading))
}
