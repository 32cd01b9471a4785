use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::db::models::RoomId;

/// Latest temperature/humidity sample of one thing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub is_connected: bool,
    /// Unix seconds of the sample as reported by ThingWorx.
    #[serde(skip)]
    pub last_updated: i64,
}

impl SensorReading {
    /// Builds a reading, deriving `is_connected` from how far `last_updated`
    /// is from `now` (both in Unix seconds).
    pub fn new(temperature: f64, humidity: f64, last_updated: i64, now: i64, window_secs: i64) -> Self {
        Self {
            temperature,
            humidity,
            is_connected: (now - last_updated).abs() <= window_secs,
            last_updated,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    reading: SensorReading,
    expires_at: DateTime<Utc>,
}

/// In-memory store of the most recent `SensorReading` per `(room_id, thing_name)`.
///
/// Entries are never swept; expired ones are filtered out on read.
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
#[derive(Clone)]
pub struct SensorCache {
    inner: Arc<RwLock<HashMap<RoomId, BTreeMap<String, Entry>>>>,
    ttl: TimeDelta,
}

impl SensorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::default(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Overwrite the cached reading for `(room_id, thing_name)`.
    pub async fn put(&self, room_id: RoomId, thing_name: &str, reading: SensorReading) {
        self.put_at(room_id, thing_name, reading, Utc::now()).await;
    }

    pub async fn put_at(
        &self,
        room_id: RoomId,
        thing_name: &str,
        reading: SensorReading,
        now: DateTime<Utc>,
    ) {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.inner
            .write()
            .await
            .entry(room_id)
            .or_default()
            .insert(thing_name.to_owned(), Entry { reading, expires_at });
    }

    /// Return the unexpired readings of a room, ordered by thing name.
    /// `None` when the room has no entry or all of its entries have expired.
    pub async fn get(&self, room_id: RoomId) -> Option<Vec<SensorReading>> {
        self.get_at(room_id, Utc::now()).await
    }

    pub async fn get_at(&self, room_id: RoomId, now: DateTime<Utc>) -> Option<Vec<SensorReading>> {
        let guard = self.inner.read().await;
        let readings: Vec<SensorReading> = guard
            .get(&room_id)?
            .values()
            .filter(|e| e.expires_at > now)
            .map(|e| e.reading.clone())
            .collect();
        (!readings.is_empty()).then_some(readings)
    }

    /// Number of unexpired entries across all rooms.
    pub async fn live_entries(&self) -> usize {
        let now = Utc::now();
        self.inner
            .read()
            .await
            .values()
            .flat_map(BTreeMap::values)
            .filter(|e| e.expires_at > now)
            .count()
    }
}
