use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub type RoomId = i32;
pub type FloorId = i32;
pub type SessionId = Uuid;
pub type VoteId = i64;

/// Mirrors the `vote_choice` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vote_choice", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Hot,
    Comfort,
    Cold,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoteChoice::Hot => "hot",
            VoteChoice::Comfort => "comfort",
            VoteChoice::Cold => "cold",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub name: String,
    pub building_name: String,
    pub floor: FloorId,
}

/// A telemetry-reporting device and the room it is installed in.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Thing {
    pub room_id: RoomId,
    pub thing_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: SessionId,
    pub expire: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire < now
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Vote {
    pub vote_id: VoteId,
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub choice: VoteChoice,
    pub timestamp: DateTime<Utc>,
}
