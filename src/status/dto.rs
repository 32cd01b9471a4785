use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    db::models::{FloorId, RoomId, Vote, VoteChoice},
    sensor_cache::SensorReading,
};

/// `room_id → name`
pub type RoomNameMap = BTreeMap<RoomId, String>;

/// `building_name → floor → [room_id]`, room ids ascending.
pub type RoomGroupMap = BTreeMap<String, BTreeMap<FloorId, Vec<RoomId>>>;

/// Current sensor readings and comfort tally of a room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    #[serde(rename = "id")]
    pub room_id: RoomId,
    /// Unexpired, connected readings; empty when nothing is cached.
    pub sensors: Vec<SensorReading>,
    pub hot: u64,
    pub comfort: u64,
    pub cold: u64,
}

/// The requesting session's ballot for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyVote {
    pub vote: VoteChoice,
    /// Unix seconds
    pub timestamp: i64,
}

impl From<Vote> for MyVote {
    fn from(v: Vote) -> Self {
        Self {
            vote: v.choice,
            timestamp: v.timestamp.timestamp(),
        }
    }
}

/// Per-choice vote counts for one room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub hot: u64,
    pub comfort: u64,
    pub cold: u64,
}

impl VoteTally {
    pub fn add(&mut self, choice: VoteChoice, count: u64) {
        match choice {
            VoteChoice::Hot => self.hot += count,
            VoteChoice::Comfort => self.comfort += count,
            VoteChoice::Cold => self.cold += count,
        }
    }
}

impl RoomStatus {
    pub fn new(room_id: RoomId, sensors: Vec<SensorReading>, tally: VoteTally) -> Self {
        Self {
            room_id,
            sensors,
            hot: tally.hot,
            comfort: tally.comfort,
            cold: tally.cold,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn tally_accumulates_per_choice() {
        let mut tally = VoteTally::default();
        tally.add(VoteChoice::Hot, 2);
        tally.add(VoteChoice::Cold, 1);
        tally.add(VoteChoice::Hot, 1);
        assert_eq!(tally, VoteTally { hot: 3, comfort: 0, cold: 1 });
    }

    #[test]
    fn room_status_serializes_to_view_shape() {
        let status = RoomStatus::new(
            12,
            vec![SensorReading {
                temperature: 22.5,
                humidity: 40.0,
                is_connected: true,
                last_updated: 1_700_000_000,
            }],
            VoteTally { hot: 1, comfort: 2, cold: 3 },
        );
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "id": 12,
                "sensors": [ { "temperature": 22.5, "humidity": 40.0, "isConnected": true } ],
                "hot": 1,
                "comfort": 2,
                "cold": 3
            })
        );
    }

    #[test]
    fn my_vote_uses_unix_seconds() {
        let at = DateTime::from_timestamp(1_700_000_123, 456_000_000).unwrap();
        let vote = Vote {
            vote_id: 1,
            session_id: Uuid::new_v4(),
            room_id: 1,
            choice: VoteChoice::Comfort,
            timestamp: at,
        };
        let my_vote = MyVote::from(vote);
        assert_eq!(my_vote, MyVote { vote: VoteChoice::Comfort, timestamp: 1_700_000_123 });
        assert_eq!(
            serde_json::to_value(&my_vote).unwrap(),
            json!({ "vote": "comfort", "timestamp": 1_700_000_123 })
        );
    }
}
