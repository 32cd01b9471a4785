//! Row fixtures shared by the database-backed tests.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{RoomId, SessionId};

pub async fn insert_room(pool: &PgPool, room_id: RoomId, name: &str, building: &str, floor: i32) {
    sqlx::query("INSERT INTO room (room_id, name, building_name, floor) VALUES ($1, $2, $3, $4)")
        .bind(room_id)
        .bind(name)
        .bind(building)
        .bind(floor)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_thing(pool: &PgPool, room_id: RoomId, thing_name: &str) {
    sqlx::query("INSERT INTO thing (room_id, thing_name) VALUES ($1, $2)")
        .bind(room_id)
        .bind(thing_name)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn insert_session(pool: &PgPool, expire: DateTime<Utc>) -> SessionId {
    let session_id = Uuid::new_v4();
    sqlx::query("INSERT INTO session (session_id, expire) VALUES ($1, $2)")
        .bind(session_id)
        .bind(expire)
        .execute(pool)
        .await
        .unwrap();
    session_id
}

pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}
