//! Read-only room and thing lookups.
//!
//! Every function runs on a connection borrowed from the caller's
//! transaction; nothing here commits.

use sqlx::PgConnection;

use super::dto::{RoomGroupMap, RoomNameMap};
use crate::{
    db::models::{Room, RoomId, Thing},
    error::StoreResult,
};

pub async fn room(conn: &mut PgConnection, room_id: RoomId) -> StoreResult<Option<Room>> {
    let room = sqlx::query_as::<_, Room>(
        "SELECT room_id, name, building_name, floor FROM room WHERE room_id = $1",
    )
    .bind(room_id)
    .fetch_optional(conn)
    .await?;
    Ok(room)
}

pub async fn room_name(conn: &mut PgConnection, room_id: RoomId) -> StoreResult<Option<String>> {
    Ok(room(conn, room_id).await?.map(|r| r.name))
}

/// Full scan of `room`; the table is small.
pub async fn all_rooms(conn: &mut PgConnection) -> StoreResult<Vec<Room>> {
    let rooms = sqlx::query_as::<_, Room>(
        "SELECT room_id, name, building_name, floor FROM room ORDER BY room_id",
    )
    .fetch_all(conn)
    .await?;
    Ok(rooms)
}

pub async fn all_rooms_info(conn: &mut PgConnection) -> StoreResult<(RoomNameMap, RoomGroupMap)> {
    Ok(group_rooms(&all_rooms(conn).await?))
}

/// Every `(room_id, thing_name)` pair known to the database.
pub async fn all_things(conn: &mut PgConnection) -> StoreResult<Vec<Thing>> {
    let things = sqlx::query_as::<_, Thing>(
        "SELECT room_id, thing_name FROM thing ORDER BY room_id, thing_name",
    )
    .fetch_all(conn)
    .await?;
    Ok(things)
}

pub async fn things_in_room(conn: &mut PgConnection, room_id: RoomId) -> StoreResult<Vec<Thing>> {
    let things = sqlx::query_as::<_, Thing>(
        "SELECT room_id, thing_name FROM thing WHERE room_id = $1 ORDER BY thing_name",
    )
    .bind(room_id)
    .fetch_all(conn)
    .await?;
    Ok(things)
}

pub fn group_rooms(rooms: &[Room]) -> (RoomNameMap, RoomGroupMap) {
    let mut names = RoomNameMap::new();
    let mut groups = RoomGroupMap::new();
    for room in rooms {
        names.insert(room.room_id, room.name.clone());
        groups
            .entry(room.building_name.clone())
            .or_default()
            .entry(room.floor)
            .or_default()
            .push(room.room_id);
    }
    for floors in groups.values_mut() {
        for ids in floors.values_mut() {
            ids.sort_unstable();
        }
    }
    (names, groups)
}
