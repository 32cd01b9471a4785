pub mod directory;
pub mod dto;
pub mod votes;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use crate::{
    db::models::{RoomId, Session, SessionId, VoteChoice},
    error::StoreResult,
    sensor_cache::SensorCache,
};

use self::dto::{MyVote, RoomGroupMap, RoomNameMap, RoomStatus};

/// Entry point for the request path: opens one transaction per request and
/// reads the shared `SensorCache` alongside it.
#[derive(Clone)]
pub struct RoomStatusManager {
    pool: PgPool,
    cache: SensorCache,
}

impl RoomStatusManager {
    pub fn new(pool: PgPool, cache: SensorCache) -> Self {
        Self { pool, cache }
    }

    /// Begin a request-scoped transaction.
    ///
    /// `session_id` comes from the caller's session transport. An unknown or
    /// expired id is treated the same as no session at all.
    pub async fn begin(&self, session_id: Option<SessionId>) -> StoreResult<StatusTx> {
        let mut tx = self.pool.begin().await?;
        let session = match session_id {
            Some(id) => votes::load_session(&mut tx, id, Utc::now()).await?,
            None => None,
        };
        debug!(has_session = session.is_some(), "Status transaction started");

        Ok(StatusTx {
            tx,
            cache: self.cache.clone(),
            session,
        })
    }
}

/// One request's view of rooms, votes and cached readings.
///
/// Dropping without `commit` rolls the transaction back.
pub struct StatusTx {
    tx: Transaction<'static, Postgres>,
    cache: SensorCache,
    session: Option<Session>,
}

impl StatusTx {
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    pub async fn room_name(&mut self, room_id: RoomId) -> StoreResult<Option<String>> {
        directory::room_name(&mut self.tx, room_id).await
    }

    pub async fn all_rooms_info(&mut self) -> StoreResult<(RoomNameMap, RoomGroupMap)> {
        directory::all_rooms_info(&mut self.tx).await
    }

    /// This session's ballot for the room, if any.
    pub async fn my_vote(&mut self, room_id: RoomId) -> StoreResult<Option<MyVote>> {
        let vote = votes::get_vote(&mut self.tx, self.session.as_ref(), room_id).await?;
        Ok(vote.map(MyVote::from))
    }

    /// Record this session's ballot. Fails with `InvalidSessionState` when
    /// the transaction was opened without a live session.
    pub async fn vote(&mut self, room_id: RoomId, choice: VoteChoice) -> StoreResult<MyVote> {
        let vote = votes::record_vote(
            &mut self.tx,
            self.session.as_ref(),
            room_id,
            choice,
            Utc::now(),
        )
        .await?;
        debug!(room_id, choice = %choice, "Vote recorded");
        Ok(vote.into())
    }

    pub async fn status(&mut self, room_id: RoomId) -> StoreResult<RoomStatus> {
        assemble_status(&mut self.tx, &self.cache, room_id, Utc::now()).await
    }
}

/// Combine the cached readings of a room with its current tally.
pub async fn assemble_status(
    conn: &mut PgConnection,
    cache: &SensorCache,
    room_id: RoomId,
    now: DateTime<Utc>,
) -> StoreResult<RoomStatus> {
    let sensors = cache.get_at(room_id, now).await.unwrap_or_default();
    let tally = votes::tally(conn, room_id, now).await?;
    Ok(RoomStatus::new(room_id, sensors, tally))
}
