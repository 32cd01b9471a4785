//! Ballot recording and tallying.
//!
//! A session holds at most one vote per room. `UNIQUE (session_id, room_id)`
//! enforces it, so recording is a single upsert and a second ballot from the
//! same session replaces the first.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::dto::VoteTally;
use crate::{
    db::models::{RoomId, Session, SessionId, Vote, VoteChoice},
    error::{StoreError, StoreResult},
};

/// Look up a session that has not expired at `now`.
pub async fn load_session(
    conn: &mut PgConnection,
    session_id: SessionId,
    now: DateTime<Utc>,
) -> StoreResult<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT session_id, expire FROM session WHERE session_id = $1 AND expire >= $2",
    )
    .bind(session_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(session)
}

/// The session's vote for a room. `None` if there is no session or it has
/// not voted there yet.
pub async fn get_vote(
    conn: &mut PgConnection,
    session: Option<&Session>,
    room_id: RoomId,
) -> StoreResult<Option<Vote>> {
    let Some(session) = session else {
        return Ok(None);
    };

    let vote = sqlx::query_as::<_, Vote>(
        r#"
        SELECT vote_id, session_id, room_id, choice, timestamp
        FROM vote
        WHERE session_id = $1 AND room_id = $2
        "#,
    )
    .bind(session.session_id)
    .bind(room_id)
    .fetch_optional(conn)
    .await?;
    Ok(vote)
}

/// Insert or replace the session's ballot for a room.
///
/// Returns `StoreError::InvalidSessionState` when `session` is `None` or has
/// expired by `now`.
pub async fn record_vote(
    conn: &mut PgConnection,
    session: Option<&Session>,
    room_id: RoomId,
    choice: VoteChoice,
    now: DateTime<Utc>,
) -> StoreResult<Vote> {
    let session = session
        .filter(|s| !s.is_expired_at(now))
        .ok_or(StoreError::InvalidSessionState)?;

    let vote = sqlx::query_as::<_, Vote>(
        r#"
        INSERT INTO vote (session_id, room_id, choice, timestamp)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (session_id, room_id)
        DO UPDATE SET choice = EXCLUDED.choice, timestamp = EXCLUDED.timestamp
        RETURNING vote_id, session_id, room_id, choice, timestamp
        "#,
    )
    .bind(session.session_id)
    .bind(room_id)
    .bind(choice)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(vote)
}

/// Count a room's votes per choice, ignoring sessions that expired before `as_of`.
pub async fn tally(
    conn: &mut PgConnection,
    room_id: RoomId,
    as_of: DateTime<Utc>,
) -> StoreResult<VoteTally> {
    let rows = sqlx::query_as::<_, (VoteChoice, i64)>(
        r#"
        SELECT vote.choice, COUNT(vote.vote_id)
        FROM vote
        JOIN session ON session.session_id = vote.session_id
        WHERE vote.room_id = $1 AND session.expire >= $2
        GROUP BY vote.choice
        "#,
    )
    .bind(room_id)
    .bind(as_of)
    .fetch_all(conn)
    .await?;

    let mut tally = VoteTally::default();
    for (choice, count) in rows {
        tally.add(choice, count.max(0) as u64);
    }
    Ok(tally)
}

/// Delete sessions that expired before `now`; their votes cascade.
pub async fn delete_expired_sessions(conn: &mut PgConnection, now: DateTime<Utc>) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM session WHERE expire < $1")
        .bind(now)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use sqlx::PgPool;

    use super::*;
    use crate::test_support::{count_rows, insert_room, insert_session};

    async fn seed(pool: &PgPool) {
        insert_room(pool, 1, "Lobby", "North", 1).await;
        insert_room(pool, 2, "Library", "North", 2).await;
    }

    async fn live_session(pool: &PgPool) -> Session {
        let now = Utc::now();
        let id = insert_session(pool, now + TimeDelta::hours(1)).await;
        let mut conn = pool.acquire().await.unwrap();
        load_session(&mut conn, id, now).await.unwrap().unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn load_session_skips_expired_and_unknown(pool: PgPool) {
        let now = Utc::now();
        let expired = insert_session(&pool, now - TimeDelta::minutes(5)).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(load_session(&mut conn, expired, now).await.unwrap().is_none());
        assert!(load_session(&mut conn, uuid::Uuid::new_v4(), now).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_vote_is_none_before_voting(pool: PgPool) {
        seed(&pool).await;
        let session = live_session(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(get_vote(&mut conn, Some(&session), 1).await.unwrap().is_none());
        assert!(get_vote(&mut conn, None, 1).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn record_then_get_returns_choice(pool: PgPool) {
        seed(&pool).await;
        let session = live_session(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        let recorded = record_vote(&mut tx, Some(&session), 1, VoteChoice::Comfort, Utc::now())
            .await
            .unwrap();
        let fetched = get_vote(&mut tx, Some(&session), 1).await.unwrap().unwrap();

        assert_eq!(fetched.vote_id, recorded.vote_id);
        assert_eq!(fetched.choice, VoteChoice::Comfort);
        assert_eq!(fetched.session_id, session.session_id);
        tx.commit().await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn revoting_keeps_one_row_with_latest_choice(pool: PgPool) {
        seed(&pool).await;
        let session = live_session(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let first = record_vote(&mut conn, Some(&session), 1, VoteChoice::Hot, Utc::now())
            .await
            .unwrap();
        let second = record_vote(&mut conn, Some(&session), 1, VoteChoice::Cold, Utc::now())
            .await
            .unwrap();

        assert_eq!(first.vote_id, second.vote_id);
        assert_eq!(count_rows(&pool, "vote").await, 1);
        let counts = tally(&mut conn, 1, Utc::now()).await.unwrap();
        assert_eq!(counts, VoteTally { hot: 0, comfort: 0, cold: 1 });
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn votes_are_scoped_per_room(pool: PgPool) {
        seed(&pool).await;
        let session = live_session(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        record_vote(&mut conn, Some(&session), 1, VoteChoice::Hot, Utc::now()).await.unwrap();
        record_vote(&mut conn, Some(&session), 2, VoteChoice::Cold, Utc::now()).await.unwrap();

        assert_eq!(count_rows(&pool, "vote").await, 2);
        assert_eq!(tally(&mut conn, 1, Utc::now()).await.unwrap().hot, 1);
        assert_eq!(tally(&mut conn, 2, Utc::now()).await.unwrap().cold, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn voting_without_session_is_rejected(pool: PgPool) {
        seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let err = record_vote(&mut conn, None, 1, VoteChoice::Hot, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidSessionState));
        assert_eq!(count_rows(&pool, "vote").await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn session_that_lapsed_after_loading_cannot_vote(pool: PgPool) {
        seed(&pool).await;
        let session = live_session(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let later = session.expire + TimeDelta::seconds(1);
        let err = record_vote(&mut conn, Some(&session), 1, VoteChoice::Hot, later)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidSessionState));
        assert_eq!(count_rows(&pool, "vote").await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn tally_of_room_without_votes_is_zero(pool: PgPool) {
        seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(tally(&mut conn, 1, Utc::now()).await.unwrap(), VoteTally::default());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn tally_ignores_expired_sessions_and_cleanup_removes_them(pool: PgPool) {
        seed(&pool).await;
        let now = Utc::now();
        let alive = live_session(&pool).await;
        let expiring_id = insert_session(&pool, now + TimeDelta::seconds(30)).await;
        let mut conn = pool.acquire().await.unwrap();
        let expiring = load_session(&mut conn, expiring_id, now).await.unwrap().unwrap();

        record_vote(&mut conn, Some(&alive), 1, VoteChoice::Comfort, now).await.unwrap();
        record_vote(&mut conn, Some(&expiring), 1, VoteChoice::Hot, now).await.unwrap();

        assert_eq!(
            tally(&mut conn, 1, now).await.unwrap(),
            VoteTally { hot: 1, comfort: 1, cold: 0 }
        );

        // One minute later the second session has expired but its vote row remains.
        let later = now + TimeDelta::minutes(1);
        assert_eq!(count_rows(&pool, "vote").await, 2);
        assert_eq!(
            tally(&mut conn, 1, later).await.unwrap(),
            VoteTally { hot: 0, comfort: 1, cold: 0 }
        );

        assert_eq!(delete_expired_sessions(&mut conn, later).await.unwrap(), 1);
        assert_eq!(count_rows(&pool, "session").await, 1);
        assert_eq!(count_rows(&pool, "vote").await, 1);
        assert!(load_session(&mut conn, expiring_id, now).await.unwrap().is_none());
    }
}
