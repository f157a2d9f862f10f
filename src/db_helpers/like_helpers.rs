use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Like, LikeWithUser},
};

use super::{begin_write, get_post_by_id, retry_on_conflict};

#[derive(Debug)]
pub enum LikeToggle {
    Liked(Like),
    Unliked,
}

/// Flips the caller's like on a post. The current state is observed first
/// and the flip is then applied idempotently, so concurrent toggles that
/// observed the same state agree on the outcome instead of cancelling out or
/// double counting.
pub async fn toggle_like_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
) -> Result<LikeToggle, RequestError> {
    let already_liked = observe_like(pool, user_id, post_id).await?;
    apply_toggle(pool, user_id, post_id, already_liked).await
}

async fn observe_like(pool: &SqlitePool, user_id: i64, post_id: i64) -> Result<bool, RequestError> {
    let mut conn = pool.acquire().await?;
    Ok(find_like(&mut conn, user_id, post_id).await?.is_some())
}

/// Post existence is checked by the write itself, under the write lock.
async fn apply_toggle(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
    already_liked: bool,
) -> Result<LikeToggle, RequestError> {
    if already_liked {
        unlike_post_in_db(pool, user_id, post_id).await?;
        Ok(LikeToggle::Unliked)
    } else {
        like_post_in_db(pool, user_id, post_id)
            .await
            .map(LikeToggle::Liked)
    }
}

async fn find_like(
    conn: &mut SqliteConnection,
    user_id: i64,
    post_id: i64,
) -> Result<Option<Like>, RequestError> {
    let like = sqlx::query_as::<Sqlite, Like>(
        "SELECT * FROM likes WHERE user_id = $1 AND post_id = $2",
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(like)
}

async fn ensure_post_exists(conn: &mut SqliteConnection, post_id: i64) -> Result<(), RequestError> {
    match get_post_by_id(conn, post_id).await? {
        Some(_) => Ok(()),
        None => Err(RequestError::NotFound("Post not found")),
    }
}

/// Ensures the like exists. The counter only moves when this call inserted
/// the row.
pub async fn like_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
) -> Result<Like, RequestError> {
    retry_on_conflict(|| try_like_post(pool, user_id, post_id)).await
}

async fn try_like_post(pool: &SqlitePool, user_id: i64, post_id: i64) -> Result<Like, RequestError> {
    let mut tx = begin_write(pool).await?;
    ensure_post_exists(&mut tx, post_id).await?;

    if let Some(existing) = find_like(&mut tx, user_id, post_id).await? {
        return Ok(existing);
    }

    let like = sqlx::query_as::<Sqlite, Like>(
        r#"
        INSERT INTO likes (user_id, post_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_one(&mut tx)
    .await?;

    sqlx::query("UPDATE posts SET like_count = like_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut tx)
        .await?;

    tx.commit().await?;
    Ok(like)
}

/// Ensures the like is gone. Returns whether this call removed it; the
/// counter only moves when it did.
pub async fn unlike_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
) -> Result<bool, RequestError> {
    retry_on_conflict(|| try_unlike_post(pool, user_id, post_id)).await
}

async fn try_unlike_post(pool: &SqlitePool, user_id: i64, post_id: i64) -> Result<bool, RequestError> {
    let mut tx = begin_write(pool).await?;
    ensure_post_exists(&mut tx, post_id).await?;

    let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
        .bind(user_id)
        .bind(post_id)
        .execute(&mut tx)
        .await?
        .rows_affected();
    if removed > 0 {
        sqlx::query("UPDATE posts SET like_count = like_count - $1 WHERE id = $2")
            .bind(removed as i64)
            .bind(post_id)
            .execute(&mut tx)
            .await?;
    }
    tx.commit().await?;
    Ok(removed > 0)
}

pub async fn list_likes_in_db(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<LikeWithUser>, RequestError> {
    let likes = sqlx::query_as::<Sqlite, LikeWithUser>(
        r#"
        SELECT l.id,
               l.user_id,
               l.post_id,
               l.created_at,
               u.firstname,
               u.lastname,
               u.image AS user_image
        FROM likes l
            JOIN users u ON l.user_id = u.id
        WHERE l.post_id = $1
        ORDER BY l.created_at DESC, l.id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    Ok(likes)
}
