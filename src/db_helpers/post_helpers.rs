use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::Post};

use super::{is_foreign_key_violation, retry_on_conflict};

pub async fn create_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    content: &str,
    image_url: Option<&str>,
) -> Result<Post, RequestError> {
    let post = retry_on_conflict(|| try_create_post(pool, user_id, content, image_url)).await?;
    tracing::debug!(post_id = post.id, user_id, "post created");
    Ok(post)
}

// An explicit transaction makes the row visible to other connections as soon
// as this returns, whether or not the RETURNING cursor was drained.
async fn try_create_post(
    pool: &SqlitePool,
    user_id: i64,
    content: &str,
    image_url: Option<&str>,
) -> Result<Post, RequestError> {
    let mut tx = pool.begin().await?;
    let post = sqlx::query_as::<Sqlite, Post>(
        r#"
        INSERT INTO posts (user_id, content, image_url, like_count, comment_count)
        VALUES ($1, $2, $3, 0, 0)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(content)
    .bind(image_url)
    .fetch_one(&mut tx)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            RequestError::NotFound("User not found")
        } else {
            e.into()
        }
    })?;
    tx.commit().await?;
    Ok(post)
}
