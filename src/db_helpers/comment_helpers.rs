use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{errors::RequestError, models::CommentWithAuthor};

use super::{get_post_by_id, is_foreign_key_violation, retry_on_conflict};

const COMMENT_WITH_AUTHOR: &str = r#"
        SELECT c.id,
               c.user_id,
               c.post_id,
               c.content,
               c.created_at,
               c.updated_at,
               u.firstname,
               u.lastname,
               u.image AS user_image
        FROM comments c
            JOIN users u ON c.user_id = u.id
"#;

async fn get_comment_with_author(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<CommentWithAuthor, RequestError> {
    let query = format!("{} WHERE c.id = $1", COMMENT_WITH_AUTHOR);
    let comment = sqlx::query_as::<Sqlite, CommentWithAuthor>(&query)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(comment)
}

pub async fn add_comment_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
    content: &str,
) -> Result<CommentWithAuthor, RequestError> {
    retry_on_conflict(|| try_add_comment(pool, user_id, post_id, content)).await
}

async fn try_add_comment(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
    content: &str,
) -> Result<CommentWithAuthor, RequestError> {
    let mut tx = pool.begin().await?;

    let comment_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO comments (user_id, post_id, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(post_id)
    .bind(content)
    .fetch_one(&mut tx)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            RequestError::NotFound("Post not found")
        } else {
            e.into()
        }
    })?;

    sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut tx)
        .await?;

    let comment = get_comment_with_author(&mut tx, comment_id).await?;
    tx.commit().await?;
    Ok(comment)
}

/// Deletes a comment the caller wrote. A missing comment and someone else's
/// comment are reported identically.
pub async fn delete_comment_in_db(
    pool: &SqlitePool,
    user_id: i64,
    comment_id: i64,
) -> Result<(), RequestError> {
    retry_on_conflict(|| try_delete_comment(pool, user_id, comment_id)).await
}

async fn try_delete_comment(
    pool: &SqlitePool,
    user_id: i64,
    comment_id: i64,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let post_id: Option<i64> = sqlx::query_scalar(
        r#"
        DELETE FROM comments WHERE id = $1 AND user_id = $2
        RETURNING post_id
        "#,
    )
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(&mut tx)
    .await?;

    let post_id = match post_id {
        Some(post_id) => post_id,
        None => {
            return Err(RequestError::NotFound(
                "Comment not found or unauthorized to delete",
            ))
        }
    };

    sqlx::query("UPDATE posts SET comment_count = comment_count - 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn list_comments_in_db(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<CommentWithAuthor>, RequestError> {
    let mut conn = pool.acquire().await?;
    if get_post_by_id(&mut conn, post_id).await?.is_none() {
        return Err(RequestError::NotFound("Post not found"));
    }
    let query = format!(
        "{} WHERE c.post_id = $1 ORDER BY c.created_at DESC, c.id DESC",
        COMMENT_WITH_AUTHOR
    );
    let comments = sqlx::query_as::<Sqlite, CommentWithAuthor>(&query)
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(comments)
}
