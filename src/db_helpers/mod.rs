use std::future::Future;
use std::time::Duration;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::{
    errors::RequestError,
    models::{Post, User},
};

mod comment_helpers;
mod like_helpers;
mod otp_helpers;
mod post_helpers;
mod profile_helpers;
mod schema;
mod user_helpers;

pub use comment_helpers::*;
pub use like_helpers::*;
pub use otp_helpers::*;
pub use post_helpers::*;
pub use profile_helpers::*;
pub use schema::*;
pub use user_helpers::*;

pub const MAX_TX_RETRIES: u32 = 5;

/// Runs `op` (which owns its whole transaction) again when it fails on a
/// uniqueness race or lock contention. A failed attempt has already rolled
/// back by the time it is retried.
pub async fn retry_on_conflict<T, F, Fut>(mut op: F) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(error) if error.is_retryable() && attempt < MAX_TX_RETRIES => {
                tracing::warn!(attempt, %error, "transaction conflict, retrying");
                let jitter: u64 = rand::random::<u64>() % 10;
                tokio::time::sleep(Duration::from_millis(10 * attempt as u64 + jitter)).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Opens a transaction that already holds the database write lock, like
/// `BEGIN IMMEDIATE`. Reads made inside it see the latest commit and stay
/// valid until this transaction ends, so a later write cannot fail with a
/// stale snapshot.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, RequestError> {
    let mut tx = pool.begin().await?;
    // Any write statement takes the lock, even one that matches no rows.
    sqlx::query("DELETE FROM otps WHERE 0")
        .execute(&mut tx)
        .await?;
    Ok(tx)
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(e) => e.message().contains("FOREIGN KEY constraint failed"),
        _ => false,
    }
}

// ----------------- Helper Functions -----------------

pub async fn get_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, RequestError> {
    let result = sqlx::query_as::<Sqlite, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(result)
}

pub async fn get_user_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<User>, RequestError> {
    let result = sqlx::query_as::<Sqlite, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(result)
}

pub async fn get_post_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Post>, RequestError> {
    let result = sqlx::query_as::<Sqlite, Post>("SELECT * FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(result)
}
// ----------------- End Helper Functions -----------------

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A fresh database in a temp file, so pooled connections share it.
    pub async fn test_pool() -> SqlitePool {
        let path = std::env::temp_dir().join(format!(
            "socialhub-test-{:016x}.db",
            rand::random::<u64>()
        ));
        init_db(&format!("sqlite://{}", path.display()))
            .await
            .expect("test database")
    }

    pub async fn insert_test_user(pool: &SqlitePool, email: &str) -> User {
        let mut tx = pool.begin().await.unwrap();
        let profile_id: i64 =
            sqlx::query_scalar("INSERT INTO profiles DEFAULT VALUES RETURNING id")
                .fetch_one(&mut tx)
                .await
                .unwrap();
        let user = sqlx::query_as::<Sqlite, User>(
            r#"
            INSERT INTO users (firstname, lastname, email, password, account_type, profile_id)
            VALUES ('Test', 'User', $1, 'not-a-hash', 'STUDENT', $2)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(profile_id)
        .fetch_one(&mut tx)
        .await
        .unwrap();
        tx.commit().await.unwrap();
        user
    }

    pub async fn insert_test_post(pool: &SqlitePool, user_id: i64) -> Post {
        create_post_in_db(pool, user_id, "hello world", None)
            .await
            .unwrap()
    }

    /// (like_count, comment_count, real likes, real comments) for a post.
    pub async fn counters(pool: &SqlitePool, post_id: i64) -> (i64, i64, i64, i64) {
        sqlx::query_as(
            r#"
            SELECT like_count,
                   comment_count,
                   (SELECT COUNT(*) FROM likes WHERE post_id = posts.id),
                   (SELECT COUNT(*) FROM comments WHERE post_id = posts.id)
            FROM posts WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
