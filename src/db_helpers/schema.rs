use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;

use crate::errors::RequestError;

// Millisecond precision keeps "newest row" ordering meaningful for rows
// written within the same second.
const CREATE_TABLES: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        gender         TEXT,
        date_of_birth  TEXT,
        about          TEXT,
        contact_number TEXT,
        created_at     TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at     TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        firstname       TEXT NOT NULL,
        lastname        TEXT NOT NULL,
        email           TEXT NOT NULL UNIQUE,
        password        TEXT NOT NULL,
        account_type    TEXT NOT NULL,
        approved        BOOLEAN NOT NULL DEFAULT 1,
        profile_id      INTEGER REFERENCES profiles(id),
        image           TEXT,
        bio             TEXT NOT NULL DEFAULT '',
        website         TEXT NOT NULL DEFAULT '',
        active          BOOLEAN NOT NULL DEFAULT 1,
        account_privacy TEXT NOT NULL DEFAULT 'public',
        created_at      TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at      TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content       TEXT NOT NULL,
        image_url     TEXT,
        like_count    INTEGER NOT NULL DEFAULT 0,
        comment_count INTEGER NOT NULL DEFAULT 0,
        created_at    TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at    TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        post_id    INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        UNIQUE (user_id, post_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        post_id    INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        content    TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS otps (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        email       TEXT NOT NULL,
        otp         TEXT NOT NULL UNIQUE,
        created_at  TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        consumed_at TIMESTAMP
    )
    "#,
];

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS otps_email_created_idx ON otps (email, created_at)",
    "CREATE INDEX IF NOT EXISTS likes_post_idx ON likes (post_id)",
    "CREATE INDEX IF NOT EXISTS comments_post_idx ON comments (post_id)",
];

/// Opens (creating if needed) the database, then brings the schema up to
/// date. Safe to run against an existing database any number of times.
pub async fn init_db(db_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("Invalid DATABASE_URL {}", db_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    // Every connection to an in-memory database is a separate database.
    let max_connections = if db_url.contains(":memory:") { 1 } else { 8 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("Failed to open database")?;

    info!("Running schema initialisation");
    init_schema(&pool)
        .await
        .context("Failed to initialise schema")?;
    migrate_counters(&pool)
        .await
        .context("Failed to migrate post counters")?;
    info!("Database ready");
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    for statement in CREATE_TABLES.iter().chain(CREATE_INDEXES.iter()) {
        sqlx::query(*statement).execute(&mut tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// One-time reconciliation for databases created before the denormalized
/// counters and the like uniqueness constraint existed.
pub async fn migrate_counters(pool: &SqlitePool) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;

    let columns: Vec<String> = sqlx::query("SELECT name FROM pragma_table_info('posts')")
        .fetch_all(&mut tx)
        .await?
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();
    for column in ["like_count", "comment_count"] {
        if !columns.iter().any(|existing| existing == column) {
            info!(column, "adding missing counter column to posts");
            let statement = format!(
                "ALTER TABLE posts ADD COLUMN {} INTEGER NOT NULL DEFAULT 0",
                column
            );
            sqlx::query(&statement).execute(&mut tx).await?;
        }
    }

    let duplicates = sqlx::query(
        r#"
        DELETE FROM likes
        WHERE id NOT IN (SELECT MIN(id) FROM likes GROUP BY user_id, post_id)
        "#,
    )
    .execute(&mut tx)
    .await?
    .rows_affected();
    if duplicates > 0 {
        tracing::warn!(duplicates, "removed duplicate likes");
    }
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS likes_user_post_unique ON likes (user_id, post_id)",
    )
    .execute(&mut tx)
    .await?;

    reconcile_post_counters(&mut tx, None).await?;
    tx.commit().await?;
    Ok(())
}

/// Recomputes `like_count` / `comment_count` from the detail tables, for the
/// given posts or for every post when `post_ids` is `None`.
pub async fn reconcile_post_counters(
    conn: &mut SqliteConnection,
    post_ids: Option<&[i64]>,
) -> Result<(), RequestError> {
    const RECOUNT: &str = r#"
        UPDATE posts
        SET like_count    = (SELECT COUNT(*) FROM likes l WHERE l.post_id = posts.id),
            comment_count = (SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id)
    "#;
    match post_ids {
        None => {
            sqlx::query(RECOUNT).execute(&mut *conn).await?;
        }
        Some(ids) => {
            let statement = format!("{} WHERE id = $1", RECOUNT);
            for id in ids {
                sqlx::query(&statement).bind(id).execute(&mut *conn).await?;
            }
        }
    }
    Ok(())
}
