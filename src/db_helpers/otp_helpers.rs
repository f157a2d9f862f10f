use sqlx::{Sqlite, SqliteConnection};

use crate::{errors::RequestError, models::OtpRecord};

/// The newest OTP issued for `email`; only this row can ever be valid.
pub async fn get_latest_otp(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<OtpRecord>, RequestError> {
    let result = sqlx::query_as::<Sqlite, OtpRecord>(
        r#"
        SELECT * FROM otps
        WHERE email = $1
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(result)
}

/// Whether any email has ever been issued `code`.
pub async fn otp_code_exists(conn: &mut SqliteConnection, code: &str) -> Result<bool, RequestError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM otps WHERE otp = $1")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub async fn insert_otp(
    conn: &mut SqliteConnection,
    email: &str,
    code: &str,
) -> Result<OtpRecord, RequestError> {
    let record = sqlx::query_as::<Sqlite, OtpRecord>(
        r#"
        INSERT INTO otps (email, otp)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(code)
    .fetch_one(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn consume_otp(conn: &mut SqliteConnection, id: i64) -> Result<(), RequestError> {
    sqlx::query(
        r#"
        UPDATE otps SET consumed_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = $1 AND consumed_at IS NULL
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_pool;
    use super::*;

    #[tokio::test]
    async fn latest_otp_wins_even_within_the_same_second() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_otp(&mut conn, "a@x.com", "111111").await.unwrap();
        insert_otp(&mut conn, "a@x.com", "222222").await.unwrap();
        insert_otp(&mut conn, "b@x.com", "333333").await.unwrap();

        let latest = get_latest_otp(&mut conn, "a@x.com").await.unwrap().unwrap();
        assert_eq!(latest.otp, "222222");
        assert!(get_latest_otp(&mut conn, "c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn codes_are_unique_across_emails() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_otp(&mut conn, "a@x.com", "123456").await.unwrap();
        assert!(otp_code_exists(&mut conn, "123456").await.unwrap());
        assert!(!otp_code_exists(&mut conn, "654321").await.unwrap());

        let duplicate = insert_otp(&mut conn, "b@x.com", "123456").await.unwrap_err();
        assert!(duplicate.is_unique_violation());
    }

    #[tokio::test]
    async fn consuming_marks_row_once() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let record = insert_otp(&mut conn, "a@x.com", "123456").await.unwrap();
        assert!(record.consumed_at.is_none());
        consume_otp(&mut conn, record.id).await.unwrap();
        let latest = get_latest_otp(&mut conn, "a@x.com").await.unwrap().unwrap();
        assert!(latest.consumed_at.is_some());
    }
}
