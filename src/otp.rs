use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::{
    db_helpers::{
        begin_write, get_latest_otp, get_user_by_email, insert_otp, otp_code_exists,
        retry_on_conflict,
    },
    errors::RequestError,
    mail::{verification_email, Mailer, VERIFICATION_SUBJECT},
    models::OtpRecord,
};

pub const OTP_LENGTH: usize = 6;
/// Upper bound on re-rolls when a generated code is already taken.
pub const MAX_OTP_ATTEMPTS: usize = 10;

pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..10u32.pow(OTP_LENGTH as u32));
    format!("{:0width$}", code, width = OTP_LENGTH)
}

pub fn is_expired(created_at: NaiveDateTime, now: NaiveDateTime, ttl: Duration) -> bool {
    now - created_at > ttl
}

/// Rolls codes until one has never been issued to any email.
async fn unused_code(conn: &mut SqliteConnection) -> Result<String, RequestError> {
    for _ in 0..MAX_OTP_ATTEMPTS {
        let code = generate_otp();
        if !otp_code_exists(&mut *conn, &code).await? {
            return Ok(code);
        }
    }
    Err(anyhow::anyhow!("no unused OTP after {} attempts", MAX_OTP_ATTEMPTS).into())
}

/// Issues a fresh OTP for an unregistered email and mails it. The row is
/// only kept if the mail was accepted. Returns the issued code.
pub async fn request_otp(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<String, RequestError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(RequestError::Validation("Email is required"));
    }

    // Conflicts are only retried up to the insert; the mail is sent once.
    let (tx, record) = retry_on_conflict(|| reserve_otp(pool, email)).await?;

    if let Err(error) = mailer
        .send(email, VERIFICATION_SUBJECT, &verification_email(&record.otp))
        .await
    {
        warn!(error = ?error, "verification email failed, discarding OTP");
        return Err(RequestError::DeliveryFailed);
    }

    tx.commit().await?;
    info!(otp_id = record.id, "OTP issued");
    Ok(record.otp)
}

/// Inserts an unused code for `email` and hands back the still-open
/// transaction holding it.
async fn reserve_otp(
    pool: &SqlitePool,
    email: &str,
) -> Result<(Transaction<'static, Sqlite>, OtpRecord), RequestError> {
    let mut tx = begin_write(pool).await?;

    if get_user_by_email(&mut tx, email).await?.is_some() {
        return Err(RequestError::AlreadyRegistered);
    }

    let code = unused_code(&mut tx).await?;
    let record = insert_otp(&mut tx, email, &code).await?;
    Ok((tx, record))
}

/// Checks `code` against the newest OTP issued for `email`. Older rows are
/// never considered, and the newest one must be unconsumed and within `ttl`.
pub async fn verify_otp(
    conn: &mut SqliteConnection,
    email: &str,
    code: &str,
    ttl: Duration,
) -> Result<OtpRecord, RequestError> {
    let record = get_latest_otp(conn, email)
        .await?
        .ok_or(RequestError::InvalidOtp)?;

    if record.otp != code.trim() || record.consumed_at.is_some() {
        return Err(RequestError::InvalidOtp);
    }
    if is_expired(record.created_at, Utc::now().naive_utc(), ttl) {
        return Err(RequestError::InvalidOtp);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::db_helpers::test_support::{insert_test_user, test_pool};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, _subject: &str, html_body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), html_body.to_string()));
            Ok(())
        }
    }

    struct BrokenMailer;

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _: &str, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp unavailable")
        }
    }

    async fn otp_rows(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM otps")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expiry_is_measured_from_creation() {
        let created = Utc::now().naive_utc();
        let ttl = Duration::minutes(5);
        assert!(!is_expired(created, created + Duration::minutes(4), ttl));
        assert!(is_expired(created, created + Duration::minutes(6), ttl));
    }

    #[tokio::test]
    async fn issued_code_is_mailed_and_verifies() {
        let pool = test_pool().await;
        let mailer = RecordingMailer::default();

        let code = request_otp(&pool, &mailer, " a@x.com ").await.unwrap();
        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@x.com");
        assert!(sent[0].1.contains(&code));

        let mut conn = pool.acquire().await.unwrap();
        verify_otp(&mut conn, "a@x.com", &code, Duration::minutes(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn only_the_newest_code_is_valid() {
        let pool = test_pool().await;
        let mailer = RecordingMailer::default();
        let first = request_otp(&pool, &mailer, "a@x.com").await.unwrap();
        let second = request_otp(&pool, &mailer, "a@x.com").await.unwrap();
        assert_ne!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let ttl = Duration::minutes(5);
        assert!(matches!(
            verify_otp(&mut conn, "a@x.com", &first, ttl).await,
            Err(RequestError::InvalidOtp)
        ));
        verify_otp(&mut conn, "a@x.com", &second, ttl).await.unwrap();
    }

    #[tokio::test]
    async fn registered_email_gets_no_otp_row() {
        let pool = test_pool().await;
        insert_test_user(&pool, "taken@x.com").await;
        let mailer = RecordingMailer::default();

        let error = request_otp(&pool, &mailer, "taken@x.com").await.unwrap_err();
        assert!(matches!(error, RequestError::AlreadyRegistered));
        assert_eq!(otp_rows(&pool).await, 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_rolls_back_the_row() {
        let pool = test_pool().await;
        let error = request_otp(&pool, &BrokenMailer, "a@x.com").await.unwrap_err();
        assert!(matches!(error, RequestError::DeliveryFailed));
        assert_eq!(otp_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let pool = test_pool().await;
        let code = request_otp(&pool, &RecordingMailer::default(), "a@x.com")
            .await
            .unwrap();
        sqlx::query("UPDATE otps SET created_at = '2000-01-01 00:00:00.000'")
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(matches!(
            verify_otp(&mut conn, "a@x.com", &code, Duration::minutes(5)).await,
            Err(RequestError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn concurrent_requests_mail_each_stored_code_once() {
        let pool = test_pool().await;
        let mailer = std::sync::Arc::new(RecordingMailer::default());

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let pool = pool.clone();
                let mailer = mailer.clone();
                tokio::spawn(async move {
                    let email = format!("user{}@x.com", i);
                    request_otp(&pool, mailer.as_ref(), &email).await
                })
            })
            .collect();
        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().unwrap());
        }

        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 6);
        assert_eq!(otp_rows(&pool).await, 6);
        for code in &codes {
            assert_eq!(sent.iter().filter(|(_, body)| body.contains(code.as_str())).count(), 1);
        }
    }

    #[tokio::test]
    async fn blank_email_is_a_validation_error() {
        let pool = test_pool().await;
        let error = request_otp(&pool, &RecordingMailer::default(), "  ")
            .await
            .unwrap_err();
        assert!(matches!(error, RequestError::Validation(_)));
    }
}
