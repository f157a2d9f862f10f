use sqlx::{Sqlite, SqlitePool};

use crate::{
    authentication::hash_password_argon2,
    errors::RequestError,
    models::{AccountType, User},
    otp::verify_otp,
};

use super::{begin_write, get_user_by_email, retry_on_conflict};

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/5.x/initials/svg";

pub struct NewUser<'a> {
    pub firstname: &'a str,
    pub lastname: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub account_type: &'a str,
}

/// Deterministic initials avatar for a freshly registered user.
pub fn default_avatar_url(firstname: &str, lastname: &str) -> String {
    let seed = format!("{} {}", firstname, lastname);
    match reqwest::Url::parse_with_params(AVATAR_BASE_URL, &[("seed", seed.as_str())]) {
        Ok(url) => url.to_string(),
        Err(_) => AVATAR_BASE_URL.to_string(),
    }
}

/// Signup: checks the email is free, re-validates the newest OTP, then
/// creates the profile and the user and consumes the OTP, all in one
/// transaction.
pub async fn register_user_in_db(
    pool: &SqlitePool,
    new_user: NewUser<'_>,
    otp: &str,
    otp_ttl: chrono::Duration,
) -> Result<User, RequestError> {
    let password = hash_password_argon2(new_user.password.to_owned()).await?;
    let new_user = &new_user;
    let password = password.as_str();
    retry_on_conflict(|| try_register_user(pool, new_user, password, otp, otp_ttl)).await
}

async fn try_register_user(
    pool: &SqlitePool,
    new_user: &NewUser<'_>,
    password: &str,
    otp: &str,
    otp_ttl: chrono::Duration,
) -> Result<User, RequestError> {
    let mut tx = begin_write(pool).await?;

    if get_user_by_email(&mut tx, new_user.email).await?.is_some() {
        return Err(RequestError::AlreadyRegistered);
    }

    let otp_record = verify_otp(&mut tx, new_user.email, otp, otp_ttl).await?;
    let approved = AccountType::classify(new_user.account_type).starts_approved();

    let profile_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO profiles (gender, date_of_birth, about, contact_number)
        VALUES (NULL, NULL, NULL, NULL)
        RETURNING id
        "#,
    )
    .fetch_one(&mut tx)
    .await?;

    let user = sqlx::query_as::<Sqlite, User>(
        r#"
        INSERT INTO users (firstname, lastname, email, password, account_type, approved, profile_id, image)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new_user.firstname)
    .bind(new_user.lastname)
    .bind(new_user.email)
    .bind(password)
    .bind(new_user.account_type)
    .bind(approved)
    .bind(profile_id)
    .bind(default_avatar_url(new_user.firstname, new_user.lastname))
    .fetch_one(&mut tx)
    .await
    .map_err(|e| {
        let e = RequestError::from(e);
        if e.is_unique_violation() {
            RequestError::AlreadyRegistered
        } else {
            e
        }
    })?;

    super::consume_otp(&mut tx, otp_record.id).await?;
    tx.commit().await?;

    Ok(user)
}

/// Returns false when no user has that email any more.
pub async fn update_password_in_db(
    pool: &SqlitePool,
    email: &str,
    hashed_password: &str,
) -> Result<bool, RequestError> {
    let updated = sqlx::query(
        r#"
        UPDATE users
        SET password = $1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE email = $2
        "#,
    )
    .bind(hashed_password)
    .bind(email)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}
