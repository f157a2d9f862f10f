use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::UpdateProfileRequest,
    errors::RequestError,
    models::{Profile, User, UserDetails},
};

use super::{begin_write, get_user_by_id, reconcile_post_counters, retry_on_conflict};

async fn get_user_details(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<UserDetails, RequestError> {
    let user = get_user_by_id(&mut *conn, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    let profile_id = user
        .profile_id
        .ok_or(RequestError::NotFound("Profile not found"))?;
    let profile = sqlx::query_as::<Sqlite, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    Ok(UserDetails { user, profile })
}

/// Updates the caller's names and their owned profile row together. Fields
/// left as `None` keep their stored value.
pub async fn update_profile_in_db(
    pool: &SqlitePool,
    id: i64,
    UpdateProfileRequest {
        firstname,
        lastname,
        date_of_birth,
        about,
        contact_number,
        gender,
    }: UpdateProfileRequest,
) -> Result<UserDetails, RequestError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE users
        SET firstname  = COALESCE($1, firstname),
            lastname   = COALESCE($2, lastname),
            updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = $3
        "#,
    )
    .bind(firstname)
    .bind(lastname)
    .bind(id)
    .execute(&mut tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(RequestError::NotFound("User not found"));
    }

    sqlx::query(
        r#"
        UPDATE profiles
        SET date_of_birth  = COALESCE($1, date_of_birth),
            about          = COALESCE($2, about),
            contact_number = COALESCE($3, contact_number),
            gender         = COALESCE($4, gender),
            updated_at     = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = (SELECT profile_id FROM users WHERE id = $5)
        "#,
    )
    .bind(date_of_birth)
    .bind(about)
    .bind(contact_number)
    .bind(gender)
    .bind(id)
    .execute(&mut tx)
    .await?;

    let details = get_user_details(&mut tx, id).await?;
    tx.commit().await?;
    Ok(details)
}

pub async fn update_user_image_in_db(
    pool: &SqlitePool,
    id: i64,
    image_url: &str,
) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<Sqlite, User>(
        r#"
        UPDATE users
        SET image = $1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(image_url)
    .bind(id)
    .fetch_optional(&mut tx)
    .await?
    .ok_or(RequestError::NotFound("User not found"))?;
    tx.commit().await?;
    Ok(user)
}

/// Deletes the user, everything that cascades from it, and the owned
/// profile. Counters on other users' posts the account had liked or
/// commented on are recomputed in the same transaction.
pub async fn delete_account_in_db(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    retry_on_conflict(|| try_delete_account(pool, id)).await?;
    tracing::info!(user_id = id, "account deleted");
    Ok(())
}

async fn try_delete_account(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;

    let user = get_user_by_id(&mut tx, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;

    let touched_posts: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT post_id FROM likes WHERE user_id = $1
        UNION
        SELECT post_id FROM comments WHERE user_id = $1
        "#,
    )
    .bind(id)
    .fetch_all(&mut tx)
    .await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut tx)
        .await?;

    reconcile_post_counters(&mut tx, Some(&touched_posts)).await?;

    if let Some(profile_id) = user.profile_id {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(profile_id)
            .execute(&mut tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
