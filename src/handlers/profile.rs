use std::sync::Arc;

use axum::{extract::Multipart, http::StatusCode, Extension, Json};
use chrono::NaiveDate;
use tracing::info;

use crate::{
    authentication::AuthUser,
    blob_store::DISPLAY_PICTURE_SIZE,
    data_formats::{
        DataWrapper, NoData, UpdateProfileRequest, UpdatedUserWrapper, UserDetailsResponse,
        UserResponse,
    },
    db_helpers::{delete_account_in_db, update_profile_in_db, update_user_image_in_db},
    errors::RequestError,
    AppState,
};

use super::{ok, ApiResult};

const DATE_OF_BIRTH_FORMAT: &str = "%Y-%m-%d";

/// Trims the provided fields. Names may be left out but not blanked.
fn normalize_profile_update(
    request: UpdateProfileRequest,
) -> Result<UpdateProfileRequest, RequestError> {
    let trim = |value: Option<String>| value.map(|value| value.trim().to_string());
    let request = UpdateProfileRequest {
        firstname: trim(request.firstname),
        lastname: trim(request.lastname),
        date_of_birth: trim(request.date_of_birth),
        about: request.about,
        contact_number: trim(request.contact_number),
        gender: trim(request.gender),
    };

    if request.firstname.as_deref() == Some("") || request.lastname.as_deref() == Some("") {
        return Err(RequestError::Validation("Name fields cannot be empty"));
    }
    if let Some(date_of_birth) = request.date_of_birth.as_deref() {
        if NaiveDate::parse_from_str(date_of_birth, DATE_OF_BIRTH_FORMAT).is_err() {
            return Err(RequestError::Validation(
                "dateOfBirth must be formatted as YYYY-MM-DD",
            ));
        }
    }
    Ok(request)
}

// ----------------- Profile Handlers -----------------
pub async fn update_profile(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UpdatedUserWrapper> {
    let request = normalize_profile_update(request)?;
    let details = update_profile_in_db(&state.pool, user.id, request).await?;
    ok(
        StatusCode::OK,
        "Profile updated successfully",
        UpdatedUserWrapper {
            updated_user_details: UserDetailsResponse::new(details),
        },
    )
}

pub async fn update_display_picture(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<DataWrapper<UserResponse>> {
    let mut picture = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| RequestError::Validation("Malformed multipart body"))?
    {
        if field.name() != Some("displayPicture") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("display-picture").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| RequestError::Validation("Malformed multipart body"))?;
        picture = Some((file_name, bytes));
    }

    let (file_name, bytes) = match picture {
        Some((file_name, bytes)) if !bytes.is_empty() => (file_name, bytes),
        _ => return Err(RequestError::Validation("displayPicture is required")),
    };

    let url = state
        .blob_store
        .upload(bytes.to_vec(), &file_name, Some(DISPLAY_PICTURE_SIZE))
        .await?;
    let updated = update_user_image_in_db(&state.pool, user.id, &url).await?;

    info!(user_id = user.id, "display picture updated");
    ok(
        StatusCode::OK,
        "Image updated successfully",
        DataWrapper {
            data: UserResponse::new(updated),
        },
    )
}

pub async fn delete_profile(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<NoData> {
    delete_account_in_db(&state.pool, user.id).await?;
    info!(user_id = user.id, "account deleted");
    ok(StatusCode::OK, "Account deleted successfully", NoData {})
}
// ----------------- End Profile Handlers -----------------
