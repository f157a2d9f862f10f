use std::sync::Arc;

use axum::{http::StatusCode, Extension, Json};
use tracing::{info, warn};

use crate::{
    authentication::{
        hash_password_argon2, issue_reset_token, issue_session_token, verify_password_argon2,
        verify_reset_token,
    },
    data_formats::{
        non_empty, ForgotPasswordRequest, LoginRequest, LoginWrapper, NoData, OtpWrapper,
        ResetPasswordRequest, SendOtpRequest, SignupRequest, UserResponse, UserWrapper,
    },
    db_helpers::{get_user_by_email, register_user_in_db, update_password_in_db, NewUser},
    errors::RequestError,
    mail::{password_reset_email, RESET_SUBJECT},
    models::DEFAULT_ACCOUNT_TYPE,
    otp::request_otp,
    AppState,
};

use super::{ok, ApiResult};

/// Passwords are taken verbatim, but a blank one counts as missing.
fn password_field(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|password| !password.trim().is_empty())
}

// ----------------- Auth Handlers -----------------
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<UserWrapper<UserResponse>> {
    let (
        Some(firstname),
        Some(lastname),
        Some(email),
        Some(password),
        Some(confirm_password),
        Some(otp),
    ) = (
        non_empty(&request.firstname),
        non_empty(&request.lastname),
        non_empty(&request.email),
        password_field(&request.password),
        password_field(&request.confirm_password),
        non_empty(&request.otp),
    )
    else {
        return Err(RequestError::MissingFields);
    };

    if password != confirm_password {
        return Err(RequestError::PasswordMismatch);
    }

    let account_type = non_empty(&request.account_type).unwrap_or(DEFAULT_ACCOUNT_TYPE);
    let user = register_user_in_db(
        &state.pool,
        NewUser {
            firstname,
            lastname,
            email,
            password,
            account_type,
        },
        otp,
        chrono::Duration::seconds(state.config.otp_ttl_secs),
    )
    .await?;

    info!(user_id = user.id, account_type, "user registered");
    ok(
        StatusCode::OK,
        "User registered successfully",
        UserWrapper::wrap_with_user_data(UserResponse::new(user)),
    )
}

pub async fn send_otp(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SendOtpRequest>,
) -> ApiResult<OtpWrapper> {
    let email = non_empty(&request.email).ok_or(RequestError::Validation("Email is required"))?;

    let otp = request_otp(&state.pool, state.mailer.as_ref(), email)
        .await
        .map_err(|e| match e {
            RequestError::AlreadyRegistered => {
                RequestError::NotAuthorized("User is already registered")
            }
            e => e,
        })?;

    let otp = if state.config.echo_otp { Some(otp) } else { None };
    ok(StatusCode::OK, "OTP sent successfully", OtpWrapper { otp })
}

pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginWrapper> {
    let (Some(email), Some(password)) =
        (non_empty(&request.email), password_field(&request.password))
    else {
        return Err(RequestError::Validation("Email and password are required"));
    };

    let mut conn = state.pool.acquire().await?;
    let user = match get_user_by_email(&mut conn, email).await? {
        Some(user) => user,
        None => return Err(RequestError::InvalidCredentials),
    };
    drop(conn);

    if !verify_password_argon2(password.to_owned(), &user.password).await? {
        return Err(RequestError::InvalidCredentials);
    }

    let token = issue_session_token(&state.config.jwt_secret, user.id, &user.email)?;
    info!(user_id = user.id, "login successful");
    ok(
        StatusCode::OK,
        "Login successful",
        LoginWrapper {
            token,
            user: UserResponse::new(user),
        },
    )
}

pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<NoData> {
    let email = non_empty(&request.email).ok_or(RequestError::Validation("Email is required"))?;

    let mut conn = state.pool.acquire().await?;
    if get_user_by_email(&mut conn, email).await?.is_none() {
        return Err(RequestError::NotFound("Email not found"));
    }
    drop(conn);

    let token = issue_reset_token(&state.config.jwt_secret, email)?;
    let reset_link = format!("{}?token={}", state.config.reset_url_base, token);
    if let Err(error) = state
        .mailer
        .send(email, RESET_SUBJECT, &password_reset_email(&reset_link))
        .await
    {
        warn!(error = ?error, "password reset email failed");
        return Err(RequestError::DeliveryFailed);
    }

    ok(StatusCode::OK, "Password reset link sent to email", NoData {})
}

pub async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<NoData> {
    let (Some(token), Some(new_password), Some(confirm_password)) = (
        non_empty(&request.token),
        password_field(&request.new_password),
        password_field(&request.confirm_password),
    ) else {
        return Err(RequestError::Validation("All fields are required"));
    };

    if new_password != confirm_password {
        return Err(RequestError::PasswordMismatch);
    }

    let email = verify_reset_token(&state.config.jwt_secret, token)?;
    let hashed_password = hash_password_argon2(new_password.to_owned()).await?;
    if !update_password_in_db(&state.pool, &email, &hashed_password).await? {
        return Err(RequestError::InvalidOrExpiredToken);
    }

    info!("password reset");
    ok(StatusCode::OK, "Password reset successful", NoData {})
}
// ----------------- End Auth Handlers -----------------
