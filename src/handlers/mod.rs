use axum::{
    http::{StatusCode, Uri},
    Json,
};

use crate::{
    data_formats::Envelope,
    errors::{RequestError, RequestErrorJson},
    JsonResponse,
};

mod auth;
mod post;
mod profile;

pub use auth::*;
pub use post::*;
pub use profile::*;

pub type ApiResult<T> = Result<JsonResponse<Envelope<T>>, RequestError>;

fn ok<T>(status: StatusCode, message: &str, data: T) -> ApiResult<T> {
    Ok((status, Json(Envelope::with_message(message, data))))
}

/// Path ids must be positive integers.
fn parse_id(raw: &str, error: &'static str) -> Result<i64, RequestError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(RequestError::Validation(error)),
    }
}

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> JsonResponse<RequestErrorJson> {
    (
        StatusCode::NOT_FOUND,
        Json(RequestErrorJson::new(&format!(
            "URL {} provided was not found",
            uri
        ))),
    )
}
