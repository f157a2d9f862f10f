use serde::{Deserialize, Serialize};

use super::response::{
    CommentResponse, LikeResponse, LikerResponse, PostResponse, UserDetailsResponse, UserResponse,
};

/// The `{"success": true, "message": ..., ...data}` envelope every
/// successful response is wrapped in. Failures use
/// [`crate::errors::RequestErrorJson`].
#[derive(Debug, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn with_message(message: &str, data: T) -> Envelope<T> {
        Envelope {
            success: true,
            message: Some(message.to_string()),
            data,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct NoData {}

#[derive(Debug, Deserialize, Serialize)]
pub struct UserWrapper<T> {
    pub user: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginWrapper {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct OtpWrapper {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedUserWrapper {
    pub updated_user_details: UserDetailsResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DataWrapper<T> {
    pub data: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostWrapper {
    pub post: PostResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ToggleLikeWrapper {
    pub action: LikeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<LikeResponse>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Liked,
    Unliked,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleLikesWrapper {
    pub like_count: usize,
    pub likes: Vec<LikerResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentWrapper {
    pub comment: CommentResponse,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleCommentsWrapper {
    pub comments: Vec<CommentResponse>,
    pub total_comments: usize,
}

impl<T> UserWrapper<T> {
    pub fn wrap_with_user_data(user: T) -> UserWrapper<T> {
        UserWrapper { user }
    }
}
