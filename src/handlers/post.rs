use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use crate::{
    authentication::AuthUser,
    data_formats::{
        non_empty, CommentRequest, CommentResponse, CommentWrapper, LikeAction, LikeResponse,
        LikerResponse, MultipleCommentsWrapper, MultipleLikesWrapper, NoData, PostResponse,
        PostWrapper, ToggleLikeWrapper,
    },
    db_helpers::{
        add_comment_in_db, create_post_in_db, delete_comment_in_db, list_comments_in_db,
        list_likes_in_db, toggle_like_in_db, unlike_post_in_db, LikeToggle,
    },
    errors::RequestError,
    AppState,
};

use super::{ok, parse_id, ApiResult};

const INVALID_POST_ID: &str = "Invalid post ID";
const INVALID_COMMENT_ID: &str = "Invalid comment ID";

struct PostUpload {
    content: Option<String>,
    image: Option<(String, Vec<u8>)>,
}

async fn read_post_upload(mut multipart: Multipart) -> Result<PostUpload, RequestError> {
    let malformed = |_: MultipartError| RequestError::Validation("Malformed multipart body");
    let mut upload = PostUpload {
        content: None,
        image: None,
    };
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        match field.name() {
            Some("content") => upload.content = Some(field.text().await.map_err(malformed)?),
            Some("image") => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    upload.image = Some((file_name, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }
    Ok(upload)
}

// ----------------- Post Handlers -----------------
pub async fn create_post(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<PostWrapper> {
    let upload = read_post_upload(multipart).await?;
    let content = non_empty(&upload.content)
        .ok_or(RequestError::Validation("Content is required"))?
        .to_string();

    let image_url = match upload.image {
        Some((file_name, bytes)) => Some(state.blob_store.upload(bytes, &file_name, None).await?),
        None => None,
    };

    let post = create_post_in_db(&state.pool, user.id, &content, image_url.as_deref()).await?;
    info!(post_id = post.id, user_id = user.id, "post created");
    ok(
        StatusCode::CREATED,
        "Post created successfully",
        PostWrapper {
            post: PostResponse::new(post),
        },
    )
}

pub async fn toggle_like(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> ApiResult<ToggleLikeWrapper> {
    let post_id = parse_id(&post_id, INVALID_POST_ID)?;
    match toggle_like_in_db(&state.pool, user.id, post_id).await? {
        LikeToggle::Liked(like) => ok(
            StatusCode::CREATED,
            "Post liked successfully",
            ToggleLikeWrapper {
                action: LikeAction::Liked,
                like: Some(LikeResponse::new(like)),
            },
        ),
        LikeToggle::Unliked => ok(
            StatusCode::OK,
            "Post unliked successfully",
            ToggleLikeWrapper {
                action: LikeAction::Unliked,
                like: None,
            },
        ),
    }
}

pub async fn unlike_post(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> ApiResult<NoData> {
    let post_id = parse_id(&post_id, INVALID_POST_ID)?;
    if !unlike_post_in_db(&state.pool, user.id, post_id).await? {
        return Err(RequestError::NotFound("Like not found"));
    }
    ok(StatusCode::OK, "Post unliked successfully", NoData {})
}

pub async fn list_likes(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> ApiResult<MultipleLikesWrapper> {
    let post_id = parse_id(&post_id, INVALID_POST_ID)?;
    let likes: Vec<LikerResponse> = list_likes_in_db(&state.pool, post_id)
        .await?
        .into_iter()
        .map(LikerResponse::new)
        .collect();
    ok(
        StatusCode::OK,
        "Likes fetched successfully",
        MultipleLikesWrapper {
            like_count: likes.len(),
            likes,
        },
    )
}

pub async fn add_comment(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> ApiResult<CommentWrapper> {
    let post_id = parse_id(&post_id, INVALID_POST_ID)?;
    let content = non_empty(&request.content)
        .ok_or(RequestError::Validation("Comment content cannot be empty"))?;

    let comment = add_comment_in_db(&state.pool, user.id, post_id, content).await?;
    info!(comment_id = comment.id, post_id, "comment added");
    ok(
        StatusCode::CREATED,
        "Comment added successfully",
        CommentWrapper {
            comment: CommentResponse::new(comment),
        },
    )
}

pub async fn delete_comment(
    user: AuthUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(comment_id): Path<String>,
) -> ApiResult<NoData> {
    let comment_id = parse_id(&comment_id, INVALID_COMMENT_ID)?;
    delete_comment_in_db(&state.pool, user.id, comment_id).await?;
    ok(StatusCode::OK, "Comment deleted successfully", NoData {})
}

pub async fn list_comments(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> ApiResult<MultipleCommentsWrapper> {
    let post_id = parse_id(&post_id, INVALID_POST_ID)?;
    let comments: Vec<CommentResponse> = list_comments_in_db(&state.pool, post_id)
        .await?
        .into_iter()
        .map(CommentResponse::new)
        .collect();
    ok(
        StatusCode::OK,
        "Comments fetched successfully",
        MultipleCommentsWrapper {
            total_comments: comments.len(),
            comments,
        },
    )
}
// ----------------- End Post Handlers -----------------
