use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{
    CommentWithAuthor, Like, LikeWithUser, Post, Profile, User, UserDetails,
};

/// Outward-facing view of a user. The password hash never leaves the
/// persistence layer.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub account_type: String,
    pub approved: bool,
    pub image: Option<String>,
    pub bio: String,
    pub website: String,
    pub active: bool,
    pub account_privacy: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: i64,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub about: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailsResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub additional_details: ProfileResponse,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LikerResponse {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: NaiveDateTime,
    pub full_name: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthorResponse {
    pub id: i64,
    pub full_name: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user: AuthorResponse,
}

impl UserResponse {
    pub fn new(
        User {
            id,
            firstname,
            lastname,
            email,
            account_type,
            approved,
            image,
            bio,
            website,
            active,
            account_privacy,
            created_at,
            updated_at,
            ..
        }: User,
    ) -> Self {
        UserResponse {
            id,
            firstname,
            lastname,
            email,
            account_type,
            approved,
            image,
            bio,
            website,
            active,
            account_privacy,
            created_at,
            updated_at,
        }
    }
}

impl ProfileResponse {
    pub fn new(
        Profile {
            id,
            gender,
            date_of_birth,
            about,
            contact_number,
            ..
        }: Profile,
    ) -> Self {
        ProfileResponse {
            id,
            gender,
            date_of_birth,
            about,
            contact_number,
        }
    }
}

impl UserDetailsResponse {
    pub fn new(UserDetails { user, profile }: UserDetails) -> Self {
        UserDetailsResponse {
            user: UserResponse::new(user),
            additional_details: ProfileResponse::new(profile),
        }
    }
}

impl PostResponse {
    pub fn new(
        Post {
            id,
            user_id,
            content,
            image_url,
            like_count,
            comment_count,
            created_at,
            updated_at,
        }: Post,
    ) -> Self {
        PostResponse {
            id,
            user_id,
            content,
            image_url,
            like_count,
            comment_count,
            created_at,
            updated_at,
        }
    }
}

impl LikeResponse {
    pub fn new(
        Like {
            id,
            user_id,
            post_id,
            created_at,
        }: Like,
    ) -> Self {
        LikeResponse {
            id,
            user_id,
            post_id,
            created_at,
        }
    }
}

impl LikerResponse {
    pub fn new(
        LikeWithUser {
            id,
            user_id,
            post_id,
            created_at,
            firstname,
            lastname,
            user_image,
        }: LikeWithUser,
    ) -> Self {
        LikerResponse {
            id,
            user_id,
            post_id,
            created_at,
            full_name: format!("{} {}", firstname, lastname),
            image: user_image,
        }
    }
}

impl CommentResponse {
    pub fn new(
        CommentWithAuthor {
            id,
            user_id,
            post_id,
            content,
            created_at,
            updated_at,
            firstname,
            lastname,
            user_image,
        }: CommentWithAuthor,
    ) -> Self {
        CommentResponse {
            id,
            post_id,
            content,
            created_at,
            updated_at,
            user: AuthorResponse {
                id: user_id,
                full_name: format!("{} {}", firstname, lastname),
                image: user_image,
            },
        }
    }
}
