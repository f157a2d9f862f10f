use chrono::NaiveDateTime;

/// The one account type that needs manual approval after signup.
pub const ELEVATED_ACCOUNT_TYPE: &str = "TEACHER";
pub const DEFAULT_ACCOUNT_TYPE: &str = "STUDENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Regular,
    Elevated,
}

impl AccountType {
    pub fn classify(account_type: &str) -> Self {
        if account_type == ELEVATED_ACCOUNT_TYPE {
            AccountType::Elevated
        } else {
            AccountType::Regular
        }
    }

    /// Elevated accounts start unapproved.
    pub fn starts_approved(self) -> bool {
        self == AccountType::Regular
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    pub account_type: String,
    pub approved: bool,
    pub profile_id: Option<i64>,
    pub image: Option<String>,
    pub bio: String,
    pub website: String,
    pub active: bool,
    pub account_privacy: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub about: Option<String>,
    pub contact_number: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub id: i64,
    pub email: String,
    pub otp: String,
    pub created_at: NaiveDateTime,
    pub consumed_at: Option<NaiveDateTime>,
}

/// A like joined with the display fields of the user who gave it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LikeWithUser {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: NaiveDateTime,
    pub firstname: String,
    pub lastname: String,
    pub user_image: Option<String>,
}

/// A comment joined with the display fields of its author.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub firstname: String,
    pub lastname: String,
    pub user_image: Option<String>,
}

/// A user row joined with its profile, as returned after a profile update.
#[derive(Debug, Clone)]
pub struct UserDetails {
    pub user: User,
    pub profile: Profile,
}
