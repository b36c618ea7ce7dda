use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Storage key shown for users who never uploaded a picture.
pub const DEFAULT_PICTURE: &str = "default.jpg";

/// One-to-one extension of a user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub picture: String,
    pub email: String,
}

impl Profile {
    pub fn has_custom_picture(&self) -> bool {
        self.picture != DEFAULT_PICTURE
    }
}

/// A user joined with their profile, as listed on the admin page.
#[derive(Debug, Clone, FromRow)]
pub struct UserWithProfile {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub last_login: Option<time::OffsetDateTime>,
    pub picture: Option<String>,
}
