// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Unique login name. Guests get a generated one.
    pub username: String,

    /// Argon2 password hash; guests have none.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: Option<String>,

    /// Display name.
    pub full_name: String,

    pub is_guest: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Values needed to create a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: Option<String>,
    pub full_name: String,
    pub is_guest: bool,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
