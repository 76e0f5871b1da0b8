//! User, role and session models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Citizen: files reports, earns and spends points
    User,
    /// Moderator: triages reports, maintains the reward catalog
    Admin,
}

impl Role {
    /// Check if the role can resolve or reject reports
    pub fn can_moderate_reports(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role can create, edit and delete rewards
    pub fn can_manage_rewards(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role can list every account
    pub fn can_view_users(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if a resolved report earns its owner the resolution bonus
    pub fn earns_resolution_bonus(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::User)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub points: i64,
    pub created_at: String,
}

impl User {
    /// Get the role as a Role enum
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }
}

/// Public profile: identity fields merged with profile fields, no secrets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub points: i64,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            role: user.role_enum(),
            id: user.id,
            email: user.email,
            username: user.username,
            points: user.points,
            created_at: user.created_at,
        }
    }
}

/// Profile row for the admin user table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserWithReportCount {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub points: i64,
    pub created_at: String,
    pub report_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

pub async fn find_user(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// All accounts with the number of reports each has filed, newest first
pub async fn list_users_with_report_counts(
    pool: &SqlitePool,
) -> Result<Vec<UserWithReportCount>, sqlx::Error> {
    sqlx::query_as::<_, UserWithReportCount>(
        r#"
        SELECT u.id, u.email, u.username, u.role, u.points, u.created_at,
               (SELECT COUNT(*) FROM reports r WHERE r.user_id = u.id) AS report_count
        FROM users u
        ORDER BY u.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}
