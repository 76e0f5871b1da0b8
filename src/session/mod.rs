//! Session manager: account creation, credential exchange and bearer sessions.
//!
//! A bearer token resolves to a [`Caller`], the identity joined with its
//! profile row. Every ledger operation takes a `Caller` explicitly; there is no
//! ambient "current user".

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::db::{format_timestamp, now_timestamp, DbPool, LoginResponse, Role, User, UserResponse};

/// Session-change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { session_id: String, user_id: String },
    SignedOut { session_id: String, user_id: String },
}

/// The authenticated identity behind a request
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub session_id: String,
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    /// Balance at the time the session was resolved. Ledger operations
    /// re-read the balance inside their own transaction.
    pub points: i64,
    pub created_at: String,
}

impl Caller {
    pub fn profile(&self) -> UserResponse {
        UserResponse {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            role: self.role,
            points: self.points,
            created_at: self.created_at.clone(),
        }
    }
}

#[derive(FromRow)]
struct CallerRow {
    session_id: String,
    id: String,
    email: String,
    username: String,
    role: String,
    points: i64,
    created_at: String,
}

impl From<CallerRow> for Caller {
    fn from(row: CallerRow) -> Self {
        Self {
            session_id: row.session_id,
            id: row.id,
            email: row.email,
            username: row.username,
            role: Role::from(row.role),
            points: row.points,
            created_at: row.created_at,
        }
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct SessionManager {
    db: DbPool,
    events: broadcast::Sender<SessionEvent>,
    session_ttl: chrono::Duration,
}

impl SessionManager {
    pub fn new(db: DbPool, session_ttl: chrono::Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            db,
            events,
            session_ttl,
        }
    }

    /// Subscribe to sign-in / sign-out notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Create a `user` account with zero points.
    ///
    /// Does not sign the new account in. Every failure (duplicate email,
    /// hashing, storage) is logged and reduced to `false`.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> bool {
        match self.create_account(username, email, password, Role::User).await {
            Ok(user) => {
                info!(user_id = %user.id, "Registered new account");
                true
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                false
            }
        }
    }

    async fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User> {
        let password_hash =
            hash_password(password).map_err(|e| anyhow!("Failed to hash password: {}", e))?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: normalize_email(email),
            username: username.trim().to_string(),
            password_hash,
            role: role.to_string(),
            points: 0,
            created_at: now_timestamp(),
        };

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, role, points, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.points)
        .bind(&user.created_at)
        .execute(&self.db)
        .await
        .context("Failed to insert user")?;

        Ok(user)
    }

    /// Exchange credentials for a session token.
    ///
    /// Returns `None` on any failure; the cause is logged only.
    pub async fn login(&self, email: &str, password: &str) -> Option<LoginResponse> {
        match self.try_login(email, password).await {
            Ok(Some(response)) => Some(response),
            Ok(None) => {
                warn!("Login rejected: invalid credentials");
                None
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                None
            }
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<Option<LoginResponse>> {
        let user = crate::db::find_user_by_email(&self.db, &normalize_email(email)).await?;
        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => return Ok(None),
        };

        let token = generate_token();
        let session_id = uuid::Uuid::new_v4().to_string();
        let expires_at = Utc::now()
            .checked_add_signed(self.session_ttl)
            .ok_or_else(|| anyhow!("Session expiry overflow"))?;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session_id)
        .bind(&user.id)
        .bind(hash_token(&token))
        .bind(format_timestamp(expires_at))
        .bind(now_timestamp())
        .execute(&self.db)
        .await
        .context("Failed to create session")?;

        info!(user_id = %user.id, session_id = %session_id, "User signed in");
        self.publish(SessionEvent::SignedIn {
            session_id,
            user_id: user.id.clone(),
        });

        Ok(Some(LoginResponse {
            token,
            user: UserResponse::from(user),
        }))
    }

    /// Terminate the session behind `token`. Returns whether a session existed.
    pub async fn logout(&self, token: &str) -> Result<bool, sqlx::Error> {
        let session: Option<(String, String)> =
            sqlx::query_as("DELETE FROM sessions WHERE token_hash = ? RETURNING id, user_id")
                .bind(hash_token(token))
                .fetch_optional(&self.db)
                .await?;

        match session {
            Some((session_id, user_id)) => {
                info!(user_id = %user_id, session_id = %session_id, "User signed out");
                self.publish(SessionEvent::SignedOut {
                    session_id,
                    user_id,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resolve a bearer token into the caller's identity merged with the
    /// current profile. `None` for unknown or expired tokens.
    pub async fn resolve(&self, token: &str) -> Result<Option<Caller>, sqlx::Error> {
        let row: Option<CallerRow> = sqlx::query_as(
            r#"
            SELECT s.id AS session_id, u.id, u.email, u.username, u.role, u.points, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(hash_token(token))
        .bind(now_timestamp())
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Caller::from))
    }

    /// Make sure an admin account exists for `email`, creating or promoting it.
    pub async fn ensure_admin(&self, email: &str, password: &str, username: &str) -> Result<()> {
        let email = normalize_email(email);
        match crate::db::find_user_by_email(&self.db, &email).await? {
            Some(user) if user.role_enum() == Role::Admin => Ok(()),
            Some(user) => {
                sqlx::query("UPDATE users SET role = ? WHERE id = ?")
                    .bind(Role::Admin.as_str())
                    .bind(&user.id)
                    .execute(&self.db)
                    .await?;
                info!(user_id = %user.id, "Promoted configured account to admin");
                Ok(())
            }
            None => {
                let user = self
                    .create_account(username, &email, password, Role::Admin)
                    .await?;
                info!(user_id = %user.id, "Created admin account");
                Ok(())
            }
        }
    }

    /// Whether `session_id` still exists and has not expired
    pub async fn is_live(&self, session_id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM sessions WHERE id = ? AND expires_at > ?")
                .bind(session_id)
                .bind(now_timestamp())
                .fetch_optional(&self.db)
                .await?;
        Ok(row.is_some())
    }

    /// Delete expired sessions, returning how many were removed. Each one is
    /// announced as a sign-out.
    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let purged: Vec<(String, String)> =
            sqlx::query_as("DELETE FROM sessions WHERE expires_at <= ? RETURNING id, user_id")
                .bind(now_timestamp())
                .fetch_all(&self.db)
                .await?;

        let count = purged.len() as u64;
        for (session_id, user_id) in purged {
            self.publish(SessionEvent::SignedOut {
                session_id,
                user_id,
            });
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect;

    async fn manager() -> SessionManager {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        SessionManager::new(pool, chrono::Duration::days(7))
    }

    async fn session_count(manager: &SessionManager) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        count
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_token_hash_is_stable_and_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn test_register_creates_profile_without_session() {
        let manager = manager().await;

        assert!(manager.register("alice", "Alice@Example.com", "password123").await);
        assert_eq!(session_count(&manager).await, 0);

        let user = crate::db::find_user_by_email(&manager.db, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role_enum(), Role::User);
        assert_eq!(user.points, 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let manager = manager().await;

        assert!(manager.register("alice", "alice@example.com", "password123").await);
        assert!(!manager.register("alice2", "ALICE@example.com", "password456").await);
    }

    #[tokio::test]
    async fn test_login_issues_resolvable_session() {
        let manager = manager().await;
        let mut events = manager.subscribe();
        manager.register("bob", "bob@example.com", "hunter2hunter2").await;

        let response = manager.login("bob@example.com", "hunter2hunter2").await.unwrap();
        assert_eq!(response.user.username, "bob");

        let caller = manager.resolve(&response.token).await.unwrap().unwrap();
        assert_eq!(caller.id, response.user.id);
        assert_eq!(caller.email, "bob@example.com");
        assert_eq!(caller.role, Role::User);
        assert_eq!(caller.points, 0);

        match events.recv().await.unwrap() {
            SessionEvent::SignedIn { user_id, .. } => assert_eq!(user_id, caller.id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_with_bad_credentials() {
        let manager = manager().await;
        manager.register("bob", "bob@example.com", "hunter2hunter2").await;

        assert!(manager.login("bob@example.com", "wrong").await.is_none());
        assert!(manager.login("nobody@example.com", "hunter2hunter2").await.is_none());
        assert_eq!(session_count(&manager).await, 0);
    }

    #[tokio::test]
    async fn test_logout_ends_session_and_notifies() {
        let manager = manager().await;
        manager.register("carol", "carol@example.com", "sup3rsecret").await;
        let response = manager.login("carol@example.com", "sup3rsecret").await.unwrap();
        let mut events = manager.subscribe();

        assert!(manager.logout(&response.token).await.unwrap());
        assert!(manager.resolve(&response.token).await.unwrap().is_none());
        assert!(!manager.logout(&response.token).await.unwrap());

        match events.recv().await.unwrap() {
            SessionEvent::SignedOut { user_id, .. } => assert_eq!(user_id, response.user.id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_session_does_not_resolve() {
        let manager = manager().await;
        manager.register("dave", "dave@example.com", "sup3rsecret").await;
        let response = manager.login("dave@example.com", "sup3rsecret").await.unwrap();

        sqlx::query("UPDATE sessions SET expires_at = '2000-01-01T00:00:00.000Z'")
            .execute(&manager.db)
            .await
            .unwrap();

        assert!(manager.resolve(&response.token).await.unwrap().is_none());

        let caller_session: (String,) = sqlx::query_as("SELECT id FROM sessions")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert!(!manager.is_live(&caller_session.0).await.unwrap());

        let mut events = manager.subscribe();
        assert_eq!(manager.purge_expired().await.unwrap(), 1);
        assert_eq!(session_count(&manager).await, 0);

        match events.recv().await.unwrap() {
            SessionEvent::SignedOut {
                session_id,
                user_id,
            } => {
                assert_eq!(session_id, caller_session.0);
                assert_eq!(user_id, response.user.id);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_session_until_logout() {
        let manager = manager().await;
        manager.register("fay", "fay@example.com", "sup3rsecret").await;
        let response = manager.login("fay@example.com", "sup3rsecret").await.unwrap();
        let caller = manager.resolve(&response.token).await.unwrap().unwrap();

        assert!(manager.is_live(&caller.session_id).await.unwrap());
        manager.logout(&response.token).await.unwrap();
        assert!(!manager.is_live(&caller.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_then_promotes() {
        let manager = manager().await;

        manager
            .ensure_admin("root@example.com", "rootpassword", "root")
            .await
            .unwrap();
        let admin = crate::db::find_user_by_email(&manager.db, "root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role_enum(), Role::Admin);

        manager.register("eve", "eve@example.com", "evepassword").await;
        manager
            .ensure_admin("eve@example.com", "ignored", "ignored")
            .await
            .unwrap();
        let eve = crate::db::find_user_by_email(&manager.db, "eve@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(eve.role_enum(), Role::Admin);
        assert!(verify_password("evepassword", &eve.password_hash));
    }
}
