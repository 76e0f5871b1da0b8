//! Shared fixtures for unit tests.

use crate::config::PointsConfig;
use crate::db::{connect, DbPool, Location, Role};
use crate::feeds::FeedHub;
use crate::ledger::Ledger;
use crate::session::Caller;
use std::sync::Arc;

pub async fn memory_pool() -> DbPool {
    connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database")
}

pub fn ledger(pool: &DbPool) -> (Ledger, Arc<FeedHub>) {
    let feeds = Arc::new(FeedHub::new(64));
    (
        Ledger::new(pool.clone(), feeds.clone(), PointsConfig::default()),
        feeds,
    )
}

/// Insert an account directly and return it as a caller
pub async fn insert_user(pool: &DbPool, username: &str, role: Role, points: i64) -> Caller {
    let id = uuid::Uuid::new_v4().to_string();
    let email = format!("{}@example.com", username);
    let created_at = crate::db::now_timestamp();

    sqlx::query(
        "INSERT INTO users (id, email, username, password_hash, role, points, created_at) VALUES (?, ?, ?, 'unused', ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(username)
    .bind(role.as_str())
    .bind(points)
    .bind(&created_at)
    .execute(pool)
    .await
    .expect("insert user");

    Caller {
        session_id: format!("session-{}", username),
        id,
        email,
        username: username.to_string(),
        role,
        points,
        created_at,
    }
}

pub async fn balance(pool: &DbPool, user_id: &str) -> i64 {
    let (points,): (i64,) = sqlx::query_as("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("user balance");
    points
}

pub async fn count(pool: &DbPool, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("row count");
    n
}

pub fn bandung() -> Location {
    Location {
        lat: -6.9175,
        lng: 107.6191,
        province: "JAWA BARAT".to_string(),
        city: "KOTA BANDUNG".to_string(),
        district: "COBLONG".to_string(),
        village: "DAGO".to_string(),
        full_address: "DAGO, COBLONG, KOTA BANDUNG, JAWA BARAT".to_string(),
    }
}
