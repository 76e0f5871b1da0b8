//! Points ledger and report workflow.
//!
//! Every operation takes the [`Caller`] explicitly, checks the caller's
//! capabilities itself, and commits all of its writes in one transaction.
//! Change notifications go out only after the commit succeeds.

mod reports;
mod rewards;

pub use reports::StatusChange;

use thiserror::Error;
use tracing::warn;

use crate::config::PointsConfig;
use crate::db::{
    list_reports, list_rewards, list_user_rewards, list_users_with_report_counts, DbPool, Report,
    ReportStatus, Reward, UserReward, UserWithReportCount,
};
use crate::feeds::{Change, FeedHub};
use crate::session::Caller;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::sync::Arc;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not permitted: {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Report cannot move from {from} to {to}")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("Report is already {0}")]
    ReportClosed(ReportStatus),

    #[error("Insufficient points: balance {balance}, required {required}")]
    InsufficientPoints { balance: i64, required: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct Ledger {
    db: DbPool,
    feeds: Arc<FeedHub>,
    points: PointsConfig,
}

impl Ledger {
    pub fn new(db: DbPool, feeds: Arc<FeedHub>, points: PointsConfig) -> Self {
        Self { db, feeds, points }
    }

    /// Begin a transaction that holds the write lock from its first statement,
    /// so concurrent writers wait on `busy_timeout` instead of failing.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, LedgerError> {
        Ok(self.db.begin_with("BEGIN IMMEDIATE").await?)
    }

    fn publish(&self, change: Change) {
        self.feeds.publish(change);
    }

    pub async fn list_reports(&self) -> Result<Vec<Report>, LedgerError> {
        Ok(list_reports(&self.db).await?)
    }

    pub async fn list_rewards(&self) -> Result<Vec<Reward>, LedgerError> {
        Ok(list_rewards(&self.db).await?)
    }

    /// The caller's own redemption records
    pub async fn list_user_rewards(&self, caller: &Caller) -> Result<Vec<UserReward>, LedgerError> {
        Ok(list_user_rewards(&self.db, &caller.id).await?)
    }

    /// Every account with its report count. Admin only.
    pub async fn list_users(
        &self,
        caller: &Caller,
    ) -> Result<Vec<UserWithReportCount>, LedgerError> {
        if !caller.role.can_view_users() {
            warn!(user_id = %caller.id, "Rejected user listing by non-admin");
            return Err(LedgerError::Forbidden("listing users requires the admin role"));
        }
        Ok(list_users_with_report_counts(&self.db).await?)
    }
}

/// Add `delta` to a balance
async fn credit_points(
    conn: &mut SqliteConnection,
    user_id: &str,
    delta: i64,
) -> Result<i64, LedgerError> {
    let balance: Option<(i64,)> =
        sqlx::query_as("UPDATE users SET points = points + ? WHERE id = ? RETURNING points")
            .bind(delta)
            .bind(user_id)
            .fetch_optional(conn)
            .await?;

    balance
        .map(|(points,)| points)
        .ok_or(LedgerError::NotFound("User"))
}

/// Subtract `amount` from a balance, refusing to go below zero
async fn debit_points(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: i64,
) -> Result<i64, LedgerError> {
    let balance: Option<(i64,)> = sqlx::query_as(
        "UPDATE users SET points = points - ? WHERE id = ? AND points >= ? RETURNING points",
    )
    .bind(amount)
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((points,)) = balance {
        return Ok(points);
    }

    let current: Option<(i64,)> = sqlx::query_as("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match current {
        Some((balance,)) => Err(LedgerError::InsufficientPoints {
            balance,
            required: amount,
        }),
        None => Err(LedgerError::NotFound("User")),
    }
}
