//! Redemption receipts.
//!
//! A `UserReward` is written once, inside the redemption transaction, and
//! has no update path afterwards.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserReward {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    /// Reward cost at the moment of redemption
    pub points_redeemed: i64,
    /// Reward name at the moment of redemption
    pub reward_item: String,
    pub redeemed_at: String,
}

/// A user's receipts, newest first
pub async fn list_user_rewards(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<UserReward>, sqlx::Error> {
    sqlx::query_as::<_, UserReward>(
        "SELECT * FROM user_rewards WHERE user_id = ? ORDER BY redeemed_at DESC, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
