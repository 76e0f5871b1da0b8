//! Reward catalog models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RewardCategory {
    /// Physical items and donations
    #[default]
    Item,
    /// Digital badges
    Badge,
    Discount,
}

impl RewardCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardCategory::Item => "item",
            RewardCategory::Badge => "badge",
            RewardCategory::Discount => "discount",
        }
    }
}

impl std::fmt::Display for RewardCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RewardCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" => Ok(RewardCategory::Item),
            "badge" => Ok(RewardCategory::Badge),
            "discount" => Ok(RewardCategory::Discount),
            _ => Err(format!("Unknown reward category: {}", s)),
        }
    }
}

impl From<String> for RewardCategory {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points_required: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points_required: i64,
    pub category: RewardCategory,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Reward> for RewardResponse {
    fn from(reward: Reward) -> Self {
        Self {
            category: RewardCategory::from(reward.category),
            id: reward.id,
            name: reward.name,
            description: reward.description,
            points_required: reward.points_required,
            image_url: reward.image_url,
            created_at: reward.created_at,
            updated_at: reward.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRewardRequest {
    pub name: String,
    pub description: String,
    pub points_required: i64,
    #[serde(default)]
    pub category: RewardCategory,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRewardRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub points_required: Option<i64>,
    pub category: Option<RewardCategory>,
    pub image_url: Option<String>,
}

/// Outcome of a redemption attempt, as reported to clients
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption: Option<super::UserReward>,
}

pub async fn find_reward(pool: &SqlitePool, id: &str) -> Result<Option<Reward>, sqlx::Error> {
    sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Whole catalog, cheapest first
pub async fn list_rewards(pool: &SqlitePool) -> Result<Vec<Reward>, sqlx::Error> {
    sqlx::query_as::<_, Reward>("SELECT * FROM rewards ORDER BY points_required ASC, name")
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_defaults_to_item() {
        let req: CreateRewardRequest = serde_json::from_str(
            r#"{"name": "Tote bag", "description": "Reusable bag", "points_required": 20}"#,
        )
        .unwrap();
        assert_eq!(req.category, RewardCategory::Item);
        assert!(req.image_url.is_none());
    }

    #[test]
    fn test_category_round_trips_through_text_column() {
        for category in [RewardCategory::Item, RewardCategory::Badge, RewardCategory::Discount] {
            assert_eq!(RewardCategory::from(category.to_string()), category);
        }
    }
}
