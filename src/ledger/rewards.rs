use tracing::{info, warn};

use super::{debit_points, Ledger, LedgerError};
use crate::db::{
    now_timestamp, CreateRewardRequest, Reward, RewardCategory, UpdateRewardRequest, UserReward,
};
use crate::feeds::{Change, Collection};
use crate::session::Caller;

fn require_reward_manager(caller: &Caller) -> Result<(), LedgerError> {
    if caller.role.can_manage_rewards() {
        Ok(())
    } else {
        warn!(user_id = %caller.id, "Rejected reward catalog change by non-admin");
        Err(LedgerError::Forbidden("managing rewards requires the admin role"))
    }
}

fn check_reward_fields(name: &str, points_required: i64) -> Result<(), LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation("Reward name is required".to_string()));
    }
    if points_required < 0 {
        return Err(LedgerError::Validation(
            "Points required cannot be negative".to_string(),
        ));
    }
    Ok(())
}

impl Ledger {
    /// Spend the caller's points on a reward.
    ///
    /// The reward is read inside the transaction, so the cost charged is the
    /// cost at this instant. The balance check and the debit are one
    /// conditional update; on any failure nothing is written.
    pub async fn redeem_reward(
        &self,
        caller: &Caller,
        reward_id: &str,
    ) -> Result<UserReward, LedgerError> {
        let mut tx = self.begin_write().await?;

        let reward = sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE id = ?")
            .bind(reward_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound("Reward"))?;

        let balance = debit_points(&mut tx, &caller.id, reward.points_required).await?;

        let redemption = UserReward {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: caller.id.clone(),
            reward_id: reward.id.clone(),
            points_redeemed: reward.points_required,
            reward_item: reward.name.clone(),
            redeemed_at: now_timestamp(),
        };

        sqlx::query(
            "INSERT INTO user_rewards (id, user_id, reward_id, points_redeemed, reward_item, redeemed_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&redemption.id)
        .bind(&redemption.user_id)
        .bind(&redemption.reward_id)
        .bind(redemption.points_redeemed)
        .bind(&redemption.reward_item)
        .bind(&redemption.redeemed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            user_id = %caller.id,
            reward_id = %reward.id,
            points = reward.points_required,
            balance,
            "Reward redeemed"
        );
        self.publish(Change::scoped(Collection::UserRewards, &caller.id));
        self.publish(Change::scoped(Collection::Profile, &caller.id));

        Ok(redemption)
    }

    pub async fn create_reward(
        &self,
        caller: &Caller,
        req: CreateRewardRequest,
    ) -> Result<Reward, LedgerError> {
        require_reward_manager(caller)?;
        check_reward_fields(&req.name, req.points_required)?;

        let now = now_timestamp();
        let reward = Reward {
            id: uuid::Uuid::new_v4().to_string(),
            name: req.name,
            description: req.description,
            points_required: req.points_required,
            category: req.category.to_string(),
            image_url: req.image_url.filter(|url| !url.trim().is_empty()),
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO rewards (id, name, description, points_required, category, image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reward.id)
        .bind(&reward.name)
        .bind(&reward.description)
        .bind(reward.points_required)
        .bind(&reward.category)
        .bind(&reward.image_url)
        .bind(&reward.created_at)
        .bind(&reward.updated_at)
        .execute(&self.db)
        .await?;

        info!(reward_id = %reward.id, admin_id = %caller.id, "Reward created");
        self.publish(Change::global(Collection::Rewards));

        Ok(reward)
    }

    /// Patch a reward. Existing redemption records keep the cost and name
    /// they were redeemed with.
    pub async fn update_reward(
        &self,
        caller: &Caller,
        reward_id: &str,
        req: UpdateRewardRequest,
    ) -> Result<Reward, LedgerError> {
        require_reward_manager(caller)?;

        let mut tx = self.begin_write().await?;

        let existing = sqlx::query_as::<_, Reward>("SELECT * FROM rewards WHERE id = ?")
            .bind(reward_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound("Reward"))?;

        let name = req.name.unwrap_or(existing.name);
        let points_required = req.points_required.unwrap_or(existing.points_required);
        check_reward_fields(&name, points_required)?;

        let category = req
            .category
            .unwrap_or_else(|| RewardCategory::from(existing.category));
        // An empty string clears the image
        let image_url = match req.image_url {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url),
            None => existing.image_url,
        };

        let reward = sqlx::query_as::<_, Reward>(
            r#"
            UPDATE rewards SET
                name = ?,
                description = ?,
                points_required = ?,
                category = ?,
                image_url = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(req.description.unwrap_or(existing.description))
        .bind(points_required)
        .bind(category.as_str())
        .bind(&image_url)
        .bind(now_timestamp())
        .bind(reward_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(reward_id = %reward_id, admin_id = %caller.id, "Reward updated");
        self.publish(Change::global(Collection::Rewards));

        Ok(reward)
    }

    pub async fn delete_reward(&self, caller: &Caller, reward_id: &str) -> Result<(), LedgerError> {
        require_reward_manager(caller)?;

        let result = sqlx::query("DELETE FROM rewards WHERE id = ?")
            .bind(reward_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound("Reward"));
        }

        info!(reward_id = %reward_id, admin_id = %caller.id, "Reward deleted");
        self.publish(Change::global(Collection::Rewards));

        Ok(())
    }
}
