//! Live collection feeds.
//!
//! Writers publish a [`Collection`] after committing. Subscribers react by
//! loading a complete [`Snapshot`] of that collection; clients always replace
//! their local copy wholesale, so there is no diffing.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::{
    find_user, list_reports, list_rewards, list_user_rewards, DbPool, ReportResponse,
    RewardResponse, UserResponse,
};
use crate::session::Caller;

/// Collections a client can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Every report
    Reports,
    /// The reward catalog
    Rewards,
    /// The caller's own redemption records
    UserRewards,
    /// The caller's own profile (point balance)
    Profile,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Reports,
        Collection::Rewards,
        Collection::UserRewards,
        Collection::Profile,
    ];

    /// Whether the collection is filtered by the caller's identity
    pub fn is_user_scoped(&self) -> bool {
        matches!(self, Collection::UserRewards | Collection::Profile)
    }
}

/// A change notification. Scoped changes carry the affected user so other
/// subscribers can skip the reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub user_id: Option<String>,
}

impl Change {
    pub fn global(collection: Collection) -> Self {
        Self {
            collection,
            user_id: None,
        }
    }

    pub fn scoped(collection: Collection, user_id: impl Into<String>) -> Self {
        Self {
            collection,
            user_id: Some(user_id.into()),
        }
    }

    /// Whether a subscriber acting as `user_id` must reload after this change
    pub fn concerns(&self, user_id: &str) -> bool {
        match &self.user_id {
            Some(affected) => affected == user_id,
            None => true,
        }
    }
}

/// The full current contents of one collection
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub collection: Collection,
    pub items: serde_json::Value,
}

impl Snapshot {
    pub fn empty(collection: Collection) -> Self {
        Self {
            collection,
            items: serde_json::Value::Array(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.as_array().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct FeedHub {
    changes: broadcast::Sender<Change>,
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self { changes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub fn publish(&self, change: Change) {
        tracing::debug!(collection = ?change.collection, user_id = ?change.user_id, "Collection changed");
        // No subscribers is fine
        let _ = self.changes.send(change);
    }

    /// Current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Load the complete snapshot of `collection` as seen by `caller`.
///
/// Each snapshot comes from a single query, so it never mixes states.
pub async fn load_snapshot(
    db: &DbPool,
    collection: Collection,
    caller: &Caller,
) -> Result<Snapshot, sqlx::Error> {
    let items = match collection {
        Collection::Reports => {
            let reports: Vec<ReportResponse> = list_reports(db)
                .await?
                .into_iter()
                .map(ReportResponse::from)
                .collect();
            to_items(&reports)
        }
        Collection::Rewards => {
            let rewards: Vec<RewardResponse> = list_rewards(db)
                .await?
                .into_iter()
                .map(RewardResponse::from)
                .collect();
            to_items(&rewards)
        }
        Collection::UserRewards => to_items(&list_user_rewards(db, &caller.id).await?),
        Collection::Profile => {
            let profile: Vec<UserResponse> = find_user(db, &caller.id)
                .await?
                .into_iter()
                .map(UserResponse::from)
                .collect();
            to_items(&profile)
        }
    };

    Ok(Snapshot { collection, items })
}

fn to_items<T: Serialize>(items: &[T]) -> serde_json::Value {
    serde_json::to_value(items).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize snapshot");
        serde_json::Value::Array(Vec::new())
    })
}
