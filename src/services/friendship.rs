use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::EngagementGateway,
    error::{AppError, AppResult},
    models::{FriendshipStatus, User, UserId},
    services::{keyed_lock::KeyedMutex, require_user},
};

/// Directed friendship graph with reciprocal confirmation
///
/// Edges are owner-specific records: A holding an edge to B says nothing
/// about B. An edge becomes `Confirmed` only while both directions exist;
/// deleting one side demotes the survivor back to `Pending`.
pub struct FriendshipGraph {
    gateway: Arc<dyn EngagementGateway>,
    pair_locks: KeyedMutex<(UserId, UserId)>,
}

/// Normalized key for the unordered pair, so both directions contend on
/// the same mutex
fn pair_key(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl FriendshipGraph {
    pub fn new(gateway: Arc<dyn EngagementGateway>) -> Self {
        Self {
            gateway,
            pair_locks: KeyedMutex::new(),
        }
    }

    /// Creates the edge `user -> friend`
    ///
    /// Fails `NotFound` when either user is unknown and `Conflict` when the
    /// edge already exists. A pre-existing reciprocal edge promotes both
    /// directions to `Confirmed`.
    pub async fn add_friend(&self, user_id: UserId, friend_id: UserId) -> AppResult<()> {
        require_user(self.gateway.as_ref(), user_id).await?;
        require_user(self.gateway.as_ref(), friend_id).await?;

        let _guard = self.pair_locks.lock(pair_key(user_id, friend_id)).await;

        if self
            .gateway
            .load_friendship_edge(user_id, friend_id)
            .await?
            .is_some()
        {
            tracing::info!(
                user_id = user_id,
                friend_id = friend_id,
                "Friend already added"
            );
            return Err(AppError::Conflict(format!(
                "user {} has already added user {} as a friend",
                user_id, friend_id
            )));
        }

        let reciprocal = self
            .gateway
            .load_friendship_edge(friend_id, user_id)
            .await?;

        let status = if reciprocal.is_some() {
            // Both directions now exist, confirm the reciprocal in place
            self.gateway
                .save_friendship_edge(friend_id, user_id, FriendshipStatus::Confirmed)
                .await?;
            FriendshipStatus::Confirmed
        } else {
            FriendshipStatus::Pending
        };

        self.gateway
            .save_friendship_edge(user_id, friend_id, status)
            .await?;

        tracing::info!(
            user_id = user_id,
            friend_id = friend_id,
            status = status.as_str(),
            "Friendship edge created"
        );

        Ok(())
    }

    /// Removes the edge `user -> friend`, returning whether it existed
    ///
    /// A surviving reciprocal edge is demoted to `Pending` rather than
    /// removed: the reverse relationship continues as a one-directional,
    /// unconfirmed friendship.
    pub async fn delete_friend(&self, user_id: UserId, friend_id: UserId) -> AppResult<bool> {
        require_user(self.gateway.as_ref(), user_id).await?;
        require_user(self.gateway.as_ref(), friend_id).await?;

        let _guard = self.pair_locks.lock(pair_key(user_id, friend_id)).await;

        let reciprocal = self
            .gateway
            .load_friendship_edge(friend_id, user_id)
            .await?;
        if reciprocal.is_some() {
            self.gateway
                .save_friendship_edge(friend_id, user_id, FriendshipStatus::Pending)
                .await?;
        }

        let removed = self
            .gateway
            .delete_friendship_edge(user_id, friend_id)
            .await?;

        tracing::info!(
            user_id = user_id,
            friend_id = friend_id,
            removed = removed,
            "Friendship edge deleted"
        );

        Ok(removed)
    }

    /// All users the subject holds an edge to, regardless of status,
    /// ordered by id ascending
    pub async fn get_friends(&self, user_id: UserId) -> AppResult<Vec<User>> {
        require_user(self.gateway.as_ref(), user_id).await?;

        let friend_ids = self.gateway.load_friend_ids(user_id).await?;
        self.gateway.load_users(&friend_ids).await
    }

    /// Users both subjects hold an edge to, ordered by id ascending
    pub async fn get_common_friends(&self, user_a: UserId, user_b: UserId) -> AppResult<Vec<User>> {
        require_user(self.gateway.as_ref(), user_a).await?;
        require_user(self.gateway.as_ref(), user_b).await?;

        let friends_of_b: HashSet<UserId> =
            self.gateway.load_friend_ids(user_b).await?.into_iter().collect();

        let common: Vec<UserId> = self
            .gateway
            .load_friend_ids(user_a)
            .await?
            .into_iter()
            .filter(|id| friends_of_b.contains(id))
            .collect();

        if common.is_empty() {
            return Ok(Vec::new());
        }

        self.gateway.load_users(&common).await
    }
}
