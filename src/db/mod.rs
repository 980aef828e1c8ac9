/// Persistence gateway abstraction
///
/// This module provides a pluggable storage backend for the engagement core.
/// Services depend only on this trait; `PgGateway` backs production and
/// `MemoryGateway` backs tests and lightweight deployments. Every method is
/// a single load/save primitive so that backends can make each one atomic.
use std::collections::{HashMap, HashSet};

use crate::{
    error::AppResult,
    models::{
        Film, FilmId, FriendshipEdge, FriendshipStatus, PopularityFilter, RankedFilm, Review,
        ReviewId, ReviewReaction, User, UserId,
    },
};

pub mod cache;
pub mod memory;
pub mod postgres;

pub use cache::{create_redis_client, Cache, CacheKey};
pub use memory::MemoryGateway;
pub use postgres::{create_pool, PgGateway};

/// Load/save primitives required from durable storage
///
/// Identity generation belongs to implementations of this trait (database
/// sequences, counters behind the store lock), never to the services above.
/// Upsert-style methods must be atomic per key so that the storage layer
/// never interleaves a check with a write.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EngagementGateway: Send + Sync {
    // Entity lookups

    /// Loads a user by id, `None` when absent
    async fn load_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Loads the users for the given ids, skipping unknown ids
    async fn load_users(&self, ids: &[UserId]) -> AppResult<Vec<User>>;

    /// Loads a film by id, `None` when absent
    async fn load_film(&self, id: FilmId) -> AppResult<Option<Film>>;

    /// Loads a review by id, `None` when absent
    async fn load_review(&self, id: ReviewId) -> AppResult<Option<Review>>;

    // Friendship edges

    /// Loads the directed edge `owner -> friend`, `None` when absent
    async fn load_friendship_edge(
        &self,
        owner: UserId,
        friend: UserId,
    ) -> AppResult<Option<FriendshipEdge>>;

    /// Inserts or updates the directed edge `owner -> friend`
    async fn save_friendship_edge(
        &self,
        owner: UserId,
        friend: UserId,
        status: FriendshipStatus,
    ) -> AppResult<()>;

    /// Deletes the directed edge `owner -> friend`, returning whether a row
    /// was removed
    async fn delete_friendship_edge(&self, owner: UserId, friend: UserId) -> AppResult<bool>;

    /// Ids of all users `owner` holds an edge to, any status
    async fn load_friend_ids(&self, owner: UserId) -> AppResult<Vec<UserId>>;

    // Likes

    /// Records a like; inserting an already-present like is a no-op
    async fn insert_like(&self, film: FilmId, user: UserId) -> AppResult<()>;

    /// Deletes a like, returning whether a row was removed
    async fn delete_like(&self, film: FilmId, user: UserId) -> AppResult<bool>;

    /// Ids of all users that like the film
    async fn load_film_likes(&self, film: FilmId) -> AppResult<HashSet<UserId>>;

    /// Ids of all films the user likes
    async fn load_user_likes(&self, user: UserId) -> AppResult<HashSet<FilmId>>;

    /// Like sets of every user that has at least one like
    async fn load_all_user_likes(&self) -> AppResult<HashMap<UserId, HashSet<FilmId>>>;

    /// Films matching the filter, ranked by like count descending with ties
    /// broken by ascending film id, truncated to `limit`
    async fn load_films_ranked(
        &self,
        filter: PopularityFilter,
        limit: i64,
    ) -> AppResult<Vec<RankedFilm>>;

    /// The given films joined with their like counts, in no defined order
    async fn load_films_with_counts(&self, ids: &[FilmId]) -> AppResult<Vec<RankedFilm>>;

    // Review reactions

    /// Loads the reaction of `user` on `review`, `None` when absent
    async fn load_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
    ) -> AppResult<Option<ReviewReaction>>;

    /// Inserts or replaces the reaction of `user` on `review`
    async fn save_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
        is_positive: bool,
    ) -> AppResult<()>;

    /// Deletes the reaction of `user` on `review`, returning whether a row
    /// was removed
    async fn delete_review_reaction(&self, review: ReviewId, user: UserId) -> AppResult<bool>;

    /// Writes the cached usefulness tally of a review
    async fn persist_useful(&self, review: ReviewId, value: i32) -> AppResult<()>;

    /// Reviews for one film, or across all films when `film` is `None`,
    /// ordered by usefulness descending then id ascending, truncated to
    /// `limit`
    async fn load_reviews(&self, film: Option<FilmId>, limit: i64) -> AppResult<Vec<Review>>;
}
