use std::sync::Arc;

use crate::{
    db::{Cache, CacheKey, EngagementGateway},
    error::{AppError, AppResult},
    models::{FilmId, PopularityFilter, RankedFilm, UserId},
    services::{require_film, require_user},
};

/// Seconds a popularity listing may be served from Redis
const POPULAR_CACHE_TTL: u64 = 30;

/// Per-film like sets with popularity and common-films queries
///
/// Likes are plain `(film, user)` membership facts. Mutations go through
/// atomic storage upserts, so two calls on the same pair can never
/// interleave as a read-modify-write race.
pub struct EngagementStore {
    gateway: Arc<dyn EngagementGateway>,
    cache: Option<Cache>,
}

impl EngagementStore {
    pub fn new(gateway: Arc<dyn EngagementGateway>) -> Self {
        Self {
            gateway,
            cache: None,
        }
    }

    /// Same store, with popularity listings served read-through from Redis
    pub fn with_cache(gateway: Arc<dyn EngagementGateway>, cache: Cache) -> Self {
        Self {
            gateway,
            cache: Some(cache),
        }
    }

    /// Records that `user` likes `film`
    ///
    /// Fails `NotFound` when either is unknown. Liking a film twice is a
    /// no-op, never an error.
    pub async fn add_like(&self, film_id: FilmId, user_id: UserId) -> AppResult<()> {
        require_film(self.gateway.as_ref(), film_id).await?;
        require_user(self.gateway.as_ref(), user_id).await?;

        self.gateway.insert_like(film_id, user_id).await?;

        tracing::info!(film_id = film_id, user_id = user_id, "Like recorded");

        Ok(())
    }

    /// Removes the like of `user` on `film`
    ///
    /// Removing a like that does not exist fails `NotFound`; it is never a
    /// silent no-op.
    pub async fn remove_like(&self, film_id: FilmId, user_id: UserId) -> AppResult<()> {
        require_film(self.gateway.as_ref(), film_id).await?;

        let removed = self.gateway.delete_like(film_id, user_id).await?;
        if !removed {
            tracing::info!(film_id = film_id, user_id = user_id, "Like not found");
            return Err(AppError::NotFound(format!(
                "like of user {} on film {} not found",
                user_id, film_id
            )));
        }

        tracing::info!(film_id = film_id, user_id = user_id, "Like removed");

        Ok(())
    }

    /// Films ranked by like count descending, ties broken by ascending id
    ///
    /// The filter (genre membership, release year) applies before ranking
    /// and before truncation to `count`. Empty when nothing matches.
    pub async fn get_most_popular(
        &self,
        count: i64,
        filter: PopularityFilter,
    ) -> AppResult<Vec<RankedFilm>> {
        let key = CacheKey::MostPopular {
            limit: count,
            filter,
        };

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_from_cache::<Vec<RankedFilm>>(&key).await? {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(cached);
            }
            tracing::debug!(key = %key, "Cache miss");
        }

        let ranked = self.gateway.load_films_ranked(filter, count).await?;

        if let Some(cache) = &self.cache {
            cache.set_in_background(&key, &ranked, POPULAR_CACHE_TTL);
        }

        Ok(ranked)
    }

    /// Films liked by both users, ordered by global like count descending
    /// then id ascending
    pub async fn get_common_films(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> AppResult<Vec<RankedFilm>> {
        require_user(self.gateway.as_ref(), user_a).await?;
        require_user(self.gateway.as_ref(), user_b).await?;

        let likes_a = self.gateway.load_user_likes(user_a).await?;
        let likes_b = self.gateway.load_user_likes(user_b).await?;

        let common: Vec<FilmId> = likes_a.intersection(&likes_b).copied().collect();
        if common.is_empty() {
            return Ok(Vec::new());
        }

        let mut films = self.gateway.load_films_with_counts(&common).await?;
        films.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then(a.film.id.cmp(&b.film.id))
        });

        Ok(films)
    }
}
