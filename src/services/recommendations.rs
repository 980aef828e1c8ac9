use std::sync::Arc;

use crate::{
    db::{Cache, CacheKey, EngagementGateway},
    error::AppResult,
    models::{Film, FilmId, UserId},
    services::require_user,
};

/// Seconds a recommendation listing may be served from Redis
const RECOMMEND_CACHE_TTL: u64 = 60;

/// Nearest-neighbor-by-overlap collaborative filter
///
/// A single neighbor is selected per call: the user sharing the most liked
/// films with the target. Recommendations are the neighbor's likes the
/// target has not liked yet. No weighting, no blending of candidates.
pub struct RecommendationEngine {
    gateway: Arc<dyn EngagementGateway>,
    cache: Option<Cache>,
}

impl RecommendationEngine {
    pub fn new(gateway: Arc<dyn EngagementGateway>) -> Self {
        Self {
            gateway,
            cache: None,
        }
    }

    /// Same engine, with listings served read-through from Redis
    pub fn with_cache(gateway: Arc<dyn EngagementGateway>, cache: Cache) -> Self {
        Self {
            gateway,
            cache: Some(cache),
        }
    }

    /// Recommends films for `user_id`, ordered by ascending film id
    ///
    /// Scans every other user's like set and keeps the one with the largest
    /// overlap, ties broken by smallest user id. A best overlap of zero
    /// means no taste signal at all, which yields an empty list rather than
    /// a fallback ranking.
    pub async fn recommend(&self, user_id: UserId) -> AppResult<Vec<Film>> {
        require_user(self.gateway.as_ref(), user_id).await?;

        let key = CacheKey::Recommendations(user_id);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_from_cache::<Vec<Film>>(&key).await? {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(cached);
            }
            tracing::debug!(key = %key, "Cache miss");
        }

        let all_likes = self.gateway.load_all_user_likes().await?;
        let target_likes = all_likes.get(&user_id).cloned().unwrap_or_default();

        let mut best: Option<(usize, UserId)> = None;
        for (&candidate, likes) in &all_likes {
            if candidate == user_id {
                continue;
            }

            let overlap = likes.intersection(&target_likes).count();
            if overlap == 0 {
                continue;
            }

            let replace = match best {
                None => true,
                Some((best_overlap, best_id)) => {
                    overlap > best_overlap || (overlap == best_overlap && candidate < best_id)
                }
            };
            if replace {
                best = Some((overlap, candidate));
            }
        }

        let Some((overlap, neighbor)) = best else {
            tracing::info!(user_id = user_id, "No like overlap with any user");
            return Ok(Vec::new());
        };

        let neighbor_likes = &all_likes[&neighbor];
        let mut film_ids: Vec<FilmId> = neighbor_likes
            .difference(&target_likes)
            .copied()
            .collect();
        film_ids.sort_unstable();

        let mut films: Vec<Film> = self
            .gateway
            .load_films_with_counts(&film_ids)
            .await?
            .into_iter()
            .map(|ranked| ranked.film)
            .collect();
        films.sort_by_key(|film| film.id);

        tracing::info!(
            user_id = user_id,
            neighbor_id = neighbor,
            overlap = overlap,
            recommended = films.len(),
            "Recommendations computed"
        );

        if let Some(cache) = &self.cache {
            cache.set_in_background(&key, &films, RECOMMEND_CACHE_TTL);
        }

        Ok(films)
    }
}
