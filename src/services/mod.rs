use crate::{
    db::EngagementGateway,
    error::{AppError, AppResult},
    models::{Film, FilmId, Review, ReviewId, User, UserId},
};

pub mod engagement;
pub mod friendship;
pub mod keyed_lock;
pub mod recommendations;
pub mod reviews;

pub use engagement::EngagementStore;
pub use friendship::FriendshipGraph;
pub use keyed_lock::KeyedMutex;
pub use recommendations::RecommendationEngine;
pub use reviews::ReviewScoreTracker;

/// Loads a user or fails with a typed not-found error
pub(crate) async fn require_user(gateway: &dyn EngagementGateway, id: UserId) -> AppResult<User> {
    gateway.load_user(id).await?.ok_or_else(|| {
        tracing::info!(user_id = id, "User not found");
        AppError::NotFound(format!("user with id {} not found", id))
    })
}

/// Loads a film or fails with a typed not-found error
pub(crate) async fn require_film(gateway: &dyn EngagementGateway, id: FilmId) -> AppResult<Film> {
    gateway.load_film(id).await?.ok_or_else(|| {
        tracing::info!(film_id = id, "Film not found");
        AppError::NotFound(format!("film with id {} not found", id))
    })
}

/// Loads a review or fails with a typed not-found error
pub(crate) async fn require_review(
    gateway: &dyn EngagementGateway,
    id: ReviewId,
) -> AppResult<Review> {
    gateway.load_review(id).await?.ok_or_else(|| {
        tracing::info!(review_id = id, "Review not found");
        AppError::NotFound(format!("review with id {} not found", id))
    })
}
