use std::sync::Arc;

use crate::{
    db::EngagementGateway,
    error::{AppError, AppResult},
    models::{FilmId, Review, ReviewId, UserId},
    services::{keyed_lock::KeyedMutex, require_film, require_review, require_user},
};

/// Per-review reaction ledger and the derived usefulness tally
///
/// Each user holds at most one reaction per review; a second vote either
/// conflicts (same polarity) or replaces the first (opposite polarity).
/// `useful` is always the net tally of currently recorded reactions and is
/// only ever written here.
pub struct ReviewScoreTracker {
    gateway: Arc<dyn EngagementGateway>,
    review_locks: KeyedMutex<ReviewId>,
}

impl ReviewScoreTracker {
    pub fn new(gateway: Arc<dyn EngagementGateway>) -> Self {
        Self {
            gateway,
            review_locks: KeyedMutex::new(),
        }
    }

    /// Records or replaces the reaction of `user` on `review`
    ///
    /// First vote moves `useful` by one. A repeat vote with the same
    /// polarity fails `Conflict` without touching state. A polarity flip
    /// moves `useful` by two, cancelling the old contribution and applying
    /// the new one.
    pub async fn add_reaction(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        is_positive: bool,
    ) -> AppResult<Review> {
        require_user(self.gateway.as_ref(), user_id).await?;

        // Locking the review serializes the reaction lookup with the tally
        // write, for every user voting on it
        let _guard = self.review_locks.lock(review_id).await;

        let mut review = require_review(self.gateway.as_ref(), review_id).await?;
        let existing = self
            .gateway
            .load_review_reaction(review_id, user_id)
            .await?;

        let replacing = match existing {
            None => false,
            Some(reaction) if reaction.is_positive == is_positive => {
                tracing::info!(
                    review_id = review_id,
                    user_id = user_id,
                    "Duplicate reaction rejected"
                );
                return Err(AppError::Conflict(format!(
                    "user {} has already reacted to review {} this way",
                    user_id, review_id
                )));
            }
            Some(_) => true,
        };

        if is_positive {
            review.increase_useful(replacing);
        } else {
            review.decrease_useful(replacing);
        }

        self.gateway
            .save_review_reaction(review_id, user_id, is_positive)
            .await?;
        self.gateway.persist_useful(review_id, review.useful).await?;

        tracing::info!(
            review_id = review_id,
            user_id = user_id,
            is_positive = is_positive,
            replacing = replacing,
            useful = review.useful,
            "Reaction recorded"
        );

        Ok(review)
    }

    /// Deletes the reaction of `user` on `review`
    ///
    /// The caller states the polarity it believes it is removing; a
    /// mismatch with the stored reaction fails `Conflict`. Success applies
    /// the inverse single-step adjustment to `useful`.
    pub async fn remove_reaction(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        expected_is_positive: bool,
    ) -> AppResult<Review> {
        require_user(self.gateway.as_ref(), user_id).await?;

        let _guard = self.review_locks.lock(review_id).await;

        let mut review = require_review(self.gateway.as_ref(), review_id).await?;
        let reaction = self
            .gateway
            .load_review_reaction(review_id, user_id)
            .await?
            .ok_or_else(|| {
                tracing::info!(
                    review_id = review_id,
                    user_id = user_id,
                    "Reaction not found"
                );
                AppError::NotFound(format!(
                    "reaction of user {} on review {} not found",
                    user_id, review_id
                ))
            })?;

        if reaction.is_positive != expected_is_positive {
            tracing::info!(
                review_id = review_id,
                user_id = user_id,
                "Reaction polarity mismatch"
            );
            return Err(AppError::Conflict(format!(
                "review {} has no such reaction from user {}",
                review_id, user_id
            )));
        }

        if expected_is_positive {
            review.decrease_useful(false);
        } else {
            review.increase_useful(false);
        }

        self.gateway
            .delete_review_reaction(review_id, user_id)
            .await?;
        self.gateway.persist_useful(review_id, review.useful).await?;

        tracing::info!(
            review_id = review_id,
            user_id = user_id,
            useful = review.useful,
            "Reaction removed"
        );

        Ok(review)
    }

    /// Reviews for one film, or across the whole catalog when `film_id` is
    /// `None`, ordered by usefulness descending then id ascending
    pub async fn get_reviews(
        &self,
        film_id: Option<FilmId>,
        count: i64,
    ) -> AppResult<Vec<Review>> {
        if let Some(id) = film_id {
            require_film(self.gateway.as_ref(), id).await?;
        }

        self.gateway.load_reviews(film_id, count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryGateway;
    use crate::models::User;
    use chrono::NaiveDate;

    fn date(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 11, 2).unwrap()
    }

    struct Fixture {
        gateway: Arc<MemoryGateway>,
        tracker: ReviewScoreTracker,
        users: Vec<User>,
        review_id: ReviewId,
        film_id: FilmId,
    }

    async fn setup(user_count: usize) -> Fixture {
        let gateway = Arc::new(MemoryGateway::new());
        let mut users = Vec::new();
        for i in 0..user_count {
            users.push(
                gateway
                    .create_user(
                        &format!("user{}@example.com", i),
                        &format!("user{}", i),
                        &format!("User {}", i),
                        date(1985),
                    )
                    .await,
            );
        }
        let film = gateway.create_film("Ran", date(1985), 162, vec![]).await;
        let review = gateway
            .create_review(film.id, users[0].id, "a late masterpiece", true)
            .await;
        let tracker = ReviewScoreTracker::new(gateway.clone());
        Fixture {
            gateway,
            tracker,
            users,
            review_id: review.id,
            film_id: film.id,
        }
    }

    async fn stored_useful(fixture: &Fixture) -> i32 {
        fixture
            .gateway
            .load_review(fixture.review_id)
            .await
            .unwrap()
            .unwrap()
            .useful
    }

    #[tokio::test]
    async fn test_useful_walk_through_flip_and_removal() {
        let fixture = setup(1).await;
        let user = fixture.users[0].id;

        assert_eq!(stored_useful(&fixture).await, 0);

        let review = fixture
            .tracker
            .add_reaction(fixture.review_id, user, true)
            .await
            .unwrap();
        assert_eq!(review.useful, 1);
        assert_eq!(stored_useful(&fixture).await, 1);

        // Polarity flip swings the tally by two
        let review = fixture
            .tracker
            .add_reaction(fixture.review_id, user, false)
            .await
            .unwrap();
        assert_eq!(review.useful, -1);
        assert_eq!(stored_useful(&fixture).await, -1);

        let review = fixture
            .tracker
            .remove_reaction(fixture.review_id, user, false)
            .await
            .unwrap();
        assert_eq!(review.useful, 0);
        assert_eq!(stored_useful(&fixture).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_polarity_conflicts_without_state_change() {
        let fixture = setup(1).await;
        let user = fixture.users[0].id;

        fixture
            .tracker
            .add_reaction(fixture.review_id, user, true)
            .await
            .unwrap();

        let err = fixture
            .tracker
            .add_reaction(fixture.review_id, user, true)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(stored_useful(&fixture).await, 1);

        // Still exactly one stored reaction for the pair
        let reaction = fixture
            .gateway
            .load_review_reaction(fixture.review_id, user)
            .await
            .unwrap()
            .unwrap();
        assert!(reaction.is_positive);
    }

    #[tokio::test]
    async fn test_reactions_from_distinct_users_accumulate() {
        let fixture = setup(3).await;

        for user in &fixture.users {
            fixture
                .tracker
                .add_reaction(fixture.review_id, user.id, true)
                .await
                .unwrap();
        }
        assert_eq!(stored_useful(&fixture).await, 3);

        fixture
            .tracker
            .remove_reaction(fixture.review_id, fixture.users[1].id, true)
            .await
            .unwrap();
        assert_eq!(stored_useful(&fixture).await, 2);
    }

    #[tokio::test]
    async fn test_remove_mismatched_polarity_conflicts() {
        let fixture = setup(1).await;
        let user = fixture.users[0].id;

        fixture
            .tracker
            .add_reaction(fixture.review_id, user, false)
            .await
            .unwrap();

        let err = fixture
            .tracker
            .remove_reaction(fixture.review_id, user, true)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(stored_useful(&fixture).await, -1);
    }

    #[tokio::test]
    async fn test_remove_missing_reaction_is_not_found() {
        let fixture = setup(1).await;
        let err = fixture
            .tracker
            .remove_reaction(fixture.review_id, fixture.users[0].id, true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_review_or_user_is_not_found() {
        let fixture = setup(1).await;
        let user = fixture.users[0].id;

        assert!(fixture
            .tracker
            .add_reaction(999, user, true)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(fixture
            .tracker
            .add_reaction(fixture.review_id, 999, true)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_reviews_listed_by_usefulness() {
        let fixture = setup(3).await;
        let author = fixture.users[0].id;

        let second = fixture
            .gateway
            .create_review(fixture.film_id, author, "overrated", false)
            .await;
        let third = fixture
            .gateway
            .create_review(fixture.film_id, author, "fine", true)
            .await;

        // second gets two upvotes, third one, the fixture review none
        for user in &fixture.users[1..] {
            fixture
                .tracker
                .add_reaction(second.id, user.id, true)
                .await
                .unwrap();
        }
        fixture
            .tracker
            .add_reaction(third.id, fixture.users[1].id, true)
            .await
            .unwrap();

        let reviews = fixture
            .tracker
            .get_reviews(Some(fixture.film_id), 10)
            .await
            .unwrap();
        let ids: Vec<ReviewId> = reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, third.id, fixture.review_id]);

        let top_two = fixture
            .tracker
            .get_reviews(None, 2)
            .await
            .unwrap();
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[0].id, second.id);
    }

    #[tokio::test]
    async fn test_reviews_for_unknown_film_is_not_found() {
        let fixture = setup(1).await;
        let err = fixture.tracker.get_reviews(Some(999), 10).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
