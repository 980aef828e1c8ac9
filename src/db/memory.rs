use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::{
    db::EngagementGateway,
    error::AppResult,
    models::{
        Film, FilmId, FriendshipEdge, FriendshipStatus, Genre, PopularityFilter, RankedFilm,
        Review, ReviewId, ReviewReaction, User, UserId,
    },
};

/// In-memory persistence gateway
///
/// Backs the test suite and single-process deployments. Every trait method
/// runs under one lock acquisition, so each primitive is atomic exactly
/// like its single-statement Postgres counterpart.
#[derive(Default)]
pub struct MemoryGateway {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    films: HashMap<FilmId, Film>,
    reviews: HashMap<ReviewId, Review>,
    friendships: HashMap<(UserId, UserId), FriendshipStatus>,
    film_likes: HashMap<FilmId, HashSet<UserId>>,
    reactions: HashMap<(ReviewId, UserId), bool>,
    next_user_id: UserId,
    next_film_id: FilmId,
    next_review_id: ReviewId,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user, assigning the next id from the store's sequence
    pub async fn create_user(
        &self,
        email: &str,
        login: &str,
        name: &str,
        birthday: NaiveDate,
    ) -> User {
        let mut state = self.state.write().await;
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            email: email.to_string(),
            login: login.to_string(),
            name: name.to_string(),
            birthday,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Adds a film to the catalog, assigning the next id from the store's
    /// sequence
    pub async fn create_film(
        &self,
        name: &str,
        release_date: NaiveDate,
        duration_minutes: i32,
        genres: Vec<Genre>,
    ) -> Film {
        let mut state = self.state.write().await;
        state.next_film_id += 1;
        let film = Film {
            id: state.next_film_id,
            name: name.to_string(),
            description: String::new(),
            release_date,
            duration_minutes,
            genres,
        };
        state.films.insert(film.id, film.clone());
        film
    }

    /// Stores a review with a zero usefulness tally
    pub async fn create_review(
        &self,
        film_id: FilmId,
        author_id: UserId,
        content: &str,
        is_positive: bool,
    ) -> Review {
        let mut state = self.state.write().await;
        state.next_review_id += 1;
        let review = Review {
            id: state.next_review_id,
            film_id,
            author_id,
            content: content.to_string(),
            is_positive,
            useful: 0,
        };
        state.reviews.insert(review.id, review.clone());
        review
    }
}

fn rank(films: Vec<RankedFilm>, limit: i64) -> Vec<RankedFilm> {
    let mut films = films;
    films.sort_by(|a, b| {
        b.like_count
            .cmp(&a.like_count)
            .then(a.film.id.cmp(&b.film.id))
    });
    films.truncate(limit.max(0) as usize);
    films
}

#[async_trait::async_trait]
impl EngagementGateway for MemoryGateway {
    async fn load_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn load_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        users.dedup_by_key(|u| u.id);
        Ok(users)
    }

    async fn load_film(&self, id: FilmId) -> AppResult<Option<Film>> {
        Ok(self.state.read().await.films.get(&id).cloned())
    }

    async fn load_review(&self, id: ReviewId) -> AppResult<Option<Review>> {
        Ok(self.state.read().await.reviews.get(&id).cloned())
    }

    async fn load_friendship_edge(
        &self,
        owner: UserId,
        friend: UserId,
    ) -> AppResult<Option<FriendshipEdge>> {
        Ok(self
            .state
            .read()
            .await
            .friendships
            .get(&(owner, friend))
            .map(|status| FriendshipEdge {
                owner_id: owner,
                friend_id: friend,
                status: *status,
            }))
    }

    async fn save_friendship_edge(
        &self,
        owner: UserId,
        friend: UserId,
        status: FriendshipStatus,
    ) -> AppResult<()> {
        self.state
            .write()
            .await
            .friendships
            .insert((owner, friend), status);
        Ok(())
    }

    async fn delete_friendship_edge(&self, owner: UserId, friend: UserId) -> AppResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .friendships
            .remove(&(owner, friend))
            .is_some())
    }

    async fn load_friend_ids(&self, owner: UserId) -> AppResult<Vec<UserId>> {
        let state = self.state.read().await;
        let mut ids: Vec<UserId> = state
            .friendships
            .keys()
            .filter(|(o, _)| *o == owner)
            .map(|(_, f)| *f)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn insert_like(&self, film: FilmId, user: UserId) -> AppResult<()> {
        self.state
            .write()
            .await
            .film_likes
            .entry(film)
            .or_default()
            .insert(user);
        Ok(())
    }

    async fn delete_like(&self, film: FilmId, user: UserId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .film_likes
            .get_mut(&film)
            .map(|likes| likes.remove(&user))
            .unwrap_or(false))
    }

    async fn load_film_likes(&self, film: FilmId) -> AppResult<HashSet<UserId>> {
        Ok(self
            .state
            .read()
            .await
            .film_likes
            .get(&film)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_user_likes(&self, user: UserId) -> AppResult<HashSet<FilmId>> {
        let state = self.state.read().await;
        Ok(state
            .film_likes
            .iter()
            .filter(|(_, likes)| likes.contains(&user))
            .map(|(film, _)| *film)
            .collect())
    }

    async fn load_all_user_likes(&self) -> AppResult<HashMap<UserId, HashSet<FilmId>>> {
        let state = self.state.read().await;
        let mut by_user: HashMap<UserId, HashSet<FilmId>> = HashMap::new();
        for (film, likes) in &state.film_likes {
            for user in likes {
                by_user.entry(*user).or_default().insert(*film);
            }
        }
        Ok(by_user)
    }

    async fn load_films_ranked(
        &self,
        filter: PopularityFilter,
        limit: i64,
    ) -> AppResult<Vec<RankedFilm>> {
        let state = self.state.read().await;
        let films: Vec<RankedFilm> = state
            .films
            .values()
            .filter(|film| match filter.genre_id {
                Some(genre_id) => film.has_genre(genre_id),
                None => true,
            })
            .filter(|film| match filter.year {
                Some(year) => film.release_year() == year,
                None => true,
            })
            .map(|film| RankedFilm {
                film: film.clone(),
                like_count: state
                    .film_likes
                    .get(&film.id)
                    .map(|likes| likes.len() as i64)
                    .unwrap_or(0),
            })
            .collect();

        Ok(rank(films, limit))
    }

    async fn load_films_with_counts(&self, ids: &[FilmId]) -> AppResult<Vec<RankedFilm>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.films.get(id))
            .map(|film| RankedFilm {
                film: film.clone(),
                like_count: state
                    .film_likes
                    .get(&film.id)
                    .map(|likes| likes.len() as i64)
                    .unwrap_or(0),
            })
            .collect())
    }

    async fn load_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
    ) -> AppResult<Option<ReviewReaction>> {
        Ok(self
            .state
            .read()
            .await
            .reactions
            .get(&(review, user))
            .map(|is_positive| ReviewReaction {
                review_id: review,
                user_id: user,
                is_positive: *is_positive,
            }))
    }

    async fn save_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
        is_positive: bool,
    ) -> AppResult<()> {
        self.state
            .write()
            .await
            .reactions
            .insert((review, user), is_positive);
        Ok(())
    }

    async fn delete_review_reaction(&self, review: ReviewId, user: UserId) -> AppResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .reactions
            .remove(&(review, user))
            .is_some())
    }

    async fn persist_useful(&self, review: ReviewId, value: i32) -> AppResult<()> {
        if let Some(stored) = self.state.write().await.reviews.get_mut(&review) {
            stored.useful = value;
        }
        Ok(())
    }

    async fn load_reviews(&self, film: Option<FilmId>, limit: i64) -> AppResult<Vec<Review>> {
        let state = self.state.read().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|review| match film {
                Some(film_id) => review.film_id == film_id,
                None => true,
            })
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.useful.cmp(&a.useful).then(a.id.cmp(&b.id)));
        reviews.truncate(limit.max(0) as usize);
        Ok(reviews)
    }
}
