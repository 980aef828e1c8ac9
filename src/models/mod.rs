use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub type UserId = i32;
pub type FilmId = i32;
pub type ReviewId = i32;
pub type GenreId = i32;

/// A registered user of the catalog
///
/// Flat record: friendships live in their own relation keyed by
/// `(owner_id, friend_id)`, never embedded here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: NaiveDate,
}

/// Confirmation state of a directed friendship edge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    /// Only this direction exists
    Pending,
    /// A reciprocal edge existed at last mutation
    Confirmed,
}

impl FriendshipStatus {
    /// Storage representation used by the TEXT column in Postgres
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Confirmed => "confirmed",
        }
    }

    /// Parses the storage representation back into a status.
    ///
    /// An unrecognized value means the stored row is inconsistent, which
    /// surfaces as an internal error rather than a panic.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(FriendshipStatus::Pending),
            "confirmed" => Ok(FriendshipStatus::Confirmed),
            other => Err(AppError::Internal(format!(
                "invalid friendship status in storage: {}",
                other
            ))),
        }
    }
}

/// A directed friendship record owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendshipEdge {
    pub owner_id: UserId,
    pub friend_id: UserId,
    pub status: FriendshipStatus,
}

/// Film genre reference data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

/// A film in the catalog
///
/// Like membership is stored in its own relation `(film_id, user_id)` and
/// loaded through the gateway, not carried on the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Film {
    pub id: FilmId,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration_minutes: i32,
    pub genres: Vec<Genre>,
}

impl Film {
    /// Release year, the unit of the popularity year filter
    pub fn release_year(&self) -> i32 {
        use chrono::Datelike;
        self.release_date.year()
    }

    /// Whether the film carries the given genre
    pub fn has_genre(&self, genre_id: GenreId) -> bool {
        self.genres.iter().any(|g| g.id == genre_id)
    }
}

/// A film joined with its global like tally, the unit of ranked listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedFilm {
    pub film: Film,
    pub like_count: i64,
}

/// Optional constraints applied before popularity ranking and truncation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PopularityFilter {
    pub genre_id: Option<GenreId>,
    pub year: Option<i32>,
}

/// A user's review of a film
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub id: ReviewId,
    pub film_id: FilmId,
    pub author_id: UserId,
    pub content: String,
    pub is_positive: bool,
    /// Net tally of reactions: +1 per positive, -1 per negative. Cached
    /// derived value; only reaction operations may move it.
    pub useful: i32,
}

impl Review {
    /// Applies a positive reaction to the usefulness tally.
    ///
    /// `replacing` marks a polarity flip, which cancels the old negative
    /// contribution and applies the new positive one in a single step.
    pub fn increase_useful(&mut self, replacing: bool) {
        self.useful += if replacing { 2 } else { 1 };
    }

    /// Applies a negative reaction to the usefulness tally.
    pub fn decrease_useful(&mut self, replacing: bool) {
        self.useful -= if replacing { 2 } else { 1 };
    }
}

/// A user's single current positive/negative vote on a review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewReaction {
    pub review_id: ReviewId,
    pub user_id: UserId,
    pub is_positive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_film(id: FilmId, year: i32, genres: Vec<Genre>) -> Film {
        Film {
            id,
            name: format!("Film {}", id),
            description: String::new(),
            release_date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
            duration_minutes: 120,
            genres,
        }
    }

    #[test]
    fn test_friendship_status_round_trip() {
        for status in [FriendshipStatus::Pending, FriendshipStatus::Confirmed] {
            assert_eq!(FriendshipStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_friendship_status_rejects_garbage() {
        let err = FriendshipStatus::parse("friendly").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_film_release_year() {
        let film = test_film(1, 1999, vec![]);
        assert_eq!(film.release_year(), 1999);
    }

    #[test]
    fn test_film_has_genre() {
        let drama = Genre {
            id: 2,
            name: "Drama".to_string(),
        };
        let film = test_film(1, 2005, vec![drama]);
        assert!(film.has_genre(2));
        assert!(!film.has_genre(3));
    }

    #[test]
    fn test_useful_adjustments() {
        let mut review = Review {
            id: 1,
            film_id: 1,
            author_id: 1,
            content: "worth watching".to_string(),
            is_positive: true,
            useful: 0,
        };

        review.increase_useful(false);
        assert_eq!(review.useful, 1);

        // Polarity flip cancels the +1 and applies -1 in one step
        review.decrease_useful(true);
        assert_eq!(review.useful, -1);

        review.increase_useful(true);
        assert_eq!(review.useful, 1);

        review.decrease_useful(false);
        assert_eq!(review.useful, 0);
    }
}
