use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool, QueryBuilder, Row};

use crate::{
    db::EngagementGateway,
    error::{AppError, AppResult},
    models::{
        Film, FilmId, FriendshipEdge, FriendshipStatus, Genre, PopularityFilter, RankedFilm,
        Review, ReviewId, ReviewReaction, User, UserId,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Postgres-backed persistence gateway
///
/// Check-then-act never happens here: every write is a single statement
/// with `ON CONFLICT` semantics, so each primitive is atomic per key.
pub struct PgGateway {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i32,
    email: String,
    login: String,
    name: String,
    birthday: NaiveDate,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.user_id,
            email: row.email,
            login: row.login,
            name: row.name,
            birthday: row.birthday,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FilmRow {
    film_id: i32,
    name: String,
    description: String,
    release_date: NaiveDate,
    duration_minutes: i32,
}

impl FilmRow {
    fn into_film(self, genres: Vec<Genre>) -> Film {
        Film {
            id: self.film_id,
            name: self.name,
            description: self.description,
            release_date: self.release_date,
            duration_minutes: self.duration_minutes,
            genres,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RankedFilmRow {
    film_id: i32,
    name: String,
    description: String,
    release_date: NaiveDate,
    duration_minutes: i32,
    like_count: i64,
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    review_id: i32,
    film_id: i32,
    author_id: i32,
    content: String,
    is_positive: bool,
    useful: i32,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.review_id,
            film_id: row.film_id,
            author_id: row.author_id,
            content: row.content,
            is_positive: row.is_positive,
            useful: row.useful,
        }
    }
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))
    }

    /// Loads the genre lists for the given films, keyed by film id
    async fn load_genres_for(&self, film_ids: &[FilmId]) -> AppResult<HashMap<FilmId, Vec<Genre>>> {
        if film_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT fg.film_id, g.genre_id, g.name
            FROM film_genres fg
            JOIN genres g ON g.genre_id = fg.genre_id
            WHERE fg.film_id = ANY($1)
            ORDER BY g.genre_id
            "#,
        )
        .bind(film_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<FilmId, Vec<Genre>> = HashMap::new();
        for row in rows {
            let film_id: i32 = row.try_get("film_id")?;
            genres.entry(film_id).or_default().push(Genre {
                id: row.try_get("genre_id")?,
                name: row.try_get("name")?,
            });
        }

        Ok(genres)
    }

    async fn ranked_rows_to_films(&self, rows: Vec<RankedFilmRow>) -> AppResult<Vec<RankedFilm>> {
        let ids: Vec<FilmId> = rows.iter().map(|r| r.film_id).collect();
        let mut genres = self.load_genres_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| RankedFilm {
                like_count: row.like_count,
                film: Film {
                    id: row.film_id,
                    name: row.name,
                    description: row.description,
                    release_date: row.release_date,
                    duration_minutes: row.duration_minutes,
                    genres: genres.remove(&row.film_id).unwrap_or_default(),
                },
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl EngagementGateway for PgGateway {
    async fn load_user(&self, id: UserId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, login, name, birthday
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn load_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, login, name, birthday
            FROM users
            WHERE user_id = ANY($1)
            ORDER BY user_id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn load_film(&self, id: FilmId) -> AppResult<Option<Film>> {
        let row = sqlx::query_as::<_, FilmRow>(
            r#"
            SELECT film_id, name, description, release_date, duration_minutes
            FROM films
            WHERE film_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut genres = self.load_genres_for(&[id]).await?;
        Ok(Some(row.into_film(genres.remove(&id).unwrap_or_default())))
    }

    async fn load_review(&self, id: ReviewId) -> AppResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT review_id, film_id, author_id, content, is_positive, useful
            FROM reviews
            WHERE review_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    async fn load_friendship_edge(
        &self,
        owner: UserId,
        friend: UserId,
    ) -> AppResult<Option<FriendshipEdge>> {
        let row = sqlx::query(
            r#"
            SELECT status
            FROM friendships
            WHERE owner_id = $1 AND friend_id = $2
            "#,
        )
        .bind(owner)
        .bind(friend)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                Ok(Some(FriendshipEdge {
                    owner_id: owner,
                    friend_id: friend,
                    status: FriendshipStatus::parse(&status)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save_friendship_edge(
        &self,
        owner: UserId,
        friend: UserId,
        status: FriendshipStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO friendships (owner_id, friend_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, friend_id) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(owner)
        .bind(friend)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_friendship_edge(&self, owner: UserId, friend: UserId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM friendships
            WHERE owner_id = $1 AND friend_id = $2
            "#,
        )
        .bind(owner)
        .bind(friend)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_friend_ids(&self, owner: UserId) -> AppResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT friend_id
            FROM friendships
            WHERE owner_id = $1
            ORDER BY friend_id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn insert_like(&self, film: FilmId, user: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO film_likes (film_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (film_id, user_id) DO NOTHING
            "#,
        )
        .bind(film)
        .bind(user)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_like(&self, film: FilmId, user: UserId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM film_likes
            WHERE film_id = $1 AND user_id = $2
            "#,
        )
        .bind(film)
        .bind(user)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_film_likes(&self, film: FilmId) -> AppResult<HashSet<UserId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT user_id
            FROM film_likes
            WHERE film_id = $1
            "#,
        )
        .bind(film)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn load_user_likes(&self, user: UserId) -> AppResult<HashSet<FilmId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT film_id
            FROM film_likes
            WHERE user_id = $1
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn load_all_user_likes(&self) -> AppResult<HashMap<UserId, HashSet<FilmId>>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, film_id
            FROM film_likes
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut likes: HashMap<UserId, HashSet<FilmId>> = HashMap::new();
        for row in rows {
            let user_id: i32 = row.try_get("user_id")?;
            let film_id: i32 = row.try_get("film_id")?;
            likes.entry(user_id).or_default().insert(film_id);
        }

        Ok(likes)
    }

    async fn load_films_ranked(
        &self,
        filter: PopularityFilter,
        limit: i64,
    ) -> AppResult<Vec<RankedFilm>> {
        let mut query: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT f.film_id, f.name, f.description, f.release_date, f.duration_minutes, \
             COUNT(fl.user_id) AS like_count \
             FROM films f \
             LEFT JOIN film_likes fl ON fl.film_id = f.film_id",
        );

        if let Some(genre_id) = filter.genre_id {
            query.push(" JOIN film_genres fg ON fg.film_id = f.film_id AND fg.genre_id = ");
            query.push_bind(genre_id);
        }

        if let Some(year) = filter.year {
            query.push(" WHERE EXTRACT(YEAR FROM f.release_date)::int = ");
            query.push_bind(year);
        }

        query.push(" GROUP BY f.film_id ORDER BY like_count DESC, f.film_id ASC LIMIT ");
        query.push_bind(limit);

        let rows = query
            .build_query_as::<RankedFilmRow>()
            .fetch_all(&self.pool)
            .await?;

        self.ranked_rows_to_films(rows).await
    }

    async fn load_films_with_counts(&self, ids: &[FilmId]) -> AppResult<Vec<RankedFilm>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, RankedFilmRow>(
            r#"
            SELECT f.film_id, f.name, f.description, f.release_date, f.duration_minutes,
                   COUNT(fl.user_id) AS like_count
            FROM films f
            LEFT JOIN film_likes fl ON fl.film_id = f.film_id
            WHERE f.film_id = ANY($1)
            GROUP BY f.film_id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        self.ranked_rows_to_films(rows).await
    }

    async fn load_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
    ) -> AppResult<Option<ReviewReaction>> {
        let row = sqlx::query(
            r#"
            SELECT is_positive
            FROM review_reactions
            WHERE review_id = $1 AND user_id = $2
            "#,
        )
        .bind(review)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| -> AppResult<ReviewReaction> {
                Ok(ReviewReaction {
                    review_id: review,
                    user_id: user,
                    is_positive: row.try_get("is_positive")?,
                })
            })
            .transpose()?)
    }

    async fn save_review_reaction(
        &self,
        review: ReviewId,
        user: UserId,
        is_positive: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO review_reactions (review_id, user_id, is_positive)
            VALUES ($1, $2, $3)
            ON CONFLICT (review_id, user_id) DO UPDATE SET is_positive = EXCLUDED.is_positive
            "#,
        )
        .bind(review)
        .bind(user)
        .bind(is_positive)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_review_reaction(&self, review: ReviewId, user: UserId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM review_reactions
            WHERE review_id = $1 AND user_id = $2
            "#,
        )
        .bind(review)
        .bind(user)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn persist_useful(&self, review: ReviewId, value: i32) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reviews
            SET useful = $2
            WHERE review_id = $1
            "#,
        )
        .bind(review)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_reviews(&self, film: Option<FilmId>, limit: i64) -> AppResult<Vec<Review>> {
        let rows = match film {
            Some(film_id) => {
                sqlx::query_as::<_, ReviewRow>(
                    r#"
                    SELECT review_id, film_id, author_id, content, is_positive, useful
                    FROM reviews
                    WHERE film_id = $1
                    ORDER BY useful DESC, review_id ASC
                    LIMIT $2
                    "#,
                )
                .bind(film_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ReviewRow>(
                    r#"
                    SELECT review_id, film_id, author_id, content, is_positive, useful
                    FROM reviews
                    ORDER BY useful DESC, review_id ASC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Review::from).collect())
    }
}
