use std::sync::Arc;

use chrono::NaiveDate;
use tokio_test::assert_ok;

use cinegraph::db::{EngagementGateway, MemoryGateway};
use cinegraph::models::{FilmId, Genre, PopularityFilter, User, UserId};
use cinegraph::{EngagementStore, FriendshipGraph, RecommendationEngine, ReviewScoreTracker};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();
}

fn date(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 5, 20).unwrap()
}

struct App {
    gateway: Arc<MemoryGateway>,
    friendships: FriendshipGraph,
    engagement: EngagementStore,
    recommendations: RecommendationEngine,
    reviews: ReviewScoreTracker,
}

impl App {
    fn new() -> Self {
        let gateway = Arc::new(MemoryGateway::new());
        Self {
            friendships: FriendshipGraph::new(gateway.clone()),
            engagement: EngagementStore::new(gateway.clone()),
            recommendations: RecommendationEngine::new(gateway.clone()),
            reviews: ReviewScoreTracker::new(gateway.clone()),
            gateway,
        }
    }

    async fn user(&self, tag: &str) -> User {
        self.gateway
            .create_user(
                &format!("{}@example.com", tag),
                tag,
                tag,
                date(1988),
            )
            .await
    }
}

#[tokio::test]
async fn test_friendship_lifecycle_end_to_end() {
    init_tracing();
    let app = App::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;

    assert_ok!(app.friendships.add_friend(alice.id, bob.id).await);
    assert_ok!(app.friendships.add_friend(carol.id, bob.id).await);
    assert_ok!(app.friendships.add_friend(bob.id, alice.id).await);

    let alices: Vec<UserId> = app
        .friendships
        .get_friends(alice.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(alices, vec![bob.id]);

    // Alice and Carol both point at Bob
    let common: Vec<UserId> = app
        .friendships
        .get_common_friends(alice.id, carol.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(common, vec![bob.id]);

    // Unfriending one side leaves the other side pending, not gone
    assert!(app.friendships.delete_friend(alice.id, bob.id).await.unwrap());
    assert!(app.friendships.get_friends(alice.id).await.unwrap().is_empty());
    let bobs: Vec<UserId> = app
        .friendships
        .get_friends(bob.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(bobs, vec![alice.id]);
}

#[tokio::test]
async fn test_likes_drive_popularity_and_recommendations() {
    init_tracing();
    let app = App::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let scifi = Genre {
        id: 6,
        name: "Science Fiction".to_string(),
    };
    let metropolis = app
        .gateway
        .create_film("Metropolis", date(1927), 153, vec![scifi.clone()])
        .await;
    let alien = app
        .gateway
        .create_film("Alien", date(1979), 117, vec![scifi])
        .await;
    let casablanca = app
        .gateway
        .create_film("Casablanca", date(1942), 102, vec![])
        .await;

    assert_ok!(app.engagement.add_like(metropolis.id, alice.id).await);
    assert_ok!(app.engagement.add_like(alien.id, alice.id).await);
    assert_ok!(app.engagement.add_like(alien.id, bob.id).await);
    assert_ok!(app.engagement.add_like(casablanca.id, bob.id).await);

    let popular: Vec<FilmId> = app
        .engagement
        .get_most_popular(10, PopularityFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.film.id)
        .collect();
    assert_eq!(popular, vec![alien.id, metropolis.id, casablanca.id]);

    let scifi_only: Vec<FilmId> = app
        .engagement
        .get_most_popular(
            10,
            PopularityFilter {
                genre_id: Some(6),
                year: None,
            },
        )
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.film.id)
        .collect();
    assert_eq!(scifi_only, vec![alien.id, metropolis.id]);

    let common: Vec<FilmId> = app
        .engagement
        .get_common_films(alice.id, bob.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.film.id)
        .collect();
    assert_eq!(common, vec![alien.id]);

    // Bob shares Alien with Alice, so she inherits Casablanca and he
    // inherits Metropolis
    let for_alice: Vec<FilmId> = app
        .recommendations
        .recommend(alice.id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(for_alice, vec![casablanca.id]);

    let for_bob: Vec<FilmId> = app
        .recommendations
        .recommend(bob.id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(for_bob, vec![metropolis.id]);
}

#[tokio::test]
async fn test_review_reactions_end_to_end() {
    init_tracing();
    let app = App::new();
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let skeptic = app.user("skeptic").await;

    let film = app
        .gateway
        .create_film("Seven Samurai", date(1954), 207, vec![])
        .await;
    let review = app
        .gateway
        .create_review(film.id, author.id, "still the blueprint", true)
        .await;
    assert_eq!(review.useful, 0);

    let after_up = app
        .reviews
        .add_reaction(review.id, reader.id, true)
        .await
        .unwrap();
    assert_eq!(after_up.useful, 1);

    let after_down = app
        .reviews
        .add_reaction(review.id, skeptic.id, false)
        .await
        .unwrap();
    assert_eq!(after_down.useful, 0);

    // The skeptic comes around: a flip swings the tally by two
    let after_flip = app
        .reviews
        .add_reaction(review.id, skeptic.id, true)
        .await
        .unwrap();
    assert_eq!(after_flip.useful, 2);

    let listed = app.reviews.get_reviews(Some(film.id), 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].useful, 2);

    let after_remove = app
        .reviews
        .remove_reaction(review.id, reader.id, true)
        .await
        .unwrap();
    assert_eq!(after_remove.useful, 1);
}

#[tokio::test]
async fn test_concurrent_reactions_never_lose_updates() {
    init_tracing();
    let app = App::new();
    let author = app.user("author").await;

    let film = app
        .gateway
        .create_film("Rashomon", date(1950), 88, vec![])
        .await;
    let review = app
        .gateway
        .create_review(film.id, author.id, "testimony disagrees", true)
        .await;

    let mut voters = Vec::new();
    for i in 0..20 {
        voters.push(app.user(&format!("voter{}", i)).await);
    }

    let tracker = Arc::new(ReviewScoreTracker::new(app.gateway.clone()));
    let mut tasks = Vec::new();
    for voter in voters {
        let tracker = tracker.clone();
        let review_id = review.id;
        tasks.push(tokio::spawn(async move {
            tracker.add_reaction(review_id, voter.id, true).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = app.gateway.load_review(review.id).await.unwrap().unwrap();
    assert_eq!(stored.useful, 20);
}
