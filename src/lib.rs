//! Engagement core for a film catalog service.
//!
//! Four components sit on top of the catalog: a directed friendship graph
//! with reciprocal confirmation, a like store with popularity rankings, a
//! nearest-neighbor recommendation engine, and a review usefulness tracker.
//! All durable state flows through the [`db::EngagementGateway`] trait;
//! request routing and catalog CRUD live in the consuming service.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::{EngagementStore, FriendshipGraph, RecommendationEngine, ReviewScoreTracker};
