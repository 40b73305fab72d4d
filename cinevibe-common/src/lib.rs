//! # CineVibe Common Library
//!
//! Shared code for the CineVibe review aggregation backend:
//! - Database initialization and schema self-healing
//! - Domain enums (content type, roles, levels, votes)
//! - Analytics event types and the EventBus
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use events::{AnalyticsEvent, EventBus};
pub use models::{ContentType, UserLevel, UserRole, VoteType};
