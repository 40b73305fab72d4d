//! Business logic shared by several route groups

pub mod achievements;
pub mod content_stats;
pub mod countries;
pub mod progress;
pub mod taste;
pub mod tmdb;
