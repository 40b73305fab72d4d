//! HTTP route groups, one module per resource

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod buildinfo;
pub mod content;
pub mod critics;
pub mod expectations;
pub mod gamification;
pub mod health;
pub mod hero;
pub mod recommendations;
pub mod reviews;
pub mod users;

pub use health::health_routes;

/// Apply a default and clamp a `limit` query value to `1..=max`
pub fn clamp_limit(raw: Option<i64>, default: i64, max: i64) -> i64 {
    raw.unwrap_or(default).clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(0), 20, 100), 1);
        assert_eq!(clamp_limit(Some(-5), 20, 100), 1);
        assert_eq!(clamp_limit(Some(1000), 20, 100), 100);
    }
}
