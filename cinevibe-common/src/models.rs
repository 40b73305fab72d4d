//! Domain enums stored as TEXT columns
//!
//! The database keeps the upper-case wire names (`MOVIE`, `CRITIC`, ...).
//! Parsing is case-insensitive so query strings like `?type=movie` work.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kind of aggregated title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Movie,
    TvSeries,
    Game,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [ContentType::Movie, ContentType::TvSeries, ContentType::Game];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "MOVIE",
            ContentType::TvSeries => "TV_SERIES",
            ContentType::Game => "GAME",
        }
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOVIE" => Ok(ContentType::Movie),
            "TV_SERIES" | "SERIES" | "TV" => Ok(ContentType::TvSeries),
            "GAME" => Ok(ContentType::Game),
            other => Err(Error::InvalidInput(format!("Unknown content type: {}", other))),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Critic,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Critic => "CRITIC",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "CRITIC" => Ok(UserRole::Critic),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reputation tier stored in `users.level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserLevel {
    Novice,
    Enthusiast,
    Expert,
    Legend,
}

impl UserLevel {
    /// Tier for an accumulated reputation score
    pub fn for_reputation(reputation: i64) -> Self {
        if reputation >= 1000 {
            UserLevel::Legend
        } else if reputation >= 500 {
            UserLevel::Expert
        } else if reputation >= 100 {
            UserLevel::Enthusiast
        } else {
            UserLevel::Novice
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserLevel::Novice => "NOVICE",
            UserLevel::Enthusiast => "ENTHUSIAST",
            UserLevel::Expert => "EXPERT",
            UserLevel::Legend => "LEGEND",
        }
    }

    /// Human readable name
    pub fn title(&self) -> &'static str {
        match self {
            UserLevel::Novice => "Novice",
            UserLevel::Enthusiast => "Enthusiast",
            UserLevel::Expert => "Expert",
            UserLevel::Legend => "Legend",
        }
    }

    /// Reputation needed to reach the next tier
    pub fn next_threshold(&self) -> i64 {
        match self {
            UserLevel::Novice => 100,
            UserLevel::Enthusiast => 500,
            UserLevel::Expert => 1000,
            UserLevel::Legend => 5000,
        }
    }
}

/// Review vote direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Like,
    Dislike,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Like => "LIKE",
            VoteType::Dislike => "DISLIKE",
        }
    }
}

impl FromStr for VoteType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(VoteType::Like),
            "DISLIKE" => Ok(VoteType::Dislike),
            _ => Err(Error::InvalidInput("Invalid vote type".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parsing_is_case_insensitive() {
        assert_eq!("movie".parse::<ContentType>().unwrap(), ContentType::Movie);
        assert_eq!("TV_SERIES".parse::<ContentType>().unwrap(), ContentType::TvSeries);
        assert_eq!("series".parse::<ContentType>().unwrap(), ContentType::TvSeries);
        assert!("podcast".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_content_type_serde_uses_wire_names() {
        let json = serde_json::to_string(&ContentType::TvSeries).unwrap();
        assert_eq!(json, "\"TV_SERIES\"");
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(UserLevel::for_reputation(0), UserLevel::Novice);
        assert_eq!(UserLevel::for_reputation(99), UserLevel::Novice);
        assert_eq!(UserLevel::for_reputation(100), UserLevel::Enthusiast);
        assert_eq!(UserLevel::for_reputation(500), UserLevel::Expert);
        assert_eq!(UserLevel::for_reputation(1000), UserLevel::Legend);
    }

    #[test]
    fn test_vote_type_is_strict() {
        assert_eq!("LIKE".parse::<VoteType>().unwrap(), VoteType::Like);
        assert!("like".parse::<VoteType>().is_err());
        assert!("MEH".parse::<VoteType>().is_err());
    }
}
