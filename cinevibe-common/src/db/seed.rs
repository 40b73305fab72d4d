//! Seed data applied on every startup

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// One row of the built-in achievement catalog
#[derive(Debug, Clone, Copy)]
pub struct AchievementSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub icon_name: &'static str,
    pub xp_reward: i64,
    pub category: &'static str,
}

/// Built-in achievements, upserted by name
pub const ACHIEVEMENT_CATALOG: &[AchievementSeed] = &[
    AchievementSeed {
        name: "First Step",
        description: "Write your first review",
        icon_name: "footprints",
        xp_reward: 10,
        category: "reviews",
    },
    AchievementSeed {
        name: "Movie Maniac",
        description: "Write 10 reviews",
        icon_name: "film",
        xp_reward: 50,
        category: "reviews",
    },
    AchievementSeed {
        name: "Critic",
        description: "Write 50 reviews",
        icon_name: "star",
        xp_reward: 200,
        category: "reviews",
    },
    AchievementSeed {
        name: "Popular",
        description: "Receive 10 likes on your reviews",
        icon_name: "heart",
        xp_reward: 30,
        category: "engagement",
    },
    AchievementSeed {
        name: "Versatile",
        description: "Review titles from 5 different genres",
        icon_name: "palette",
        xp_reward: 40,
        category: "diversity",
    },
    AchievementSeed {
        name: "Trending",
        description: "Review 3 titles while they are hyped",
        icon_name: "flame",
        xp_reward: 30,
        category: "special",
    },
    AchievementSeed {
        name: "Wordsmith",
        description: "Write a review of at least 500 characters",
        icon_name: "feather",
        xp_reward: 25,
        category: "reviews",
    },
    AchievementSeed {
        name: "Perfectionist",
        description: "Give a perfect 10",
        icon_name: "trophy",
        xp_reward: 20,
        category: "reviews",
    },
    AchievementSeed {
        name: "Harsh Judge",
        description: "Give a rating of 2 or lower",
        icon_name: "gavel",
        xp_reward: 20,
        category: "reviews",
    },
    AchievementSeed {
        name: "Life of the Party",
        description: "Receive 5 likes on your reviews",
        icon_name: "users",
        xp_reward: 15,
        category: "engagement",
    },
];

/// Apply all seed data
pub async fn seed_defaults(pool: &SqlitePool) -> Result<()> {
    seed_achievements(pool).await?;
    Ok(())
}

/// Upsert the achievement catalog
///
/// Existing rows keep their id (so earned achievements stay linked) while
/// description, icon, reward and category follow the catalog.
pub async fn seed_achievements(pool: &SqlitePool) -> Result<()> {
    for seed in ACHIEVEMENT_CATALOG {
        sqlx::query(
            r#"
            INSERT INTO achievements (name, description, icon_name, xp_reward, category)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                icon_name = excluded.icon_name,
                xp_reward = excluded.xp_reward,
                category = excluded.category
            "#,
        )
        .bind(seed.name)
        .bind(seed.description)
        .bind(seed.icon_name)
        .bind(seed.xp_reward)
        .bind(seed.category)
        .execute(pool)
        .await?;
    }

    info!("Achievement catalog ready ({} entries)", ACHIEVEMENT_CATALOG.len());
    Ok(())
}
