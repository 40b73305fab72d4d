//! Taste profiles and content-based recommendations
//!
//! A profile summarizes a user's reviews (genres, aspects, emotions, rating
//! habits). Candidates the user has not reviewed are scored against it.

use cinevibe_common::events::ScoreMap;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::models::{parse_score_map, round2, ContentRecord, CONTENT_COLUMNS};

const TOP_N: usize = 5;

/// One of the user's reviews joined with the reviewed title
#[derive(Debug, Clone, Default)]
pub struct TasteSample {
    pub rating: Option<f64>,
    pub genre: Option<String>,
    pub content_type: String,
    pub aspects: ScoreMap,
    pub emotions: ScoreMap,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreStat {
    pub genre: String,
    pub count: i64,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionStat {
    pub emotion: String,
    pub intensity: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStat {
    #[serde(rename = "type")]
    pub content_type: String,
    pub count: i64,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Distribution {
    pub harsh: f64,
    pub balanced: f64,
    pub generous: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RatingTendency {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasteProfile {
    pub user_id: i64,
    pub favorite_genres: Vec<GenreStat>,
    pub favorite_aspects: ScoreMap,
    pub dominant_emotions: Vec<EmotionStat>,
    pub preferred_content_types: Vec<TypeStat>,
    pub rating_tendency: RatingTendency,
    pub total_reviews: i64,
}

#[derive(Default)]
struct Tally {
    count: i64,
    rating_sum: f64,
    rated: i64,
}

impl Tally {
    fn add(&mut self, rating: Option<f64>) {
        self.count += 1;
        if let Some(r) = rating {
            self.rating_sum += r;
            self.rated += 1;
        }
    }

    fn avg(&self) -> f64 {
        if self.rated == 0 {
            0.0
        } else {
            round2(self.rating_sum / self.rated as f64)
        }
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / total as f64)
    }
}

pub fn build_profile(user_id: i64, samples: &[TasteSample]) -> TasteProfile {
    let mut genres: HashMap<String, Tally> = HashMap::new();
    let mut types: BTreeMap<String, Tally> = BTreeMap::new();
    let mut aspect_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut emotion_sums: BTreeMap<String, (f64, i64)> = BTreeMap::new();

    for sample in samples {
        if let Some(genre) = &sample.genre {
            for g in genre.split(',').map(str::trim).filter(|g| !g.is_empty()) {
                genres.entry(g.to_string()).or_default().add(sample.rating);
            }
        }
        types
            .entry(sample.content_type.clone())
            .or_default()
            .add(sample.rating);
        for (key, value) in &sample.aspects {
            let entry = aspect_sums.entry(key.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        for (key, value) in sample.emotions.iter().filter(|(_, v)| **v > 0.0) {
            let entry = emotion_sums.entry(key.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut favorite_genres: Vec<GenreStat> = genres
        .into_iter()
        .map(|(genre, t)| GenreStat {
            genre,
            count: t.count,
            avg_rating: t.avg(),
        })
        .collect();
    favorite_genres.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(b.avg_rating.total_cmp(&a.avg_rating))
            .then(a.genre.cmp(&b.genre))
    });
    favorite_genres.truncate(TOP_N);

    let mut dominant_emotions: Vec<EmotionStat> = emotion_sums
        .into_iter()
        .map(|(emotion, (sum, count))| EmotionStat {
            emotion,
            intensity: round2(sum / count as f64),
            count,
        })
        .collect();
    dominant_emotions.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    dominant_emotions.truncate(TOP_N);

    let ratings: Vec<f64> = samples.iter().filter_map(|s| s.rating).collect();
    let rating_tendency = if ratings.is_empty() {
        RatingTendency::default()
    } else {
        let n = ratings.len();
        RatingTendency {
            average: round2(ratings.iter().sum::<f64>() / n as f64),
            min: ratings.iter().copied().fold(f64::INFINITY, f64::min),
            max: ratings.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            distribution: Distribution {
                harsh: percent(ratings.iter().filter(|r| **r < 5.0).count(), n),
                balanced: percent(ratings.iter().filter(|r| (5.0..=7.0).contains(*r)).count(), n),
                generous: percent(ratings.iter().filter(|r| **r > 7.0).count(), n),
            },
        }
    };

    TasteProfile {
        user_id,
        favorite_genres,
        favorite_aspects: aspect_sums
            .into_iter()
            .map(|(k, (sum, n))| (k, round2(sum / n as f64)))
            .collect(),
        dominant_emotions,
        preferred_content_types: types
            .into_iter()
            .map(|(content_type, t)| TypeStat {
                content_type,
                count: t.count,
                avg_rating: t.avg(),
            })
            .collect(),
        rating_tendency,
        total_reviews: samples.len() as i64,
    }
}

pub async fn taste_profile(pool: &SqlitePool, user_id: i64) -> Result<TasteProfile, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT r.rating, r.aspects, r.emotions, c.genre, c.content_type
        FROM reviews r
        JOIN content c ON c.id = r.content_id
        WHERE r.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut samples = Vec::with_capacity(rows.len());
    for row in &rows {
        let aspects: Option<String> = row.try_get("aspects")?;
        let emotions: Option<String> = row.try_get("emotions")?;
        samples.push(TasteSample {
            rating: row.try_get("rating")?,
            genre: row.try_get("genre")?,
            content_type: row.try_get("content_type")?,
            aspects: parse_score_map(aspects.as_deref()),
            emotions: parse_score_map(emotions.as_deref()),
        });
    }

    Ok(build_profile(user_id, &samples))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub content_id: i64,
    pub title: String,
    pub content_type: String,
    pub genre: Option<String>,
    pub avg_rating: f64,
    pub poster_url: Option<String>,
    pub release_year: Option<i64>,
    pub match_score: i64,
    pub match_reasons: Vec<String>,
}

impl Recommendation {
    fn from_content(c: &ContentRecord, score: i64, reasons: Vec<String>) -> Self {
        Self {
            content_id: c.id,
            title: c.title.clone(),
            content_type: c.content_type.clone(),
            genre: c.genre.clone(),
            avg_rating: c.avg_rating,
            poster_url: c.poster_url.clone(),
            release_year: c.release_year,
            match_score: score,
            match_reasons: reasons,
        }
    }
}

/// Score one candidate against a profile
pub fn score_candidate(profile: &TasteProfile, candidate: &ContentRecord) -> (i64, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    let candidate_genres: Vec<String> =
        candidate.genres().iter().map(|g| g.to_lowercase()).collect();
    let matched: Vec<&GenreStat> = profile
        .favorite_genres
        .iter()
        .filter(|g| candidate_genres.contains(&g.genre.to_lowercase()))
        .collect();
    if !matched.is_empty() && profile.total_reviews > 0 {
        let count: i64 = matched.iter().map(|g| g.count).sum();
        score += (count as f64 / profile.total_reviews as f64 * 40.0).min(40.0);
        let names: Vec<&str> = matched.iter().map(|g| g.genre.as_str()).collect();
        reasons.push(format!("Matches your favorite genres: {}", names.join(", ")));
    }

    let diff = (candidate.avg_rating - profile.rating_tendency.average).abs();
    let rating_score = (20.0 - diff * 5.0).max(0.0);
    score += rating_score;
    if rating_score > 10.0 {
        reasons.push("Rated close to your usual scores".to_string());
    }

    if let Some(serde_json::Value::Object(perception)) = &candidate.perception_map {
        let mut aspect_score: f64 = 0.0;
        for (aspect, preferred) in &profile.favorite_aspects {
            let close = perception
                .get(aspect)
                .and_then(|v| v.as_f64())
                .map(|v| (v - preferred).abs() < 2.0)
                .unwrap_or(false);
            if close {
                aspect_score += 6.0;
            }
        }
        if aspect_score > 0.0 {
            reasons.push("Strong in the aspects you value".to_string());
        }
        score += aspect_score.min(30.0);
    }

    if let (Some(top), Some(serde_json::Value::Object(cloud))) =
        (profile.dominant_emotions.first(), &candidate.emotional_cloud)
    {
        let intensity = cloud.get(&top.emotion).and_then(|v| v.as_f64()).unwrap_or(0.0);
        if intensity > 30.0 {
            score += 10.0;
            reasons.push(format!("Evokes {}", top.emotion));
        }
    }

    (score.round() as i64, reasons)
}

/// Personalized picks for a user, best first
pub async fn recommend(
    pool: &SqlitePool,
    user_id: i64,
    limit: usize,
) -> Result<Vec<Recommendation>, sqlx::Error> {
    let profile = taste_profile(pool, user_id).await?;

    if profile.total_reviews == 0 {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM content WHERE avg_rating >= 7 ORDER BY reviews_count DESC, id DESC LIMIT ?",
            CONTENT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

        return rows
            .iter()
            .map(|row| -> Result<Recommendation, sqlx::Error> {
                let c = ContentRecord::from_row(row)?;
                Ok(Recommendation::from_content(
                    &c,
                    0,
                    vec!["Popular title with a high rating".to_string()],
                ))
            })
            .collect();
    }

    let floor = profile.rating_tendency.average - 1.0;
    let rows = sqlx::query(&format!(
        "SELECT {} FROM content \
         WHERE id NOT IN (SELECT content_id FROM reviews WHERE user_id = ?) AND avg_rating >= ? \
         ORDER BY avg_rating DESC, id DESC",
        CONTENT_COLUMNS
    ))
    .bind(user_id)
    .bind(floor)
    .fetch_all(pool)
    .await?;

    let favorite: Vec<String> = profile
        .favorite_genres
        .iter()
        .map(|g| g.genre.to_lowercase())
        .collect();

    let mut picks = Vec::new();
    for row in &rows {
        let candidate = ContentRecord::from_row(row)?;
        let in_favorite = favorite.is_empty()
            || candidate
                .genres()
                .iter()
                .any(|g| favorite.contains(&g.to_lowercase()));
        if !in_favorite {
            continue;
        }
        let (score, reasons) = score_candidate(&profile, &candidate);
        picks.push(Recommendation::from_content(&candidate, score, reasons));
        if picks.len() >= limit * 3 {
            break;
        }
    }

    picks.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    picks.truncate(limit);
    Ok(picks)
}

/// Replace stored recommendations for every user who has written a review
///
/// Returns the number of rows written.
pub async fn generate_all(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let users: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT user_id FROM reviews")
        .fetch_all(pool)
        .await?;

    let mut generated = 0;
    for user_id in users {
        let picks = recommend(pool, user_id, 10).await?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM recommendations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for pick in &picks {
            sqlx::query(
                "INSERT INTO recommendations (user_id, content_id, score, reason) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(pick.content_id)
            .bind(pick.match_score as f64)
            .bind(pick.match_reasons.join("; "))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        generated += picks.len();
    }

    info!("Generated {} recommendations", generated);
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rating: f64, genre: &str, content_type: &str) -> TasteSample {
        TasteSample {
            rating: Some(rating),
            genre: Some(genre.to_string()),
            content_type: content_type.to_string(),
            ..Default::default()
        }
    }

    fn candidate(genre: &str, avg: f64) -> ContentRecord {
        ContentRecord {
            id: 9,
            title: "Candidate".to_string(),
            content_type: "MOVIE".to_string(),
            release_year: Some(2020),
            genre: Some(genre.to_string()),
            description: None,
            avg_rating: avg,
            critics_rating: 0.0,
            audience_rating: 0.0,
            hype_index: 0,
            reviews_count: 0,
            positive_reviews: 0,
            mixed_reviews: 0,
            negative_reviews: 0,
            emotional_cloud: None,
            perception_map: None,
            poster_url: None,
            trailer_url: None,
            director: None,
            cast_list: None,
            director_photo_url: None,
            cast_photos: None,
            runtime: None,
            developer: None,
            publisher: None,
            platforms: None,
            esrb_rating: None,
            players: None,
            file_size: None,
            technical_info: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_profile_genres_and_tendency() {
        let profile = build_profile(
            1,
            &[
                sample(9.0, "Drama, Crime", "MOVIE"),
                sample(8.0, "Drama", "MOVIE"),
                sample(3.0, "Comedy", "GAME"),
                sample(6.0, "Drama", "TV_SERIES"),
            ],
        );

        assert_eq!(profile.total_reviews, 4);
        assert_eq!(profile.favorite_genres[0].genre, "Drama");
        assert_eq!(profile.favorite_genres[0].count, 3);
        assert_eq!(profile.favorite_genres[0].avg_rating, 7.67);
        assert_eq!(profile.rating_tendency.average, 6.5);
        assert_eq!(profile.rating_tendency.min, 3.0);
        assert_eq!(profile.rating_tendency.max, 9.0);
        assert_eq!(profile.rating_tendency.distribution.harsh, 25.0);
        assert_eq!(profile.rating_tendency.distribution.balanced, 25.0);
        assert_eq!(profile.rating_tendency.distribution.generous, 50.0);
        assert_eq!(profile.preferred_content_types.len(), 3);
    }

    #[test]
    fn test_emotions_skip_zero_and_rank_by_intensity() {
        let mut a = sample(7.0, "Drama", "MOVIE");
        a.emotions = ScoreMap::from([("joy".into(), 20.0), ("fear".into(), 0.0)]);
        let mut b = sample(7.0, "Drama", "MOVIE");
        b.emotions = ScoreMap::from([("awe".into(), 90.0), ("joy".into(), 40.0)]);

        let profile = build_profile(1, &[a, b]);
        let names: Vec<&str> = profile.dominant_emotions.iter().map(|e| e.emotion.as_str()).collect();
        assert_eq!(names, vec!["awe", "joy"]);
        assert_eq!(profile.dominant_emotions[1].intensity, 30.0);
        assert_eq!(profile.dominant_emotions[1].count, 2);
    }

    #[test]
    fn test_empty_profile() {
        let profile = build_profile(5, &[]);
        assert_eq!(profile.total_reviews, 0);
        assert!(profile.favorite_genres.is_empty());
        assert_eq!(profile.rating_tendency.average, 0.0);
    }

    #[test]
    fn test_score_rewards_genre_rating_and_emotion() {
        let mut a = sample(8.0, "Drama", "MOVIE");
        a.emotions = ScoreMap::from([("awe".into(), 70.0)]);
        a.aspects = ScoreMap::from([("plot".into(), 9.0)]);
        let profile = build_profile(1, &[a, sample(8.0, "Drama", "MOVIE")]);

        let mut c = candidate("Drama, Thriller", 8.0);
        c.emotional_cloud = Some(serde_json::json!({"awe": 55.0}));
        c.perception_map = Some(serde_json::json!({"plot": 8.5}));

        let (score, reasons) = score_candidate(&profile, &c);
        // genre 40 + rating 20 + aspect 6 + emotion 10
        assert_eq!(score, 76);
        assert_eq!(reasons.len(), 4);

        let (far, _) = score_candidate(&profile, &candidate("Comedy", 2.0));
        assert_eq!(far, 0);
    }
}
