//! The Movie Database (TMDB) client and content import
//!
//! Search and list endpoints are passed through as JSON. Detail lookups are
//! typed and converted into a [`ContentDraft`] for import.

use chrono::Utc;
use cinevibe_common::config::TmdbConfig;
use cinevibe_common::{AnalyticsEvent, ContentType, EventBus};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::models::{insert_content, ContentDraft};

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
const USER_AGENT: &str = concat!("cinevibe/", env!("CARGO_PKG_VERSION"));
/// TMDB allows 40 requests per 10 seconds
const RATE_LIMIT_MS: u64 = 250;
const CAST_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB API key is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("TMDB title not found: {0}")]
    NotFound(String),

    #[error("TMDB API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Content already exists: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<TmdbError> for ApiError {
    fn from(err: TmdbError) -> Self {
        match err {
            TmdbError::NotConfigured => ApiError::BadRequest(err.to_string()),
            TmdbError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TmdbError::Duplicate(_) => ApiError::Conflict(err.to_string()),
            TmdbError::Database(e) => ApiError::Database(e),
            TmdbError::Network(_) | TmdbError::Api(..) | TmdbError::Parse(_) => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastMember {
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCrewMember {
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    pub key: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCreator {
    pub name: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub videos: Option<TmdbVideos>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTvDetails {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub episode_run_time: Vec<i64>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub created_by: Vec<TmdbCreator>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub videos: Option<TmdbVideos>,
}

/// Minimum spacing between outgoing requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("TMDB rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

pub fn image_url(path: Option<&str>, size: &str) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{}/{}{}", IMAGE_BASE_URL, size, p))
}

/// Official YouTube trailer, else any YouTube trailer, else any YouTube video
pub fn youtube_trailer(videos: Option<&TmdbVideos>) -> Option<String> {
    let results = &videos?.results;
    let youtube = |v: &&TmdbVideo| v.site == "YouTube";
    results
        .iter()
        .filter(youtube)
        .find(|v| v.kind == "Trailer" && v.official)
        .or_else(|| results.iter().filter(youtube).find(|v| v.kind == "Trailer"))
        .or_else(|| results.iter().find(youtube))
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}

fn release_year(date: Option<&str>) -> Option<i64> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn genre_list(genres: &[TmdbGenre]) -> Option<String> {
    let joined = genres
        .iter()
        .map(|g| g.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

fn cast_fields(credits: Option<&TmdbCredits>) -> (Option<String>, Option<Value>) {
    let cast: Vec<&TmdbCastMember> = credits
        .map(|c| c.cast.iter().take(CAST_LIMIT).collect())
        .unwrap_or_default();
    if cast.is_empty() {
        return (None, None);
    }

    let names = cast.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
    let photos = cast
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "character": c.character,
                "photo_url": image_url(c.profile_path.as_deref(), "w185"),
            })
        })
        .collect::<Vec<_>>();
    (Some(names), Some(Value::Array(photos)))
}

pub fn movie_to_draft(movie: &TmdbMovieDetails) -> ContentDraft {
    let director = movie
        .credits
        .as_ref()
        .and_then(|c| c.crew.iter().find(|m| m.job.as_deref() == Some("Director")));
    let (cast, cast_photos) = cast_fields(movie.credits.as_ref());

    let mut draft = ContentDraft::new(movie.title.clone(), ContentType::Movie);
    draft.description = movie.overview.clone();
    draft.release_year = release_year(movie.release_date.as_deref());
    draft.genre = genre_list(&movie.genres);
    draft.runtime = movie.runtime;
    draft.poster_url = image_url(movie.poster_path.as_deref(), "w500");
    draft.trailer_url = youtube_trailer(movie.videos.as_ref());
    draft.director = director.map(|d| d.name.clone());
    draft.director_photo_url = director.and_then(|d| image_url(d.profile_path.as_deref(), "w185"));
    draft.cast_list = cast;
    draft.cast_photos = cast_photos;
    draft
}

pub fn tv_to_draft(show: &TmdbTvDetails) -> ContentDraft {
    let creators = show
        .created_by
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let (cast, cast_photos) = cast_fields(show.credits.as_ref());

    let mut draft = ContentDraft::new(show.name.clone(), ContentType::TvSeries);
    draft.description = show.overview.clone();
    draft.release_year = release_year(show.first_air_date.as_deref());
    draft.genre = genre_list(&show.genres);
    draft.runtime = show.episode_run_time.first().copied();
    draft.poster_url = image_url(show.poster_path.as_deref(), "w500");
    draft.trailer_url = youtube_trailer(show.videos.as_ref());
    draft.director = (!creators.is_empty()).then_some(creators);
    draft.director_photo_url = show
        .created_by
        .first()
        .and_then(|c| image_url(c.profile_path.as_deref(), "w185"));
    draft.cast_list = cast;
    draft.cast_photos = cast_photos;
    draft
}

/// Which TMDB catalog an id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmdbKind {
    Movie,
    Tv,
}

/// TMDB API client
pub struct TmdbClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self, TmdbError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TmdbError::Network(e.to_string()))?;

        if config.api_key.is_none() {
            tracing::warn!("TMDB_API_KEY not configured, TMDB import disabled");
        }

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, TmdbError> {
        let api_key = self.api_key.as_deref().ok_or(TmdbError::NotConfigured)?;
        self.rate_limiter.wait().await;

        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "Querying TMDB API");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", api_key), ("language", "en-US")])
            .query(params)
            .send()
            .await
            .map_err(|e| TmdbError::Network(e.to_string()))?;

        let status = response.status();
        if status == 404 {
            return Err(TmdbError::NotFound(endpoint.to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TmdbError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))
    }

    pub async fn search(&self, kind: TmdbKind, query: &str, page: u32) -> Result<Value, TmdbError> {
        let endpoint = match kind {
            TmdbKind::Movie => "/search/movie",
            TmdbKind::Tv => "/search/tv",
        };
        self.get(
            endpoint,
            &[
                ("query", query.to_string()),
                ("page", page.to_string()),
                ("include_adult", "false".to_string()),
            ],
        )
        .await
    }

    /// `list` is one of `popular`, `top_rated`, `upcoming`
    pub async fn movie_list(&self, list: &str, page: u32) -> Result<Value, TmdbError> {
        self.get(&format!("/movie/{}", list), &[("page", page.to_string())])
            .await
    }

    pub async fn movie_details(&self, tmdb_id: i64) -> Result<TmdbMovieDetails, TmdbError> {
        self.get(
            &format!("/movie/{}", tmdb_id),
            &[("append_to_response", "credits,videos".to_string())],
        )
        .await
    }

    pub async fn tv_details(&self, tmdb_id: i64) -> Result<TmdbTvDetails, TmdbError> {
        self.get(
            &format!("/tv/{}", tmdb_id),
            &[("append_to_response", "credits,videos".to_string())],
        )
        .await
    }

    /// Fetch a title and store it as content, returning the new content id
    ///
    /// A title with the same name and type already stored is a duplicate.
    pub async fn import(
        &self,
        pool: &SqlitePool,
        events: &EventBus,
        kind: TmdbKind,
        tmdb_id: i64,
    ) -> Result<(i64, String), TmdbError> {
        let draft = match kind {
            TmdbKind::Movie => movie_to_draft(&self.movie_details(tmdb_id).await?),
            TmdbKind::Tv => tv_to_draft(&self.tv_details(tmdb_id).await?),
        };

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM content WHERE title = ? AND content_type = ?")
                .bind(&draft.title)
                .bind(draft.content_type.as_str())
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            return Err(TmdbError::Duplicate(draft.title));
        }

        let id = insert_content(pool, &draft).await?;
        tracing::info!(tmdb_id, content_id = id, title = %draft.title, "Imported from TMDB");

        events.emit_lossy(AnalyticsEvent::ContentImported {
            content_id: id,
            content_type: draft.content_type.as_str().to_string(),
            source: "tmdb".to_string(),
            event_time: Utc::now(),
        });

        Ok((id, draft.title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> TmdbConfig {
        TmdbConfig {
            api_key: api_key.map(str::to_string),
            base_url: "https://api.themoviedb.org/3/".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = TmdbClient::new(&config(None)).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.base_url, "https://api.themoviedb.org/3");
        assert!(TmdbClient::new(&config(Some("k"))).unwrap().is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses_requests() {
        let client = TmdbClient::new(&config(None)).unwrap();
        let err = client.search(TmdbKind::Movie, "dune", 1).await.unwrap_err();
        assert!(matches!(err, TmdbError::NotConfigured));
        assert!(matches!(ApiError::from(err), ApiError::BadRequest(_)));
    }

    #[test]
    fn test_movie_conversion() {
        let movie: TmdbMovieDetails = serde_json::from_value(json!({
            "id": 438631,
            "title": "Dune",
            "overview": "Paul Atreides...",
            "release_date": "2021-09-15",
            "runtime": 155,
            "poster_path": "/d5NXSklXo0qyIYkgV94XAgMIckC.jpg",
            "genres": [{"id": 878, "name": "Science Fiction"}, {"id": 12, "name": "Adventure"}],
            "credits": {
                "cast": [{"name": "Timothée Chalamet", "character": "Paul", "profile_path": "/p.jpg"}],
                "crew": [
                    {"name": "Hans Zimmer", "job": "Original Music Composer"},
                    {"name": "Denis Villeneuve", "job": "Director", "profile_path": "/dv.jpg"}
                ]
            },
            "videos": {"results": [
                {"key": "teaser", "site": "YouTube", "type": "Teaser", "official": true},
                {"key": "n9xhJrPXop4", "site": "YouTube", "type": "Trailer", "official": true}
            ]}
        }))
        .unwrap();

        let draft = movie_to_draft(&movie);
        assert_eq!(draft.content_type, ContentType::Movie);
        assert_eq!(draft.release_year, Some(2021));
        assert_eq!(draft.genre.as_deref(), Some("Science Fiction, Adventure"));
        assert_eq!(draft.director.as_deref(), Some("Denis Villeneuve"));
        assert_eq!(
            draft.director_photo_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w185/dv.jpg")
        );
        assert_eq!(
            draft.trailer_url.as_deref(),
            Some("https://www.youtube.com/watch?v=n9xhJrPXop4")
        );
        assert_eq!(draft.cast_list.as_deref(), Some("Timothée Chalamet"));
        assert_eq!(draft.cast_photos.unwrap()[0]["character"], "Paul");
    }

    #[test]
    fn test_tv_conversion_uses_creators() {
        let show: TmdbTvDetails = serde_json::from_value(json!({
            "id": 1396,
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "episode_run_time": [45, 47],
            "genres": [{"id": 18, "name": "Drama"}],
            "created_by": [{"name": "Vince Gilligan"}]
        }))
        .unwrap();

        let draft = tv_to_draft(&show);
        assert_eq!(draft.content_type, ContentType::TvSeries);
        assert_eq!(draft.runtime, Some(45));
        assert_eq!(draft.director.as_deref(), Some("Vince Gilligan"));
        assert!(draft.trailer_url.is_none());
        assert!(draft.cast_list.is_none());
    }
}
