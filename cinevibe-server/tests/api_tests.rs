//! Integration tests for the cinevibe-server HTTP API
//!
//! Each test gets a fresh SQLite file in a temp directory, prepared by the
//! same `init_database` the binary uses, and drives the router with
//! `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cinevibe_common::config::ServerConfig;
use cinevibe_common::db::init_database;
use cinevibe_server::auth::{ensure_admin, AdminSeed};
use cinevibe_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: Router,
    _dir: TempDir,
}

/// Fresh database, admin account `root` / `rootpass`
async fn setup_app() -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("cinevibe.db");
    let pool = init_database(&db_path).await.expect("database init");

    ensure_admin(
        &pool,
        &AdminSeed {
            username: "root".to_string(),
            email: "root@cinevibe.test".to_string(),
            password: "rootpass".to_string(),
        },
    )
    .await
    .expect("admin bootstrap");

    let config = ServerConfig {
        database_path: db_path,
        jwt_secret: "integration-test-secret".to_string(),
        ..ServerConfig::default()
    };
    let state = AppState::new(pool, config).expect("app state");

    TestApp {
        app: build_router(state),
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn register(&self, username: &str, role: &str) -> (i64, String) {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "secret123",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        (
            body["user"]["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "root", "password": "rootpass" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_content(&self, admin: &str, title: &str, genre: &str) -> i64 {
        let (status, body) = self
            .send(
                "POST",
                "/api/content",
                Some(admin),
                Some(json!({
                    "title": title,
                    "type": "MOVIE",
                    "genre": genre,
                    "releaseYear": 2021,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create content failed: {}", body);
        body["id"].as_i64().unwrap()
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let t = setup_app().await;
    let (status, body) = t.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cinevibe-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let t = setup_app().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-42");
}

#[tokio::test]
async fn test_buildinfo() {
    let t = setup_app().await;
    let (status, body) = t.send("GET", "/api/buildinfo", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["git_hash"].is_string());
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_register_login_validate() {
    let t = setup_app().await;
    let (id, token) = t.register("alice", "USER").await;

    let (status, body) = t.send("GET", "/api/auth/validate", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["username"], "alice");

    let (status, body) = t
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "usernameOrEmail": "alice@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn test_register_duplicate_and_admin_role_refused() {
    let t = setup_app().await;
    let (_, token) = t.register("mallory", "ADMIN").await;

    let (_, me) = t.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(me["role"], "USER");

    let (status, body) = t
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "mallory",
                "email": "other@example.com",
                "password": "secret123",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_login_failures() {
    let t = setup_app().await;
    t.register("bob", "USER").await;

    let (status, body) = t
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "bob", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = t
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_guards() {
    let t = setup_app().await;
    let (_, token) = t.register("carol", "USER").await;

    let (status, _) = t.send("GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.send("GET", "/api/users/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t.send("GET", "/api/admin/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["statusCode"] == 403);

    let (status, _) = t
        .send("POST", "/api/content", Some(&token), Some(json!({ "title": "Nope" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Content and reviews
// =============================================================================

#[tokio::test]
async fn test_review_flow_updates_aggregates_and_unlocks_first_step() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Dune", "Sci-Fi").await;
    let (user_id, token) = t.register("dave", "USER").await;

    let (status, body) = t
        .send(
            "POST",
            "/api/reviews",
            Some(&token),
            Some(json!({
                "content_id": content_id,
                "content": "Huge, loud and beautiful.",
                "rating": 8,
                "emotions": { "awe": 0.9 },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "review failed: {}", body);
    assert_eq!(body["status"], "inserted");
    let unlocked: Vec<&str> = body["newAchievements"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert!(unlocked.contains(&"First Step"));

    let (status, detail) = t
        .send("GET", &format!("/api/content/{}", content_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["reviews_count"], 1);
    assert_eq!(detail["avg_rating"].as_f64().unwrap(), 8.0);
    assert_eq!(detail["userReviewsList"].as_array().unwrap().len(), 1);

    let (_, reviews) = t
        .send("GET", &format!("/api/reviews/user/{}", user_id), None, None)
        .await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["content_title"], "Dune");

    let (_, me) = t.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(me["totalReviews"], 1);
}

#[tokio::test]
async fn test_review_for_unknown_content_is_404() {
    let t = setup_app().await;
    let (_, token) = t.register("erin", "USER").await;

    let (status, _) = t
        .send(
            "POST",
            "/api/reviews",
            Some(&token),
            Some(json!({ "content_id": 999, "content": "ghost", "rating": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vote_toggle() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Arrival", "Drama").await;
    let (_, author) = t.register("frank", "USER").await;
    let (_, voter) = t.register("grace", "USER").await;

    let (_, review) = t
        .send(
            "POST",
            "/api/reviews",
            Some(&author),
            Some(json!({ "content_id": content_id, "content": "Quietly devastating.", "rating": 9 })),
        )
        .await;
    let review_id = review["review_id"].as_i64().unwrap();
    let uri = format!("/api/reviews/{}/vote", review_id);

    let (status, body) = t.send("POST", &uri, Some(&voter), Some(json!({ "type": "LIKE" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "added");

    let (_, body) = t.send("POST", &uri, Some(&voter), Some(json!({ "type": "DISLIKE" }))).await;
    assert_eq!(body["status"], "updated");
    assert_eq!(body["vote"], "DISLIKE");

    let (_, body) = t.send("POST", &uri, Some(&voter), Some(json!({ "type": "DISLIKE" }))).await;
    assert_eq!(body["status"], "removed");

    let (status, _) = t.send("POST", &uri, Some(&voter), Some(json!({ "type": "MEH" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_owner_edits_review() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Heat", "Crime").await;
    let (_, owner) = t.register("heidi", "USER").await;
    let (_, other) = t.register("ivan", "USER").await;

    let (_, review) = t
        .send(
            "POST",
            "/api/reviews",
            Some(&owner),
            Some(json!({ "content_id": content_id, "content": "Tense.", "rating": 7 })),
        )
        .await;
    let uri = format!("/api/reviews/{}", review["review_id"].as_i64().unwrap());

    let (status, body) = t.send("PUT", &uri, Some(&other), Some(json!({ "rating": 1 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You can only edit your own reviews");

    let (status, _) = t.send("PUT", &uri, Some(&owner), Some(json!({ "rating": 9 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = t
        .send("GET", &format!("/api/content/{}", content_id), None, None)
        .await;
    assert_eq!(detail["avg_rating"].as_f64().unwrap(), 9.0);
}

#[tokio::test]
async fn test_content_crud_and_search() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let id = t.create_content(&admin, "Blade Runner", "Sci-Fi").await;
    t.create_content(&admin, "Runner Runner", "Thriller").await;

    let (status, body) = t.send("GET", "/api/content/search?query=runner", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = t.send("GET", "/api/content/autocomplete?q=bl", None, None).await;
    assert_eq!(body[0]["title"], "Blade Runner");

    let (_, body) = t.send("GET", "/api/content/autocomplete?q=b", None, None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = t
        .send(
            "PUT",
            &format!("/api/content/{}", id),
            Some(&admin),
            Some(json!({ "description": "Replicants." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Blade Runner");
    assert_eq!(body["description"], "Replicants.");

    let (status, body) = t
        .send("DELETE", &format!("/api/content/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");

    let (status, _) = t.send("GET", &format!("/api/content/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Per-user features
// =============================================================================

#[tokio::test]
async fn test_watchlist_round_trip() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Alien", "Horror").await;
    let (_, token) = t.register("judy", "USER").await;
    let uri = format!("/api/users/me/watchlist/{}", content_id);

    let (status, _) = t.send("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    // Adding twice keeps a single entry
    t.send("POST", &uri, Some(&token), None).await;

    let (_, list) = t.send("GET", "/api/users/me/watchlist", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["content"]["title"], "Alien");

    t.send("DELETE", &uri, Some(&token), None).await;
    let (_, list) = t.send("GET", "/api/users/me/watchlist", Some(&token), None).await;
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = t
        .send("POST", "/api/users/me/watchlist/9999", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expectations_upsert_and_average() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Dune: Part Three", "Sci-Fi").await;
    let (_, a) = t.register("kim", "USER").await;
    let (_, b) = t.register("leo", "USER").await;
    let uri = format!("/api/expectations/{}", content_id);

    let (_, mine) = t.send("GET", &format!("{}/me", uri), Some(&a), None).await;
    assert!(mine["rating"].is_null());

    t.send("POST", &uri, Some(&a), Some(json!({ "rating": 6 }))).await;
    t.send("POST", &uri, Some(&a), Some(json!({ "rating": 10 }))).await;
    t.send("POST", &uri, Some(&b), Some(json!({ "rating": 8 }))).await;

    let (_, summary) = t.send("GET", &uri, None, None).await;
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["avgRating"].as_f64().unwrap(), 9.0);

    let (status, _) = t.send("POST", &uri, Some(&a), Some(json!({ "rating": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_follow_critic() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Tenet", "Action").await;
    let (critic_id, critic) = t.register("roger", "CRITIC").await;
    let (user_id, user) = t.register("mia", "USER").await;

    t.send(
        "POST",
        "/api/reviews",
        Some(&critic),
        Some(json!({ "content_id": content_id, "content": "Clever, cold.", "rating": 6 })),
    )
    .await;

    let (status, body) = t
        .send("POST", &format!("/api/critics/{}/follow", critic_id), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = t
        .send("POST", &format!("/api/critics/{}/follow", user_id), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Critic not found");

    let (_, followed) = t.send("GET", "/api/critics/followed", Some(&user), None).await;
    assert_eq!(followed[0]["username"], "roger");

    let (_, personal) = t
        .send(
            "GET",
            &format!("/api/critics/personalized/{}", content_id),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(personal["personalRating"].as_f64().unwrap(), 6.0);
    assert_eq!(personal["reviewCount"], 1);
}

// =============================================================================
// Admin and analytics
// =============================================================================

#[tokio::test]
async fn test_admin_stats_and_user_moderation() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let (user_id, token) = t.register("nina", "USER").await;

    let (status, stats) = t.send("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"]["total"], 2);
    assert_eq!(stats["users"]["byRole"]["admins"], 1);
    assert_eq!(stats["system"]["tmdb"], "missing");

    let (status, body) = t
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/status", user_id),
            Some(&admin),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);

    let (status, body) = t
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "nina", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account is disabled");

    let (status, body) = t
        .send("DELETE", &format!("/api/admin/users/{}", user_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], user_id);

    let (status, _) = t.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tmdb_import_without_key_is_400() {
    let t = setup_app().await;
    let admin = t.admin_token().await;

    let (status, _) = t
        .send("POST", "/api/admin/tmdb/import/movie/603", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = t.send("GET", "/api/admin/tmdb/status", Some(&admin), None).await;
    assert_eq!(body["tmdb"]["configured"], false);
}

#[tokio::test]
async fn test_realtime_analytics_disabled_shapes() {
    let t = setup_app().await;

    let (_, status) = t.send("GET", "/api/analytics/realtime/status", None, None).await;
    assert_eq!(status["streaming_enabled"], false);

    let (_, top) = t.send("GET", "/api/analytics/realtime/top-content", None, None).await;
    assert!(top["results"].as_array().unwrap().is_empty());
    assert_eq!(top["clickhouse_enabled"], false);

    let (_, trends) = t
        .send("GET", "/api/analytics/realtime/trends/reviews", None, None)
        .await;
    assert_eq!(trends["period_days"], 30);

    let (_, emotions) = t.send("GET", "/api/analytics/realtime/emotions", None, None).await;
    assert_eq!(emotions["content_id"], "all");
}

#[tokio::test]
async fn test_recommendations_generate_requires_admin() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let (_, token) = t.register("olga", "USER").await;

    let (status, _) = t
        .send("POST", "/api/recommendations/generate", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .send("POST", "/api/recommendations/generate", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated"], 0);

    let (_, mine) = t.send("GET", "/api/recommendations", Some(&token), None).await;
    assert!(mine.as_array().unwrap().is_empty());
}

// =============================================================================
// Counters, aggregates and rankings
// =============================================================================

impl TestApp {
    async fn review(&self, token: &str, content_id: i64, rating: Option<f64>) -> i64 {
        let mut body = json!({ "content_id": content_id, "content": "Worth a look." });
        if let Some(rating) = rating {
            body["rating"] = json!(rating);
        }
        let (status, body) = self.send("POST", "/api/reviews", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "review failed: {}", body);
        body["review_id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_total_ratings_follows_edits_and_deletes() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let rated = t.create_content(&admin, "Heat", "Crime").await;
    let unrated = t.create_content(&admin, "Ronin", "Crime").await;
    let (_, token) = t.register("ivan", "USER").await;

    t.review(&token, rated, Some(7.0)).await;
    let review_id = t.review(&token, unrated, None).await;

    let (_, me) = t.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(me["totalReviews"], 2);
    assert_eq!(me["totalRatings"], 1);

    let (status, _) = t
        .send(
            "PUT",
            &format!("/api/reviews/{}", review_id),
            Some(&token),
            Some(json!({ "rating": 6 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = t.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(me["totalRatings"], 2);

    let (status, _) = t
        .send("DELETE", &format!("/api/reviews/{}", review_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = t.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(me["totalReviews"], 1);
    assert_eq!(me["totalRatings"], 1);
}

#[tokio::test]
async fn test_recommendations_without_favorite_genres() {
    let t = setup_app().await;
    let admin = t.admin_token().await;

    let (status, body) = t
        .send(
            "POST",
            "/api/content",
            Some(&admin),
            Some(json!({ "title": "Untitled Project", "type": "MOVIE" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "create content failed: {}", body);
    let genreless = body["id"].as_i64().unwrap();
    let good = t.create_content(&admin, "Good", "Drama").await;

    let (_, other) = t.register("olga", "USER").await;
    t.review(&other, good, Some(9.0)).await;

    let (_, token) = t.register("pete", "USER").await;
    t.review(&token, genreless, Some(8.0)).await;

    let (status, recs) = t
        .send("GET", "/api/users/me/recommendations", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let recs = recs.as_array().unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["contentId"], good);
}

#[tokio::test]
async fn test_reputation_leaderboard_excludes_admins() {
    let t = setup_app().await;
    t.register("quinn", "USER").await;
    t.register("rosa", "CRITIC").await;

    let (status, board) = t.send("GET", "/api/gamification/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = board
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["username"].as_str())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"quinn"));
    assert!(names.contains(&"rosa"));
    assert!(!names.contains(&"root"));
}

#[tokio::test]
async fn test_audience_score_counts_only_user_accounts() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Solaris", "Sci-Fi").await;
    let (_, user) = t.register("sofia", "USER").await;
    let (_, critic) = t.register("tomas", "CRITIC").await;

    t.review(&user, content_id, Some(8.0)).await;
    t.review(&critic, content_id, Some(6.0)).await;
    t.review(&admin, content_id, Some(1.0)).await;

    let (_, detail) = t
        .send("GET", &format!("/api/content/{}", content_id), None, None)
        .await;
    assert_eq!(detail["reviews_count"], 3);
    assert_eq!(detail["avg_rating"].as_f64().unwrap(), 5.0);
    assert_eq!(detail["userScore"].as_f64().unwrap(), 8.0);
    assert_eq!(detail["metascore"].as_f64().unwrap(), 60.0);
}

#[tokio::test]
async fn test_admin_user_delete_cascades_and_recalculates() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Stalker", "Drama").await;
    let (critic_id, critic) = t.register("vera", "CRITIC").await;
    let (voter_id, voter) = t.register("kim", "USER").await;
    let (_, sam) = t.register("sam", "USER").await;

    t.review(&critic, content_id, Some(4.0)).await;
    t.review(&voter, content_id, Some(8.0)).await;
    let sam_review = t.review(&sam, content_id, Some(6.0)).await;

    t.send(
        "POST",
        &format!("/api/reviews/{}/vote", sam_review),
        Some(&voter),
        Some(json!({ "type": "LIKE" })),
    )
    .await;
    t.send("POST", &format!("/api/critics/{}/follow", critic_id), Some(&sam), None)
        .await;

    let (status, _) = t
        .send("DELETE", &format!("/api/admin/users/{}", voter_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, reviews) = t
        .send("GET", &format!("/api/reviews/content/{}", content_id), None, None)
        .await;
    let reviews = reviews.as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    let kept = reviews.iter().find(|r| r["id"] == sam_review).unwrap();
    assert_eq!(kept["likes"], 0);

    let (_, detail) = t
        .send("GET", &format!("/api/content/{}", content_id), None, None)
        .await;
    assert_eq!(detail["reviews_count"], 2);
    assert_eq!(detail["avg_rating"].as_f64().unwrap(), 5.0);
    assert_eq!(detail["userScore"].as_f64().unwrap(), 6.0);

    let (_, followed) = t.send("GET", "/api/critics/followed", Some(&sam), None).await;
    assert_eq!(followed.as_array().unwrap().len(), 1);

    t.send("DELETE", &format!("/api/admin/users/{}", critic_id), Some(&admin), None)
        .await;

    let (_, followed) = t.send("GET", "/api/critics/followed", Some(&sam), None).await;
    assert!(followed.as_array().unwrap().is_empty());

    let (_, detail) = t
        .send("GET", &format!("/api/content/{}", content_id), None, None)
        .await;
    assert_eq!(detail["reviews_count"], 1);
    assert_eq!(detail["avg_rating"].as_f64().unwrap(), 6.0);
    assert_eq!(detail["metascore"].as_f64().unwrap(), 0.0);
}

// =============================================================================
// Home page shelves
// =============================================================================

#[tokio::test]
async fn test_hero_carousel_crud() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Mad Max", "Action").await;

    let (status, body) = t
        .send(
            "POST",
            "/api/content/hero",
            Some(&admin),
            Some(json!({ "contentId": 999 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Content with ID 999 not found");

    let (status, slide) = t
        .send(
            "POST",
            "/api/content/hero",
            Some(&admin),
            Some(json!({ "contentId": content_id, "displayOrder": 2, "customTitle": "Fury Road" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "create slide failed: {}", slide);
    let slide_id = slide["id"].as_i64().unwrap();
    assert_eq!(slide["content"]["title"], "Mad Max");

    let (status, active) = t.send("GET", "/api/content/hero/active", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active[0]["custom_title"], "Fury Road");

    let (status, _) = t.send("GET", "/api/content/hero/all", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .send(
            "PUT",
            &format!("/api/content/hero/{}", slide_id),
            Some(&admin),
            Some(json!({ "contentId": 4242 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, slide) = t
        .send(
            "PUT",
            &format!("/api/content/hero/{}", slide_id),
            Some(&admin),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slide["is_active"], false);
    assert_eq!(slide["custom_title"], "Fury Road");

    let (_, active) = t.send("GET", "/api/content/hero/active", None, None).await;
    assert!(active.as_array().unwrap().is_empty());
    let (_, all) = t.send("GET", "/api/content/hero/all", Some(&admin), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let uri = format!("/api/content/hero/{}", slide_id);
    let (status, _) = t.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_coming_soon_crud() {
    let t = setup_app().await;
    let admin = t.admin_token().await;

    let (status, _) = t
        .send("POST", "/api/content/coming-soon", Some(&admin), Some(json!({ "title": " " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, late) = t
        .send(
            "POST",
            "/api/content/coming-soon",
            Some(&admin),
            Some(json!({ "title": "Sequel", "type": "SERIES", "releaseDate": "2031-05-01" })),
        )
        .await;
    let (status, early) = t
        .send(
            "POST",
            "/api/content/coming-soon",
            Some(&admin),
            Some(json!({ "title": "Prequel", "releaseDate": "2030-01-15", "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(early["content_type"], "MOVIE");
    assert_eq!(late["content_type"], "TV_SERIES");

    let (_, all) = t.send("GET", "/api/content/coming-soon/all", Some(&admin), None).await;
    let titles: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Prequel", "Sequel"]);

    let (_, active) = t.send("GET", "/api/content/coming-soon/active", None, None).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["title"], "Sequel");

    let early_id = early["id"].as_i64().unwrap();
    let (status, updated) = t
        .send(
            "PUT",
            &format!("/api/content/coming-soon/{}", early_id),
            Some(&admin),
            Some(json!({ "isActive": true, "description": "Before it all" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Prequel");
    assert_eq!(updated["description"], "Before it all");

    let (status, _) = t
        .send(
            "DELETE",
            &format!("/api/content/coming-soon/{}", early_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, active) = t.send("GET", "/api/content/coming-soon/active", None, None).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

// =============================================================================
// Rating breakdowns
// =============================================================================

#[tokio::test]
async fn test_dynamics_and_country_ratings() {
    let t = setup_app().await;
    let admin = t.admin_token().await;
    let content_id = t.create_content(&admin, "Amelie", "Romance").await;

    let (_, empty) = t
        .send("GET", &format!("/api/content/{}/dynamics", content_id), None, None)
        .await;
    assert!(empty.as_array().unwrap().is_empty());

    for (name, country, rating) in [("uma", "France", 9.0), ("vic", "France", 6.0), ("walt", "Germany", 3.0)] {
        let (_, token) = t.register(name, "USER").await;
        let (status, _) = t
            .send("PATCH", "/api/users/me", Some(&token), Some(json!({ "country": country })))
            .await;
        assert_eq!(status, StatusCode::OK);
        t.review(&token, content_id, Some(rating)).await;
    }
    // Reviews without a rating stay out of both views
    let (_, silent) = t.register("xena", "USER").await;
    t.send("PATCH", "/api/users/me", Some(&silent), Some(json!({ "country": "Spain" })))
        .await;
    t.review(&silent, content_id, None).await;

    let (status, points) = t
        .send("GET", &format!("/api/content/{}/dynamics", content_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let points = points.as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["reviewCount"], 3);
    assert_eq!(points[0]["weeklyAvg"], "6.00");
    assert_eq!(points[0]["cumulativeAvg"], "6.00");

    let (status, body) = t
        .send("GET", &format!("/api/content/{}/country-ratings", content_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRatings"], 3);
    assert_eq!(body["countriesCount"], 2);
    assert_eq!(body["globalAvg"].as_f64().unwrap(), 6.0);

    let france = &body["ratings"][0];
    assert_eq!(france["country"], "France");
    assert_eq!(france["countryCode"], "FR");
    assert_eq!(france["count"], 2);
    assert_eq!(france["avgRating"].as_f64().unwrap(), 7.5);
    assert_eq!(france["positiveCount"], 1);
    assert_eq!(france["mixedCount"], 1);
    assert_eq!(france["difference"].as_f64().unwrap(), 1.5);

    let germany = &body["ratings"][1];
    assert_eq!(germany["negativeCount"], 1);
    assert_eq!(germany["difference"].as_f64().unwrap(), -3.0);
}
