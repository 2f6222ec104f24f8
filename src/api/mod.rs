//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - auth (register, login, logout, me)
//! - courses and their feeds
//! - content categories
//! - forum posts, comments, likes and collections
//! - admin maintenance

pub mod admin;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod common;
pub mod courses;
pub mod middleware;
pub mod posts;
pub mod responses;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::DatabasePool;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.pool.ping().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": format!("{:?}", state.pool.driver()).to_lowercase(),
    })))
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .route("/admin/forum/heat/refresh", post(admin::refresh_heat))
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route("/courses", post(courses::create_course))
        .route("/forum/posts", post(posts::create_post))
        .route("/forum/posts/{id}", put(posts::update_post).delete(posts::delete_post))
        .route("/forum/posts/{id}/like", post(posts::toggle_like))
        .route("/forum/posts/{id}/collect", post(posts::toggle_collect))
        .route("/forum/posts/{id}/bounty", post(posts::set_bounty))
        .route("/forum/posts/{id}/comments", post(comments::create_comment))
        .route("/forum/comments/{id}", axum::routing::delete(comments::delete_comment))
        .route("/forum/comments/{id}/like", post(comments::toggle_comment_like))
        .route("/forum/collections", get(posts::list_collections))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; a valid session still identifies the viewer
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route("/courses/{id}/posts", get(courses::course_feed))
        .route("/categories", get(categories::list_categories))
        .route("/forum/posts", get(posts::global_feed))
        .route("/forum/posts/{id}", get(posts::get_post))
        .route("/forum/posts/{id}/comments", get(comments::list_comments))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    // Cookie sessions need credentials, which rule out a wildcard origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let state = AppState::new(pool, &Config::default(), Arc::new(MemoryCache::new()));
        build_router(state, "http://localhost:3000").unwrap()
    }

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str, role: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": username, "password": "password123", "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// admin, student, teacher tokens plus a course owned by the teacher
    async fn seeded() -> (Router, String, String, String, i64) {
        let app = app().await;
        let admin = register(&app, "root", "student").await;
        let alice = register(&app, "alice", "student").await;
        let bob = register(&app, "bob", "teacher").await;

        let (status, course) = send(
            &app,
            Method::POST,
            "/api/v1/courses",
            Some(&bob),
            Some(json!({ "code": "cs101", "name": "Intro to CS" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let course_id = course["id"].as_i64().unwrap();
        (app, admin, alice, bob, course_id)
    }

    async fn create_post(app: &Router, token: &str, body: Value) -> String {
        let (status, created) = send(app, Method::POST, "/api/v1/forum/posts", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        created["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_categories() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "sqlite");

        let (status, body) = send(&app, Method::GET, "/api/v1/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["kind"], "qa");
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let app = app().await;
        let token = register(&app, "founder", "student").await;

        let (status, me) = send(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["role"], "admin");

        let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let app = app().await;
        register(&app, "alice", "student").await;
        let bad = json!({ "username": "alice", "password": "wrong-password" });

        for _ in 0..5 {
            let (status, _) = send(&app, Method::POST, "/api/v1/auth/login", None, Some(bad.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let good = json!({ "username": "alice", "password": "password123" });
        let (status, body) = send(&app, Method::POST, "/api/v1/auth/login", None, Some(good)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    async fn send_raw(app: &Router, uri: &str, token: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_bodies_use_error_payload() {
        let (app, _admin, alice, _bob, course_id) = seeded().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/forum/posts",
            Some(&alice),
            Some(json!({ "content": "no title" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "body");
        assert!(body["error"]["details"]["message"].as_str().unwrap().contains("title"));

        let (status, body) = send_raw(&app, "/api/v1/forum/posts", &alice, "application/json", "{\"title\":").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send_raw(&app, "/api/v1/forum/posts", &alice, "text/plain", "title=x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "body");

        let id = create_post(&app, &alice, json!({ "title": "Q", "content": "?", "course_id": course_id })).await;
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/forum/posts/{}/comments", id),
            Some(&alice),
            Some(json!({ "content": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(&app, Method::POST, "/api/v1/auth/login", None, Some(json!({ "username": "alice" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_post_detail_like_and_view() {
        let (app, _admin, alice, bob, course_id) = seeded().await;
        let id = create_post(
            &app,
            &alice,
            json!({ "title": "Exam tips", "content": "Read chapter 3", "course_id": course_id, "category_id": 2 }),
        )
        .await;

        let uri = format!("/api/v1/forum/posts/{}/like", id);
        let (status, _) = send(&app, Method::POST, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, liked) = send(&app, Method::POST, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(liked["action"], "like");
        assert_eq!(liked["like_count"], 1);
        assert!(liked["heat_score"].as_f64().unwrap() > 0.0);

        let (_, unliked) = send(&app, Method::POST, &uri, Some(&bob), None).await;
        assert_eq!(unliked["action"], "unlike");
        assert_eq!(unliked["like_count"], 0);

        let (_, collected) = send(
            &app,
            Method::POST,
            &format!("/api/v1/forum/posts/{}/collect", id),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(collected["action"], "collect");
        assert_eq!(collected["collect_count"], 1);

        let (status, detail) = send(&app, Method::GET, &format!("/api/v1/forum/posts/{}", id), Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["post"]["view_count"], 1);
        assert_eq!(detail["has_collected"], true);
        assert_eq!(detail["has_liked"], false);

        let (_, collections) = send(&app, Method::GET, "/api/v1/forum/collections", Some(&bob), None).await;
        assert_eq!(collections["total"], 1);
    }

    #[tokio::test]
    async fn test_anonymous_author_is_masked() {
        let (app, _admin, alice, bob, _) = seeded().await;
        let id = create_post(
            &app,
            &alice,
            json!({ "title": "Secret", "content": "shh", "is_anonymous": true }),
        )
        .await;
        let uri = format!("/api/v1/forum/posts/{}", id);

        let (_, as_bob) = send(&app, Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(as_bob["post"]["author_name"], "Anonymous");
        assert!(as_bob["post"]["author_id"].is_null());

        let (_, as_alice) = send(&app, Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(as_alice["post"]["author_name"], "alice");
    }

    #[tokio::test]
    async fn test_permissions_and_errors() {
        let (app, admin, alice, bob, _) = seeded().await;
        let id = create_post(&app, &alice, json!({ "title": "Mine", "content": "body" })).await;
        let uri = format!("/api/v1/forum/posts/{}", id);

        let (status, body) = send(&app, Method::PUT, &uri, Some(&bob), Some(json!({ "title": "Hijacked" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, body) = send(&app, Method::POST, "/api/v1/forum/posts", Some(&alice), Some(json!({ "title": " ", "content": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "title");

        let (status, _) = send(&app, Method::POST, "/api/v1/forum/posts", Some(&admin), Some(json!({ "title": "t", "content": "x" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::GET, "/api/v1/courses/999/posts", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Post not found");
    }

    #[tokio::test]
    async fn test_comment_endpoints() {
        let (app, _admin, alice, bob, _) = seeded().await;
        let id = create_post(&app, &alice, json!({ "title": "Q", "content": "?" })).await;
        let comments_uri = format!("/api/v1/forum/posts/{}/comments", id);

        let (status, added) = send(&app, Method::POST, &comments_uri, Some(&bob), Some(json!({ "content": "answer" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(added["comment_count"], 1);
        let root_id = added["comment"]["id"].as_str().unwrap().to_string();

        let (_, reply) = send(
            &app,
            Method::POST,
            &comments_uri,
            Some(&alice),
            Some(json!({ "content": "thanks", "parent_id": root_id })),
        )
        .await;
        assert_eq!(reply["comment_count"], 2);

        let (status, listed) = send(&app, Method::GET, &comments_uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["items"][0]["content"], "answer");
        assert_eq!(listed["items"][0]["replies"][0]["content"], "thanks");

        let like_uri = format!("/api/v1/forum/comments/{}/like", root_id);
        let (_, liked) = send(&app, Method::POST, &like_uri, Some(&alice), None).await;
        assert_eq!(liked["like_count"], 1);
        assert!(liked.get("heat_score").is_none());

        let (status, deleted) = send(&app, Method::DELETE, &format!("/api/v1/forum/comments/{}", root_id), Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["removed"], 2);
        assert_eq!(deleted["comment_count"], 0);
    }

    #[tokio::test]
    async fn test_feed_and_admin_refresh() {
        let (app, admin, alice, _bob, course_id) = seeded().await;
        for title in ["first", "second", "third"] {
            create_post(&app, &alice, json!({ "title": title, "content": "c", "course_id": course_id })).await;
        }

        let (status, feed) = send(
            &app,
            Method::GET,
            &format!("/api/v1/courses/{}/posts?sort=newest&page=abc", course_id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed["total"], 3);
        assert_eq!(feed["page"], 1);

        let (status, empty) = send(&app, Method::GET, "/api/v1/forum/posts?page=5", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(empty["items"].as_array().unwrap().len(), 0);

        let (status, _) = send(&app, Method::POST, "/api/v1/admin/forum/heat/refresh", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, refreshed) = send(&app, Method::POST, "/api/v1/admin/forum/heat/refresh", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refreshed["updated"], 3);
    }
}
