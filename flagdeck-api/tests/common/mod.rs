//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - A router wired to a fresh in-memory store
//! - Signup and login helpers returning bearer tokens
//! - A request helper that decodes JSON responses

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use flagdeck_api::app::{build_router, AppState};
use flagdeck_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, LogFormat};
use flagdeck_shared::store::memory::MemoryDatabase;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test context holding the router and the store behind it
pub struct TestContext {
    pub db: Arc<MemoryDatabase>,
    pub app: axum::Router,
}

impl TestContext {
    pub fn new() -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let app = build_router(AppState::new(db.clone(), test_config()));

        Self { db, app }
    }

    /// Sends a request and returns the status with the decoded body
    ///
    /// Non-JSON bodies (axum extractor rejections) decode to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
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

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Signs up `username` with `role` and asserts success
    pub async fn signup(&self, username: &str, role: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/signup",
                None,
                Some(json!({
                    "email": format!("{}@example.com", username),
                    "username": username,
                    "password": PASSWORD,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {}", body);
        body
    }

    /// Logs in through the JSON endpoint and returns the access token
    pub async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Signs up and logs in, returning the new user's id and token
    pub async fn register(&self, username: &str, role: &str) -> (String, String) {
        let user = self.signup(username, role).await;
        let token = self.login(username).await;
        (user["id"].as_str().unwrap().to_string(), token)
    }

    pub async fn create_project(&self, token: &str, name: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/v1/projects",
                token,
                json!({ "name": name, "description": "test project" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create project failed: {}", body);
        body
    }

    pub async fn create_flag(
        &self,
        token: &str,
        project_id: &str,
        name: &str,
        environment: &str,
    ) -> (StatusCode, Value) {
        self.post(
            "/api/v1/feature-flags",
            token,
            json!({
                "name": name,
                "description": "x",
                "is_enabled": true,
                "environment": environment,
                "project_id": project_id,
            }),
        )
        .await
    }
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "memory://".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            access_token_expire_minutes: 30,
        },
        log_format: LogFormat::Text,
    }
}
