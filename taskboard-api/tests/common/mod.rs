//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Router built over the per-test database from `#[sqlx::test]`
//! - Test user creation and JWT token generation
//! - Request helpers returning status and parsed JSON

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::auth::jwt::{create_token, Claims, TokenType};
use taskboard_shared::models::user::{CreateUser, User};
use tower::Service as _;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Test context holding the app and its database
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

/// A registered user with a ready access token
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

impl TestContext {
    pub fn new(db: PgPool) -> Self {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgresql://unused".to_string()),
            "JWT_SECRET" => Some(TEST_JWT_SECRET.to_string()),
            _ => None,
        })
        .expect("Test configuration is valid");

        let app = build_router(AppState::new(db.clone(), config.clone()));

        TestContext { db, app, config }
    }

    /// Inserts a user directly and signs an access token for them
    pub async fn user(&self, name: &str) -> TestUser {
        let user = User::create(
            &self.db,
            CreateUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "not-a-real-hash".to_string(),
            },
        )
        .await
        .expect("Failed to create test user");

        let token = create_token(&Claims::new(user.id, TokenType::Access), TEST_JWT_SECRET)
            .expect("Failed to sign test token");

        TestUser { user, token }
    }

    /// Sends a request and returns the status with the parsed body (`Null` if empty)
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, as_user: &TestUser) -> (StatusCode, Value) {
        self.send("GET", uri, Some(&as_user.token), None).await
    }

    pub async fn post(&self, uri: &str, as_user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(&as_user.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, as_user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(&as_user.token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, as_user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send("PATCH", uri, Some(&as_user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, as_user: &TestUser) -> (StatusCode, Value) {
        self.send("DELETE", uri, Some(&as_user.token), None).await
    }

    /// Creates a project through the API and returns its UUID
    pub async fn create_project(&self, owner: &TestUser, name: &str) -> String {
        let (status, body) = self
            .post("/projects", owner, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["data"]["uuid"].as_str().unwrap().to_string()
    }

    /// Creates a task through the API and returns its body
    pub async fn create_task(&self, project: &str, as_user: &TestUser, body: Value) -> Value {
        let (status, body) = self.post(&format!("/projects/{project}/tasks"), as_user, body).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["data"].clone()
    }
}
