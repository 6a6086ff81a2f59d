//! Shared fixtures for the HTTP integration tests

#![allow(dead_code)]

use anyhow::Result;
use axum::http::{header, HeaderValue};
use axum_test::TestServer;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, IntoActiveModel, Set};
use serde_json::{json, Value};
use spoke::auth::{AuthUser, Role};
use spoke::config::{Environment, ServerConfig};
use spoke::database::connection::setup_database;
use spoke::database::entities::{campaigns, organizations, user_organizations, users};
use spoke::server::app::{build_state, router, AppState};
use tempfile::NamedTempFile;

pub const SUPERADMIN_TOKEN: &str = "test-superadmin-token";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    // Keeps the database file alive for the lifetime of the test
    _db_file: NamedTempFile,
}

impl TestApp {
    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Start a session for `user` and return its bearer token
    pub fn sign_in(&self, user: &users::Model) -> String {
        self.state.sessions.create(AuthUser::from(user))
    }

    pub async fn graphql(&self, token: Option<&str>, query: &str, variables: Value) -> Value {
        let mut request = self
            .server
            .post("/graphql")
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = token {
            request = request.add_header(header::AUTHORIZATION, bearer(token));
        }
        request.await.json::<Value>()
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
}

pub fn config(environment: Environment) -> ServerConfig {
    ServerConfig {
        environment,
        superadmin_token: Some(SUPERADMIN_TOKEN.to_string()),
        ..ServerConfig::default()
    }
}

pub async fn spawn_app(config: ServerConfig) -> Result<TestApp> {
    let db_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    let state = build_state(db, &config)?;
    let server = TestServer::new(router(state.clone())?)?;

    Ok(TestApp {
        server,
        state,
        _db_file: db_file,
    })
}

pub async fn seed_organization(db: &DatabaseConnection, name: &str) -> Result<organizations::Model> {
    Ok(organizations::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn seed_user(db: &DatabaseConnection, email: &str) -> Result<users::Model> {
    Ok(users::ActiveModel {
        email: Set(email.to_string()),
        first_name: Set("Ada".to_string()),
        last_name: Set("Lovelace".to_string()),
        is_superadmin: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn seed_member(
    db: &DatabaseConnection,
    organization: &organizations::Model,
    email: &str,
    role: Role,
) -> Result<users::Model> {
    let user = seed_user(db, email).await?;
    user_organizations::ActiveModel {
        user_id: Set(user.id),
        organization_id: Set(organization.id),
        role: Set(role.as_str().to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(user)
}

pub async fn seed_campaign(
    db: &DatabaseConnection,
    organization: &organizations::Model,
    title: &str,
    is_started: bool,
) -> Result<campaigns::Model> {
    let now = Utc::now();
    Ok(campaigns::ActiveModel {
        organization_id: Set(organization.id),
        title: Set(title.to_string()),
        description: Set(format!("{} description", title)),
        is_started: Set(is_started),
        is_archived: Set(false),
        landlines_filtered: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn mark_landlines_filtered(
    db: &DatabaseConnection,
    campaign: campaigns::Model,
) -> Result<campaigns::Model> {
    let mut active = campaign.into_active_model();
    active.landlines_filtered = Set(true);
    Ok(active.update(db).await?)
}

pub fn error_code(body: &Value) -> Option<&str> {
    body["errors"][0]["extensions"]["code"].as_str()
}

pub fn error_message(body: &Value) -> Option<&str> {
    body["errors"][0]["message"].as_str()
}
