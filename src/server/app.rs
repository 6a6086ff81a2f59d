use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{graphql, health, superadmin};
use crate::auth::{authenticate, SessionStore};
use crate::config::ServerConfig;
use crate::graphql::GraphQLServer;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub graphql: Arc<GraphQLServer>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<ServerConfig>,
}

fn spawn_session_purge(sessions: Arc<SessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, active = sessions.len(), "Purged expired sessions");
            }
        }
    });
}

fn cors_layer(cors_origin: Option<&str>) -> Result<CorsLayer> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let layer = match cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(
            origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow!("Invalid CORS origin: {}", e))?,
        ),
        None => CorsLayer::new().allow_origin(Any),
    };

    Ok(layer
        .allow_methods(methods)
        .allow_headers(Any)
        .allow_credentials(false))
}

/// Build the shared state for a router without starting background tasks
pub fn build_state(db: DatabaseConnection, config: &ServerConfig) -> Result<AppState> {
    let graphql_server = GraphQLServer::build(db.clone(), config.graphql())?;

    Ok(AppState {
        db,
        graphql: Arc::new(graphql_server),
        sessions: Arc::new(SessionStore::new(config.session_ttl())),
        config: Arc::new(config.clone()),
    })
}

pub fn router(state: AppState) -> Result<Router> {
    let cors = cors_layer(state.config.cors_origin.as_deref())?;

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route(
            graphql::GRAPHQL_PATH,
            get(graphql::graphql_get)
                .post(graphql::graphql_post)
                .options(|| async { StatusCode::OK }),
        )
        .route("/superadmin-login", post(superadmin::superadmin_login))
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            authenticate,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

pub async fn create_app(db: DatabaseConnection, config: &ServerConfig) -> Result<Router> {
    let state = build_state(db, config)?;
    spawn_session_purge(state.sessions.clone());
    router(state)
}
