pub mod app;
pub mod handlers;

use anyhow::Result;
use clap::Subcommand;
use sea_orm_migration::prelude::*;
use tracing::info;

use crate::config::ServerConfig;
use crate::database::{connection::*, migrations::Migrator};

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(config: ServerConfig) -> Result<()> {
    let database_url = get_database_url(Some(&config.database));
    let db = establish_connection(&database_url).await?;

    setup_database(&db).await?;
    info!("Database migrations completed");

    let app = app::create_app(db, &config).await?;

    log_routes(&config);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes(config: &ServerConfig) {
    let options = config.graphql();

    info!("API Endpoints:");
    info!("  /health                     - Health check");
    info!("  /graphql                    - GraphQL API (GET, POST, multipart uploads)");
    info!("  /superadmin-login           - Superadmin sign-in");
    if options.playground {
        info!("  GraphQL playground served at /graphql for browsers");
    }
    if options.mocks {
        info!("  Unresolved schema fields are served with mock values");
    }
    if config.superadmin_token.is_none() {
        info!("  SUPERADMIN_TOKEN not set, superadmin login is disabled");
    }
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::fresh(&db).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
