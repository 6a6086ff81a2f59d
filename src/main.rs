use anyhow::Result;
use clap::{Parser, Subcommand};
use spoke::config::ServerConfig;
use spoke::server::{self, MigrateDirection};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(ServerConfig),
    /// Apply or roll back database migrations
    Migrate {
        #[clap(short, long, env = "DATABASE_PATH", default_value = "spoke.db")]
        database: String,
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Serve(config) => {
            info!(
                "Starting server on port {} ({:?})",
                config.port, config.environment
            );
            server::start_server(config).await?;
        }
        Commands::Migrate {
            database,
            direction,
        } => {
            server::migrate_database(&database, direction).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
