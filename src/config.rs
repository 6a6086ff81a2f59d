use std::time::Duration;

use async_graphql::http::MultipartOptions;
use clap::{ArgAction, Args, ValueEnum};

/// Per-file ceiling for GraphQL multipart uploads (50 MB)
pub const MAX_UPLOAD_FILE_SIZE: usize = 50 * 1000 * 1000;
/// Maximum number of files accepted in one GraphQL request
pub const MAX_UPLOAD_FILES: usize = 20;

const DEFAULT_MAX_QUERY_DEPTH: usize = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Args, Clone, Debug)]
pub struct ServerConfig {
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,
    #[arg(short, long, env = "DATABASE_PATH", default_value = "spoke.db")]
    pub database: String,
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,
    #[arg(long, env = "SUPERADMIN_TOKEN")]
    pub superadmin_token: Option<String>,
    #[arg(long, env = "SESSION_TTL_SECS", default_value = "86400")]
    pub session_ttl_secs: u64,
    /// Fill fields without resolvers with mock values
    #[arg(long, env = "GRAPHQL_MOCKS", default_value_t = true, action = ArgAction::Set)]
    pub mocks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database: "spoke.db".to_string(),
            environment: Environment::default(),
            cors_origin: None,
            superadmin_token: None,
            session_ttl_secs: 86_400,
            mocks: true,
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn graphql(&self) -> GraphQLOptions {
        GraphQLOptions {
            mocks: self.mocks,
            ..GraphQLOptions::for_environment(self.environment)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size: usize,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_UPLOAD_FILE_SIZE,
            max_files: MAX_UPLOAD_FILES,
        }
    }
}

impl UploadLimits {
    pub fn multipart_options(&self) -> MultipartOptions {
        MultipartOptions::default()
            .max_file_size(self.max_file_size)
            .max_num_files(self.max_files)
    }
}

/// Settings the GraphQL server derives from the process environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphQLOptions {
    pub production: bool,
    pub introspection: bool,
    pub playground: bool,
    pub debug: bool,
    pub mocks: bool,
    pub max_depth: usize,
    pub uploads: UploadLimits,
}

impl GraphQLOptions {
    pub fn for_environment(environment: Environment) -> Self {
        let production = environment.is_production();
        Self {
            production,
            introspection: !production,
            playground: !production,
            debug: !production,
            mocks: true,
            max_depth: DEFAULT_MAX_QUERY_DEPTH,
            uploads: UploadLimits::default(),
        }
    }
}
