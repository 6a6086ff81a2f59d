use async_graphql::dynamic::Schema;
use async_graphql::{BatchRequest, BatchResponse, Executor, Request, Response};
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use super::context::ContextFactory;
use super::formatter::ErrorFormatter;
use super::mock_schema::SchemaBuildError;
use super::schema::schema_builder;
use crate::auth::AuthUser;
use crate::config::{GraphQLOptions, UploadLimits};

/// The executable GraphQL endpoint: schema, error formatter and context
/// factory bound together with the environment's settings
pub struct GraphQLServer {
    schema: Schema,
    formatter: ErrorFormatter,
    contexts: ContextFactory,
    options: GraphQLOptions,
}

impl GraphQLServer {
    pub fn build(db: DatabaseConnection, options: GraphQLOptions) -> Result<Self, SchemaBuildError> {
        let mut builder = schema_builder(options.mocks)?
            .data(db.clone())
            .limit_depth(options.max_depth);
        if !options.introspection {
            builder = builder.disable_introspection();
        }
        let schema = builder
            .finish()
            .map_err(|e| SchemaBuildError::Build(e.to_string()))?;

        info!(
            production = options.production,
            introspection = options.introspection,
            playground = options.playground,
            mocks = options.mocks,
            "GraphQL schema ready"
        );

        Ok(Self {
            schema,
            formatter: ErrorFormatter::new(options.production, options.debug),
            contexts: ContextFactory::new(db),
            options,
        })
    }

    /// Execute a single or batched request with a fresh request context
    pub async fn execute_batch(&self, request: BatchRequest, user: Option<AuthUser>) -> BatchResponse {
        let context = self.contexts.create(user);
        debug!(request_id = %context.request_id, "Executing GraphQL request");

        let response = self.schema.execute_batch(request.data(context)).await;
        self.formatter.format_batch(response)
    }

    pub async fn execute(&self, request: Request, user: Option<AuthUser>) -> Response {
        match self
            .execute_batch(BatchRequest::Single(request), user)
            .await
        {
            BatchResponse::Single(response) => response,
            BatchResponse::Batch(mut responses) => responses.pop().unwrap_or_default(),
        }
    }

    pub fn playground_enabled(&self) -> bool {
        self.options.playground
    }

    pub fn upload_limits(&self) -> UploadLimits {
        self.options.uploads
    }
}
