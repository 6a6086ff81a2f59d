use async_graphql::dynamic::SchemaBuilder;

use super::mock_schema::{self, MockOptions, SchemaBuildError};
use super::mocks::app_mocks;
use super::resolvers::resolver_map;

/// SDL for the API, compiled into the binary
pub const TYPE_DEFS: &str = include_str!("schema.graphql");

/// Assemble the API schema from its type definitions, resolvers and mocks
pub fn schema_builder(mocks: bool) -> Result<SchemaBuilder, SchemaBuildError> {
    mock_schema::build(
        TYPE_DEFS,
        &resolver_map(),
        app_mocks(),
        MockOptions {
            mocks,
            preserve_resolvers: true,
        },
    )
}
