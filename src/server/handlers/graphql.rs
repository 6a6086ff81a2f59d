//! HTTP entry points for `/graphql`

use async_graphql::http::{
    parse_query_string, playground_source, receive_batch_body, GraphQLPlaygroundConfig,
};
use async_graphql::{ParseRequestError, Request};
use async_graphql_axum::GraphQLResponse;
use async_graphql_parser::types::{DocumentOperations, OperationType};
use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::Extension;
use futures_util::TryStreamExt;
use serde_json::json;
use tracing::warn;

use crate::auth::AuthUser;
use crate::server::app::AppState;

pub const GRAPHQL_PATH: &str = "/graphql";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

/// Execute a JSON or multipart (upload) request
pub async fn graphql_post(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let reader = body
        .into_data_stream()
        .map_err(std::io::Error::other)
        .into_async_read();

    let limits = state.graphql.upload_limits();
    let request = match receive_batch_body(content_type, reader, limits.multipart_options()).await
    {
        Ok(request) => request,
        Err(ParseRequestError::PayloadTooLarge) => {
            warn!("Rejected oversized GraphQL upload");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
        }
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let files: usize = request.iter().map(|request| request.uploads.len()).sum();
    if files > limits.max_files {
        warn!(files, max_files = limits.max_files, "Rejected GraphQL upload with too many files");
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("At most {} files may be uploaded per request", limits.max_files),
        );
    }

    let user = user.map(|Extension(user)| user);
    GraphQLResponse::from(state.graphql.execute_batch(request, user).await).into_response()
}

/// Execute a query-string request, or serve the playground to browsers
pub async fn graphql_get(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let query = query.unwrap_or_default();

    if !has_query_param(&query) {
        if accepts_html(&headers) && state.graphql.playground_enabled() {
            return Html(playground_source(GraphQLPlaygroundConfig::new(GRAPHQL_PATH)))
                .into_response();
        }
        return error_response(StatusCode::BAD_REQUEST, "Must provide query string");
    }

    let request = match parse_query_string(&query) {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    if is_mutation(&request) {
        return error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Mutations cannot be sent over GET",
        );
    }

    let user = user.map(|Extension(user)| user);
    GraphQLResponse::from(state.graphql.execute(request, user).await).into_response()
}

fn has_query_param(query: &str) -> bool {
    query
        .split('&')
        .any(|pair| pair.split('=').next() == Some("query"))
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

/// True when the operation selected by the request is a mutation.
///
/// Documents that fail to parse are left for execution to report.
fn is_mutation(request: &Request) -> bool {
    let Ok(document) = async_graphql_parser::parse_query(&request.query) else {
        return false;
    };

    match document.operations {
        DocumentOperations::Single(operation) => operation.node.ty == OperationType::Mutation,
        DocumentOperations::Multiple(operations) => match &request.operation_name {
            Some(name) => operations
                .get(name.as_str())
                .map(|operation| operation.node.ty == OperationType::Mutation)
                .unwrap_or(false),
            None => operations
                .values()
                .any(|operation| operation.node.ty == OperationType::Mutation),
        },
    }
}
