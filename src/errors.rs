//! Error types shared by the GraphQL layer and the REST routes
//!
//! Resolvers return [`ApiError`] and convert it with
//! [`api_error_to_graphql_error`], which keeps the typed error as the
//! GraphQL error source. The error formatter relies on that source to tell
//! database-layer failures apart from everything else.

use std::fmt::Display;
use std::sync::Arc;

use async_graphql::{Error as GraphQLError, ErrorExtensions};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

/// Message sent to clients in place of errors that must not leak.
pub const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        ApiError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    /// Stable error code exposed under `extensions.code`
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Validation { .. } => "VALIDATION_FAILED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Upload(_) => "BAD_USER_INPUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the failure originated in the database driver
    pub fn is_database_error(&self) -> bool {
        matches!(self, ApiError::Database(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation { .. } | ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

/// Convert an API error into a GraphQL error with structured extensions.
///
/// The error is stored as an `Arc<ApiError>` source so it can be recovered
/// with `ServerError::source::<Arc<ApiError>>()` after execution.
pub fn api_error_to_graphql_error(err: impl Into<Arc<ApiError>>) -> GraphQLError {
    let err: Arc<ApiError> = err.into();
    let details = Arc::clone(&err);

    GraphQLError::new_with_source(err).extend_with(move |_, e| {
        e.set("code", details.code());
        match details.as_ref() {
            ApiError::NotFound { entity, id } => {
                e.set("entity", *entity);
                e.set("id", id.as_str());
            }
            ApiError::Validation { field, .. } => {
                e.set("field", field.as_str());
            }
            _ => {}
        }
    })
}

/// Lift API, loader and database results into GraphQL results
pub trait ResultExt<T> {
    fn into_graphql(self) -> async_graphql::Result<T>;
}

impl<T> ResultExt<T> for Result<T, ApiError> {
    fn into_graphql(self) -> async_graphql::Result<T> {
        self.map_err(api_error_to_graphql_error)
    }
}

impl<T> ResultExt<T> for Result<T, Arc<ApiError>> {
    fn into_graphql(self) -> async_graphql::Result<T> {
        self.map_err(api_error_to_graphql_error)
    }
}

impl<T> ResultExt<T> for Result<T, DbErr> {
    fn into_graphql(self) -> async_graphql::Result<T> {
        self.map_err(|e| api_error_to_graphql_error(ApiError::from(e)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            INTERNAL_SERVER_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
