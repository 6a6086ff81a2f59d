//! Decides what callers see of execution errors
//!
//! Every error leaving the GraphQL server passes through [`ErrorFormatter`].
//! Database-layer failures are redacted in production so that table names,
//! constraint names and SQL fragments never reach a client.

use std::sync::Arc;

use async_graphql::{BatchResponse, ErrorExtensionValues, Response, ServerError};
use sea_orm::DbErr;
use tracing::error;

use crate::errors::{ApiError, INTERNAL_SERVER_ERROR_MESSAGE};

#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorFormatter {
    production: bool,
    debug: bool,
}

impl ErrorFormatter {
    pub fn new(production: bool, debug: bool) -> Self {
        Self { production, debug }
    }

    pub fn format(&self, err: ServerError) -> ServerError {
        if self.production && is_database_failure(&err) {
            error!(
                message = %err.message,
                path = ?err.path,
                "Database error"
            );

            let mut redacted = ServerError::new(INTERNAL_SERVER_ERROR_MESSAGE, None);
            redacted.locations = err.locations;
            redacted.path = err.path;
            return redacted;
        }

        error!(message = %err.message, path = ?err.path, "GraphQL error");

        if !self.debug {
            return err;
        }

        let exception = if let Some(api) = err.source::<Arc<ApiError>>() {
            Some(format!("{:?}", api))
        } else {
            err.source::<DbErr>().map(|db| format!("{:?}", db))
        };

        match exception {
            Some(exception) => {
                let mut err = err;
                err.extensions
                    .get_or_insert_with(ErrorExtensionValues::default)
                    .set("exception", exception);
                err
            }
            None => err,
        }
    }

    pub fn format_response(&self, mut response: Response) -> Response {
        if !response.errors.is_empty() {
            response.errors = std::mem::take(&mut response.errors)
                .into_iter()
                .map(|err| self.format(err))
                .collect();
        }
        response
    }

    pub fn format_batch(&self, response: BatchResponse) -> BatchResponse {
        match response {
            BatchResponse::Single(response) => BatchResponse::Single(self.format_response(response)),
            BatchResponse::Batch(responses) => BatchResponse::Batch(
                responses
                    .into_iter()
                    .map(|response| self.format_response(response))
                    .collect(),
            ),
        }
    }
}

/// True when the error was caused by the database driver
pub fn is_database_failure(err: &ServerError) -> bool {
    if err.source::<DbErr>().is_some() {
        return true;
    }
    if let Some(api) = err.source::<Arc<ApiError>>() {
        return api.is_database_error();
    }
    err.source::<ApiError>()
        .map(ApiError::is_database_error)
        .unwrap_or(false)
}
