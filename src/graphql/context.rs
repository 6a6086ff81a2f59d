use std::sync::Arc;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use super::loaders::Loaders;
use crate::auth::AuthUser;
use crate::errors::{ApiError, ApiResult};

/// State visible to every resolver while one request executes
#[derive(Clone)]
pub struct RequestContext {
    pub loaders: Arc<Loaders>,
    pub user: Option<AuthUser>,
    pub request_id: String,
}

impl RequestContext {
    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> ApiResult<&AuthUser> {
        self.user.as_ref().ok_or(ApiError::Unauthenticated)
    }
}

/// Builds a [`RequestContext`] per request.
///
/// Every call constructs a new loader collection, so DataLoader caches are
/// never shared between requests.
#[derive(Clone)]
pub struct ContextFactory {
    db: DatabaseConnection,
}

impl ContextFactory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn create(&self, user: Option<AuthUser>) -> RequestContext {
        RequestContext {
            loaders: Arc::new(Loaders::new(&self.db)),
            user,
            request_id: Uuid::new_v4().to_string(),
        }
    }
}
