//! Per-request DataLoaders
//!
//! A fresh [`Loaders`] collection is built for every request context, so
//! cached rows never outlive the request that loaded them.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::{DataLoader, HashMapCache, Loader};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};

use crate::database::entities::{campaigns, organizations, users};
use crate::errors::ApiError;

pub struct OrganizationLoader {
    db: DatabaseConnection,
}

impl Loader<i32> for OrganizationLoader {
    type Value = organizations::Model;
    type Error = Arc<ApiError>;

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let rows = organizations::Entity::find()
            .filter(organizations::Column::Id.is_in(keys.iter().copied()))
            .all(&self.db)
            .await
            .map_err(|e| Arc::new(ApiError::from(e)))?;

        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }
}

pub struct UserLoader {
    db: DatabaseConnection,
}

impl Loader<i32> for UserLoader {
    type Value = users::Model;
    type Error = Arc<ApiError>;

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let rows = users::Entity::find()
            .filter(users::Column::Id.is_in(keys.iter().copied()))
            .all(&self.db)
            .await
            .map_err(|e| Arc::new(ApiError::from(e)))?;

        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }
}

pub struct CampaignLoader {
    db: DatabaseConnection,
}

impl Loader<i32> for CampaignLoader {
    type Value = campaigns::Model;
    type Error = Arc<ApiError>;

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let rows = campaigns::Entity::find()
            .filter(campaigns::Column::Id.is_in(keys.iter().copied()))
            .all(&self.db)
            .await
            .map_err(|e| Arc::new(ApiError::from(e)))?;

        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }
}

/// Campaigns grouped by the organization that owns them
pub struct OrganizationCampaignsLoader {
    db: DatabaseConnection,
}

impl Loader<i32> for OrganizationCampaignsLoader {
    type Value = Vec<campaigns::Model>;
    type Error = Arc<ApiError>;

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let rows = campaigns::Entity::find()
            .filter(campaigns::Column::OrganizationId.is_in(keys.iter().copied()))
            .order_by_asc(campaigns::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| Arc::new(ApiError::from(e)))?;

        debug!(rows = rows.len(), "Loaded organization campaigns");

        // Organizations without campaigns still resolve to an empty list
        let mut grouped: HashMap<i32, Vec<campaigns::Model>> =
            keys.iter().map(|key| (*key, Vec::new())).collect();
        for row in rows {
            grouped.entry(row.organization_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

/// The loader collection carried by a request context
pub struct Loaders {
    pub organization: Arc<DataLoader<OrganizationLoader, HashMapCache>>,
    pub user: Arc<DataLoader<UserLoader, HashMapCache>>,
    pub campaign: Arc<DataLoader<CampaignLoader, HashMapCache>>,
    pub organization_campaigns: Arc<DataLoader<OrganizationCampaignsLoader, HashMapCache>>,
}

impl Loaders {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self {
            organization: Arc::new(DataLoader::with_cache(
                OrganizationLoader { db: db.clone() },
                tokio::spawn,
                HashMapCache::default(),
            )),
            user: Arc::new(DataLoader::with_cache(
                UserLoader { db: db.clone() },
                tokio::spawn,
                HashMapCache::default(),
            )),
            campaign: Arc::new(DataLoader::with_cache(
                CampaignLoader { db: db.clone() },
                tokio::spawn,
                HashMapCache::default(),
            )),
            organization_campaigns: Arc::new(DataLoader::with_cache(
                OrganizationCampaignsLoader { db: db.clone() },
                tokio::spawn,
                HashMapCache::default(),
            )),
        }
    }
}
