use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, QueryOrder};

use super::{parent_id, record, record_list};
use crate::database::entities::job_requests;
use crate::errors::{ApiError, ResultExt};
use crate::graphql::context::RequestContext;

pub(super) fn organization(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let organization_id = parent_id(&ctx, "organizationId")?;

        let organization = context
            .loaders
            .organization
            .load_one(organization_id)
            .await
            .into_graphql()?
            .ok_or_else(|| ApiError::not_found("Organization", organization_id))
            .into_graphql()?;

        Ok(Some(FieldValue::value(record(&organization)?)))
    })
}

pub(super) fn pending_jobs(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let db = ctx.data::<DatabaseConnection>()?;
        let campaign_id = parent_id(&ctx, "id")?;

        let job_types = match ctx.args.get("jobTypes") {
            Some(list) if !list.is_null() => Some(
                list.list()?
                    .iter()
                    .map(|item| item.string().map(str::to_string))
                    .collect::<async_graphql::Result<Vec<_>>>()?,
            ),
            _ => None,
        };

        let mut query = job_requests::Entity::find_pending(campaign_id);
        if let Some(job_types) = job_types {
            query = query.filter(job_requests::Column::JobType.is_in(job_types));
        }

        let jobs = query
            .order_by_asc(job_requests::Column::Id)
            .all(db)
            .await
            .into_graphql()?;

        Ok(Some(record_list(jobs.iter())?))
    })
}
