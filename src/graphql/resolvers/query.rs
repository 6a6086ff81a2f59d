use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use sea_orm::DatabaseConnection;

use super::{parse_id, record};
use crate::auth::{require_role, Role};
use crate::errors::{ApiError, ResultExt};
use crate::graphql::context::RequestContext;

/// The signed-in user, or null for anonymous requests
pub(super) fn current_user(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let Some(user) = context.user() else {
            return Ok(None);
        };

        let row = context.loaders.user.load_one(user.id).await.into_graphql()?;
        match row {
            Some(row) => Ok(Some(FieldValue::value(record(&row)?))),
            None => Ok(None),
        }
    })
}

pub(super) fn organization(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let db = ctx.data::<DatabaseConnection>()?;
        let user = context.require_user().into_graphql()?;
        let id = parse_id("id", ctx.args.try_get("id")?.string()?).into_graphql()?;

        require_role(db, user, id, Role::Texter).await.into_graphql()?;

        let organization = context
            .loaders
            .organization
            .load_one(id)
            .await
            .into_graphql()?
            .ok_or_else(|| ApiError::not_found("Organization", id))
            .into_graphql()?;

        Ok(Some(FieldValue::value(record(&organization)?)))
    })
}

pub(super) fn campaign(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let db = ctx.data::<DatabaseConnection>()?;
        let user = context.require_user().into_graphql()?;
        let id = parse_id("id", ctx.args.try_get("id")?.string()?).into_graphql()?;

        let campaign = context
            .loaders
            .campaign
            .load_one(id)
            .await
            .into_graphql()?
            .ok_or_else(|| ApiError::not_found("Campaign", id))
            .into_graphql()?;

        require_role(db, user, campaign.organization_id, Role::Supervolunteer)
            .await
            .into_graphql()?;

        Ok(Some(FieldValue::value(record(&campaign)?)))
    })
}
