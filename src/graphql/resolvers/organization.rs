use async_graphql::dynamic::{FieldFuture, ResolverContext};

use super::{parent_id, record_list};
use crate::errors::ResultExt;
use crate::graphql::context::RequestContext;

pub(super) fn campaigns(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let organization_id = parent_id(&ctx, "id")?;

        let campaigns = context
            .loaders
            .organization_campaigns
            .load_one(organization_id)
            .await
            .into_graphql()?
            .unwrap_or_default();

        Ok(Some(record_list(campaigns.iter())?))
    })
}
