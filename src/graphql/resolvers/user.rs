use async_graphql::dynamic::{FieldFuture, ResolverContext};
use async_graphql::Value;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use super::{parent_field, parent_id, record_list};
use crate::auth::Role;
use crate::database::entities::user_organizations;
use crate::errors::ResultExt;
use crate::graphql::context::RequestContext;

pub(super) fn display_name(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    let name = |key: &str| match parent_field(&ctx, key) {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    let display = format!("{} {}", name("firstName"), name("lastName"))
        .trim()
        .to_string();

    FieldFuture::new(async move { Ok(Some(Value::from(display))) })
}

/// Organizations the user belongs to, optionally only those where they hold
/// at least `role`
pub(super) fn organizations(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let db = ctx.data::<DatabaseConnection>()?;
        let user_id = parent_id(&ctx, "id")?;
        let minimum = match ctx.args.get("role") {
            Some(role) if !role.is_null() => Some(role.string()?.parse::<Role>().into_graphql()?),
            _ => None,
        };

        let memberships = user_organizations::Entity::find()
            .filter(user_organizations::Column::UserId.eq(user_id))
            .all(db)
            .await
            .into_graphql()?;

        let mut organization_ids = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(minimum) = minimum {
                if membership.role.parse::<Role>().into_graphql()? < minimum {
                    continue;
                }
            }
            organization_ids.push(membership.organization_id);
        }

        let loaded = context
            .loaders
            .organization
            .load_many(organization_ids.iter().copied())
            .await
            .into_graphql()?;
        let ordered = organization_ids.iter().filter_map(|id| loaded.get(id));

        Ok(Some(record_list(ordered)?))
    })
}
