//! Real resolvers, registered by `(type, field)`
//!
//! Resolvers hand plain-object values to their children: a database row is
//! serialised with camelCase keys and its `id` rendered as a string, so
//! scalar fields resolve straight from the parent's properties. Foreign keys
//! such as `organizationId` stay numeric on the parent for the resolvers
//! that follow them.

mod campaign;
mod mutation;
mod organization;
mod query;
mod user;

use async_graphql::dynamic::{FieldValue, ResolverContext};
use async_graphql::{Error, Value};
use serde::Serialize;

use super::mock_schema::ResolverMap;
use crate::errors::{ApiError, ApiResult};

pub use mutation::{queue_contact_upload, queue_filter_landlines};

pub fn resolver_map() -> ResolverMap {
    ResolverMap::new()
        .resolve("Query", "currentUser", query::current_user)
        .resolve("Query", "organization", query::organization)
        .resolve("Query", "campaign", query::campaign)
        .resolve("User", "displayName", user::display_name)
        .resolve("User", "organizations", user::organizations)
        .resolve("Organization", "campaigns", organization::campaigns)
        .resolve("Campaign", "organization", campaign::organization)
        .resolve("Campaign", "pendingJobs", campaign::pending_jobs)
        .resolve("Mutation", "filterLandlines", mutation::filter_landlines)
        .resolve("Mutation", "uploadContacts", mutation::upload_contacts)
}

/// Serialise a row into the plain-object form resolvers pass down
pub(crate) fn record<T: Serialize>(model: &T) -> async_graphql::Result<Value> {
    let mut json = serde_json::to_value(model)?;
    if let Some(id) = json.get_mut("id") {
        if id.is_number() {
            *id = serde_json::Value::String(id.to_string());
        }
    }
    Ok(Value::from_json(json)?)
}

pub(crate) fn record_list<'a, T: Serialize>(
    models: impl IntoIterator<Item = &'a T>,
) -> async_graphql::Result<FieldValue<'static>>
where
    T: 'a,
{
    let items = models
        .into_iter()
        .map(|model| record(model).map(FieldValue::value))
        .collect::<async_graphql::Result<Vec<_>>>()?;
    Ok(FieldValue::list(items))
}

pub(crate) fn parse_id(field: &str, raw: &str) -> ApiResult<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ApiError::validation(field, format!("'{}' is not a valid id", raw)))
}

pub(crate) fn parent_field<'a>(ctx: &ResolverContext<'a>, key: &str) -> Option<&'a Value> {
    match ctx.parent_value.as_value() {
        Some(Value::Object(map)) => map.get(key),
        _ => None,
    }
}

pub(crate) fn parent_id(ctx: &ResolverContext<'_>, key: &str) -> async_graphql::Result<i32> {
    let id = match parent_field(ctx, key) {
        Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| Error::new(format!("Parent value has no usable '{}'", key)))
}
