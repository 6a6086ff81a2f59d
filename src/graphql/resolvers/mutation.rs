use std::io::Read;

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use serde_json::json;
use tracing::info;

use super::{parse_id, record};
use crate::auth::{require_role, AuthUser, Role};
use crate::database::entities::{campaigns, job_requests};
use crate::errors::{ApiError, ApiResult, ResultExt};
use crate::graphql::context::RequestContext;

async fn find_campaign(db: &DatabaseConnection, id: i32) -> ApiResult<campaigns::Model> {
    campaigns::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign", id))
}

fn pending_conflict(job_type: &str) -> ApiError {
    ApiError::Conflict(format!(
        "A {} job is already pending for this campaign",
        job_type
    ))
}

/// Insert a queued job. The unique index on unfinished jobs turns a
/// concurrent duplicate into a conflict.
async fn queue_job(
    db: &DatabaseConnection,
    campaign_id: i32,
    job_type: &str,
    result_message: String,
) -> ApiResult<job_requests::Model> {
    let now = Utc::now();
    let job = job_requests::ActiveModel {
        campaign_id: Set(campaign_id),
        job_type: Set(job_type.to_string()),
        status: Set(job_requests::STATUS_QUEUED),
        result_message: Set(result_message),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err: DbErr| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => pending_conflict(job_type),
        _ => ApiError::from(err),
    })?;

    info!(campaign_id, job_id = job.id, job_type, "Queued job");
    Ok(job)
}

/// Queue a landline filtering job for a campaign that has not started yet.
///
/// Requires ADMIN on the campaign's organization. A campaign can only be
/// filtered once, and only one filtering job may be pending at a time.
pub async fn queue_filter_landlines(
    db: &DatabaseConnection,
    user: &AuthUser,
    campaign_id: i32,
) -> ApiResult<campaigns::Model> {
    let campaign = find_campaign(db, campaign_id).await?;
    require_role(db, user, campaign.organization_id, Role::Admin).await?;

    if campaign.landlines_filtered {
        return Err(ApiError::validation(
            "id",
            "Landlines have already been filtered for this campaign",
        ));
    }
    if campaign.is_started {
        return Err(ApiError::validation(
            "id",
            "Cannot filter landlines after the campaign has started",
        ));
    }

    let pending = job_requests::Entity::find_pending(campaign_id)
        .filter(job_requests::Column::JobType.eq(job_requests::JOB_FILTER_LANDLINES))
        .one(db)
        .await?;
    if pending.is_some() {
        return Err(pending_conflict(job_requests::JOB_FILTER_LANDLINES));
    }

    queue_job(
        db,
        campaign_id,
        job_requests::JOB_FILTER_LANDLINES,
        String::new(),
    )
    .await?;

    Ok(campaign)
}

/// Number of contact rows in an uploaded CSV, not counting the header line
fn count_contacts(content: &str) -> usize {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
        .saturating_sub(1)
}

pub async fn queue_contact_upload(
    db: &DatabaseConnection,
    user: &AuthUser,
    campaign_id: i32,
    filename: &str,
    content: &str,
) -> ApiResult<job_requests::Model> {
    let campaign = find_campaign(db, campaign_id).await?;
    require_role(db, user, campaign.organization_id, Role::Admin).await?;

    if campaign.is_started {
        return Err(ApiError::validation(
            "campaignId",
            "Cannot upload contacts after the campaign has started",
        ));
    }
    if content.trim().is_empty() {
        return Err(ApiError::Upload(format!("{} is empty", filename)));
    }

    let contacts = count_contacts(content);
    if contacts == 0 {
        return Err(ApiError::Upload(format!("{} contains no contacts", filename)));
    }

    let message = json!({
        "message": format!("Queued {} contacts from {}", contacts, filename),
    })
    .to_string();

    queue_job(db, campaign_id, job_requests::JOB_UPLOAD_CONTACTS, message).await
}

pub(super) fn filter_landlines(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let db = ctx.data::<DatabaseConnection>()?;
        let user = context.require_user().into_graphql()?;
        let id = parse_id("id", ctx.args.try_get("id")?.string()?).into_graphql()?;

        let campaign = queue_filter_landlines(db, user, id).await.into_graphql()?;
        Ok(Some(FieldValue::value(record(&campaign)?)))
    })
}

pub(super) fn upload_contacts(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<RequestContext>()?;
        let db = ctx.data::<DatabaseConnection>()?;
        let user = context.require_user().into_graphql()?;
        let campaign_id = parse_id("campaignId", ctx.args.try_get("campaignId")?.string()?)
            .into_graphql()?;

        let upload = ctx.args.try_get("file")?.upload()?.value(&ctx)?;
        let filename = upload.filename.clone();

        let bytes = tokio::task::spawn_blocking(move || {
            let mut bytes = Vec::new();
            upload.into_read().read_to_end(&mut bytes).map(|_| bytes)
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
        .into_graphql()?
        .map_err(|e| ApiError::Upload(format!("Could not read {}: {}", filename, e)))
        .into_graphql()?;
        // Invalid UTF-8 (Latin-1 exports) decodes to U+FFFD
        let content = String::from_utf8_lossy(&bytes);

        let job = queue_contact_upload(db, user, campaign_id, &filename, &content)
            .await
            .into_graphql()?;
        Ok(Some(FieldValue::value(record(&job)?)))
    })
}
