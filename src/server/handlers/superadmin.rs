//! `POST /superadmin-login`
//!
//! Operators holding the superadmin token can sign in to any organization.
//! The caller is signed in as the built-in superadmin user, who is made an
//! OWNER of the requested organization.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, SqlErr,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{AuthUser, Role, SESSION_COOKIE};
use crate::database::entities::{organizations, user_organizations, users};
use crate::errors::{ApiError, ApiResult};
use crate::server::app::AppState;

pub const SUPERADMIN_TOKEN_HEADER: &str = "x-spoke-superadmin-token";
pub const SUPERADMIN_EMAIL: &str = "superadmin@spoke.local";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrganizationRef {
    Number(i64),
    Text(String),
}

impl OrganizationRef {
    fn id(&self) -> ApiResult<i32> {
        let id = match self {
            OrganizationRef::Number(n) => i32::try_from(*n).ok(),
            OrganizationRef::Text(s) => s.trim().parse::<i32>().ok(),
        };
        id.filter(|id| *id > 0)
            .ok_or_else(|| ApiError::validation("organizationId", "Invalid organization id"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperadminLoginRequest {
    pub organization_id: Option<OrganizationRef>,
}

fn tokens_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn authorized(headers: &HeaderMap, configured: Option<&str>) -> bool {
    let Some(expected) = configured.filter(|token| !token.is_empty()) else {
        return false;
    };
    headers
        .get(SUPERADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|given| tokens_match(given, expected))
        .unwrap_or(false)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn find_superadmin(db: &DatabaseConnection) -> ApiResult<Option<users::Model>> {
    Ok(users::Entity::find()
        .filter(users::Column::Email.eq(SUPERADMIN_EMAIL))
        .one(db)
        .await?)
}

async fn superadmin_user(db: &DatabaseConnection) -> ApiResult<users::Model> {
    match find_superadmin(db).await? {
        Some(user) if user.is_superadmin => Ok(user),
        Some(user) => {
            let mut active = user.into_active_model();
            active.is_superadmin = Set(true);
            Ok(active.update(db).await?)
        }
        None => {
            let inserted = users::ActiveModel {
                email: Set(SUPERADMIN_EMAIL.to_string()),
                first_name: Set("Super".to_string()),
                last_name: Set("Admin".to_string()),
                is_superadmin: Set(true),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await;

            match inserted {
                Ok(user) => {
                    info!(user_id = user.id, "Created superadmin user");
                    Ok(user)
                }
                // A concurrent login created the row first
                Err(err) if is_unique_violation(&err) => find_superadmin(db)
                    .await?
                    .ok_or_else(|| ApiError::Internal("superadmin user disappeared".to_string())),
                Err(err) => Err(err.into()),
            }
        }
    }
}

async fn ensure_owner(db: &DatabaseConnection, user_id: i32, organization_id: i32) -> ApiResult<()> {
    let membership = user_organizations::Entity::find()
        .filter(user_organizations::Column::UserId.eq(user_id))
        .filter(user_organizations::Column::OrganizationId.eq(organization_id))
        .one(db)
        .await?;

    match membership {
        Some(membership) if membership.role == Role::Owner.as_str() => {}
        Some(membership) => {
            let mut active = membership.into_active_model();
            active.role = Set(Role::Owner.as_str().to_string());
            active.update(db).await?;
        }
        None => {
            let inserted = user_organizations::ActiveModel {
                user_id: Set(user_id),
                organization_id: Set(organization_id),
                role: Set(Role::Owner.as_str().to_string()),
                ..Default::default()
            }
            .insert(db)
            .await;
            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

pub async fn superadmin_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SuperadminLoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !authorized(&headers, state.config.superadmin_token.as_deref()) {
        warn!("Rejected superadmin login");
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response());
    }

    let Json(request) =
        body.map_err(|e| ApiError::validation("organizationId", e.body_text()))?;
    let organization_id = request
        .organization_id
        .ok_or_else(|| ApiError::validation("organizationId", "organizationId is required"))?
        .id()?;

    let organization = organizations::Entity::find_by_id(organization_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            ApiError::validation(
                "organizationId",
                format!("Organization {} does not exist", organization_id),
            )
        })?;

    let user = superadmin_user(&state.db).await?;
    ensure_owner(&state.db, user.id, organization.id).await?;

    let token = state.sessions.create(AuthUser::from(&user));
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        state.config.session_ttl_secs
    );

    info!(
        user_id = user.id,
        organization_id = organization.id,
        "Superadmin signed in"
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "userId": user.id.to_string(),
            "organizationId": organization.id.to_string(),
            "token": token,
        })),
    )
        .into_response())
}
