pub mod session;

use std::fmt;
use std::str::FromStr;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::database::entities::{user_organizations, users};
use crate::errors::{ApiError, ApiResult};

pub use session::{authenticate, session_token, SessionStore, SESSION_COOKIE};

/// The authenticated caller, as attached to a request by [`authenticate`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub is_superadmin: bool,
}

impl From<&users::Model> for AuthUser {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_superadmin: user.is_superadmin,
        }
    }
}

/// Organization roles, ordered from least to most privileged
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Texter,
    Supervolunteer,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Texter => "TEXTER",
            Role::Supervolunteer => "SUPERVOLUNTEER",
            Role::Admin => "ADMIN",
            Role::Owner => "OWNER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEXTER" => Ok(Role::Texter),
            "SUPERVOLUNTEER" => Ok(Role::Supervolunteer),
            "ADMIN" => Ok(Role::Admin),
            "OWNER" => Ok(Role::Owner),
            other => Err(ApiError::validation("role", format!("unknown role '{}'", other))),
        }
    }
}

/// Check that `user` holds at least `required` in the organization.
///
/// Superadmins pass every check and are reported as owners.
pub async fn require_role(
    db: &DatabaseConnection,
    user: &AuthUser,
    organization_id: i32,
    required: Role,
) -> ApiResult<Role> {
    if user.is_superadmin {
        return Ok(Role::Owner);
    }

    let membership = user_organizations::Entity::find()
        .filter(user_organizations::Column::UserId.eq(user.id))
        .filter(user_organizations::Column::OrganizationId.eq(organization_id))
        .one(db)
        .await?;

    let role = match membership {
        Some(membership) => membership.role.parse::<Role>()?,
        None => {
            return Err(ApiError::forbidden(format!(
                "not a member of organization {}",
                organization_id
            )))
        }
    };

    if role < required {
        return Err(ApiError::forbidden(format!(
            "role {} required, user has {}",
            required, role
        )));
    }

    Ok(role)
}
