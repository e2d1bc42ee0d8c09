/// User, identity and role endpoints
///
/// # Endpoints
///
/// - `GET /v1/users/me` - Caller's user, person and effective roles
/// - `POST /v1/users/claim` - Link the caller's identity via an invitation code
/// - `PUT /v1/users/:id/roles` - Replace a user's roles (system admin)
/// - `GET /v1/roles` - Role catalogue

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use martialbase_shared::{
    auth::{
        authorization::require_capability,
        middleware::AuthContext,
        roles::{Capability, UserRole},
    },
    db::unit_of_work::UnitOfWork,
    models::{user::MartialBaseUser, user_role::UserRoleRecord},
    services::{
        role_derivation,
        users::{self, CurrentUser},
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ClaimInvitationRequest {
    #[validate(length(min = 1, max = 32, message = "Invitation code is required"))]
    pub code: String,
}

/// Claim response
#[derive(Debug, Serialize)]
pub struct ClaimInvitationResponse {
    pub user: MartialBaseUser,

    /// Roles held after the claim
    pub roles: Vec<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRolesRequest {
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReplaceRolesResponse {
    pub user_id: Uuid,
    pub roles: Vec<UserRole>,
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CurrentUser>> {
    let mut conn = state.db.acquire().await?;
    let current = users::current_user(&mut conn, &auth).await?;

    Ok(Json(current))
}

/// Claim an invitation code
///
/// # Endpoint
///
/// ```text
/// POST /v1/users/claim
/// Authorization: Bearer <identity_token>
///
/// { "code": "AB12CD3" }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: no unclaimed user holds the code
/// - `422 Unprocessable Entity`: malformed code, or the identity is already linked
pub async fn claim_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ClaimInvitationRequest>,
) -> ApiResult<Json<ClaimInvitationResponse>> {
    req.validate()?;

    let mut uow = UnitOfWork::begin(&state.db).await?;
    let user = users::claim_invitation_code(uow.conn(), auth.external_id, &req.code).await?;
    let roles = users::stored_roles(uow.conn(), user.id).await?;
    uow.commit().await?;

    Ok(Json(ClaimInvitationResponse {
        user,
        roles: roles.iter().collect(),
    }))
}

/// Replace a user's role assignments
///
/// The request lists the complete set of role ids; anything else the user
/// holds is revoked. An unknown id fails the whole request.
pub async fn replace_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplaceRolesRequest>,
) -> ApiResult<Json<ReplaceRolesResponse>> {
    require_capability(&auth, Capability::ManageUserRoles)?;

    let mut uow = UnitOfWork::begin(&state.db).await?;
    let roles = role_derivation::replace_roles_for_user(uow.conn(), id, &req.role_ids).await?;
    uow.commit().await?;

    info!(
        user_id = %id,
        external_id = %auth.external_id,
        roles = roles.len(),
        "User roles replaced via API"
    );

    Ok(Json(ReplaceRolesResponse { user_id: id, roles }))
}

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<UserRoleRecord>>> {
    let mut conn = state.db.acquire().await?;
    let roles = users::list_roles(&mut conn).await?;

    Ok(Json(roles))
}
