/// Organisation endpoints
///
/// # Endpoints
///
/// - `GET /v1/organisations` - Organisations visible to the caller
/// - `POST /v1/organisations` - Create an organisation (system admin)
/// - `GET|PUT|DELETE /v1/organisations/:id`
/// - `PUT|DELETE /v1/organisations/:id/parent` - Re-parent or detach
/// - `GET /v1/organisations/:id/ancestors`, `/children`
/// - `GET|POST /v1/organisations/:id/people`
/// - `POST|DELETE /v1/organisations/:id/people/:person_id`
/// - `POST /v1/organisations/:id/people/:person_id/demote`
///
/// Every mutation runs in one unit of work: access check, change, commit.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{
        params::MembershipFlags,
        payloads::{check_optional, AddressRequest, PersonRequest},
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use martialbase_shared::{
    auth::{
        authorization::{
            check_organisation_admin_access, check_organisation_member_access,
            require_capability,
        },
        middleware::AuthContext,
        roles::Capability,
    },
    db::unit_of_work::UnitOfWork,
    models::{
        address::AddressInput,
        organisation::{Organisation, UpdateOrganisation},
        organisation_person::OrganisationPerson,
    },
    services::{
        hierarchy,
        organisations::{
            self, CreatedOrganisation, NewOrganisation, OrganisationMember, OrganisationView,
        },
        people::UnclaimedPerson,
    },
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Create organisation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganisationRequest {
    #[validate(length(min = 1, max = 16, message = "Initials must be 1-16 characters"))]
    pub initials: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[serde(default)]
    pub is_public: bool,

    pub parent_id: Option<Uuid>,

    pub address: Option<AddressRequest>,

    /// First administrator; when absent the caller's own person is used
    pub admin: Option<PersonRequest>,
}

/// Update organisation request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganisationRequest {
    #[validate(length(min = 1, max = 16, message = "Initials must be 1-16 characters"))]
    pub initials: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[serde(default)]
    pub is_public: bool,

    /// Replaces the stored address when present
    pub address: Option<AddressRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeParentRequest {
    pub parent_id: Uuid,
}

/// Path of the per-person endpoints
#[derive(Debug, Deserialize)]
pub struct MemberPath {
    pub id: Uuid,
    pub person_id: Uuid,
}

/// List organisations
///
/// System admins see everything; everyone else sees public organisations
/// plus those they belong to.
pub async fn list_organisations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Organisation>>> {
    let mut conn = state.db.acquire().await?;
    let organisations = organisations::list_visible(&mut conn, &auth).await?;

    Ok(Json(organisations))
}

/// Create organisation
///
/// # Endpoint
///
/// ```text
/// POST /v1/organisations
/// Authorization: Bearer <identity_token>
///
/// {
///   "initials": "BKA",
///   "name": "British Karate Association",
///   "is_public": true,
///   "admin": { "first_name": "Ada", "last_name": "Lovelace" }
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden` (`InsufficientUserRole`): caller is not a system admin
/// - `404 Not Found`: `parent_id` does not exist
/// - `422 Unprocessable Entity`: validation failed, or no admin could be found
pub async fn create_organisation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateOrganisationRequest>,
) -> ApiResult<(StatusCode, Json<CreatedOrganisation>)> {
    req.validate()?;
    check_optional(req.address.as_ref())?;
    if let Some(admin) = &req.admin {
        admin.check()?;
    }

    require_capability(&auth, Capability::CreateOrganisation)?;

    let new_organisation = NewOrganisation {
        initials: req.initials,
        name: req.name,
        is_public: req.is_public,
        parent_id: req.parent_id,
        address: req.address.map(AddressInput::from),
        admin: req.admin.map(PersonRequest::into_new_person),
    };

    let mut uow = UnitOfWork::begin(&state.db).await?;
    let created =
        organisations::create_organisation(uow.conn(), &new_organisation, auth.person_id).await?;
    uow.commit().await?;

    info!(
        organisation_id = %created.organisation.id,
        external_id = %auth.external_id,
        "Organisation created via API"
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_organisation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrganisationView>> {
    let mut conn = state.db.acquire().await?;
    check_organisation_member_access(&mut conn, &auth, id).await?;
    let view = organisations::get_organisation_view(&mut conn, id).await?;

    Ok(Json(view))
}

pub async fn update_organisation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrganisationRequest>,
) -> ApiResult<Json<Organisation>> {
    req.validate()?;
    check_optional(req.address.as_ref())?;

    let update = UpdateOrganisation {
        initials: req.initials,
        name: req.name,
        is_public: req.is_public,
    };
    let address = req.address.map(AddressInput::from);

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, id).await?;
    let organisation =
        organisations::update_organisation(uow.conn(), id, &update, address.as_ref()).await?;
    uow.commit().await?;

    Ok(Json(organisation))
}

/// Delete organisation
///
/// # Errors
///
/// - `400 Bad Request` (`orphan_person_entity`): a member belongs nowhere else
/// - `400 Bad Request` (`orphan_school_entity`): the organisation still runs schools
pub async fn delete_organisation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, id).await?;
    organisations::delete_organisation(uow.conn(), id).await?;
    uow.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Move an organisation under a new parent
///
/// The caller must administer the current parent (if any), the organisation
/// itself and the new parent, checked in that order.
pub async fn change_parent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeParentRequest>,
) -> ApiResult<Json<Organisation>> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    let organisation =
        hierarchy::change_organisation_parent(uow.conn(), &auth, id, req.parent_id).await?;
    uow.commit().await?;

    Ok(Json(organisation))
}

pub async fn remove_parent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Organisation>> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    let organisation = hierarchy::remove_organisation_parent(uow.conn(), &auth, id).await?;
    uow.commit().await?;

    Ok(Json(organisation))
}

/// Parents of an organisation, nearest first
pub async fn ancestors(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Organisation>>> {
    let mut conn = state.db.acquire().await?;
    let organisations = hierarchy::ancestors(&mut conn, &auth, id).await?;

    Ok(Json(organisations))
}

pub async fn children(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Organisation>>> {
    let mut conn = state.db.acquire().await?;
    let organisations = hierarchy::children(&mut conn, &auth, id).await?;

    Ok(Json(organisations))
}

pub async fn list_people(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<OrganisationMember>>> {
    let mut conn = state.db.acquire().await?;
    check_organisation_member_access(&mut conn, &auth, id).await?;
    let members = organisations::list_people(&mut conn, id).await?;

    Ok(Json(members))
}

/// Create a person and make them a member
///
/// The response carries the invitation code the person claims their
/// identity with.
pub async fn add_new_person(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(flags): Query<MembershipFlags>,
    Json(req): Json<PersonRequest>,
) -> ApiResult<(StatusCode, Json<UnclaimedPerson>)> {
    let is_admin = flags.is_admin()?;
    req.check()?;
    let new_person = req.into_new_person();

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, id).await?;
    let unclaimed =
        organisations::add_new_person_to_organisation(uow.conn(), id, &new_person, is_admin)
            .await?;
    uow.commit().await?;

    Ok((StatusCode::CREATED, Json(unclaimed)))
}

/// Add an existing person, or change their admin flag
///
/// # Endpoint
///
/// ```text
/// POST /v1/organisations/:id/people/:person_id?is_admin=true
/// ```
pub async fn add_existing_person(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<MemberPath>,
    Query(flags): Query<MembershipFlags>,
) -> ApiResult<(StatusCode, Json<OrganisationPerson>)> {
    let is_admin = flags.is_admin()?;

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, path.id).await?;
    let membership =
        organisations::add_organisation_person(uow.conn(), path.id, path.person_id, is_admin)
            .await?;
    uow.commit().await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

/// Remove a person from an organisation
///
/// Refused with `orphan_person_entity` if it is their only membership.
pub async fn remove_person(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<MemberPath>,
) -> ApiResult<StatusCode> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, path.id).await?;
    organisations::remove_organisation_person(uow.conn(), path.id, path.person_id).await?;
    uow.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn demote_admin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<MemberPath>,
) -> ApiResult<Json<OrganisationPerson>> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, path.id).await?;
    let membership =
        organisations::demote_organisation_admin(uow.conn(), path.id, path.person_id).await?;
    uow.commit().await?;

    Ok(Json(membership))
}
