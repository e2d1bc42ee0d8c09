/// School endpoints
///
/// # Endpoints
///
/// - `POST /v1/schools` - Create a school in an organisation
/// - `GET|PUT|DELETE /v1/schools/:id`
/// - `GET /v1/organisations/:id/schools`
/// - `PUT /v1/schools/:id/head-instructor`
/// - `GET|POST /v1/schools/:id/students`
/// - `POST|DELETE /v1/schools/:id/students/:person_id`
/// - `PUT /v1/schools/:id/students/:person_id/documents`
///
/// Day-to-day changes (students, venues, contact details) need school admin
/// access. Deleting a school or replacing its head instructor needs admin
/// access on the owning organisation.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{
        params::MembershipFlags,
        payloads::{check_all, check_optional, AddressRequest, PersonRequest},
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
            check_school_admin_access, check_school_member_access,
        },
        middleware::AuthContext,
    },
    db::unit_of_work::UnitOfWork,
    models::{
        address::AddressInput,
        school::{School, SchoolDetails},
        school_student::SchoolStudent,
    },
    services::schools::{self, NewSchool, NewStudent, SchoolView},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Name and contact fields, shared by create and update
#[derive(Debug, Deserialize, Validate)]
pub struct SchoolDetailsRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 32, message = "Phone number must be at most 32 characters"))]
    pub phone_no: Option<String>,

    #[validate(email(message = "Email must be a valid address"))]
    pub email_address: Option<String>,

    #[validate(url(message = "Website must be a valid URL"))]
    pub website_url: Option<String>,

    #[validate(url(message = "Instagram link must be a valid URL"))]
    pub instagram_url: Option<String>,

    #[validate(url(message = "Facebook link must be a valid URL"))]
    pub facebook_url: Option<String>,
}

impl From<SchoolDetailsRequest> for SchoolDetails {
    fn from(req: SchoolDetailsRequest) -> Self {
        SchoolDetails {
            name: req.name,
            phone_no: req.phone_no,
            email_address: req.email_address,
            website_url: req.website_url,
            instagram_url: req.instagram_url,
            facebook_url: req.facebook_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSchoolRequest {
    pub organisation_id: Uuid,
    pub art_id: Uuid,
    pub head_instructor_id: Option<Uuid>,

    #[serde(flatten)]
    pub details: SchoolDetailsRequest,

    pub default_address: Option<AddressRequest>,

    #[serde(default)]
    pub venues: Vec<AddressRequest>,
}

/// Update school request
///
/// `venues` is the complete list: venues with a known `id` are updated,
/// venues without one are added, stored venues left out are deleted.
#[derive(Debug, Deserialize)]
pub struct UpdateSchoolRequest {
    #[serde(flatten)]
    pub details: SchoolDetailsRequest,

    pub default_address: Option<AddressRequest>,

    #[serde(default)]
    pub venues: Vec<AddressRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeHeadInstructorRequest {
    pub person_id: Uuid,

    /// Keep the outgoing head's secretary flag
    #[serde(default)]
    pub retain_secretary: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentDocumentsRequest {
    pub insurance_document_id: Option<Uuid>,
    pub licence_document_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StudentPath {
    pub id: Uuid,
    pub person_id: Uuid,
}

/// Create school
///
/// # Endpoint
///
/// ```text
/// POST /v1/schools
///
/// {
///   "organisation_id": "uuid",
///   "art_id": "uuid",
///   "name": "Leeds Shotokan",
///   "head_instructor_id": "uuid",
///   "venues": [{ "line1": "1 Dojo Lane", "town": "Leeds", "postcode": "LS1 1AA" }]
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: caller does not administer the organisation
/// - `404 Not Found`: organisation, art or head instructor does not exist
pub async fn create_school(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSchoolRequest>,
) -> ApiResult<(StatusCode, Json<SchoolView>)> {
    req.details.validate()?;
    check_optional(req.default_address.as_ref())?;
    check_all(&req.venues)?;

    let new_school = NewSchool {
        organisation_id: req.organisation_id,
        art_id: req.art_id,
        head_instructor_id: req.head_instructor_id,
        details: req.details.into(),
        default_address: req.default_address.map(AddressInput::from),
        venues: req.venues.into_iter().map(AddressInput::from).collect(),
    };

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_organisation_admin_access(uow.conn(), &auth, new_school.organisation_id).await?;
    let view = schools::create_school(uow.conn(), &new_school).await?;
    uow.commit().await?;

    info!(
        school_id = %view.school.id,
        organisation_id = %view.school.organisation_id,
        "School created via API"
    );

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_school(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SchoolView>> {
    let mut conn = state.db.acquire().await?;
    check_school_member_access(&mut conn, &auth, id).await?;
    let view = schools::get_school_view(&mut conn, id).await?;

    Ok(Json(view))
}

pub async fn list_organisation_schools(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<School>>> {
    let mut conn = state.db.acquire().await?;
    check_organisation_member_access(&mut conn, &auth, id).await?;
    let schools = schools::list_by_organisation(&mut conn, id).await?;

    Ok(Json(schools))
}

pub async fn update_school(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSchoolRequest>,
) -> ApiResult<Json<SchoolView>> {
    req.details.validate()?;
    check_optional(req.default_address.as_ref())?;
    check_all(&req.venues)?;

    let details: SchoolDetails = req.details.into();
    let default_address = req.default_address.map(AddressInput::from);
    let venues: Vec<AddressInput> = req.venues.into_iter().map(AddressInput::from).collect();

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_school_admin_access(uow.conn(), &auth, id).await?;
    let view =
        schools::update_school(uow.conn(), id, &details, default_address.as_ref(), &venues)
            .await?;
    uow.commit().await?;

    Ok(Json(view))
}

/// Delete school
///
/// Venues, the default address and enrolments go with it; the people and
/// their organisation memberships stay.
pub async fn delete_school(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    let school = schools::get_school(uow.conn(), id).await?;
    check_organisation_admin_access(uow.conn(), &auth, school.organisation_id).await?;
    schools::delete_school(uow.conn(), id).await?;
    uow.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_head_instructor(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeHeadInstructorRequest>,
) -> ApiResult<Json<School>> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    let school = schools::get_school(uow.conn(), id).await?;
    check_organisation_admin_access(uow.conn(), &auth, school.organisation_id).await?;
    let school = schools::change_school_head_instructor(
        uow.conn(),
        id,
        req.person_id,
        req.retain_secretary,
    )
    .await?;
    uow.commit().await?;

    Ok(Json(school))
}

pub async fn list_students(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<SchoolStudent>>> {
    let mut conn = state.db.acquire().await?;
    check_school_member_access(&mut conn, &auth, id).await?;
    let students = schools::list_students(&mut conn, id).await?;

    Ok(Json(students))
}

/// Create a person and enrol them
///
/// The person also joins the owning organisation.
pub async fn add_new_student(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(flags): Query<MembershipFlags>,
    Json(req): Json<PersonRequest>,
) -> ApiResult<(StatusCode, Json<NewStudent>)> {
    let is_instructor = flags.is_instructor()?;
    let is_secretary = flags.is_secretary()?;
    req.check()?;
    let new_person = req.into_new_person();

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_school_admin_access(uow.conn(), &auth, id).await?;
    let student = schools::add_new_person_to_school(
        uow.conn(),
        id,
        &new_person,
        is_instructor,
        is_secretary,
    )
    .await?;
    uow.commit().await?;

    Ok((StatusCode::CREATED, Json(student)))
}

/// Enrol an existing person, or change their flags
///
/// # Endpoint
///
/// ```text
/// POST /v1/schools/:id/students/:person_id?is_instructor=true&is_secretary=false
/// ```
pub async fn add_existing_student(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<StudentPath>,
    Query(flags): Query<MembershipFlags>,
) -> ApiResult<(StatusCode, Json<SchoolStudent>)> {
    let is_instructor = flags.is_instructor()?;
    let is_secretary = flags.is_secretary()?;

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_school_admin_access(uow.conn(), &auth, path.id).await?;
    let enrolment = schools::add_existing_person_to_school(
        uow.conn(),
        path.id,
        path.person_id,
        is_instructor,
        is_secretary,
    )
    .await?;
    uow.commit().await?;

    Ok((StatusCode::CREATED, Json(enrolment)))
}

pub async fn remove_student(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<StudentPath>,
) -> ApiResult<StatusCode> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_school_admin_access(uow.conn(), &auth, path.id).await?;
    schools::remove_student_from_school(uow.conn(), path.id, path.person_id).await?;
    uow.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Point a student's insurance and licence at documents they hold
pub async fn set_student_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<StudentPath>,
    Json(req): Json<StudentDocumentsRequest>,
) -> ApiResult<Json<SchoolStudent>> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_school_admin_access(uow.conn(), &auth, path.id).await?;
    let enrolment = schools::set_student_documents(
        uow.conn(),
        path.id,
        path.person_id,
        req.insurance_document_id,
        req.licence_document_id,
    )
    .await?;
    uow.commit().await?;

    Ok(Json(enrolment))
}
