/// Person and document endpoints
///
/// A person can be read and edited by themselves and by admins of any
/// organisation they belong to.

use crate::{app::AppState, error::ApiResult, routes::payloads::PersonRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use martialbase_shared::{
    auth::{authorization::check_person_access, middleware::AuthContext},
    db::unit_of_work::UnitOfWork,
    models::{document::Document, person::Person},
    services::people::{self, NewDocument},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddDocumentRequest {
    pub document_type_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Reference must be 1-100 characters"))]
    pub reference: Option<String>,

    pub filed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentPath {
    pub id: Uuid,
    pub document_id: Uuid,
}

pub async fn get_person(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Person>> {
    let mut conn = state.db.acquire().await?;
    let person = check_person_access(&mut conn, &auth, id).await?;

    Ok(Json(person))
}

/// Update person
///
/// When `address` is present it replaces the stored one.
pub async fn update_person(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PersonRequest>,
) -> ApiResult<Json<Person>> {
    req.check()?;
    let (details, address) = req.into_parts();

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_person_access(uow.conn(), &auth, id).await?;
    let person = people::update_person(uow.conn(), id, &details, address.as_ref()).await?;
    uow.commit().await?;

    Ok(Json(person))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Document>>> {
    let mut conn = state.db.acquire().await?;
    check_person_access(&mut conn, &auth, id).await?;
    let documents = people::list_documents(&mut conn, id).await?;

    Ok(Json(documents))
}

/// File a document for a person
///
/// `filed_at` defaults to now and `expires_at` to the document type's
/// default expiry.
pub async fn add_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    req.validate()?;

    let new_document = NewDocument {
        document_type_id: req.document_type_id,
        reference: req.reference,
        filed_at: req.filed_at,
        expires_at: req.expires_at,
    };

    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_person_access(uow.conn(), &auth, id).await?;
    let document = people::add_document(uow.conn(), id, &new_document).await?;
    uow.commit().await?;

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn remove_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<DocumentPath>,
) -> ApiResult<StatusCode> {
    let mut uow = UnitOfWork::begin(&state.db).await?;
    check_person_access(uow.conn(), &auth, path.id).await?;
    people::remove_document(uow.conn(), path.id, path.document_id).await?;
    uow.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
