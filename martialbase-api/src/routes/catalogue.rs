/// Read-only reference data
///
/// - `GET /v1/arts` - Martial arts a school can teach
/// - `GET /v1/document-types` - Kinds of document a person can file

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use martialbase_shared::models::{art::Art, document::DocumentType};

pub async fn list_arts(State(state): State<AppState>) -> ApiResult<Json<Vec<Art>>> {
    let arts = Art::list(&state.db).await?;

    Ok(Json(arts))
}

pub async fn list_document_types(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DocumentType>>> {
    let document_types = DocumentType::list(&state.db).await?;

    Ok(Json(document_types))
}
