/// Error handling for the API server
///
/// Handlers return `Result<T, ApiError>`; domain errors from the shared crate
/// convert with `?`.
///
/// # Status mapping
///
/// | Domain error            | Status | `error`                 |
/// |-------------------------|--------|-------------------------|
/// | `NotFound`              | 404    | `not_found`             |
/// | `Forbidden`             | 403    | `forbidden` (+ `code`)  |
/// | `OrphanPersonEntity`    | 400    | `orphan_person_entity`  |
/// | `OrphanSchoolEntity`    | 400    | `orphan_school_entity`  |
/// | `Validation`            | 422    | `validation_error`      |
/// | unique violation        | 409    | `conflict`              |
/// | other database errors   | 500    | `internal_error`        |
///
/// # Example
///
/// ```no_run
/// use martialbase_api::error::ApiResult;
/// use martialbase_shared::error::{EntityKind, MartialBaseError};
/// use axum::Json;
/// use uuid::Uuid;
///
/// async fn handler(id: Uuid) -> ApiResult<Json<()>> {
///     Err(MartialBaseError::not_found(EntityKind::School, id).into())
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use martialbase_shared::error::{ForbiddenCode, MartialBaseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403) with the access-check reason
    Forbidden {
        code: ForbiddenCode,
        organisation_id: Option<Uuid>,
        message: String,
    },

    /// Not found (404)
    NotFound(String),

    /// Structural invariant would break (400)
    Orphan {
        error: &'static str,
        message: String,
    },

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) from request body validation
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unprocessable entity (422) from a domain rule or a query parameter
    InvalidInput(String),

    /// Internal server error (500)
    InternalError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine readable error name, e.g. `not_found`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ForbiddenCode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    fn new(error: &str, message: String) -> Self {
        Self {
            error: error.to_string(),
            message,
            code: None,
            organisation_id: None,
            details: None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden { message, .. } => f.write_str(message),
            ApiError::NotFound(msg) => f.write_str(msg),
            ApiError::Orphan { message, .. } => f.write_str(message),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InvalidInput(msg) => write!(f, "Validation failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Orphan { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) | ApiError::InvalidInput(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::BadRequest(msg) => ErrorResponse::new("bad_request", msg),
            ApiError::Unauthorized(msg) => ErrorResponse::new("unauthorized", msg),
            ApiError::Forbidden {
                code,
                organisation_id,
                message,
            } => ErrorResponse {
                code: Some(code),
                organisation_id,
                ..ErrorResponse::new("forbidden", message)
            },
            ApiError::NotFound(msg) => ErrorResponse::new("not_found", msg),
            ApiError::Orphan { error, message } => ErrorResponse::new(error, message),
            ApiError::Conflict(msg) => ErrorResponse::new("conflict", msg),
            ApiError::ValidationError(errors) => ErrorResponse {
                details: Some(errors),
                ..ErrorResponse::new("validation_error", "Request validation failed".to_string())
            },
            ApiError::InvalidInput(msg) => ErrorResponse::new("validation_error", msg),
            ApiError::InternalError(msg) => {
                // Logged here, never shown to clients
                tracing::error!(error = %msg, "Internal error");
                ErrorResponse::new("internal_error", "An internal error occurred".to_string())
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<MartialBaseError> for ApiError {
    fn from(err: MartialBaseError) -> Self {
        let message = err.to_string();

        match err {
            MartialBaseError::NotFound { .. } => ApiError::NotFound(message),
            MartialBaseError::Forbidden {
                code,
                organisation_id,
            } => ApiError::Forbidden {
                code,
                organisation_id,
                message,
            },
            MartialBaseError::OrphanPersonEntity { .. } => ApiError::Orphan {
                error: "orphan_person_entity",
                message,
            },
            MartialBaseError::OrphanSchoolEntity { .. } => ApiError::Orphan {
                error: "orphan_school_entity",
                message,
            },
            MartialBaseError::Validation(msg) => ApiError::InvalidInput(msg),
            MartialBaseError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let what = db_err.constraint().unwrap_or("unique constraint");
                ApiError::Conflict(format!("Duplicate value violates {}", what))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use martialbase_shared::error::EntityKind;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404_with_exact_message() {
        let id = Uuid::new_v4();
        let err: ApiError = MartialBaseError::not_found(EntityKind::School, id).into();

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], format!("School ID '{}' not found.", id));
    }

    #[tokio::test]
    async fn test_forbidden_carries_code_and_organisation() {
        let org = Uuid::new_v4();
        let err: ApiError =
            MartialBaseError::forbidden(ForbiddenCode::NotOrganisationAdmin, org).into();

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["code"], "NotOrganisationAdmin");
        assert_eq!(body["organisation_id"], org.to_string());
    }

    #[tokio::test]
    async fn test_orphans_map_to_400() {
        let err: ApiError = MartialBaseError::OrphanPersonEntity {
            person_id: Uuid::new_v4(),
            organisation_id: Uuid::new_v4(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "orphan_person_entity");

        let err: ApiError = MartialBaseError::OrphanSchoolEntity {
            school_id: Uuid::new_v4(),
            organisation_id: Uuid::new_v4(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "orphan_school_entity");
    }

    #[tokio::test]
    async fn test_validation_maps_to_422() {
        let err: ApiError = MartialBaseError::Validation("is_admin must be a boolean".into()).into();

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "is_admin must be a boolean");
        assert!(body.get("code").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err: ApiError = sqlx::Error::PoolTimedOut.into();

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail {
                field: "name".to_string(),
                message: "Name must be 1-255 characters".to_string(),
            },
            ValidationErrorDetail {
                field: "initials".to_string(),
                message: "Initials must be 1-16 characters".to_string(),
            },
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }
}
