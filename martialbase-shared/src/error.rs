/// Domain error taxonomy shared by every service
///
/// All services in this crate return [`MartialBaseResult`]. The API crate maps
/// each variant onto an HTTP response; the messages rendered here are the ones
/// clients see.
///
/// # Variants
///
/// - `NotFound`: a referenced id does not exist. Renders as
///   `"<EntityKind> ID '<id>' not found."`
/// - `Forbidden`: an access check failed, tagged with a [`ForbiddenCode`]
/// - `OrphanPersonEntity` / `OrphanSchoolEntity`: a removal would leave a
///   person without an organisation, or a school without its organisation
/// - `Validation`: malformed or missing input
/// - `Database`: anything the driver reports
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Result alias used across services
pub type MartialBaseResult<T> = Result<T, MartialBaseError>;

/// Kinds of entity that can be reported as missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Organisation,
    OrganisationPerson,
    School,
    SchoolStudent,
    Person,
    Address,
    Art,
    Document,
    DocumentType,
    MartialBaseUser,
    UserRole,
    InvitationCode,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Organisation => "Organisation",
            EntityKind::OrganisationPerson => "OrganisationPerson",
            EntityKind::School => "School",
            EntityKind::SchoolStudent => "SchoolStudent",
            EntityKind::Person => "Person",
            EntityKind::Address => "Address",
            EntityKind::Art => "Art",
            EntityKind::Document => "Document",
            EntityKind::DocumentType => "DocumentType",
            EntityKind::MartialBaseUser => "MartialBaseUser",
            EntityKind::UserRole => "UserRole",
            EntityKind::InvitationCode => "InvitationCode",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason codes attached to a forbidden outcome
///
/// This set is closed: clients switch on these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForbiddenCode {
    /// Caller holds no role that could grant access to this kind of entity
    InsufficientUserRole,

    /// Caller's external identity is not linked to a person yet
    AzureUserNotRegistered,

    /// Caller is not flagged admin on the organisation
    NotOrganisationAdmin,

    /// Caller is not a member of a non-public organisation
    NoOrganisationAccess,
}

impl ForbiddenCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForbiddenCode::InsufficientUserRole => "InsufficientUserRole",
            ForbiddenCode::AzureUserNotRegistered => "AzureUserNotRegistered",
            ForbiddenCode::NotOrganisationAdmin => "NotOrganisationAdmin",
            ForbiddenCode::NoOrganisationAccess => "NoOrganisationAccess",
        }
    }
}

impl fmt::Display for ForbiddenCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MartialBaseError {
    #[error("{kind} ID '{id}' not found.")]
    NotFound { kind: EntityKind, id: String },

    #[error("{}", forbidden_message(.code, .organisation_id))]
    Forbidden {
        code: ForbiddenCode,
        organisation_id: Option<Uuid>,
    },

    #[error("Person ID '{person_id}' would no longer belong to any organisation (organisation ID '{organisation_id}').")]
    OrphanPersonEntity { person_id: Uuid, organisation_id: Uuid },

    #[error("School ID '{school_id}' still belongs to organisation ID '{organisation_id}'.")]
    OrphanSchoolEntity { school_id: Uuid, organisation_id: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MartialBaseError {
    /// Shorthand for a missing entity keyed by UUID
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        MartialBaseError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn forbidden(code: ForbiddenCode, organisation_id: Uuid) -> Self {
        MartialBaseError::Forbidden {
            code,
            organisation_id: Some(organisation_id),
        }
    }

    /// Forbidden outcome of a check that is not tied to one organisation
    pub fn forbidden_role(code: ForbiddenCode) -> Self {
        MartialBaseError::Forbidden {
            code,
            organisation_id: None,
        }
    }

    /// Returns the forbidden code, if this is a forbidden error
    pub fn forbidden_code(&self) -> Option<ForbiddenCode> {
        match self {
            MartialBaseError::Forbidden { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn forbidden_message(code: &ForbiddenCode, organisation_id: &Option<Uuid>) -> String {
    match organisation_id {
        Some(id) => format!("Forbidden ({}) for organisation ID '{}'.", code, id),
        None => format!("Forbidden ({}).", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_format() {
        let id = Uuid::parse_str("6f1c2f5e-8a3e-4c4f-9a63-1b1f4e7c2d10").unwrap();
        let err = MartialBaseError::not_found(EntityKind::Organisation, id);
        assert_eq!(
            err.to_string(),
            "Organisation ID '6f1c2f5e-8a3e-4c4f-9a63-1b1f4e7c2d10' not found."
        );

        let err = MartialBaseError::NotFound {
            kind: EntityKind::InvitationCode,
            id: "AB12CD3".to_string(),
        };
        assert_eq!(err.to_string(), "InvitationCode ID 'AB12CD3' not found.");
    }

    #[test]
    fn test_forbidden_code_names() {
        assert_eq!(ForbiddenCode::InsufficientUserRole.as_str(), "InsufficientUserRole");
        assert_eq!(ForbiddenCode::AzureUserNotRegistered.as_str(), "AzureUserNotRegistered");
        assert_eq!(ForbiddenCode::NotOrganisationAdmin.as_str(), "NotOrganisationAdmin");
        assert_eq!(ForbiddenCode::NoOrganisationAccess.as_str(), "NoOrganisationAccess");

        let json = serde_json::to_string(&ForbiddenCode::NotOrganisationAdmin).unwrap();
        assert_eq!(json, "\"NotOrganisationAdmin\"");
    }

    #[test]
    fn test_forbidden_code_accessor() {
        let org = Uuid::new_v4();
        let err = MartialBaseError::forbidden(ForbiddenCode::NoOrganisationAccess, org);
        assert_eq!(err.forbidden_code(), Some(ForbiddenCode::NoOrganisationAccess));
        assert!(err.to_string().contains(&org.to_string()));

        let err = MartialBaseError::forbidden_role(ForbiddenCode::InsufficientUserRole);
        assert_eq!(err.to_string(), "Forbidden (InsufficientUserRole).");

        let err = MartialBaseError::Validation("bad".to_string());
        assert_eq!(err.forbidden_code(), None);
    }
}
