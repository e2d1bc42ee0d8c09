/// People and their documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use super::addresses::{create_optional_address, replace_owned_address};
use crate::auth::invitation::generate_invitation_code;
use crate::error::{EntityKind, MartialBaseError, MartialBaseResult};
use crate::models::{
    address::AddressInput,
    document::{CreateDocument, Document, DocumentType, PersonDocument},
    person::{Person, PersonDetails},
    user::MartialBaseUser,
};

/// A person to be created, with an optional home address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPerson {
    #[serde(flatten)]
    pub details: PersonDetails,
    pub address: Option<AddressInput>,
}

/// A freshly created person nobody has claimed yet
#[derive(Debug, Clone, Serialize)]
pub struct UnclaimedPerson {
    pub person: Person,
    pub user_id: Uuid,

    /// Handed to the person so they can link their identity
    pub invitation_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub document_type_id: Uuid,
    pub reference: Option<String>,

    /// Defaults to now
    pub filed_at: Option<DateTime<Utc>>,

    /// Defaults to the document type's default expiry, if it has one
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn get_person(conn: &mut PgConnection, person_id: Uuid) -> MartialBaseResult<Person> {
    Person::find_by_id(&mut *conn, person_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Person, person_id))
}

/// Creates a person, their address and an unlinked user with a fresh
/// invitation code
///
/// Memberships are the caller's business: a person must join an organisation
/// in the same unit of work.
pub async fn create_unclaimed_person(
    conn: &mut PgConnection,
    new_person: &NewPerson,
) -> MartialBaseResult<UnclaimedPerson> {
    let address_id = create_optional_address(&mut *conn, new_person.address.as_ref()).await?;
    let person = Person::create(&mut *conn, &new_person.details, address_id).await?;

    let invitation_code = generate_invitation_code(&mut *conn).await?;
    let user =
        MartialBaseUser::create(&mut *conn, Some(person.id), None, Some(&invitation_code)).await?;

    info!(person_id = %person.id, user_id = %user.id, "Created unclaimed person");

    Ok(UnclaimedPerson {
        person,
        user_id: user.id,
        invitation_code,
    })
}

/// Overwrites a person's details and replaces their address
pub async fn update_person(
    conn: &mut PgConnection,
    person_id: Uuid,
    details: &PersonDetails,
    address: Option<&AddressInput>,
) -> MartialBaseResult<Person> {
    let existing = get_person(&mut *conn, person_id).await?;

    let address_id = replace_owned_address(&mut *conn, existing.address_id, address).await?;
    if address_id != existing.address_id {
        Person::set_address(&mut *conn, person_id, address_id).await?;
    }

    Person::update(&mut *conn, person_id, details)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Person, person_id))
}

pub async fn list_documents(
    conn: &mut PgConnection,
    person_id: Uuid,
) -> MartialBaseResult<Vec<Document>> {
    get_person(&mut *conn, person_id).await?;
    Ok(Document::list_for_person(&mut *conn, person_id).await?)
}

/// Files a document for a person
pub async fn add_document(
    conn: &mut PgConnection,
    person_id: Uuid,
    new_document: &NewDocument,
) -> MartialBaseResult<Document> {
    get_person(&mut *conn, person_id).await?;

    let document_type = DocumentType::find_by_id(&mut *conn, new_document.document_type_id)
        .await?
        .ok_or_else(|| {
            MartialBaseError::not_found(EntityKind::DocumentType, new_document.document_type_id)
        })?;

    let filed_at = new_document.filed_at.unwrap_or_else(Utc::now);
    let expires_at = new_document
        .expires_at
        .or_else(|| document_type.default_expiry_from(filed_at));

    if expires_at.is_some_and(|expires_at| expires_at <= filed_at) {
        return Err(MartialBaseError::Validation(
            "expires_at must be after filed_at".to_string(),
        ));
    }

    let document = Document::create(
        &mut *conn,
        &CreateDocument {
            document_type_id: document_type.id,
            reference: new_document.reference.clone(),
            filed_at,
            expires_at,
        },
    )
    .await?;
    PersonDocument::link(&mut *conn, person_id, document.id).await?;

    info!(person_id = %person_id, document_id = %document.id, "Filed document");

    Ok(document)
}

/// Deletes one of a person's documents
///
/// School enrolments pointing at it lose the reference.
pub async fn remove_document(
    conn: &mut PgConnection,
    person_id: Uuid,
    document_id: Uuid,
) -> MartialBaseResult<()> {
    get_person(&mut *conn, person_id).await?;

    if !PersonDocument::is_owned_by(&mut *conn, person_id, document_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Document, document_id));
    }

    Document::delete(&mut *conn, document_id).await?;
    info!(person_id = %person_id, document_id = %document_id, "Removed document");

    Ok(())
}
