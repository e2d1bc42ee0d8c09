/// Schools, their students and their addresses
///
/// A school's students are always members of the school's organisation:
/// enrolling someone creates the organisation membership if it is missing.
/// Deleting a school removes its addresses and enrolments but leaves the
/// people and their organisation memberships alone.
///
/// Access checks are not done here; handlers run them first.

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::addresses::{create_optional_address, replace_owned_address, replace_school_venues};
use super::people::{create_unclaimed_person, NewPerson, UnclaimedPerson};
use crate::error::{EntityKind, MartialBaseError, MartialBaseResult};
use crate::models::{
    address::{Address, AddressInput},
    art::Art,
    document::PersonDocument,
    organisation::Organisation,
    organisation_person::OrganisationPerson,
    person::Person,
    school::{CreateSchool, School, SchoolDetails},
    school_student::SchoolStudent,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewSchool {
    pub organisation_id: Uuid,
    pub art_id: Uuid,
    pub head_instructor_id: Option<Uuid>,
    #[serde(flatten)]
    pub details: SchoolDetails,
    pub default_address: Option<AddressInput>,
    #[serde(default)]
    pub venues: Vec<AddressInput>,
}

/// A school with its addresses resolved
#[derive(Debug, Clone, Serialize)]
pub struct SchoolView {
    #[serde(flatten)]
    pub school: School,
    pub default_address: Option<Address>,
    pub venues: Vec<Address>,
}

/// A person created straight into a school
#[derive(Debug, Clone, Serialize)]
pub struct NewStudent {
    #[serde(flatten)]
    pub unclaimed: UnclaimedPerson,
    pub enrolment: SchoolStudent,
}

pub async fn get_school(conn: &mut PgConnection, school_id: Uuid) -> MartialBaseResult<School> {
    School::find_by_id(&mut *conn, school_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::School, school_id))
}

pub async fn get_school_view(
    conn: &mut PgConnection,
    school_id: Uuid,
) -> MartialBaseResult<SchoolView> {
    let school = get_school(&mut *conn, school_id).await?;

    let default_address = match school.default_address_id {
        Some(address_id) => Address::find_by_id(&mut *conn, address_id).await?,
        None => None,
    };
    let venues = Address::list_for_school(&mut *conn, school_id).await?;

    Ok(SchoolView {
        school,
        default_address,
        venues,
    })
}

pub async fn list_by_organisation(
    conn: &mut PgConnection,
    organisation_id: Uuid,
) -> MartialBaseResult<Vec<School>> {
    Ok(School::list_by_organisation(&mut *conn, organisation_id).await?)
}

/// Enrols a head instructor: organisation member, instructor and secretary
async fn enrol_head_instructor(
    conn: &mut PgConnection,
    school: &School,
    person_id: Uuid,
) -> MartialBaseResult<SchoolStudent> {
    OrganisationPerson::ensure(&mut *conn, school.organisation_id, person_id).await?;
    Ok(SchoolStudent::upsert(&mut *conn, school.id, person_id, true, true).await?)
}

/// Creates a school with its addresses
///
/// The organisation, the art and the head instructor (if given) must exist.
pub async fn create_school(
    conn: &mut PgConnection,
    new_school: &NewSchool,
) -> MartialBaseResult<SchoolView> {
    if !Organisation::exists(&mut *conn, new_school.organisation_id).await? {
        return Err(MartialBaseError::not_found(
            EntityKind::Organisation,
            new_school.organisation_id,
        ));
    }
    if Art::find_by_id(&mut *conn, new_school.art_id).await?.is_none() {
        return Err(MartialBaseError::not_found(EntityKind::Art, new_school.art_id));
    }
    if let Some(person_id) = new_school.head_instructor_id {
        if !Person::exists(&mut *conn, person_id).await? {
            return Err(MartialBaseError::not_found(EntityKind::Person, person_id));
        }
    }

    let default_address_id =
        create_optional_address(&mut *conn, new_school.default_address.as_ref()).await?;

    let school = School::create(
        &mut *conn,
        &CreateSchool {
            art_id: new_school.art_id,
            organisation_id: new_school.organisation_id,
            head_instructor_id: new_school.head_instructor_id,
            default_address_id,
            details: new_school.details.clone(),
        },
    )
    .await?;

    for venue in &new_school.venues {
        let address = Address::create(&mut *conn, venue).await?;
        Address::link_to_school(&mut *conn, school.id, address.id).await?;
    }

    if let Some(person_id) = school.head_instructor_id {
        enrol_head_instructor(&mut *conn, &school, person_id).await?;
    }

    info!(
        school_id = %school.id,
        organisation_id = %school.organisation_id,
        venues = new_school.venues.len(),
        "Created school"
    );

    get_school_view(&mut *conn, school.id).await
}

/// Overwrites contact fields, the default address and the venue list
pub async fn update_school(
    conn: &mut PgConnection,
    school_id: Uuid,
    details: &SchoolDetails,
    default_address: Option<&AddressInput>,
    venues: &[AddressInput],
) -> MartialBaseResult<SchoolView> {
    let existing = get_school(&mut *conn, school_id).await?;

    School::update_details(&mut *conn, school_id, details).await?;

    let default_address_id =
        replace_owned_address(&mut *conn, existing.default_address_id, default_address).await?;
    if default_address_id != existing.default_address_id {
        School::set_default_address(&mut *conn, school_id, default_address_id).await?;
    }

    replace_school_venues(&mut *conn, school_id, venues).await?;

    info!(school_id = %school_id, "Updated school");

    get_school_view(&mut *conn, school_id).await
}

/// Enrols an existing person, joining them to the school's organisation if
/// needed
///
/// Re-enrolling an existing student overwrites the flags. The head
/// instructor always keeps both the instructor and secretary flags.
pub async fn add_existing_person_to_school(
    conn: &mut PgConnection,
    school_id: Uuid,
    person_id: Uuid,
    is_instructor: bool,
    is_secretary: bool,
) -> MartialBaseResult<SchoolStudent> {
    let school = get_school(&mut *conn, school_id).await?;
    if !Person::exists(&mut *conn, person_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Person, person_id));
    }

    let is_head = school.head_instructor_id == Some(person_id);
    let is_instructor = is_instructor || is_head;
    let is_secretary = is_secretary || is_head;

    let joined = OrganisationPerson::ensure(&mut *conn, school.organisation_id, person_id).await?;
    let enrolment =
        SchoolStudent::upsert(&mut *conn, school_id, person_id, is_instructor, is_secretary)
            .await?;

    info!(
        school_id = %school_id,
        person_id = %person_id,
        is_instructor,
        is_secretary,
        joined_organisation = joined,
        "Enrolled person in school"
    );

    Ok(enrolment)
}

/// Creates a person (with an invitation code) and enrols them
pub async fn add_new_person_to_school(
    conn: &mut PgConnection,
    school_id: Uuid,
    new_person: &NewPerson,
    is_instructor: bool,
    is_secretary: bool,
) -> MartialBaseResult<NewStudent> {
    let school = get_school(&mut *conn, school_id).await?;

    let unclaimed = create_unclaimed_person(&mut *conn, new_person).await?;
    OrganisationPerson::ensure(&mut *conn, school.organisation_id, unclaimed.person.id).await?;
    let enrolment = SchoolStudent::upsert(
        &mut *conn,
        school_id,
        unclaimed.person.id,
        is_instructor,
        is_secretary,
    )
    .await?;

    info!(
        school_id = %school_id,
        person_id = %unclaimed.person.id,
        "Enrolled new person in school"
    );

    Ok(NewStudent {
        unclaimed,
        enrolment,
    })
}

/// Unenrols a student; the organisation membership stays
///
/// The head instructor cannot be removed; change the head instructor first.
pub async fn remove_student_from_school(
    conn: &mut PgConnection,
    school_id: Uuid,
    person_id: Uuid,
) -> MartialBaseResult<()> {
    let school = get_school(&mut *conn, school_id).await?;

    if school.head_instructor_id == Some(person_id) {
        return Err(MartialBaseError::Validation(format!(
            "Person ID '{}' is the head instructor of school ID '{}'.",
            person_id, school_id
        )));
    }

    if !SchoolStudent::delete(&mut *conn, school_id, person_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::SchoolStudent, person_id));
    }

    info!(school_id = %school_id, person_id = %person_id, "Removed student from school");

    Ok(())
}

pub async fn list_students(
    conn: &mut PgConnection,
    school_id: Uuid,
) -> MartialBaseResult<Vec<SchoolStudent>> {
    get_school(&mut *conn, school_id).await?;
    Ok(SchoolStudent::list_for_school(&mut *conn, school_id).await?)
}

/// Makes `new_head_id` the head instructor
///
/// The new head is enrolled (or re-flagged) as instructor and secretary. With
/// `retain_secretary` false the previous head loses the secretary flag; they
/// stay enrolled and keep the instructor flag.
pub async fn change_school_head_instructor(
    conn: &mut PgConnection,
    school_id: Uuid,
    new_head_id: Uuid,
    retain_secretary: bool,
) -> MartialBaseResult<School> {
    let school = get_school(&mut *conn, school_id).await?;
    if !Person::exists(&mut *conn, new_head_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Person, new_head_id));
    }

    let previous_head_id = school.head_instructor_id;

    School::set_head_instructor(&mut *conn, school_id, Some(new_head_id)).await?;
    enrol_head_instructor(&mut *conn, &school, new_head_id).await?;

    if let Some(previous) = previous_head_id.filter(|previous| *previous != new_head_id) {
        if !retain_secretary {
            SchoolStudent::set_secretary(&mut *conn, school_id, previous, false).await?;
        }
    }

    info!(
        school_id = %school_id,
        previous_head_id = ?previous_head_id,
        new_head_id = %new_head_id,
        retain_secretary,
        "Changed school head instructor"
    );

    get_school(&mut *conn, school_id).await
}

/// Points a student's insurance and licence slots at their own documents
pub async fn set_student_documents(
    conn: &mut PgConnection,
    school_id: Uuid,
    person_id: Uuid,
    insurance_document_id: Option<Uuid>,
    licence_document_id: Option<Uuid>,
) -> MartialBaseResult<SchoolStudent> {
    get_school(&mut *conn, school_id).await?;

    for document_id in [insurance_document_id, licence_document_id]
        .into_iter()
        .flatten()
    {
        if !PersonDocument::is_owned_by(&mut *conn, person_id, document_id).await? {
            return Err(MartialBaseError::not_found(EntityKind::Document, document_id));
        }
    }

    SchoolStudent::set_documents(
        &mut *conn,
        school_id,
        person_id,
        insurance_document_id,
        licence_document_id,
    )
    .await?
    .ok_or_else(|| MartialBaseError::not_found(EntityKind::SchoolStudent, person_id))
}

/// Deletes a school with its addresses and enrolments
///
/// Order: venues, default address, enrolments, then the school row. People
/// and organisation memberships are untouched.
pub async fn delete_school(conn: &mut PgConnection, school_id: Uuid) -> MartialBaseResult<()> {
    let school = get_school(&mut *conn, school_id).await?;

    let venues = Address::list_for_school(&mut *conn, school_id).await?;
    for venue in &venues {
        Address::unlink_from_school(&mut *conn, school_id, venue.id).await?;
        Address::delete(&mut *conn, venue.id).await?;
    }

    if let Some(address_id) = school.default_address_id {
        Address::delete(&mut *conn, address_id).await?;
    }

    let students = SchoolStudent::delete_all_for_school(&mut *conn, school_id).await?;

    if !School::delete(&mut *conn, school_id).await? {
        warn!(school_id = %school_id, "School vanished during delete");
        return Err(MartialBaseError::not_found(EntityKind::School, school_id));
    }

    info!(
        school_id = %school_id,
        venues_removed = venues.len(),
        students_removed = students,
        "Deleted school"
    );

    Ok(())
}
