/// Organisations and their memberships
///
/// The membership rules enforced here:
///
/// - every person belongs to at least one organisation, so removing a
///   person's last membership fails with `OrphanPersonEntity`
/// - an organisation cannot be deleted while it is the only organisation of
///   one of its members (`OrphanPersonEntity`) or while a school still
///   belongs to it (`OrphanSchoolEntity`); both checks run before anything is
///   removed
/// - [`add_organisation_person`] is an upsert: repeating it never duplicates
///   the membership, and a different admin flag is updated in place
///
/// Access checks are not done here; handlers run them first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::addresses::{create_optional_address, replace_owned_address};
use super::people::{create_unclaimed_person, NewPerson, UnclaimedPerson};
use crate::auth::middleware::AuthContext;
use crate::auth::roles::UserRole;
use crate::error::{EntityKind, MartialBaseError, MartialBaseResult};
use crate::models::{
    address::{Address, AddressInput},
    organisation::{CreateOrganisation, Organisation, UpdateOrganisation},
    organisation_person::OrganisationPerson,
    person::Person,
    school::School,
    school_student::SchoolStudent,
    user_role::MartialBaseUserRole,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganisation {
    pub initials: String,
    pub name: String,
    pub is_public: bool,
    pub parent_id: Option<Uuid>,
    pub address: Option<AddressInput>,

    /// Creates this person as the organisation's first admin
    pub admin: Option<NewPerson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrganisation {
    pub organisation: Organisation,
    pub admin: Option<UnclaimedPerson>,
}

/// A member as listed on an organisation
#[derive(Debug, Clone, Serialize)]
pub struct OrganisationMember {
    #[serde(flatten)]
    pub person: Person,
    pub is_admin: bool,
}

/// An organisation with its address resolved
#[derive(Debug, Clone, Serialize)]
pub struct OrganisationView {
    #[serde(flatten)]
    pub organisation: Organisation,
    pub address: Option<Address>,
}

/// Fails with `OrphanPersonEntity` when `membership_count` is exactly one
///
/// Zero memberships is not an orphan case: there is nothing to remove.
pub fn ensure_not_last_membership(
    membership_count: i64,
    organisation_id: Uuid,
    person_id: Uuid,
) -> MartialBaseResult<()> {
    if membership_count == 1 {
        return Err(MartialBaseError::OrphanPersonEntity {
            person_id,
            organisation_id,
        });
    }

    Ok(())
}

pub async fn get_organisation(
    conn: &mut PgConnection,
    organisation_id: Uuid,
) -> MartialBaseResult<Organisation> {
    Organisation::find_by_id(&mut *conn, organisation_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, organisation_id))
}

pub async fn get_organisation_view(
    conn: &mut PgConnection,
    organisation_id: Uuid,
) -> MartialBaseResult<OrganisationView> {
    let organisation = get_organisation(&mut *conn, organisation_id).await?;
    let address = match organisation.address_id {
        Some(address_id) => Address::find_by_id(&mut *conn, address_id).await?,
        None => None,
    };

    Ok(OrganisationView {
        organisation,
        address,
    })
}

/// Organisations the caller may see: all of them for the super-role,
/// otherwise public ones plus the caller's own
pub async fn list_visible(
    conn: &mut PgConnection,
    caller: &AuthContext,
) -> MartialBaseResult<Vec<Organisation>> {
    if caller.bypasses_entity_checks() {
        return Ok(Organisation::list_all(&mut *conn).await?);
    }

    Ok(Organisation::list_visible_to_person(&mut *conn, caller.person_id).await?)
}

/// Creates an organisation, optionally with a new admin person
///
/// Without a new admin, `creator_person_id` (the caller's person, if linked)
/// becomes the first admin. With neither, the call fails with `Validation`
/// before anything is written.
pub async fn create_organisation(
    conn: &mut PgConnection,
    new_organisation: &NewOrganisation,
    creator_person_id: Option<Uuid>,
) -> MartialBaseResult<CreatedOrganisation> {
    if new_organisation.admin.is_none() && creator_person_id.is_none() {
        return Err(MartialBaseError::Validation(
            "An organisation needs an admin: supply one or register as a person first."
                .to_string(),
        ));
    }

    if let Some(parent_id) = new_organisation.parent_id {
        if !Organisation::exists(&mut *conn, parent_id).await? {
            return Err(MartialBaseError::not_found(EntityKind::Organisation, parent_id));
        }
    }

    let address_id = create_optional_address(&mut *conn, new_organisation.address.as_ref()).await?;

    let organisation = Organisation::create(
        &mut *conn,
        CreateOrganisation {
            initials: new_organisation.initials.clone(),
            name: new_organisation.name.clone(),
            address_id,
            parent_id: new_organisation.parent_id,
            is_public: new_organisation.is_public,
        },
    )
    .await?;

    let admin = match &new_organisation.admin {
        Some(new_admin) => {
            let unclaimed = create_unclaimed_person(&mut *conn, new_admin).await?;
            OrganisationPerson::upsert(&mut *conn, organisation.id, unclaimed.person.id, true)
                .await?;
            MartialBaseUserRole::assign_role(
                &mut *conn,
                unclaimed.user_id,
                UserRole::OrganisationAdmin,
            )
            .await?;
            Some(unclaimed)
        }
        None => {
            if let Some(person_id) = creator_person_id {
                OrganisationPerson::upsert(&mut *conn, organisation.id, person_id, true).await?;
            }
            None
        }
    };

    info!(
        organisation_id = %organisation.id,
        parent_id = ?organisation.parent_id,
        new_admin = admin.is_some(),
        "Created organisation"
    );

    Ok(CreatedOrganisation {
        organisation,
        admin,
    })
}

/// Overwrites an organisation's fields and replaces its address
pub async fn update_organisation(
    conn: &mut PgConnection,
    organisation_id: Uuid,
    update: &UpdateOrganisation,
    address: Option<&AddressInput>,
) -> MartialBaseResult<Organisation> {
    let existing = get_organisation(&mut *conn, organisation_id).await?;

    let address_id = replace_owned_address(&mut *conn, existing.address_id, address).await?;
    if address_id != existing.address_id {
        Organisation::set_address(&mut *conn, organisation_id, address_id).await?;
    }

    let organisation = Organisation::update(&mut *conn, organisation_id, update)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, organisation_id))?;

    info!(organisation_id = %organisation_id, "Updated organisation");

    Ok(organisation)
}

/// Adds a person to an organisation, or updates their admin flag
pub async fn add_organisation_person(
    conn: &mut PgConnection,
    organisation_id: Uuid,
    person_id: Uuid,
    is_admin: bool,
) -> MartialBaseResult<OrganisationPerson> {
    if !Organisation::exists(&mut *conn, organisation_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Organisation, organisation_id));
    }
    if !Person::exists(&mut *conn, person_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Person, person_id));
    }

    let membership =
        OrganisationPerson::upsert(&mut *conn, organisation_id, person_id, is_admin).await?;

    info!(
        organisation_id = %organisation_id,
        person_id = %person_id,
        is_admin,
        "Organisation membership set"
    );

    Ok(membership)
}

/// Creates a person (with an invitation code) directly into an organisation
pub async fn add_new_person_to_organisation(
    conn: &mut PgConnection,
    organisation_id: Uuid,
    new_person: &NewPerson,
    is_admin: bool,
) -> MartialBaseResult<UnclaimedPerson> {
    if !Organisation::exists(&mut *conn, organisation_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Organisation, organisation_id));
    }

    let unclaimed = create_unclaimed_person(&mut *conn, new_person).await?;
    OrganisationPerson::upsert(&mut *conn, organisation_id, unclaimed.person.id, is_admin).await?;

    info!(
        organisation_id = %organisation_id,
        person_id = %unclaimed.person.id,
        is_admin,
        "Added new person to organisation"
    );

    Ok(unclaimed)
}

/// Clears the admin flag of a member
pub async fn demote_organisation_admin(
    conn: &mut PgConnection,
    organisation_id: Uuid,
    person_id: Uuid,
) -> MartialBaseResult<OrganisationPerson> {
    let membership = OrganisationPerson::set_admin(&mut *conn, organisation_id, person_id, false)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::OrganisationPerson, person_id))?;

    info!(organisation_id = %organisation_id, person_id = %person_id, "Demoted organisation admin");

    Ok(membership)
}

/// Removes a person from an organisation
///
/// Their enrolments in the organisation's schools go with the membership.
///
/// # Errors
///
/// - `OrphanPersonEntity` if the person belongs to exactly one organisation
/// - `Validation` if the person heads one of the organisation's schools
/// - `NotFound` for a missing organisation, person or membership
pub async fn remove_organisation_person(
    conn: &mut PgConnection,
    organisation_id: Uuid,
    person_id: Uuid,
) -> MartialBaseResult<()> {
    if !Organisation::exists(&mut *conn, organisation_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Organisation, organisation_id));
    }
    if !Person::exists(&mut *conn, person_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Person, person_id));
    }

    let membership_count = OrganisationPerson::count_for_person(&mut *conn, person_id).await?;
    if let Err(e) = ensure_not_last_membership(membership_count, organisation_id, person_id) {
        warn!(
            organisation_id = %organisation_id,
            person_id = %person_id,
            "Refusing to remove last organisation membership"
        );
        return Err(e);
    }

    if let Some(school_id) =
        School::first_headed_in_organisation(&mut *conn, organisation_id, person_id).await?
    {
        return Err(MartialBaseError::Validation(format!(
            "Person ID '{}' is the head instructor of school ID '{}'.",
            person_id, school_id
        )));
    }

    let enrolments =
        SchoolStudent::delete_for_person_in_organisation(&mut *conn, organisation_id, person_id)
            .await?;

    if !OrganisationPerson::delete(&mut *conn, organisation_id, person_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::OrganisationPerson, person_id));
    }

    info!(
        organisation_id = %organisation_id,
        person_id = %person_id,
        enrolments_removed = enrolments,
        "Removed person from organisation"
    );

    Ok(())
}

/// Deletes an organisation, its memberships and its address
///
/// # Errors
///
/// - `OrphanPersonEntity` for the first member who belongs nowhere else
/// - `OrphanSchoolEntity` for the first school still owned by it
///
/// Both are checked before any row is removed.
pub async fn delete_organisation(
    conn: &mut PgConnection,
    organisation_id: Uuid,
) -> MartialBaseResult<()> {
    let organisation = get_organisation(&mut *conn, organisation_id).await?;

    let sole_members = OrganisationPerson::sole_member_ids(&mut *conn, organisation_id).await?;
    if let Some(&person_id) = sole_members.first() {
        warn!(
            organisation_id = %organisation_id,
            sole_members = sole_members.len(),
            "Refusing to delete organisation with sole members"
        );
        return Err(MartialBaseError::OrphanPersonEntity {
            person_id,
            organisation_id,
        });
    }

    if let Some(school_id) = School::first_for_organisation(&mut *conn, organisation_id).await? {
        warn!(
            organisation_id = %organisation_id,
            school_id = %school_id,
            "Refusing to delete organisation that still owns schools"
        );
        return Err(MartialBaseError::OrphanSchoolEntity {
            school_id,
            organisation_id,
        });
    }

    let memberships =
        OrganisationPerson::delete_all_for_organisation(&mut *conn, organisation_id).await?;
    Organisation::delete(&mut *conn, organisation_id).await?;
    if let Some(address_id) = organisation.address_id {
        Address::delete(&mut *conn, address_id).await?;
    }

    info!(
        organisation_id = %organisation_id,
        memberships_removed = memberships,
        "Deleted organisation"
    );

    Ok(())
}

/// Members of an organisation with their admin flags
pub async fn list_people(
    conn: &mut PgConnection,
    organisation_id: Uuid,
) -> MartialBaseResult<Vec<OrganisationMember>> {
    let admin_flags: HashMap<Uuid, bool> =
        OrganisationPerson::list_for_organisation(&mut *conn, organisation_id)
            .await?
            .into_iter()
            .map(|membership| (membership.person_id, membership.is_admin))
            .collect();

    let people = Person::list_for_organisation(&mut *conn, organisation_id).await?;

    Ok(people
        .into_iter()
        .map(|person| {
            let is_admin = admin_flags.get(&person.id).copied().unwrap_or(false);
            OrganisationMember { person, is_admin }
        })
        .collect())
}
