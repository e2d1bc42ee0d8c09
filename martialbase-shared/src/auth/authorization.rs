/// Access checks for organisations and schools
///
/// Every entity-scoped check runs in the same order and stops at the first
/// failure:
///
/// 1. The entity must exist (`NotFound`).
/// 2. Holders of the super-role pass.
/// 3. The caller must hold a role granting the relevant [`Capability`]
///    (`InsufficientUserRole`).
/// 4. The caller's identity must be linked to a person
///    (`AzureUserNotRegistered`).
/// 5. The membership rule of the check (`NotOrganisationAdmin` or
///    `NoOrganisationAccess`).
///
/// Steps 2 to 4 are [`screen_caller`]; step 5 is [`decide_admin`] or
/// [`decide_member`]. Both are pure so the ordering is testable without a
/// database.
///
/// # Example
///
/// ```no_run
/// use martialbase_shared::auth::authorization::check_organisation_admin_access;
/// use martialbase_shared::auth::middleware::AuthContext;
/// use martialbase_shared::db::unit_of_work::UnitOfWork;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, caller: AuthContext, org: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let mut uow = UnitOfWork::begin(&pool).await?;
/// let organisation = check_organisation_admin_access(uow.conn(), &caller, org).await?;
/// println!("{} may be administered", organisation.name);
/// # Ok(())
/// # }
/// ```

use sqlx::PgConnection;
use uuid::Uuid;

use super::middleware::AuthContext;
use super::roles::Capability;
use crate::error::{EntityKind, ForbiddenCode, MartialBaseError, MartialBaseResult};
use crate::models::{
    organisation::Organisation, organisation_person::OrganisationPerson, person::Person,
    school::School, school_student::SchoolStudent,
};

/// Outcome of the caller-level part of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screened {
    /// Super-role: skip the membership rule
    Bypass,

    /// Membership rule still applies to this person
    Person(Uuid),
}

/// Super-role, capability and registration checks
pub fn screen_caller(
    caller: &AuthContext,
    capability: Capability,
    organisation_id: Uuid,
) -> MartialBaseResult<Screened> {
    if caller.bypasses_entity_checks() {
        return Ok(Screened::Bypass);
    }

    if !caller.has_capability(capability) {
        return Err(MartialBaseError::forbidden(
            ForbiddenCode::InsufficientUserRole,
            organisation_id,
        ));
    }

    caller.person_id.map(Screened::Person).ok_or_else(|| {
        MartialBaseError::forbidden(ForbiddenCode::AzureUserNotRegistered, organisation_id)
    })
}

/// Admin rule: `membership` is the caller's row in the organisation, if any
pub fn decide_admin(
    membership: Option<&OrganisationPerson>,
    organisation_id: Uuid,
) -> MartialBaseResult<()> {
    match membership {
        Some(row) if row.is_admin => Ok(()),
        _ => Err(MartialBaseError::forbidden(
            ForbiddenCode::NotOrganisationAdmin,
            organisation_id,
        )),
    }
}

/// Member rule: any membership row, or a public organisation
pub fn decide_member(
    membership: Option<&OrganisationPerson>,
    organisation: &Organisation,
) -> MartialBaseResult<()> {
    if membership.is_some() || organisation.is_public {
        Ok(())
    } else {
        Err(MartialBaseError::forbidden(
            ForbiddenCode::NoOrganisationAccess,
            organisation.id,
        ))
    }
}

/// Fails with `InsufficientUserRole` unless the caller holds `capability`
///
/// Used by operations that are not scoped to one organisation, such as
/// creating an organisation or managing role assignments.
pub fn require_capability(caller: &AuthContext, capability: Capability) -> MartialBaseResult<()> {
    if caller.has_capability(capability) {
        Ok(())
    } else {
        Err(MartialBaseError::forbidden_role(
            ForbiddenCode::InsufficientUserRole,
        ))
    }
}

async fn load_organisation(
    conn: &mut PgConnection,
    organisation_id: Uuid,
) -> MartialBaseResult<Organisation> {
    Organisation::find_by_id(&mut *conn, organisation_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, organisation_id))
}

async fn load_school(conn: &mut PgConnection, school_id: Uuid) -> MartialBaseResult<School> {
    School::find_by_id(&mut *conn, school_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::School, school_id))
}

/// Caller must be admin of `organisation_id`
///
/// Returns the organisation so callers do not load it twice. No side effects.
pub async fn check_organisation_admin_access(
    conn: &mut PgConnection,
    caller: &AuthContext,
    organisation_id: Uuid,
) -> MartialBaseResult<Organisation> {
    let organisation = load_organisation(&mut *conn, organisation_id).await?;

    if let Screened::Person(person_id) =
        screen_caller(caller, Capability::OrganisationScoped, organisation_id)?
    {
        let membership = OrganisationPerson::find(&mut *conn, organisation_id, person_id).await?;
        decide_admin(membership.as_ref(), organisation_id)?;
    }

    Ok(organisation)
}

/// Caller must be a member of `organisation_id`, or it must be public
pub async fn check_organisation_member_access(
    conn: &mut PgConnection,
    caller: &AuthContext,
    organisation_id: Uuid,
) -> MartialBaseResult<Organisation> {
    let organisation = load_organisation(&mut *conn, organisation_id).await?;

    if let Screened::Person(person_id) =
        screen_caller(caller, Capability::OrganisationScoped, organisation_id)?
    {
        let membership = OrganisationPerson::find(&mut *conn, organisation_id, person_id).await?;
        decide_member(membership.as_ref(), &organisation)?;
    }

    Ok(organisation)
}

/// Caller must administer the school
///
/// Admins of the owning organisation pass, as do the school's head
/// instructor and its secretaries. Failures report `NotOrganisationAdmin`
/// against the owning organisation.
pub async fn check_school_admin_access(
    conn: &mut PgConnection,
    caller: &AuthContext,
    school_id: Uuid,
) -> MartialBaseResult<School> {
    let school = load_school(&mut *conn, school_id).await?;

    let Screened::Person(person_id) =
        screen_caller(caller, Capability::SchoolScoped, school.organisation_id)?
    else {
        return Ok(school);
    };

    if school.head_instructor_id == Some(person_id) {
        return Ok(school);
    }

    let enrolment = SchoolStudent::find(&mut *conn, school.id, person_id).await?;
    if enrolment.is_some_and(|row| row.is_secretary) {
        return Ok(school);
    }

    let membership =
        OrganisationPerson::find(&mut *conn, school.organisation_id, person_id).await?;
    decide_admin(membership.as_ref(), school.organisation_id)?;

    Ok(school)
}

/// Caller must be a student of the school, or pass member access on its
/// organisation
pub async fn check_school_member_access(
    conn: &mut PgConnection,
    caller: &AuthContext,
    school_id: Uuid,
) -> MartialBaseResult<School> {
    let school = load_school(&mut *conn, school_id).await?;

    let Screened::Person(person_id) =
        screen_caller(caller, Capability::OrganisationScoped, school.organisation_id)?
    else {
        return Ok(school);
    };

    if SchoolStudent::find(&mut *conn, school.id, person_id)
        .await?
        .is_some()
    {
        return Ok(school);
    }

    let organisation = load_organisation(&mut *conn, school.organisation_id).await?;
    let membership =
        OrganisationPerson::find(&mut *conn, school.organisation_id, person_id).await?;
    decide_member(membership.as_ref(), &organisation)?;

    Ok(school)
}

/// Caller must be the person, or admin of an organisation the person belongs to
///
/// People are not scoped to one organisation, so failures carry no
/// organisation id.
pub async fn check_person_access(
    conn: &mut PgConnection,
    caller: &AuthContext,
    person_id: Uuid,
) -> MartialBaseResult<Person> {
    let person = Person::find_by_id(&mut *conn, person_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Person, person_id))?;

    if caller.bypasses_entity_checks() {
        return Ok(person);
    }

    if !caller.has_capability(Capability::OrganisationScoped) {
        return Err(MartialBaseError::forbidden_role(
            ForbiddenCode::InsufficientUserRole,
        ));
    }

    let caller_person_id = caller.person_id.ok_or_else(|| {
        MartialBaseError::forbidden_role(ForbiddenCode::AzureUserNotRegistered)
    })?;

    if caller_person_id == person_id
        || OrganisationPerson::administers_member(&mut *conn, caller_person_id, person_id).await?
    {
        return Ok(person);
    }

    Err(MartialBaseError::forbidden_role(
        ForbiddenCode::NotOrganisationAdmin,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::{RoleSet, UserRole};
    use chrono::Utc;

    fn caller(roles: &[UserRole], person_id: Option<Uuid>) -> AuthContext {
        AuthContext {
            external_id: Uuid::new_v4(),
            user_id: person_id.map(|_| Uuid::new_v4()),
            person_id,
            roles: roles.iter().copied().collect::<RoleSet>(),
        }
    }

    fn membership(organisation_id: Uuid, person_id: Uuid, is_admin: bool) -> OrganisationPerson {
        OrganisationPerson {
            organisation_id,
            person_id,
            is_admin,
            created_at: Utc::now(),
        }
    }

    fn organisation(is_public: bool) -> Organisation {
        Organisation {
            id: Uuid::new_v4(),
            initials: "KA".to_string(),
            name: "Karate Association".to_string(),
            address_id: None,
            parent_id: None,
            is_public,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_super_role_bypasses_everything() {
        let org = Uuid::new_v4();
        // No person, no other roles: still passes
        let ctx = caller(&[UserRole::Thanos], None);
        assert_eq!(
            screen_caller(&ctx, Capability::OrganisationScoped, org).unwrap(),
            Screened::Bypass
        );
    }

    #[test]
    fn test_missing_role_reported_before_registration() {
        let org = Uuid::new_v4();
        let ctx = caller(&[], None);

        let err = screen_caller(&ctx, Capability::OrganisationScoped, org).unwrap_err();
        assert_eq!(err.forbidden_code(), Some(ForbiddenCode::InsufficientUserRole));
    }

    #[test]
    fn test_unlinked_identity() {
        let org = Uuid::new_v4();
        let ctx = caller(&[UserRole::OrganisationMember], None);

        let err = screen_caller(&ctx, Capability::OrganisationScoped, org).unwrap_err();
        assert_eq!(
            err.forbidden_code(),
            Some(ForbiddenCode::AzureUserNotRegistered)
        );
    }

    #[test]
    fn test_school_scope_needs_school_role() {
        let org = Uuid::new_v4();
        let ctx = caller(&[UserRole::OrganisationMember], Some(Uuid::new_v4()));

        let err = screen_caller(&ctx, Capability::SchoolScoped, org).unwrap_err();
        assert_eq!(err.forbidden_code(), Some(ForbiddenCode::InsufficientUserRole));
    }

    #[test]
    fn test_screen_returns_person() {
        let org = Uuid::new_v4();
        let person = Uuid::new_v4();
        let ctx = caller(&[UserRole::OrganisationAdmin], Some(person));

        assert_eq!(
            screen_caller(&ctx, Capability::OrganisationScoped, org).unwrap(),
            Screened::Person(person)
        );
    }

    #[test]
    fn test_decide_admin() {
        let org = Uuid::new_v4();
        let person = Uuid::new_v4();

        assert!(decide_admin(Some(&membership(org, person, true)), org).is_ok());

        let err = decide_admin(Some(&membership(org, person, false)), org).unwrap_err();
        assert_eq!(err.forbidden_code(), Some(ForbiddenCode::NotOrganisationAdmin));

        let err = decide_admin(None, org).unwrap_err();
        match err {
            MartialBaseError::Forbidden {
                code,
                organisation_id,
            } => {
                assert_eq!(code, ForbiddenCode::NotOrganisationAdmin);
                assert_eq!(organisation_id, Some(org));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decide_member() {
        let private = organisation(false);
        let public = organisation(true);
        let person = Uuid::new_v4();

        assert!(decide_member(Some(&membership(private.id, person, false)), &private).is_ok());
        assert!(decide_member(None, &public).is_ok());

        let err = decide_member(None, &private).unwrap_err();
        assert_eq!(err.forbidden_code(), Some(ForbiddenCode::NoOrganisationAccess));
    }

    #[test]
    fn test_require_capability() {
        let admin = caller(&[UserRole::SystemAdmin], Some(Uuid::new_v4()));
        assert!(require_capability(&admin, Capability::CreateOrganisation).is_ok());

        let org_admin = caller(&[UserRole::OrganisationAdmin], Some(Uuid::new_v4()));
        let err = require_capability(&org_admin, Capability::ManageUserRoles).unwrap_err();
        assert_eq!(err.forbidden_code(), Some(ForbiddenCode::InsufficientUserRole));
    }
}
