/// Role derivation from membership facts
///
/// When an external identity is first linked to a person, the person's roles
/// are worked out from what they already are:
///
/// | Fact                                   | Role granted              |
/// |----------------------------------------|---------------------------|
/// | enrolled in any school                 | `school_member`           |
/// | instructor in any school               | `school_instructor`       |
/// | secretary in any school                | `school_secretary`        |
/// | head instructor of any school          | `school_head_instructor`  |
/// | member of any organisation             | `organisation_member`     |
/// | admin of any organisation              | `organisation_admin`      |
///
/// [`set_roles_for_user`] only ever adds roles. Administrative role
/// management goes through [`replace_roles_for_user`], which replaces the
/// whole set.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::roles::{RoleSet, UserRole};
use crate::error::{EntityKind, MartialBaseError, MartialBaseResult};
use crate::models::{
    organisation_person::OrganisationPerson,
    school::School,
    school_student::SchoolStudent,
    user::MartialBaseUser,
    user_role::{MartialBaseUserRole, UserRoleRecord},
};

/// Roles implied by a person's enrolments and memberships
pub fn derive_roles(
    enrolments: &[SchoolStudent],
    heads_any_school: bool,
    memberships: &[OrganisationPerson],
) -> RoleSet {
    let mut roles = RoleSet::new();

    if !enrolments.is_empty() {
        roles.insert(UserRole::SchoolMember);
    }
    if enrolments.iter().any(|enrolment| enrolment.is_instructor) {
        roles.insert(UserRole::SchoolInstructor);
    }
    if enrolments.iter().any(|enrolment| enrolment.is_secretary) {
        roles.insert(UserRole::SchoolSecretary);
    }
    if heads_any_school {
        roles.insert(UserRole::SchoolHeadInstructor);
    }
    if !memberships.is_empty() {
        roles.insert(UserRole::OrganisationMember);
    }
    if memberships.iter().any(|membership| membership.is_admin) {
        roles.insert(UserRole::OrganisationAdmin);
    }

    roles
}

/// Grants the roles derived from `person_id`'s facts to `user_id`
///
/// Existing assignments are kept; roles already held are not assigned twice.
/// Returns the roles derived.
pub async fn set_roles_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    person_id: Uuid,
) -> MartialBaseResult<RoleSet> {
    let enrolments = SchoolStudent::list_for_person(&mut *conn, person_id).await?;
    let heads_any_school = School::count_headed_by(&mut *conn, person_id).await? > 0;
    let memberships = OrganisationPerson::list_for_person(&mut *conn, person_id).await?;

    let roles = derive_roles(&enrolments, heads_any_school, &memberships);

    let mut granted = 0;
    for role in roles.iter() {
        if MartialBaseUserRole::assign_role(&mut *conn, user_id, role).await? {
            granted += 1;
        }
    }

    info!(
        user_id = %user_id,
        person_id = %person_id,
        derived = roles.len(),
        granted,
        "Derived roles for user"
    );

    Ok(roles)
}

/// Role ids to add and to remove to get from `current` to `desired`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleDiff {
    pub add: Vec<Uuid>,
    pub remove: Vec<Uuid>,
}

pub fn diff_roles(current: &[Uuid], desired: &[Uuid]) -> RoleDiff {
    let current_set: HashSet<Uuid> = current.iter().copied().collect();
    let desired_set: HashSet<Uuid> = desired.iter().copied().collect();
    let mut seen = HashSet::new();

    RoleDiff {
        add: desired
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id) && seen.insert(*id))
            .collect(),
        remove: current
            .iter()
            .copied()
            .filter(|id| !desired_set.contains(id))
            .collect(),
    }
}

/// Replaces a user's role assignments with exactly `role_ids`
///
/// # Errors
///
/// - `NotFound(MartialBaseUser)` if the user does not exist
/// - `NotFound(UserRole)` for the first id missing from the catalogue
pub async fn replace_roles_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    role_ids: &[Uuid],
) -> MartialBaseResult<Vec<UserRole>> {
    if MartialBaseUser::find_by_id(&mut *conn, user_id).await?.is_none() {
        return Err(MartialBaseError::not_found(EntityKind::MartialBaseUser, user_id));
    }

    let known: HashSet<Uuid> = UserRoleRecord::find_many(&mut *conn, role_ids)
        .await?
        .into_iter()
        .map(|record| record.id)
        .collect();
    if let Some(unknown) = role_ids.iter().find(|id| !known.contains(id)) {
        return Err(MartialBaseError::not_found(EntityKind::UserRole, *unknown));
    }

    let current = MartialBaseUserRole::role_ids_for_user(&mut *conn, user_id).await?;
    let diff = diff_roles(&current, role_ids);

    debug!(
        user_id = %user_id,
        adding = diff.add.len(),
        removing = diff.remove.len(),
        "Replacing user roles"
    );

    for role_id in &diff.add {
        MartialBaseUserRole::assign(&mut *conn, user_id, *role_id).await?;
    }
    for role_id in &diff.remove {
        MartialBaseUserRole::revoke(&mut *conn, user_id, *role_id).await?;
    }

    info!(user_id = %user_id, roles = role_ids.len(), "Replaced user roles");

    Ok(MartialBaseUserRole::roles_for_user(&mut *conn, user_id).await?)
}
