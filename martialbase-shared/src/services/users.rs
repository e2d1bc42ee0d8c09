/// Identity linking and the current-user view

use serde::Serialize;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::role_derivation::set_roles_for_user;
use crate::auth::invitation::is_valid_invitation_code;
use crate::auth::middleware::AuthContext;
use crate::auth::roles::RoleSet;
use crate::error::{EntityKind, MartialBaseError, MartialBaseResult};
use crate::models::{
    person::Person,
    user::MartialBaseUser,
    user_role::{MartialBaseUserRole, UserRoleRecord},
};

/// Who the caller is, as far as MartialBase knows
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub external_id: Uuid,
    pub user: Option<MartialBaseUser>,
    pub person: Option<Person>,
    pub roles: RoleSet,
}

/// Invitation codes are matched case-insensitively and ignore surrounding
/// whitespace
pub fn normalise_invitation_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Binds `external_id` to the person holding `code` and derives their roles
///
/// # Errors
///
/// - `Validation` if the code is malformed or the identity is already linked
/// - `NotFound(InvitationCode)` if no unclaimed user holds the code
pub async fn claim_invitation_code(
    conn: &mut PgConnection,
    external_id: Uuid,
    code: &str,
) -> MartialBaseResult<MartialBaseUser> {
    let code = normalise_invitation_code(code);
    if !is_valid_invitation_code(&code) {
        return Err(MartialBaseError::Validation(format!(
            "'{}' is not a valid invitation code.",
            code
        )));
    }

    if MartialBaseUser::find_by_external_id(&mut *conn, external_id)
        .await?
        .is_some()
    {
        warn!(external_id = %external_id, "Identity already linked, refusing invitation claim");
        return Err(MartialBaseError::Validation(
            "This identity is already linked to a person.".to_string(),
        ));
    }

    let user = MartialBaseUser::find_by_invitation_code(&mut *conn, &code)
        .await?
        .ok_or_else(|| MartialBaseError::NotFound {
            kind: EntityKind::InvitationCode,
            id: code.clone(),
        })?;

    let user = MartialBaseUser::link_identity(&mut *conn, user.id, external_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::MartialBaseUser, user.id))?;

    if let Some(person_id) = user.person_id {
        set_roles_for_user(&mut *conn, user.id, person_id).await?;
    }

    info!(user_id = %user.id, external_id = %external_id, "Claimed invitation code");

    Ok(user)
}

pub async fn current_user(
    conn: &mut PgConnection,
    caller: &AuthContext,
) -> MartialBaseResult<CurrentUser> {
    let user = match caller.user_id {
        Some(user_id) => MartialBaseUser::find_by_id(&mut *conn, user_id).await?,
        None => None,
    };
    let person = match caller.person_id {
        Some(person_id) => Person::find_by_id(&mut *conn, person_id).await?,
        None => None,
    };

    Ok(CurrentUser {
        external_id: caller.external_id,
        user,
        person,
        roles: caller.roles.clone(),
    })
}

/// The role catalogue
pub async fn list_roles(conn: &mut PgConnection) -> MartialBaseResult<Vec<UserRoleRecord>> {
    Ok(UserRoleRecord::list(&mut *conn).await?)
}

/// Roles stored for a user, without token claims
pub async fn stored_roles(conn: &mut PgConnection, user_id: Uuid) -> MartialBaseResult<RoleSet> {
    Ok(MartialBaseUserRole::roles_for_user(&mut *conn, user_id)
        .await?
        .into_iter()
        .collect())
}
