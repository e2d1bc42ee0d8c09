/// Organisation hierarchy
///
/// Re-parenting touches up to three organisations and the caller must be
/// admin of each of them. The checks run in a fixed order (current parent,
/// child, new parent) and the first failure is returned as is, so the
/// reported organisation id is always the first one the caller does not
/// administer. [`admin_check_order`] is that order.
///
/// # Example
///
/// ```no_run
/// use martialbase_shared::auth::middleware::AuthContext;
/// use martialbase_shared::db::unit_of_work::UnitOfWork;
/// use martialbase_shared::services::hierarchy::change_organisation_parent;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, caller: AuthContext, child: Uuid, parent: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let mut uow = UnitOfWork::begin(&pool).await?;
/// change_organisation_parent(uow.conn(), &caller, child, parent).await?;
/// uow.commit().await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::auth::authorization::{check_organisation_admin_access, check_organisation_member_access};
use crate::auth::middleware::AuthContext;
use crate::error::{EntityKind, MartialBaseError, MartialBaseResult};
use crate::models::organisation::Organisation;

/// Organisations the caller must administer, in the order they are checked
pub fn admin_check_order(
    current_parent: Option<Uuid>,
    child: Uuid,
    new_parent: Option<Uuid>,
) -> Vec<Uuid> {
    current_parent
        .into_iter()
        .chain(std::iter::once(child))
        .chain(new_parent)
        .collect()
}

async fn require_admin_of_each(
    conn: &mut PgConnection,
    caller: &AuthContext,
    organisation_ids: &[Uuid],
) -> MartialBaseResult<()> {
    for &organisation_id in organisation_ids {
        check_organisation_admin_access(&mut *conn, caller, organisation_id).await?;
    }

    Ok(())
}

/// Moves `child_id` under `new_parent_id`
///
/// # Errors
///
/// - `NotFound` if the child or the new parent does not exist
/// - `Forbidden(NotOrganisationAdmin)` for the first organisation, in
///   [`admin_check_order`], the caller does not administer
/// - `Validation` if the new parent is the child or one of its descendants
pub async fn change_organisation_parent(
    conn: &mut PgConnection,
    caller: &AuthContext,
    child_id: Uuid,
    new_parent_id: Uuid,
) -> MartialBaseResult<Organisation> {
    let child = Organisation::find_by_id(&mut *conn, child_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, child_id))?;

    if !Organisation::exists(&mut *conn, new_parent_id).await? {
        return Err(MartialBaseError::not_found(EntityKind::Organisation, new_parent_id));
    }

    let order = admin_check_order(child.parent_id, child.id, Some(new_parent_id));
    require_admin_of_each(&mut *conn, caller, &order).await?;

    if Organisation::is_descendant_of(&mut *conn, new_parent_id, child_id).await? {
        return Err(MartialBaseError::Validation(format!(
            "Organisation ID '{}' sits below organisation ID '{}' and cannot become its parent.",
            new_parent_id, child_id
        )));
    }

    Organisation::set_parent(&mut *conn, child_id, Some(new_parent_id)).await?;

    info!(
        organisation_id = %child_id,
        old_parent_id = ?child.parent_id,
        new_parent_id = %new_parent_id,
        "Changed organisation parent"
    );

    Organisation::find_by_id(&mut *conn, child_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, child_id))
}

/// Detaches `child_id` from its parent
///
/// Requires admin of the current parent and of the child. An organisation
/// without a parent is returned unchanged to callers with member access.
pub async fn remove_organisation_parent(
    conn: &mut PgConnection,
    caller: &AuthContext,
    child_id: Uuid,
) -> MartialBaseResult<Organisation> {
    let child = Organisation::find_by_id(&mut *conn, child_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, child_id))?;

    let Some(old_parent_id) = child.parent_id else {
        check_organisation_member_access(&mut *conn, caller, child_id).await?;
        return Ok(child);
    };

    let order = admin_check_order(Some(old_parent_id), child.id, None);
    require_admin_of_each(&mut *conn, caller, &order).await?;

    Organisation::set_parent(&mut *conn, child_id, None).await?;

    info!(
        organisation_id = %child_id,
        old_parent_id = %old_parent_id,
        "Removed organisation parent"
    );

    Organisation::find_by_id(&mut *conn, child_id)
        .await?
        .ok_or_else(|| MartialBaseError::not_found(EntityKind::Organisation, child_id))
}

/// Ancestors of an organisation, nearest first
pub async fn ancestors(
    conn: &mut PgConnection,
    caller: &AuthContext,
    organisation_id: Uuid,
) -> MartialBaseResult<Vec<Organisation>> {
    check_organisation_member_access(&mut *conn, caller, organisation_id).await?;
    Ok(Organisation::ancestors(&mut *conn, organisation_id).await?)
}

/// Direct children of an organisation
pub async fn children(
    conn: &mut PgConnection,
    caller: &AuthContext,
    organisation_id: Uuid,
) -> MartialBaseResult<Vec<Organisation>> {
    check_organisation_member_access(&mut *conn, caller, organisation_id).await?;
    Ok(Organisation::children(&mut *conn, organisation_id).await?)
}
