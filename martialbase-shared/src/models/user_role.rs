/// Role catalogue rows and role assignments
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_roles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name role_name NOT NULL UNIQUE
/// );
///
/// CREATE TABLE martial_base_user_roles (
///     user_id UUID NOT NULL REFERENCES martial_base_users(id) ON DELETE CASCADE,
///     user_role_id UUID NOT NULL REFERENCES user_roles(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (user_id, user_role_id)
/// );
/// ```
///
/// The catalogue is seeded by the initial migration with one row per
/// [`UserRole`] variant.

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::roles::UserRole;

/// A row of the role catalogue
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRoleRecord {
    pub id: Uuid,
    pub name: UserRole,
}

impl UserRoleRecord {
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRoleRecord>("SELECT id, name FROM user_roles ORDER BY name ASC")
            .fetch_all(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRoleRecord>("SELECT id, name FROM user_roles WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Catalogue rows whose ids are in `ids`; unknown ids are simply absent
    pub async fn find_many<'e, E>(executor: E, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRoleRecord>("SELECT id, name FROM user_roles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(executor)
            .await
    }
}

/// Role assignments of a user
pub struct MartialBaseUserRole;

impl MartialBaseUserRole {
    /// Roles currently assigned to a user
    pub async fn roles_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<UserRole>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM martial_base_user_roles ur
            JOIN user_roles r ON r.id = ur.user_role_id
            WHERE ur.user_id = $1
            ORDER BY r.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Catalogue ids of the roles currently assigned to a user
    pub async fn role_ids_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT user_role_id FROM martial_base_user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Assigns a catalogue role by id; returns false if already assigned
    pub async fn assign<'e, E>(executor: E, user_id: Uuid, role_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO martial_base_user_roles (user_id, user_role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, user_role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Assigns a role by name; returns false if already assigned
    pub async fn assign_role<'e, E>(executor: E, user_id: Uuid, role: UserRole) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO martial_base_user_roles (user_id, user_role_id)
            SELECT $1, r.id FROM user_roles r WHERE r.name = $2
            ON CONFLICT (user_id, user_role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke<'e, E>(executor: E, user_id: Uuid, role_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM martial_base_user_roles WHERE user_id = $1 AND user_role_id = $2",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
