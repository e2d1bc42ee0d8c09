/// Organisation model and database operations
///
/// Organisations form a tree through `parent_id`. The tree is never loaded as
/// an object graph; callers ask for [`Organisation::ancestors`],
/// [`Organisation::children`] or [`Organisation::is_descendant_of`] and get a
/// flat answer from a recursive query.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organisations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     initials VARCHAR(16) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     address_id UUID REFERENCES addresses(id) ON DELETE SET NULL,
///     parent_id UUID REFERENCES organisations(id) ON DELETE SET NULL,
///     is_public BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT organisations_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use martialbase_shared::models::organisation::{CreateOrganisation, Organisation};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let org = Organisation::create(&pool, CreateOrganisation {
///     initials: "BJA".to_string(),
///     name: "British Judo Association".to_string(),
///     address_id: None,
///     parent_id: None,
///     is_public: true,
/// }).await?;
///
/// let lineage = Organisation::ancestors(&pool, org.id).await?;
/// assert!(lineage.is_empty());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const ORGANISATION_COLUMNS: &str =
    "id, initials, name, address_id, parent_id, is_public, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organisation {
    pub id: Uuid,
    pub initials: String,
    pub name: String,
    pub address_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganisation {
    pub initials: String,
    pub name: String,
    pub address_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub is_public: bool,
}

/// Editable organisation fields, replaced as a whole
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrganisation {
    pub initials: String,
    pub name: String,
    pub is_public: bool,
}

impl Organisation {
    pub async fn create<'e, E>(executor: E, data: CreateOrganisation) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(&format!(
            r#"
            INSERT INTO organisations (initials, name, address_id, parent_id, is_public)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORGANISATION_COLUMNS}
            "#
        ))
        .bind(&data.initials)
        .bind(&data.name)
        .bind(data.address_id)
        .bind(data.parent_id)
        .bind(data.is_public)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(&format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn exists<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM organisations WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(&format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations ORDER BY name ASC"
        ))
        .fetch_all(executor)
        .await
    }

    /// Public organisations plus every organisation `person_id` belongs to
    pub async fn list_visible_to_person<'e, E>(
        executor: E,
        person_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(
            r#"
            SELECT o.id, o.initials, o.name, o.address_id, o.parent_id, o.is_public,
                   o.created_at, o.updated_at
            FROM organisations o
            WHERE o.is_public
               OR EXISTS (
                   SELECT 1 FROM organisation_people op
                   WHERE op.organisation_id = o.id AND op.person_id = $1
               )
            ORDER BY o.name ASC
            "#,
        )
        .bind(person_id)
        .fetch_all(executor)
        .await
    }

    /// Overwrites the editable fields and bumps `updated_at`
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateOrganisation,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(&format!(
            r#"
            UPDATE organisations
            SET initials = $2, name = $3, is_public = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORGANISATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.initials)
        .bind(&data.name)
        .bind(data.is_public)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_address<'e, E>(
        executor: E,
        id: Uuid,
        address_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE organisations SET address_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(address_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Rewrites the parent reference; `None` detaches the organisation
    pub async fn set_parent<'e, E>(
        executor: E,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("UPDATE organisations SET parent_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(parent_id)
                .execute(executor)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM organisations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Direct children of an organisation
    pub async fn children<'e, E>(executor: E, id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(&format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations WHERE parent_id = $1 ORDER BY name ASC"
        ))
        .bind(id)
        .fetch_all(executor)
        .await
    }

    /// Parent, grandparent, ... up to the root, nearest first
    ///
    /// The depth guard stops the walk if a cycle was ever written.
    pub async fn ancestors<'e, E>(executor: E, id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organisation>(
            r#"
            WITH RECURSIVE lineage AS (
                SELECT o.*, 1 AS depth
                FROM organisations o
                WHERE o.id = (SELECT parent_id FROM organisations WHERE id = $1)
                UNION ALL
                SELECT p.*, l.depth + 1
                FROM organisations p
                JOIN lineage l ON p.id = l.parent_id
                WHERE l.depth < 64
            )
            SELECT id, initials, name, address_id, parent_id, is_public, created_at, updated_at
            FROM lineage
            ORDER BY depth ASC
            "#,
        )
        .bind(id)
        .fetch_all(executor)
        .await
    }

    /// True if `candidate` is `id` itself or sits anywhere below it
    pub async fn is_descendant_of<'e, E>(
        executor: E,
        candidate: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id, 0 AS depth FROM organisations WHERE id = $2
                UNION ALL
                SELECT o.id, s.depth + 1
                FROM organisations o
                JOIN subtree s ON o.parent_id = s.id
                WHERE s.depth < 64
            )
            SELECT EXISTS(SELECT 1 FROM subtree WHERE id = $1)
            "#,
        )
        .bind(candidate)
        .bind(id)
        .fetch_one(executor)
        .await
    }
}
