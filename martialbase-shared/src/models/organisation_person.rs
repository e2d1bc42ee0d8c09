/// Organisation membership join rows
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organisation_people (
///     organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
///     person_id UUID NOT NULL REFERENCES people(id) ON DELETE CASCADE,
///     is_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (organisation_id, person_id)
/// );
/// ```
///
/// Every person must keep at least one row here. That rule lives in the
/// organisation service; this module only reports the counts it needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganisationPerson {
    pub organisation_id: Uuid,
    pub person_id: Uuid,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl OrganisationPerson {
    /// Inserts the membership, or updates the admin flag if it already exists
    pub async fn upsert<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
        is_admin: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, OrganisationPerson>(
            r#"
            INSERT INTO organisation_people (organisation_id, person_id, is_admin)
            VALUES ($1, $2, $3)
            ON CONFLICT (organisation_id, person_id)
            DO UPDATE SET is_admin = EXCLUDED.is_admin
            RETURNING organisation_id, person_id, is_admin, created_at
            "#,
        )
        .bind(organisation_id)
        .bind(person_id)
        .bind(is_admin)
        .fetch_one(executor)
        .await
    }

    /// Inserts a plain membership unless one exists; never touches `is_admin`
    pub async fn ensure<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO organisation_people (organisation_id, person_id, is_admin)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (organisation_id, person_id) DO NOTHING
            "#,
        )
        .bind(organisation_id)
        .bind(person_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, OrganisationPerson>(
            r#"
            SELECT organisation_id, person_id, is_admin, created_at
            FROM organisation_people
            WHERE organisation_id = $1 AND person_id = $2
            "#,
        )
        .bind(organisation_id)
        .bind(person_id)
        .fetch_optional(executor)
        .await
    }

    /// Sets the admin flag on an existing membership
    ///
    /// Returns `None` if the person is not a member.
    pub async fn set_admin<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
        is_admin: bool,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, OrganisationPerson>(
            r#"
            UPDATE organisation_people
            SET is_admin = $3
            WHERE organisation_id = $1 AND person_id = $2
            RETURNING organisation_id, person_id, is_admin, created_at
            "#,
        )
        .bind(organisation_id)
        .bind(person_id)
        .bind(is_admin)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM organisation_people WHERE organisation_id = $1 AND person_id = $2",
        )
        .bind(organisation_id)
        .bind(person_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM organisation_people WHERE organisation_id = $1")
            .bind(organisation_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of organisations a person belongs to
    pub async fn count_for_person<'e, E>(executor: E, person_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM organisation_people WHERE person_id = $1")
            .bind(person_id)
            .fetch_one(executor)
            .await
    }

    /// People whose only membership is `organisation_id`
    pub async fn sole_member_ids<'e, E>(
        executor: E,
        organisation_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT op.person_id
            FROM organisation_people op
            WHERE op.organisation_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM organisation_people other
                  WHERE other.person_id = op.person_id
                    AND other.organisation_id <> op.organisation_id
              )
            ORDER BY op.created_at ASC, op.person_id ASC
            "#,
        )
        .bind(organisation_id)
        .fetch_all(executor)
        .await
    }

    /// True if `admin_person_id` is admin of some organisation `person_id` belongs to
    pub async fn administers_member<'e, E>(
        executor: E,
        admin_person_id: Uuid,
        person_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM organisation_people admin
                JOIN organisation_people member ON member.organisation_id = admin.organisation_id
                WHERE admin.person_id = $1 AND admin.is_admin AND member.person_id = $2
            )
            "#,
        )
        .bind(admin_person_id)
        .bind(person_id)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, OrganisationPerson>(
            r#"
            SELECT organisation_id, person_id, is_admin, created_at
            FROM organisation_people
            WHERE organisation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(organisation_id)
        .fetch_all(executor)
        .await
    }

    pub async fn list_for_person<'e, E>(
        executor: E,
        person_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, OrganisationPerson>(
            r#"
            SELECT organisation_id, person_id, is_admin, created_at
            FROM organisation_people
            WHERE person_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(person_id)
        .fetch_all(executor)
        .await
    }
}
