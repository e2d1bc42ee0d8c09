/// School model and database operations
///
/// A school belongs to exactly one organisation and teaches one art. Its
/// default address and training venues are owned by the school and are
/// deleted with it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE schools (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     art_id UUID NOT NULL REFERENCES arts(id),
///     organisation_id UUID NOT NULL REFERENCES organisations(id),
///     head_instructor_id UUID REFERENCES people(id) ON DELETE SET NULL,
///     default_address_id UUID REFERENCES addresses(id) ON DELETE SET NULL,
///     name VARCHAR(255) NOT NULL,
///     phone_no VARCHAR(32),
///     email_address VARCHAR(255),
///     website_url VARCHAR(512),
///     instagram_url VARCHAR(512),
///     facebook_url VARCHAR(512),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const SCHOOL_COLUMNS: &str = "id, art_id, organisation_id, head_instructor_id, default_address_id, \
                              name, phone_no, email_address, website_url, instagram_url, \
                              facebook_url, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct School {
    pub id: Uuid,
    pub art_id: Uuid,
    pub organisation_id: Uuid,
    pub head_instructor_id: Option<Uuid>,
    pub default_address_id: Option<Uuid>,
    pub name: String,
    pub phone_no: Option<String>,
    pub email_address: Option<String>,
    pub website_url: Option<String>,
    pub instagram_url: Option<String>,
    pub facebook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name and contact fields of a school
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolDetails {
    pub name: String,
    pub phone_no: Option<String>,
    pub email_address: Option<String>,
    pub website_url: Option<String>,
    pub instagram_url: Option<String>,
    pub facebook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateSchool {
    pub art_id: Uuid,
    pub organisation_id: Uuid,
    pub head_instructor_id: Option<Uuid>,
    pub default_address_id: Option<Uuid>,
    pub details: SchoolDetails,
}

impl School {
    pub async fn create<'e, E>(executor: E, data: &CreateSchool) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, School>(&format!(
            r#"
            INSERT INTO schools (art_id, organisation_id, head_instructor_id, default_address_id,
                                 name, phone_no, email_address, website_url, instagram_url, facebook_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {SCHOOL_COLUMNS}
            "#
        ))
        .bind(data.art_id)
        .bind(data.organisation_id)
        .bind(data.head_instructor_id)
        .bind(data.default_address_id)
        .bind(&data.details.name)
        .bind(&data.details.phone_no)
        .bind(&data.details.email_address)
        .bind(&data.details.website_url)
        .bind(&data.details.instagram_url)
        .bind(&data.details.facebook_url)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, School>(&format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_by_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, School>(&format!(
            "SELECT {SCHOOL_COLUMNS} FROM schools WHERE organisation_id = $1 ORDER BY name ASC"
        ))
        .bind(organisation_id)
        .fetch_all(executor)
        .await
    }

    /// First school still referencing an organisation, if any
    pub async fn first_for_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT id FROM schools WHERE organisation_id = $1 ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(organisation_id)
        .fetch_optional(executor)
        .await
    }

    /// A school of the organisation headed by `person_id`, if any
    pub async fn first_headed_in_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT id FROM schools WHERE organisation_id = $1 AND head_instructor_id = $2 \
             ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(organisation_id)
        .bind(person_id)
        .fetch_optional(executor)
        .await
    }

    /// Number of schools whose head instructor is `person_id`
    pub async fn count_headed_by<'e, E>(executor: E, person_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM schools WHERE head_instructor_id = $1")
            .bind(person_id)
            .fetch_one(executor)
            .await
    }

    pub async fn update_details<'e, E>(
        executor: E,
        id: Uuid,
        details: &SchoolDetails,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, School>(&format!(
            r#"
            UPDATE schools
            SET name = $2, phone_no = $3, email_address = $4, website_url = $5,
                instagram_url = $6, facebook_url = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {SCHOOL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&details.name)
        .bind(&details.phone_no)
        .bind(&details.email_address)
        .bind(&details.website_url)
        .bind(&details.instagram_url)
        .bind(&details.facebook_url)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_head_instructor<'e, E>(
        executor: E,
        id: Uuid,
        person_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE schools SET head_instructor_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(person_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn set_default_address<'e, E>(
        executor: E,
        id: Uuid,
        address_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE schools SET default_address_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(address_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM schools WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
