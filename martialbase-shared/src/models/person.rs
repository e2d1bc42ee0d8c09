/// Person model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE people (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     first_name VARCHAR(255) NOT NULL,
///     middle_name VARCHAR(255),
///     last_name VARCHAR(255) NOT NULL,
///     date_of_birth DATE,
///     address_id UUID REFERENCES addresses(id) ON DELETE SET NULL,
///     email VARCHAR(255),
///     mobile_no VARCHAR(32),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const PERSON_COLUMNS: &str = "id, first_name, middle_name, last_name, date_of_birth, address_id, \
                              email, mobile_no, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Person {
    pub id: Uuid,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address_id: Option<Uuid>,
    pub email: Option<String>,
    pub mobile_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name and contact fields of a person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub mobile_no: Option<String>,
}

impl Person {
    pub async fn create<'e, E>(
        executor: E,
        details: &PersonDetails,
        address_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Person>(&format!(
            r#"
            INSERT INTO people (first_name, middle_name, last_name, date_of_birth, address_id, email, mobile_no)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PERSON_COLUMNS}
            "#
        ))
        .bind(&details.first_name)
        .bind(&details.middle_name)
        .bind(&details.last_name)
        .bind(details.date_of_birth)
        .bind(address_id)
        .bind(&details.email)
        .bind(&details.mobile_no)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Person>(&format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn exists<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM people WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Members of an organisation, ordered by surname
    pub async fn list_for_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Person>(
            r#"
            SELECT p.id, p.first_name, p.middle_name, p.last_name, p.date_of_birth,
                   p.address_id, p.email, p.mobile_no, p.created_at, p.updated_at
            FROM people p
            JOIN organisation_people op ON op.person_id = p.id
            WHERE op.organisation_id = $1
            ORDER BY p.last_name ASC, p.first_name ASC
            "#,
        )
        .bind(organisation_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        details: &PersonDetails,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Person>(&format!(
            r#"
            UPDATE people
            SET first_name = $2, middle_name = $3, last_name = $4, date_of_birth = $5,
                email = $6, mobile_no = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {PERSON_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&details.first_name)
        .bind(&details.middle_name)
        .bind(&details.last_name)
        .bind(details.date_of_birth)
        .bind(&details.email)
        .bind(&details.mobile_no)
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
        sqlx::query("UPDATE people SET address_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(address_id)
            .execute(executor)
            .await?;

        Ok(())
    }
}
