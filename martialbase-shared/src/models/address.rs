/// Postal addresses
///
/// Addresses are owned 1:1 by an organisation, a person, or a school (default
/// address and training venues). Owners delete their addresses with them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE addresses (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     line1 VARCHAR(255) NOT NULL,
///     line2 VARCHAR(255),
///     line3 VARCHAR(255),
///     town VARCHAR(255) NOT NULL,
///     county VARCHAR(255),
///     postcode VARCHAR(32) NOT NULL,
///     country_code CHAR(2) NOT NULL DEFAULT 'GB',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const ADDRESS_COLUMNS: &str =
    "id, line1, line2, line3, town, county, postcode, country_code, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid,
    pub line1: String,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub town: String,
    pub county: Option<String>,
    pub postcode: String,
    pub country_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields as submitted by a client
///
/// `id` is only meaningful for training-venue lists, where it identifies a
/// stored address to update in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub line1: String,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub town: String,
    pub county: Option<String>,
    pub postcode: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

fn default_country_code() -> String {
    "GB".to_string()
}

impl Address {
    pub async fn create<'e, E>(executor: E, data: &AddressInput) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Address>(&format!(
            r#"
            INSERT INTO addresses (line1, line2, line3, town, county, postcode, country_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(&data.line1)
        .bind(&data.line2)
        .bind(&data.line3)
        .bind(&data.town)
        .bind(&data.county)
        .bind(&data.postcode)
        .bind(&data.country_code)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Overwrites every field of a stored address
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &AddressInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Address>(&format!(
            r#"
            UPDATE addresses
            SET line1 = $2, line2 = $3, line3 = $4, town = $5, county = $6,
                postcode = $7, country_code = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.line1)
        .bind(&data.line2)
        .bind(&data.line3)
        .bind(&data.town)
        .bind(&data.county)
        .bind(&data.postcode)
        .bind(&data.country_code)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Training-venue addresses linked to a school (excludes the default address)
    pub async fn list_for_school<'e, E>(executor: E, school_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Address>(
            r#"
            SELECT a.id, a.line1, a.line2, a.line3, a.town, a.county, a.postcode,
                   a.country_code, a.created_at, a.updated_at
            FROM addresses a
            JOIN school_addresses sa ON sa.address_id = a.id
            WHERE sa.school_id = $1
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(school_id)
        .fetch_all(executor)
        .await
    }

    /// Links an existing address to a school as a training venue
    pub async fn link_to_school<'e, E>(
        executor: E,
        school_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("INSERT INTO school_addresses (school_id, address_id) VALUES ($1, $2)")
            .bind(school_id)
            .bind(address_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn unlink_from_school<'e, E>(
        executor: E,
        school_id: Uuid,
        address_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM school_addresses WHERE school_id = $1 AND address_id = $2")
                .bind(school_id)
                .bind(address_id)
                .execute(executor)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
