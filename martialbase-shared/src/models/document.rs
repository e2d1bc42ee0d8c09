/// Documents held by people (insurance, licences, certificates)
///
/// A [`Document`] is a dated record of some [`DocumentType`]. People own
/// documents through `person_documents`; a school enrolment can point its
/// insurance and licence slots at one of them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE document_types (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     description VARCHAR(255) NOT NULL,
///     default_expiry_days INTEGER,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE documents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     document_type_id UUID NOT NULL REFERENCES document_types(id),
///     reference VARCHAR(255),
///     filed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE person_documents (
///     person_id UUID NOT NULL REFERENCES people(id) ON DELETE CASCADE,
///     document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
///     PRIMARY KEY (person_id, document_id)
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentType {
    pub id: Uuid,
    pub description: String,
    pub default_expiry_days: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl DocumentType {
    pub async fn create<'e, E>(
        executor: E,
        description: &str,
        default_expiry_days: Option<i32>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, DocumentType>(
            r#"
            INSERT INTO document_types (description, default_expiry_days)
            VALUES ($1, $2)
            RETURNING id, description, default_expiry_days, created_at
            "#,
        )
        .bind(description)
        .bind(default_expiry_days)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, DocumentType>(
            "SELECT id, description, default_expiry_days, created_at FROM document_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, DocumentType>(
            "SELECT id, description, default_expiry_days, created_at FROM document_types ORDER BY description ASC",
        )
        .fetch_all(executor)
        .await
    }

    /// Expiry implied by this type for a document filed at `filed_at`
    pub fn default_expiry_from(&self, filed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.default_expiry_days
            .map(|days| filed_at + Duration::days(i64::from(days)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub document_type_id: Uuid,
    pub reference: Option<String>,
    pub filed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocument {
    pub document_type_id: Uuid,
    pub reference: Option<String>,
    pub filed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Document {
    pub async fn create<'e, E>(executor: E, data: &CreateDocument) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (document_type_id, reference, filed_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, document_type_id, reference, filed_at, expires_at, created_at
            "#,
        )
        .bind(data.document_type_id)
        .bind(&data.reference)
        .bind(data.filed_at)
        .bind(data.expires_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Document>(
            "SELECT id, document_type_id, reference, filed_at, expires_at, created_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Documents owned by a person, newest first
    pub async fn list_for_person<'e, E>(
        executor: E,
        person_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT d.id, d.document_type_id, d.reference, d.filed_at, d.expires_at, d.created_at
            FROM documents d
            JOIN person_documents pd ON pd.document_id = d.id
            WHERE pd.person_id = $1
            ORDER BY d.filed_at DESC
            "#,
        )
        .bind(person_id)
        .fetch_all(executor)
        .await
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > at)
    }
}

/// Ownership link between a person and a document
pub struct PersonDocument;

impl PersonDocument {
    pub async fn link<'e, E>(executor: E, person_id: Uuid, document_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("INSERT INTO person_documents (person_id, document_id) VALUES ($1, $2)")
            .bind(person_id)
            .bind(document_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn is_owned_by<'e, E>(
        executor: E,
        person_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM person_documents WHERE person_id = $1 AND document_id = $2)",
        )
        .bind(person_id)
        .bind(document_id)
        .fetch_one(executor)
        .await
    }
}
