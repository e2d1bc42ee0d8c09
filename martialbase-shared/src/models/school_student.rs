/// School enrolment join rows
///
/// # Schema
///
/// ```sql
/// CREATE TABLE school_students (
///     school_id UUID NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
///     person_id UUID NOT NULL REFERENCES people(id) ON DELETE CASCADE,
///     is_instructor BOOLEAN NOT NULL DEFAULT FALSE,
///     is_secretary BOOLEAN NOT NULL DEFAULT FALSE,
///     insurance_document_id UUID REFERENCES documents(id) ON DELETE SET NULL,
///     licence_document_id UUID REFERENCES documents(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (school_id, person_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const STUDENT_COLUMNS: &str = "school_id, person_id, is_instructor, is_secretary, \
                               insurance_document_id, licence_document_id, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SchoolStudent {
    pub school_id: Uuid,
    pub person_id: Uuid,
    pub is_instructor: bool,
    pub is_secretary: bool,
    pub insurance_document_id: Option<Uuid>,
    pub licence_document_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl SchoolStudent {
    /// Enrols a person, or overwrites the instructor/secretary flags of an
    /// existing enrolment
    pub async fn upsert<'e, E>(
        executor: E,
        school_id: Uuid,
        person_id: Uuid,
        is_instructor: bool,
        is_secretary: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SchoolStudent>(&format!(
            r#"
            INSERT INTO school_students (school_id, person_id, is_instructor, is_secretary)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (school_id, person_id)
            DO UPDATE SET is_instructor = EXCLUDED.is_instructor,
                          is_secretary = EXCLUDED.is_secretary
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(school_id)
        .bind(person_id)
        .bind(is_instructor)
        .bind(is_secretary)
        .fetch_one(executor)
        .await
    }

    pub async fn find<'e, E>(
        executor: E,
        school_id: Uuid,
        person_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SchoolStudent>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM school_students WHERE school_id = $1 AND person_id = $2"
        ))
        .bind(school_id)
        .bind(person_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_for_school<'e, E>(
        executor: E,
        school_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SchoolStudent>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM school_students WHERE school_id = $1 ORDER BY created_at ASC"
        ))
        .bind(school_id)
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
        sqlx::query_as::<_, SchoolStudent>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM school_students WHERE person_id = $1 ORDER BY created_at ASC"
        ))
        .bind(person_id)
        .fetch_all(executor)
        .await
    }

    pub async fn set_secretary<'e, E>(
        executor: E,
        school_id: Uuid,
        person_id: Uuid,
        is_secretary: bool,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE school_students SET is_secretary = $3 WHERE school_id = $1 AND person_id = $2",
        )
        .bind(school_id)
        .bind(person_id)
        .bind(is_secretary)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Points the insurance and licence slots at documents (or clears them)
    pub async fn set_documents<'e, E>(
        executor: E,
        school_id: Uuid,
        person_id: Uuid,
        insurance_document_id: Option<Uuid>,
        licence_document_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SchoolStudent>(&format!(
            r#"
            UPDATE school_students
            SET insurance_document_id = $3, licence_document_id = $4
            WHERE school_id = $1 AND person_id = $2
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(school_id)
        .bind(person_id)
        .bind(insurance_document_id)
        .bind(licence_document_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        school_id: Uuid,
        person_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM school_students WHERE school_id = $1 AND person_id = $2")
                .bind(school_id)
                .bind(person_id)
                .execute(executor)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_school<'e, E>(executor: E, school_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM school_students WHERE school_id = $1")
            .bind(school_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Drops a person's enrolments in every school of one organisation
    pub async fn delete_for_person_in_organisation<'e, E>(
        executor: E,
        organisation_id: Uuid,
        person_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM school_students ss
            USING schools s
            WHERE ss.school_id = s.id
              AND s.organisation_id = $1
              AND ss.person_id = $2
            "#,
        )
        .bind(organisation_id)
        .bind(person_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
