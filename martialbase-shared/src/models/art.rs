/// Martial arts catalogue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Art {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Art {
    pub async fn create<'e, E>(executor: E, name: &str) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Art>(
            "INSERT INTO arts (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Art>("SELECT id, name, created_at FROM arts WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Art>("SELECT id, name, created_at FROM arts ORDER BY name ASC")
            .fetch_all(executor)
            .await
    }
}
