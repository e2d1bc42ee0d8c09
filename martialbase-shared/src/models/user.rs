/// MartialBase user accounts
///
/// A user row links a [`Person`](super::person::Person) to an external
/// identity. Rows created for people nobody has claimed yet carry a one-time
/// invitation code instead of an external id; claiming the code swaps one for
/// the other.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE martial_base_users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     person_id UUID UNIQUE REFERENCES people(id) ON DELETE CASCADE,
///     external_id UUID UNIQUE,
///     invitation_code CHAR(7) UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use martialbase_shared::models::user::MartialBaseUser;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, external_id: Uuid) -> Result<(), sqlx::Error> {
/// if let Some(user) = MartialBaseUser::find_by_external_id(&pool, external_id).await? {
///     println!("linked to person {:?}", user.person_id);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, person_id, external_id, invitation_code, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MartialBaseUser {
    pub id: Uuid,
    pub person_id: Option<Uuid>,
    pub external_id: Option<Uuid>,

    /// Never serialised: only the person who received it should see it
    #[serde(skip_serializing)]
    pub invitation_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MartialBaseUser {
    /// Creates a user for `person_id`
    ///
    /// Exactly one of `external_id` (direct registration) or
    /// `invitation_code` (unclaimed person) is normally set.
    pub async fn create<'e, E>(
        executor: E,
        person_id: Option<Uuid>,
        external_id: Option<Uuid>,
        invitation_code: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MartialBaseUser>(&format!(
            r#"
            INSERT INTO martial_base_users (person_id, external_id, invitation_code)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(person_id)
        .bind(external_id)
        .bind(invitation_code)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MartialBaseUser>(&format!(
            "SELECT {USER_COLUMNS} FROM martial_base_users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_external_id<'e, E>(
        executor: E,
        external_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MartialBaseUser>(&format!(
            "SELECT {USER_COLUMNS} FROM martial_base_users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_person_id<'e, E>(
        executor: E,
        person_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MartialBaseUser>(&format!(
            "SELECT {USER_COLUMNS} FROM martial_base_users WHERE person_id = $1"
        ))
        .bind(person_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_invitation_code<'e, E>(
        executor: E,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MartialBaseUser>(&format!(
            "SELECT {USER_COLUMNS} FROM martial_base_users WHERE invitation_code = $1"
        ))
        .bind(code)
        .fetch_optional(executor)
        .await
    }

    pub async fn invitation_code_exists<'e, E>(executor: E, code: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM martial_base_users WHERE invitation_code = $1)",
        )
        .bind(code)
        .fetch_one(executor)
        .await
    }

    /// Binds an external identity and consumes the invitation code
    pub async fn link_identity<'e, E>(
        executor: E,
        id: Uuid,
        external_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MartialBaseUser>(&format!(
            r#"
            UPDATE martial_base_users
            SET external_id = $2, invitation_code = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(external_id)
        .fetch_optional(executor)
        .await
    }

    pub fn is_linked(&self) -> bool {
        self.external_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_code_not_serialized() {
        let user = MartialBaseUser {
            id: Uuid::new_v4(),
            person_id: Some(Uuid::new_v4()),
            external_id: None,
            invitation_code: Some("AB12CD3".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("AB12CD3"));
        assert!(!json.contains("invitation_code"));
        assert!(!user.is_linked());
    }
}
