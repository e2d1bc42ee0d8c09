/// Database models for MartialBase
///
/// Each model owns the SQL for its table. Functions are generic over
/// [`sqlx::PgExecutor`], so they run against the pool for reads or against
/// `uow.conn()` inside a [`UnitOfWork`](crate::db::unit_of_work::UnitOfWork).
///
/// # Models
///
/// - `address`: postal addresses and school training venues
/// - `art`: martial arts catalogue
/// - `document`: document types, documents and person ownership
/// - `organisation`: organisations and the parent/child tree
/// - `organisation_person`: organisation memberships with the admin flag
/// - `person`: people
/// - `school`: schools
/// - `school_student`: school enrolments with instructor/secretary flags
/// - `user`: user accounts linking people to external identities
/// - `user_role`: role catalogue and role assignments
///
/// # Example
///
/// ```no_run
/// use martialbase_shared::models::organisation_person::OrganisationPerson;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org: Uuid, person: Uuid) -> Result<(), sqlx::Error> {
/// let membership = OrganisationPerson::upsert(&pool, org, person, false).await?;
/// assert!(!membership.is_admin);
/// # Ok(())
/// # }
/// ```

pub mod address;
pub mod art;
pub mod document;
pub mod organisation;
pub mod organisation_person;
pub mod person;
pub mod school;
pub mod school_student;
pub mod user;
pub mod user_role;
