/// Request-scoped unit of work
///
/// Every mutating request opens exactly one [`UnitOfWork`], hands
/// `uow.conn()` to the services it calls, and finishes with
/// [`UnitOfWork::commit`]. Nothing is persisted before that call: an error
/// that propagates with `?` drops the unit of work and sqlx rolls the
/// transaction back.
///
/// # Example
///
/// ```no_run
/// use martialbase_shared::db::unit_of_work::UnitOfWork;
/// use martialbase_shared::services::organisations;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org: Uuid, person: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let mut uow = UnitOfWork::begin(&pool).await?;
/// organisations::add_organisation_person(uow.conn(), org, person, false).await?;
/// uow.commit().await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// Acquires a connection and opens a transaction on it
    pub async fn begin(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let tx = pool.begin().await?;
        debug!("Unit of work started");
        Ok(Self { tx })
    }

    /// Connection bound to the open transaction
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    /// Persists everything done through this unit of work
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discards everything done through this unit of work
    ///
    /// Dropping has the same effect; this exists for call sites that want the
    /// rollback error.
    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}
