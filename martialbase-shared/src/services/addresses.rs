/// Address replacement for owners of addresses
///
/// Two shapes exist:
///
/// - a single owned address (organisation, person, school default address),
///   replaced by [`replace_owned_address`]
/// - a school's list of training venues, replaced by [`replace_school_venues`]
///   using the diff computed by [`plan_address_changes`]
///
/// Venue diff rules: a stored venue missing from the submission is deleted
/// (after its join row); a submitted venue whose `id` matches a stored venue
/// is updated in place; every other submitted venue is inserted. An `id` that
/// does not belong to this school counts as a new venue.

use std::collections::HashSet;

use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::MartialBaseResult;
use crate::models::address::{Address, AddressInput};

/// What to do with a school's venues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPlan {
    pub delete: Vec<Uuid>,
    pub update: Vec<(Uuid, AddressInput)>,
    pub insert: Vec<AddressInput>,
}

impl AddressPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty() && self.insert.is_empty()
    }
}

/// Diffs submitted venues against the ids currently stored
pub fn plan_address_changes(stored: &[Uuid], submitted: &[AddressInput]) -> AddressPlan {
    let stored_set: HashSet<Uuid> = stored.iter().copied().collect();
    let mut kept: HashSet<Uuid> = HashSet::new();
    let mut plan = AddressPlan::default();

    for address in submitted {
        match address.id {
            // The same stored id submitted twice: first wins, the rest are new
            Some(id) if stored_set.contains(&id) && kept.insert(id) => {
                plan.update.push((id, address.clone()));
            }
            _ => plan.insert.push(AddressInput {
                id: None,
                ..address.clone()
            }),
        }
    }

    plan.delete = stored
        .iter()
        .copied()
        .filter(|id| !kept.contains(id))
        .collect();

    plan
}

/// Replaces a school's training venues and returns the resulting list
pub async fn replace_school_venues(
    conn: &mut PgConnection,
    school_id: Uuid,
    submitted: &[AddressInput],
) -> MartialBaseResult<Vec<Address>> {
    let stored: Vec<Uuid> = Address::list_for_school(&mut *conn, school_id)
        .await?
        .into_iter()
        .map(|address| address.id)
        .collect();

    let plan = plan_address_changes(&stored, submitted);

    debug!(
        school_id = %school_id,
        deleted = plan.delete.len(),
        updated = plan.update.len(),
        inserted = plan.insert.len(),
        "Replacing school venues"
    );

    for id in &plan.delete {
        Address::unlink_from_school(&mut *conn, school_id, *id).await?;
        Address::delete(&mut *conn, *id).await?;
    }

    for (id, data) in &plan.update {
        Address::update(&mut *conn, *id, data).await?;
    }

    for data in &plan.insert {
        let address = Address::create(&mut *conn, data).await?;
        Address::link_to_school(&mut *conn, school_id, address.id).await?;
    }

    Ok(Address::list_for_school(&mut *conn, school_id).await?)
}

/// Replaces a single owned address
///
/// Returns the id the owner should now reference. Deleting the stored
/// address clears the owner's reference through `ON DELETE SET NULL`.
pub async fn replace_owned_address(
    conn: &mut PgConnection,
    current: Option<Uuid>,
    submitted: Option<&AddressInput>,
) -> MartialBaseResult<Option<Uuid>> {
    match (current, submitted) {
        (Some(id), Some(data)) => match Address::update(&mut *conn, id, data).await? {
            Some(address) => Ok(Some(address.id)),
            None => Ok(Some(Address::create(&mut *conn, data).await?.id)),
        },
        (None, Some(data)) => Ok(Some(Address::create(&mut *conn, data).await?.id)),
        (Some(id), None) => {
            Address::delete(&mut *conn, id).await?;
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

/// Creates an address if one was submitted
pub async fn create_optional_address(
    conn: &mut PgConnection,
    submitted: Option<&AddressInput>,
) -> MartialBaseResult<Option<Uuid>> {
    match submitted {
        Some(data) => Ok(Some(Address::create(&mut *conn, data).await?.id)),
        None => Ok(None),
    }
}
