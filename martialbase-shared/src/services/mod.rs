/// Domain services
///
/// Each service function takes the unit of work's connection and performs one
/// repository-level operation: existence checks, invariants, then the writes.
/// Callers are expected to have run the access checks already, except where a
/// function takes an [`AuthContext`](crate::auth::middleware::AuthContext)
/// and checks access itself.
///
/// - `addresses`: owned address replacement and the school venue diff
/// - `hierarchy`: re-parenting and tree lookups
/// - `organisations`: organisations and their memberships
/// - `people`: people and documents
/// - `role_derivation`: roles from membership facts, role replacement
/// - `schools`: schools, students and venues
/// - `users`: invitation claims and the current-user view

pub mod addresses;
pub mod hierarchy;
pub mod organisations;
pub mod people;
pub mod role_derivation;
pub mod schools;
pub mod users;
