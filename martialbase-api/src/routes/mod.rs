/// API route handlers, grouped by resource
///
/// - `health`: liveness and database status
/// - `organisations`: organisations, their hierarchy and members
/// - `schools`: schools, venues and students
/// - `people`: people and their documents
/// - `users`: identity linking and role management
/// - `catalogue`: arts and document types

pub mod catalogue;
pub mod health;
pub mod organisations;
pub mod params;
pub mod payloads;
pub mod people;
pub mod schools;
pub mod users;
