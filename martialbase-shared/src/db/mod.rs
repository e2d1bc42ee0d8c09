/// Database layer
///
/// - `pool`: PostgreSQL pool construction and health checks
/// - `migrations`: embedded schema migrations
/// - `unit_of_work`: the per-request transaction every service runs inside
///
/// Models live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
pub mod unit_of_work;
