//! # MartialBase Shared Library
//!
//! Domain core of the MartialBase membership API: models and database access,
//! the unit of work, roles and access checks, identity tokens and the
//! membership services. The API crate depends on it for everything but HTTP.
//!
//! ## Module Organization
//!
//! - `auth`: roles, access checks, identity tokens, invitation codes
//! - `db`: connection pool, migrations, unit of work
//! - `error`: the shared error taxonomy
//! - `models`: database models, one per table
//! - `services`: multi-step operations run inside a unit of work

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

/// Current version of the MartialBase shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
