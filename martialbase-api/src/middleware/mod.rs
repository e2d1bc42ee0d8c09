/// Middleware for the API server
///
/// - `security`: response headers for a JSON API
///
/// Identity resolution lives in the shared crate
/// (`martialbase_shared::auth::middleware`) so it can be reused by other
/// binaries.

pub mod security;
