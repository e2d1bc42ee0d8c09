/// Identity and access control
///
/// # Modules
///
/// - [`roles`]: closed role registry and the capability table
/// - [`jwt`]: upstream identity token validation
/// - [`middleware`]: Axum layer resolving the caller into an [`AuthContext`](middleware::AuthContext)
/// - [`authorization`]: organisation and school access checks
/// - [`invitation`]: invitation code generation
///
/// # Example
///
/// ```
/// use martialbase_shared::auth::roles::{has_capability, Capability, UserRole};
///
/// assert!(has_capability([UserRole::Thanos], Capability::BypassEntityChecks));
/// assert!(!has_capability([UserRole::SchoolMember], Capability::CreateOrganisation));
/// ```

pub mod authorization;
pub mod invitation;
pub mod jwt;
pub mod middleware;
pub mod roles;
