/// Role registry and capability table
///
/// Roles are a closed enumeration stored as the Postgres enum `role_name`.
/// Call sites never compare role names; they ask for a [`Capability`] and
/// [`has_capability`] answers from the table below.
///
/// # Capabilities
///
/// | Capability           | Granted by                                              |
/// |----------------------|---------------------------------------------------------|
/// | `OrganisationScoped` | any organisation or school role, system admin           |
/// | `SchoolScoped`       | any school role, organisation admin, system admin       |
/// | `CreateOrganisation` | system admin                                            |
/// | `ManageUserRoles`    | system admin                                            |
/// | `BypassEntityChecks` | nobody except Thanos                                    |
///
/// Thanos holds every capability.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Roles a user can be assigned
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "role_name", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SystemAdmin,
    OrganisationAdmin,
    OrganisationMember,
    SchoolHeadInstructor,
    SchoolSecretary,
    SchoolInstructor,
    SchoolMember,

    /// Super-role: passes every entity-scoped check
    Thanos,
}

impl UserRole {
    pub const ALL: [UserRole; 8] = [
        UserRole::SystemAdmin,
        UserRole::OrganisationAdmin,
        UserRole::OrganisationMember,
        UserRole::SchoolHeadInstructor,
        UserRole::SchoolSecretary,
        UserRole::SchoolInstructor,
        UserRole::SchoolMember,
        UserRole::Thanos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SystemAdmin => "system_admin",
            UserRole::OrganisationAdmin => "organisation_admin",
            UserRole::OrganisationMember => "organisation_member",
            UserRole::SchoolHeadInstructor => "school_head_instructor",
            UserRole::SchoolSecretary => "school_secretary",
            UserRole::SchoolInstructor => "school_instructor",
            UserRole::SchoolMember => "school_member",
            UserRole::Thanos => "thanos",
        }
    }

    /// Whether this role on its own grants `capability`
    pub fn grants(&self, capability: Capability) -> bool {
        use Capability::*;
        use UserRole::*;

        match (self, capability) {
            (Thanos, _) => true,
            (_, BypassEntityChecks) => false,
            (SystemAdmin, _) => true,
            (_, CreateOrganisation) | (_, ManageUserRoles) => false,
            (_, OrganisationScoped) => true,
            (OrganisationMember, SchoolScoped) => false,
            (_, SchoolScoped) => true,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// What a caller is allowed to attempt, independent of any specific entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// May act on organisations at all (still subject to per-organisation checks)
    OrganisationScoped,

    /// May act on schools at all (still subject to per-school checks)
    SchoolScoped,

    CreateOrganisation,
    ManageUserRoles,

    /// Skips every per-entity check
    BypassEntityChecks,
}

/// Set of roles held by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<UserRole>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: UserRole) -> bool {
        self.0.contains(&role)
    }

    /// Adds a role; returns false if it was already present
    pub fn insert(&mut self, role: UserRole) -> bool {
        self.0.insert(role)
    }

    pub fn extend(&mut self, roles: impl IntoIterator<Item = UserRole>) {
        self.0.extend(roles);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = UserRole> + '_ {
        self.0.iter().copied()
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        has_capability(self.iter(), capability)
    }
}

impl FromIterator<UserRole> for RoleSet {
    fn from_iter<I: IntoIterator<Item = UserRole>>(iter: I) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

/// True if any role in `roles` grants `capability`
pub fn has_capability(roles: impl IntoIterator<Item = UserRole>, capability: Capability) -> bool {
    roles.into_iter().any(|role| role.grants(capability))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_round_trip() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("grand_master".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_thanos_grants_everything() {
        for capability in [
            Capability::OrganisationScoped,
            Capability::SchoolScoped,
            Capability::CreateOrganisation,
            Capability::ManageUserRoles,
            Capability::BypassEntityChecks,
        ] {
            assert!(UserRole::Thanos.grants(capability));
        }
    }

    #[test]
    fn test_only_thanos_bypasses_entity_checks() {
        for role in UserRole::ALL {
            assert_eq!(
                role.grants(Capability::BypassEntityChecks),
                role == UserRole::Thanos
            );
        }
    }

    #[test]
    fn test_organisation_scoped_roles() {
        assert!(UserRole::OrganisationMember.grants(Capability::OrganisationScoped));
        assert!(UserRole::OrganisationAdmin.grants(Capability::OrganisationScoped));
        assert!(UserRole::SchoolMember.grants(Capability::OrganisationScoped));
        assert!(UserRole::SystemAdmin.grants(Capability::OrganisationScoped));
    }

    #[test]
    fn test_school_scoped_roles() {
        assert!(!UserRole::OrganisationMember.grants(Capability::SchoolScoped));
        assert!(UserRole::OrganisationAdmin.grants(Capability::SchoolScoped));
        assert!(UserRole::SchoolSecretary.grants(Capability::SchoolScoped));
        assert!(UserRole::SchoolHeadInstructor.grants(Capability::SchoolScoped));
    }

    #[test]
    fn test_administrative_capabilities() {
        assert!(UserRole::SystemAdmin.grants(Capability::CreateOrganisation));
        assert!(UserRole::SystemAdmin.grants(Capability::ManageUserRoles));
        assert!(!UserRole::OrganisationAdmin.grants(Capability::CreateOrganisation));
        assert!(!UserRole::OrganisationAdmin.grants(Capability::ManageUserRoles));
    }

    #[test]
    fn test_role_set_capability() {
        let empty = RoleSet::new();
        assert!(!empty.has_capability(Capability::OrganisationScoped));

        let roles: RoleSet = [UserRole::SchoolMember, UserRole::SchoolMember]
            .into_iter()
            .collect();
        assert_eq!(roles.len(), 1);
        assert!(roles.has_capability(Capability::OrganisationScoped));
        assert!(!roles.has_capability(Capability::ManageUserRoles));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&UserRole::SchoolHeadInstructor).unwrap();
        assert_eq!(json, "\"school_head_instructor\"");

        let roles: RoleSet = serde_json::from_str("[\"thanos\",\"organisation_admin\"]").unwrap();
        assert!(roles.contains(UserRole::Thanos));
        assert!(roles.contains(UserRole::OrganisationAdmin));
    }
}
