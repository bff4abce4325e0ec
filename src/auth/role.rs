use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Privilege tier. Variant order is the privilege order, so the derived `Ord`
/// gives `User < Consultor < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Consultor,
    Admin,
}

impl Role {
    /// Parse a declared role value. Anything outside the three known values
    /// collapses to `User` -- never upward.
    pub fn parse(raw: &str) -> Role {
        match raw.trim() {
            "ADMIN" => Role::Admin,
            "CONSULTOR" => Role::Consultor,
            _ => Role::User,
        }
    }

    pub fn at_least(self, min: Role) -> bool {
        self >= min
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Consultor => "CONSULTOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_is_ordered() {
        assert!(Role::User < Role::Consultor);
        assert!(Role::Consultor < Role::Admin);
    }

    #[test]
    fn parse_accepts_known_values() {
        assert_eq!(Role::parse("USER"), Role::User);
        assert_eq!(Role::parse("CONSULTOR"), Role::Consultor);
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("  ADMIN  "), Role::Admin);
    }

    #[test]
    fn unknown_values_collapse_to_user() {
        for raw in ["", "admin", "SUPER_ADMIN", "root", "consultor ", "42"] {
            assert_eq!(Role::parse(raw), Role::User, "raw = {raw:?}");
        }
    }

    #[test]
    fn at_least_follows_the_order() {
        assert!(Role::Admin.at_least(Role::User));
        assert!(Role::Admin.at_least(Role::Admin));
        assert!(Role::Consultor.at_least(Role::User));
        assert!(!Role::Consultor.at_least(Role::Admin));
        assert!(!Role::User.at_least(Role::Consultor));
    }
}
