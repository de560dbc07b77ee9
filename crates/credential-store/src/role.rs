//! User role identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role, matching the backend role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    Investor,
    Entrepreneur,
    Admin,
}

impl RoleId {
    /// Numeric id as assigned by the backend.
    pub fn backend_id(&self) -> i64 {
        match self {
            RoleId::Investor => 1,
            RoleId::Entrepreneur => 2,
            RoleId::Admin => 3,
        }
    }

    /// Map a backend numeric id to a role.
    pub fn from_backend_id(id: i64) -> Option<RoleId> {
        match id {
            1 => Some(RoleId::Investor),
            2 => Some(RoleId::Entrepreneur),
            3 => Some(RoleId::Admin),
            _ => None,
        }
    }

    /// Lowercase name as stored on-device and returned by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::Investor => "investor",
            RoleId::Entrepreneur => "entrepreneur",
            RoleId::Admin => "admin",
        }
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "investor" => Ok(RoleId::Investor),
            "entrepreneur" => Ok(RoleId::Entrepreneur),
            "admin" => Ok(RoleId::Admin),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_id_round_trip() {
        for role in [RoleId::Investor, RoleId::Entrepreneur, RoleId::Admin] {
            assert_eq!(RoleId::from_backend_id(role.backend_id()), Some(role));
        }
        assert_eq!(RoleId::from_backend_id(0), None);
        assert_eq!(RoleId::from_backend_id(42), None);
    }

    #[test]
    fn test_name_round_trip() {
        for role in [RoleId::Investor, RoleId::Entrepreneur, RoleId::Admin] {
            assert_eq!(role.as_str().parse::<RoleId>(), Ok(role));
        }
        assert!("moderator".parse::<RoleId>().is_err());
        assert!("Investor".parse::<RoleId>().is_err());
    }
}
