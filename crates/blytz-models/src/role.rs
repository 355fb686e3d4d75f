//! Dashboard roles.
//!
//! The client and the backend name the hiring side differently: the
//! dashboard says "employer", the backend stores "company".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role cached under the `userRole` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Employer,
    Va,
}

/// Role as stored by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendRole {
    Company,
    Va,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct RoleParseError(pub String);

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employer => "employer",
            UserRole::Va => "va",
        }
    }

    /// Name used by the backend for this role.
    pub fn to_backend(self) -> BackendRole {
        match self {
            UserRole::Employer => BackendRole::Company,
            UserRole::Va => BackendRole::Va,
        }
    }
}

impl BackendRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendRole::Company => "company",
            BackendRole::Va => "va",
        }
    }

    pub fn to_user_role(self) -> UserRole {
        match self {
            BackendRole::Company => UserRole::Employer,
            BackendRole::Va => UserRole::Va,
        }
    }
}

impl From<BackendRole> for UserRole {
    fn from(role: BackendRole) -> Self {
        role.to_user_role()
    }
}

impl From<UserRole> for BackendRole {
    fn from(role: UserRole) -> Self {
        role.to_backend()
    }
}

impl FromStr for UserRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employer" => Ok(UserRole::Employer),
            "va" => Ok(UserRole::Va),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

impl FromStr for BackendRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(BackendRole::Company),
            "va" => Ok(BackendRole::Va),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for BackendRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employer_maps_to_company() {
        assert_eq!(UserRole::Employer.to_backend(), BackendRole::Company);
        assert_eq!(BackendRole::Company.to_user_role(), UserRole::Employer);
        assert_eq!(UserRole::from(BackendRole::Va), UserRole::Va);
    }

    #[test]
    fn test_parse_cached_role() {
        assert_eq!("employer".parse::<UserRole>(), Ok(UserRole::Employer));
        assert_eq!("va".parse::<UserRole>(), Ok(UserRole::Va));
        assert!("company".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_backend_role_wire_format() {
        let json = serde_json::to_string(&BackendRole::Company).unwrap();
        assert_eq!(json, "\"company\"");
        let role: BackendRole = serde_json::from_str("\"va\"").unwrap();
        assert_eq!(role, BackendRole::Va);
    }
}
