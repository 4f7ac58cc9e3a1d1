//! Role kinds and the privilege order over them

use serde::{Deserialize, Serialize};

/// Privilege level of a role, totally ordered from lowest to highest.
///
/// The declaration order is the privilege order; `Ord` is derived from it and
/// every comparison in the reconciliation engine relies on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    #[serde(rename = "EXTERN")]
    Extern,
    #[serde(rename = "LERN")]
    Lern,
    #[serde(rename = "LEHR")]
    Lehr,
    #[serde(rename = "LEIT")]
    Leit,
    #[serde(rename = "ORGADMIN")]
    OrgAdmin,
    #[serde(rename = "SYSADMIN")]
    SysAdmin,
}

impl RoleKind {
    /// The least-privileged kind, used as the base case for empty role sets.
    pub const MINIMUM: Self = Self::Extern;

    /// Returns the more-privileged of two kinds. Deterministic for equal
    /// inputs (returns the value itself).
    pub fn higher(self, other: Self) -> Self {
        self.max(other)
    }

    /// Returns the highest element of `roles` that does not exceed `ceiling`,
    /// or [`Self::MINIMUM`] when no element qualifies (including the empty
    /// set).
    pub fn highest_under<I>(roles: I, ceiling: Self) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        roles
            .into_iter()
            .filter(|role| *role <= ceiling)
            .max()
            .unwrap_or(Self::MINIMUM)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extern => "EXTERN",
            Self::Lern => "LERN",
            Self::Lehr => "LEHR",
            Self::Leit => "LEIT",
            Self::OrgAdmin => "ORGADMIN",
            Self::SysAdmin => "SYSADMIN",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EXTERN" => Ok(Self::Extern),
            "LERN" => Ok(Self::Lern),
            "LEHR" => Ok(Self::Lehr),
            "LEIT" => Ok(Self::Leit),
            "ORGADMIN" => Ok(Self::OrgAdmin),
            "SYSADMIN" => Ok(Self::SysAdmin),
            other => Err(format!("Invalid RoleKind: {other}")),
        }
    }
}
