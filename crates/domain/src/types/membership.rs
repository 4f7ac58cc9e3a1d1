//! Role assignments, remote memberships, and mass-call results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MEMBERSHIP_KEY_PREFIX;
use crate::types::role::RoleKind;

/// Deterministic composite key for a membership, derived from the person and
/// the group. Repeated upserts under the same key land on the same remote
/// record instead of creating duplicates.
pub fn membership_key(person_id: &str, group_id: &str) -> String {
    format!("{MEMBERSHIP_KEY_PREFIX}-{person_id}-{group_id}")
}

/// Projection of a Personenkontext: the locally-authoritative statement that
/// a person holds a role at an organisation.
///
/// The engine reads a snapshot of these per reconciliation run and never
/// persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub person_id: String,
    pub organisation_id: String,
    /// Id of the referenced role entity; drives auth-provider grant diffs.
    pub role_id: String,
    /// Privilege kind of the referenced role; drives membership merging.
    pub role: RoleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    pub fn new(
        person_id: impl Into<String>,
        organisation_id: impl Into<String>,
        role_id: impl Into<String>,
        role: RoleKind,
    ) -> Self {
        Self {
            person_id: person_id.into(),
            organisation_id: organisation_id.into(),
            role_id: role_id.into(),
            role,
            expires_at: None,
        }
    }
}

/// Lifecycle state of a membership at the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
        }
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("Invalid MembershipStatus: {other}")),
        }
    }
}

/// One group membership as it exists at a remote system.
///
/// At most one membership exists per (person, group) remotely; the composite
/// key encodes that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMembership {
    pub membership_id: String,
    pub group_id: String,
    pub person_id: String,
    pub role: RoleKind,
    pub status: MembershipStatus,
}

/// Input for one membership upsert inside a mass call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipParams {
    pub membership_id: String,
    pub group_id: String,
    pub person_id: String,
    pub role: RoleKind,
}

impl MembershipParams {
    /// Builds params addressed by the deterministic composite key.
    pub fn keyed(person_id: &str, group_id: &str, role: RoleKind) -> Self {
        Self {
            membership_id: membership_key(person_id, group_id),
            group_id: group_id.to_owned(),
            person_id: person_id.to_owned(),
            role,
        }
    }
}

/// Outcome of one item inside a mass call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ItemStatus {
    Ok,
    Failed(String),
}

/// One per-item result of a batched remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn ok(item_id: impl Into<String>) -> Self {
        Self { item_id: item_id.into(), status: ItemStatus::Ok }
    }

    pub fn failed(item_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { item_id: item_id.into(), status: ItemStatus::Failed(detail.into()) }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ItemStatus::Ok)
    }
}

/// Result of a batched remote call carrying one status per submitted item.
///
/// The call itself completed; individual items may still have failed. Callers
/// treat any failed item as a failed batch without retrying per item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassResult {
    pub outcomes: Vec<ItemOutcome>,
}

impl MassResult {
    pub fn new(outcomes: Vec<ItemOutcome>) -> Self {
        Self { outcomes }
    }

    /// A result where every submitted item succeeded.
    pub fn all_ok<I, S>(item_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { outcomes: item_ids.into_iter().map(ItemOutcome::ok).collect() }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }

    /// True when every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}
