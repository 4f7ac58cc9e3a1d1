//! Domain change events delivered by the upstream event source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::membership::RoleAssignment;
use crate::types::person::IdentityParams;

/// A change to a person's authorization context.
///
/// Every variant carries the post-change Personenkontext snapshot the engine
/// needs; the event source is the authority, the engine never reads local
/// state on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PersonEvent {
    PersonCreated {
        person: IdentityParams,
        assignments: Vec<RoleAssignment>,
    },
    ContextAdded {
        person_id: String,
        added: RoleAssignment,
        current: Vec<RoleAssignment>,
    },
    ContextUpdated {
        person_id: String,
        old_role_id: String,
        new_role_id: String,
        current: Vec<RoleAssignment>,
    },
    ContextRemoved {
        person_id: String,
        removed_role_id: String,
        remaining: Vec<RoleAssignment>,
    },
    PersonDeleted {
        person_id: String,
    },
}

impl PersonEvent {
    pub fn person_id(&self) -> &str {
        match self {
            Self::PersonCreated { person, .. } => &person.person_id,
            Self::ContextAdded { person_id, .. }
            | Self::ContextUpdated { person_id, .. }
            | Self::ContextRemoved { person_id, .. }
            | Self::PersonDeleted { person_id } => person_id,
        }
    }

    /// Short tag for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PersonCreated { .. } => "person_created",
            Self::ContextAdded { .. } => "context_added",
            Self::ContextUpdated { .. } => "context_updated",
            Self::ContextRemoved { .. } => "context_removed",
            Self::PersonDeleted { .. } => "person_deleted",
        }
    }

    /// The post-change assignment snapshot, for variants that carry one.
    ///
    /// Deletion events carry none; they are terminal and must not be replayed.
    pub fn snapshot(&self) -> Option<&[RoleAssignment]> {
        match self {
            Self::PersonCreated { assignments, .. } => Some(assignments),
            Self::ContextAdded { current, .. } | Self::ContextUpdated { current, .. } => {
                Some(current)
            }
            Self::ContextRemoved { remaining, .. } => Some(remaining),
            Self::PersonDeleted { .. } => None,
        }
    }
}

/// Delivery wrapper around a [`PersonEvent`] for correlation and ordering
/// diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: PersonEvent,
}

impl EventEnvelope {
    pub fn new(event: PersonEvent) -> Self {
        Self { event_id: Uuid::now_v7(), occurred_at: Utc::now(), event }
    }
}
