//! Snapshot backlog for unconverged reconciliations.

use dashmap::DashMap;
use stellwerk_domain::RoleAssignment;

#[derive(Debug, Clone)]
struct BacklogEntry {
    assignments: Vec<RoleAssignment>,
    attempts: u32,
}

/// Latest-wins store of assignment snapshots awaiting replay.
///
/// A fresh snapshot for a person replaces the stored one and resets the
/// attempt count; convergence (or person deletion) clears the entry.
#[derive(Debug, Default)]
pub struct RetryBacklog {
    entries: DashMap<String, BacklogEntry>,
}

impl RetryBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the snapshot whose sync did not converge.
    pub fn note_failure(&self, person_id: &str, assignments: Vec<RoleAssignment>) {
        self.entries.insert(
            person_id.to_owned(),
            BacklogEntry {
                assignments,
                attempts: 0,
            },
        );
    }

    /// Drops the person's entry. Called when the person converges through
    /// the normal event path or is deleted. Returns whether an entry was
    /// actually stored.
    pub fn resolve(&self, person_id: &str) -> bool {
        self.entries.remove(person_id).is_some()
    }

    /// Records a failed replay attempt. Returns `false` once the attempt
    /// limit is reached, in which case the entry is dropped.
    pub fn note_attempt_failed(&self, person_id: &str, max_attempts: u32) -> bool {
        let exhausted = {
            let Some(mut entry) = self.entries.get_mut(person_id) else {
                return true;
            };
            entry.attempts += 1;
            entry.attempts >= max_attempts
        };
        if exhausted {
            self.entries.remove(person_id);
        }
        !exhausted
    }

    /// Current contents, cloned out for a sweep run.
    pub fn pending(&self) -> Vec<(String, Vec<RoleAssignment>)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().assignments.clone()))
            .collect()
    }

    pub fn attempts(&self, person_id: &str) -> Option<u32> {
        self.entries.get(person_id).map(|entry| entry.attempts)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
