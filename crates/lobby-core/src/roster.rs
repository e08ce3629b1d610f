//! The roster of participants present on the channel.
//!
//! A [`Roster`] is an ordered sequence of unique [`ParticipantId`]s. Order
//! carries no meaning beyond determinism: joins append, snapshots impose
//! their own order. The only invariant is that no identifier appears more
//! than once, and every mutation preserves it.

use std::collections::HashSet;

use lobby_types::ParticipantId;

/// What a roster mutation actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterChange {
    /// Identifiers that were not present before.
    pub added: Vec<ParticipantId>,
    /// Identifiers that are no longer present.
    pub removed: Vec<ParticipantId>,
}

impl RosterChange {
    /// `true` if the mutation was a no-op.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Fold another change into this one.
    ///
    /// An identifier added and then removed within the same batch cancels
    /// out, and vice versa.
    pub fn merge(&mut self, other: Self) {
        for id in other.added {
            if let Some(pos) = self.removed.iter().position(|r| *r == id) {
                self.removed.remove(pos);
            } else {
                self.added.push(id);
            }
        }
        for id in other.removed {
            if let Some(pos) = self.added.iter().position(|a| *a == id) {
                self.added.remove(pos);
            } else {
                self.removed.push(id);
            }
        }
    }
}

/// Deduplicated, ordered set of present participants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: Vec<ParticipantId>,
}

impl Roster {
    /// Create an empty roster.
    pub const fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Build a roster from identifiers, keeping the first occurrence of
    /// each.
    pub fn from_members(members: impl IntoIterator<Item = ParticipantId>) -> Self {
        Self {
            members: dedup(members),
        }
    }

    /// Append `id` if it is not already present.
    ///
    /// Returns `true` if the roster changed.
    pub fn apply_join(&mut self, id: &ParticipantId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(id.clone());
        true
    }

    /// Remove `id` if it is present.
    ///
    /// Returns `true` if the roster changed.
    pub fn apply_leave(&mut self, id: &ParticipantId) -> bool {
        match self.members.iter().position(|m| m == id) {
            Some(pos) => {
                self.members.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Replace every member with `members`, in the given order.
    ///
    /// This is a wholesale replacement, not a union: anything absent from
    /// `members` is dropped. Duplicates within `members` collapse to their
    /// first occurrence.
    pub fn replace_all(&mut self, members: impl IntoIterator<Item = ParticipantId>) -> RosterChange {
        let next = dedup(members);

        let before: HashSet<&ParticipantId> = self.members.iter().collect();
        let after: HashSet<&ParticipantId> = next.iter().collect();

        let change = RosterChange {
            added: next
                .iter()
                .filter(|id| !before.contains(id))
                .cloned()
                .collect(),
            removed: self
                .members
                .iter()
                .filter(|id| !after.contains(id))
                .cloned()
                .collect(),
        };

        self.members = next;
        change
    }

    /// `true` if `id` is present.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.contains(id)
    }

    /// Present participants, in roster order.
    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    /// Number of present participants.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` if nobody is present.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn dedup(members: impl IntoIterator<Item = ParticipantId>) -> Vec<ParticipantId> {
    let mut seen = HashSet::new();
    members
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
