//! Applying presence events to a roster.
//!
//! Reconciliation is a pure function of the current roster and one event.
//! Every operation is idempotent: a duplicated join, a leave for someone
//! who was never seen, or a batch that repeats what the roster already
//! knows all leave the roster untouched.

use lobby_types::PresenceEvent;

use crate::roster::{Roster, RosterChange};

/// Apply one presence event to `roster` and report what changed.
///
/// `occupancy` is never used to bound the work: a join names exactly one
/// participant regardless of how many the service says are present.
/// Within an interval batch all joins are applied before any leave, so a
/// participant listed in both ends up absent.
pub fn reconcile(roster: &mut Roster, event: &PresenceEvent) -> RosterChange {
    let mut change = RosterChange::default();

    match event {
        PresenceEvent::Join { identifier, .. } => {
            if roster.apply_join(identifier) {
                change.added.push(identifier.clone());
            }
        }
        PresenceEvent::Leave { identifier, .. } => {
            if roster.apply_leave(identifier) {
                change.removed.push(identifier.clone());
            }
        }
        PresenceEvent::IntervalBatch { joined, left, .. } => {
            for identifier in joined {
                if roster.apply_join(identifier) {
                    change.merge(RosterChange {
                        added: vec![identifier.clone()],
                        removed: Vec::new(),
                    });
                }
            }
            for identifier in left {
                if roster.apply_leave(identifier) {
                    change.merge(RosterChange {
                        added: Vec::new(),
                        removed: vec![identifier.clone()],
                    });
                }
            }
        }
        PresenceEvent::RefreshRequested { .. } => {}
    }

    change
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use lobby_types::ParticipantId;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn pid(raw: &str) -> ParticipantId {
        ParticipantId::new(raw).unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<ParticipantId> {
        raw.iter().map(|r| pid(r)).collect()
    }

    fn join(raw: &str) -> PresenceEvent {
        PresenceEvent::Join {
            identifier: pid(raw),
            occupancy: 1,
        }
    }

    fn leave(raw: &str) -> PresenceEvent {
        PresenceEvent::Leave {
            identifier: pid(raw),
            occupancy: 0,
        }
    }

    #[test]
    fn duplicate_join_is_idempotent() {
        let mut once = Roster::new();
        reconcile(&mut once, &join("a"));

        let mut twice = Roster::new();
        reconcile(&mut twice, &join("a"));
        let second = reconcile(&mut twice, &join("a"));

        assert_eq!(once, twice);
        assert!(second.is_empty());
    }

    #[test]
    fn join_ignores_occupancy() {
        let mut roster = Roster::new();
        let event = PresenceEvent::Join {
            identifier: pid("a"),
            occupancy: 40,
        };
        reconcile(&mut roster, &event);
        assert_eq!(roster.members(), ids(&["a"]).as_slice());

        let zero = PresenceEvent::Join {
            identifier: pid("b"),
            occupancy: 0,
        };
        reconcile(&mut roster, &zero);
        assert_eq!(roster.members(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn leave_of_absent_participant_is_noop() {
        let mut roster = Roster::from_members(ids(&["a"]));
        let change = reconcile(&mut roster, &leave("ghost"));
        assert!(change.is_empty());
        assert_eq!(roster.members(), ids(&["a"]).as_slice());
    }

    #[test]
    fn batch_applies_joins_before_leaves() {
        let mut roster = Roster::new();
        let batch = PresenceEvent::IntervalBatch {
            joined: ids(&["X", "Y"]),
            left: ids(&["X"]),
            occupancy: 1,
        };
        let change = reconcile(&mut roster, &batch);
        assert_eq!(roster.members(), ids(&["Y"]).as_slice());
        assert_eq!(change.added, ids(&["Y"]));
        assert!(change.removed.is_empty());
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut roster = Roster::from_members(ids(&["a"]));
        let batch = PresenceEvent::IntervalBatch {
            joined: Vec::new(),
            left: Vec::new(),
            occupancy: 1,
        };
        assert!(reconcile(&mut roster, &batch).is_empty());
        assert_eq!(roster.members(), ids(&["a"]).as_slice());
    }

    #[test]
    fn batch_with_repeated_entries_stays_unique() {
        let mut roster = Roster::from_members(ids(&["a"]));
        let batch = PresenceEvent::IntervalBatch {
            joined: ids(&["a", "b", "b"]),
            left: ids(&["c", "c"]),
            occupancy: 2,
        };
        reconcile(&mut roster, &batch);
        assert_eq!(roster.members(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn refresh_request_leaves_roster_alone() {
        let mut roster = Roster::from_members(ids(&["a"]));
        let change = reconcile(&mut roster, &PresenceEvent::RefreshRequested { occupancy: 300 });
        assert!(change.is_empty());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn no_sequence_of_events_produces_duplicates() {
        let pool = ["p0", "p1", "p2", "p3", "p4", "p5"];
        let mut rng = StdRng::seed_from_u64(0x10bb7);
        let mut roster = Roster::new();

        for _ in 0..2_000 {
            let pick = |rng: &mut StdRng| pool[rng.random_range(0..pool.len())];
            let event = match rng.random_range(0..3) {
                0 => join(pick(&mut rng)),
                1 => leave(pick(&mut rng)),
                _ => PresenceEvent::IntervalBatch {
                    joined: (0..rng.random_range(0..4))
                        .map(|_| pid(pick(&mut rng)))
                        .collect(),
                    left: (0..rng.random_range(0..4))
                        .map(|_| pid(pick(&mut rng)))
                        .collect(),
                    occupancy: 0,
                },
            };
            reconcile(&mut roster, &event);

            let unique: HashSet<&ParticipantId> = roster.members().iter().collect();
            assert_eq!(unique.len(), roster.len(), "roster contains a duplicate");
        }
    }
}
