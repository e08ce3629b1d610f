//! Here-now snapshots: the authoritative occupant list at one instant.

use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;

/// One occupant reported by a here-now query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occupant {
    /// The occupant's identifier.
    pub identifier: ParticipantId,
    /// Presence state attached by the occupant, if state was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

/// Result of a here-now query for one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HereNow {
    /// Occupancy as counted by the service.
    pub total_occupancy: u32,
    /// Occupants, in the order the service listed them.
    pub occupants: Vec<Occupant>,
}

impl HereNow {
    /// Build a snapshot from bare identifiers.
    pub fn from_identifiers(identifiers: impl IntoIterator<Item = ParticipantId>) -> Self {
        let occupants: Vec<Occupant> = identifiers
            .into_iter()
            .map(|identifier| Occupant {
                identifier,
                state: None,
            })
            .collect();
        Self {
            total_occupancy: u32::try_from(occupants.len()).unwrap_or(u32::MAX),
            occupants,
        }
    }

    /// The occupant identifiers, in service order.
    pub fn identifiers(&self) -> Vec<ParticipantId> {
        self.occupants
            .iter()
            .map(|occupant| occupant.identifier.clone())
            .collect()
    }
}
