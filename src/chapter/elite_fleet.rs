//! Elite fleet records stored alongside the session
//!
//! The client session schema has no room for elite fleets, so each record is
//! written as a length-delimited `FleetInfo` under a reserved top-level field
//! of the session blob. Readers that do not know the field skip it.

use prost::Message;
use thiserror::Error;

use crate::constants::ELITE_FLEET_FIELD;
use crate::protocol::wire::{append_length_delimited, length_delimited_values, strip_field};
use crate::protocol::{CurrentChapterInfo, FleetInfo, Preserved, TeamInfo, WireError};

#[derive(Error, Debug)]
pub enum EliteFleetError {
    #[error("Session blob is malformed: {0}")]
    Wire(#[from] WireError),

    #[error("Elite fleet record is malformed: {0}")]
    Record(#[from] prost::DecodeError),
}

/// Elite fleets carried by a decoded session.
pub fn elite_fleets(session: &Preserved<CurrentChapterInfo>) -> Result<Vec<FleetInfo>, EliteFleetError> {
    length_delimited_values(&session.unknown, ELITE_FLEET_FIELD)?
        .into_iter()
        .map(|payload| FleetInfo::decode(payload).map_err(EliteFleetError::from))
        .collect()
}

/// Replace every elite fleet record of a decoded session.
pub fn replace_elite_fleets(
    session: &mut Preserved<CurrentChapterInfo>,
    fleets: &[FleetInfo],
) -> Result<(), EliteFleetError> {
    let mut unknown = strip_field(&session.unknown, ELITE_FLEET_FIELD)?;
    for fleet in fleets {
        append_length_delimited(&mut unknown, ELITE_FLEET_FIELD, &fleet.encode_to_vec());
    }
    session.unknown = unknown;
    Ok(())
}

/// Elite fleets stored in a raw session blob. An empty blob has none.
#[cfg(test)]
pub fn parse_elite_fleets(state: &[u8]) -> Result<Vec<FleetInfo>, EliteFleetError> {
    if state.is_empty() {
        return Ok(Vec::new());
    }
    elite_fleets(&Preserved::decode(state)?)
}

/// Rewrite a raw session blob with `fleets` as its elite fleet records.
///
/// All other unknown fields survive byte-for-byte.
#[cfg(test)]
pub fn set_elite_fleets(state: &[u8], fleets: &[FleetInfo]) -> Result<Vec<u8>, EliteFleetError> {
    let mut session = Preserved::<CurrentChapterInfo>::decode(state)?;
    replace_elite_fleets(&mut session, fleets)?;
    Ok(session.encode_to_vec())
}

/// Drop `ship_id` from every team of every fleet.
pub fn remove_ship_from_fleets(fleets: &mut [FleetInfo], ship_id: u32) {
    for fleet in fleets.iter_mut() {
        remove_ship_from_teams(&mut fleet.main_team, ship_id);
        remove_ship_from_teams(&mut fleet.submarine_team, ship_id);
        remove_ship_from_teams(&mut fleet.support_team, ship_id);
    }
}

fn remove_ship_from_teams(teams: &mut [TeamInfo], ship_id: u32) {
    for team in teams {
        team.ship_list.retain(|&id| id != ship_id);
    }
}
