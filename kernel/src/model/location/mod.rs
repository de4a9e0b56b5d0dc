use super::id::{ClubId, LocationId};

// Each club has a single shared pickup point, maintained by the location
// directory; the engine only ever reads it.
#[derive(Debug, Clone)]
pub struct Location {
    pub id: LocationId,
    pub club_id: ClubId,
    pub address: String,
}
