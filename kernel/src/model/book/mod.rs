use super::id::{BookId, ClubId, LocationId, UserId};

pub mod event;

/// One row per physical copy. `available` and `location_id` are a
/// materialized view of the in-flight transaction's status; only the
/// circulation operations may rewrite them.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub owner_id: UserId,
    pub club_id: ClubId,
    pub available: bool,
    // set iff the copy sits at the club pickup point, never while it is in
    // someone's hands
    pub location_id: Option<LocationId>,
    pub active: bool,
}

#[derive(Debug)]
pub struct BookListOptions {
    pub limit: i64,
    pub offset: i64,
}
