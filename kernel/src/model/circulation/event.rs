use super::super::id::{BookId, ClubId, UserId};

/// Admission of a new borrow request. The engine resolves the current
/// holder and the entry status from the book's custody state.
#[derive(Debug)]
pub struct AdmitRequest {
    pub book_id: BookId,
    pub borrower_id: UserId,
    pub club_id: ClubId,
}
