use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    book::BookListOptions,
    circulation::{event::AdmitRequest, CirculationTransaction, ReturnOutcome},
    id::{BookId, TransactionId, UserId},
};

/// The circulation engine. Every mutating operation is one atomic unit
/// scoped to a single book: validation, queue rewrites and the book's
/// custody flags commit or roll back together.
#[mockall::automock]
#[async_trait]
pub trait CirculationRepository: Send + Sync {
    // admit a borrow request, resolving the current holder from the book
    async fn admit_request(&self, event: AdmitRequest) -> AppResult<CirculationTransaction>;
    // Requested -> Approved, lender only
    async fn approve(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction>;
    // Approved -> AwaitingPickup, lender only
    async fn drop_off(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction>;
    // AwaitingPickup -> PickedUp, borrower only
    async fn pick_up(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction>;
    // Requested -> Cancelled, borrower only
    async fn cancel(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction>;
    // PickedUp -> ReturnInitiated, borrower only
    async fn initiate_return(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction>;
    // ReturnInitiated -> Returned, borrower only; promotes the head of the
    // wait queue to the pickup point
    async fn finalize_return(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<ReturnOutcome>;

    // the borrower's open (non-terminal) transaction on a book, if any
    async fn open_request_for(
        &self,
        book_id: BookId,
        borrower_id: UserId,
    ) -> AppResult<Option<CirculationTransaction>>;
    // the transaction currently carrying custody of the copy, if any
    async fn in_flight_transaction(
        &self,
        book_id: BookId,
    ) -> AppResult<Option<CirculationTransaction>>;
    // Requested transactions waiting on a holder, oldest first
    async fn queue_behind(
        &self,
        book_id: BookId,
        holder_id: UserId,
    ) -> AppResult<Vec<CirculationTransaction>>;

    // books a user currently holds (PickedUp / ReturnInitiated)
    async fn find_borrowed_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>>;
    // a user's requests still moving toward pickup
    async fn find_requesting_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>>;
    // the hand-off worklist: the oldest open request per book a user lends
    async fn find_lending_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>>;
    // completed borrows, newest first
    async fn find_history_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>>;
    // every transaction ever recorded for a copy, newest first
    async fn find_history_by_book(
        &self,
        book_id: BookId,
    ) -> AppResult<Vec<CirculationTransaction>>;
}
