use async_trait::async_trait;
use derive_new::new;
use kernel::notifier::{CirculationNotice, NotificationDispatcher};
use shared::error::AppResult;

/// Structured-log dispatcher. Delivery to real channels lives outside this
/// core; the log line is the integration point.
#[derive(new)]
pub struct TracingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn dispatch(&self, notice: CirculationNotice) -> AppResult<()> {
        match notice {
            CirculationNotice::RequestCreated(t) => {
                tracing::info!(
                    transaction_id = %t.id,
                    book_id = %t.book_id,
                    borrower_id = %t.borrower_id,
                    lender_id = %t.lender_id,
                    "borrow request created"
                );
            }
            CirculationNotice::HandOffApproved(t) => {
                tracing::info!(
                    transaction_id = %t.id,
                    book_id = %t.book_id,
                    borrower_id = %t.borrower_id,
                    "hand-off approved"
                );
            }
            CirculationNotice::ReadyForPickup(t) => {
                tracing::info!(
                    transaction_id = %t.id,
                    book_id = %t.book_id,
                    borrower_id = %t.borrower_id,
                    "copy ready for pickup"
                );
            }
            CirculationNotice::Returned(t) => {
                tracing::info!(
                    transaction_id = %t.id,
                    book_id = %t.book_id,
                    borrower_id = %t.borrower_id,
                    "copy returned"
                );
            }
        }
        Ok(())
    }
}
