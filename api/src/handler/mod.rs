pub mod book;
pub mod circulation;

use std::sync::Arc;

use kernel::notifier::{CirculationNotice, NotificationDispatcher};

// dispatch failures must never fail the request that triggered them
pub(crate) async fn notify(
    dispatcher: Arc<dyn NotificationDispatcher>,
    notice: CirculationNotice,
) {
    if let Err(e) = dispatcher.dispatch(notice).await {
        tracing::warn!(
            error.cause_chain = ?e,
            "failed to dispatch circulation notice"
        );
    }
}
