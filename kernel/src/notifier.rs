use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::circulation::CirculationTransaction;

/// Transitions the outside world gets told about. The engine itself never
/// dispatches; callers do, after the operation has committed, and a failed
/// dispatch never fails the request.
#[derive(Debug, Clone)]
pub enum CirculationNotice {
    RequestCreated(CirculationTransaction),
    HandOffApproved(CirculationTransaction),
    ReadyForPickup(CirculationTransaction),
    Returned(CirculationTransaction),
}

#[mockall::automock]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notice: CirculationNotice) -> AppResult<()>;
}
