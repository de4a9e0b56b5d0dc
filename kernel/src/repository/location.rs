use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{id::ClubId, location::Location};

#[mockall::automock]
#[async_trait]
pub trait LocationRepository: Send + Sync {
    // the club's single shared pickup point
    async fn pickup_point_for_club(&self, club_id: ClubId) -> AppResult<Option<Location>>;
}
