use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{auth::AccessToken, id::UserId};

/// Identity is resolved outside this core; the engine only needs to map an
/// already-issued credential to the acting user id.
#[mockall::automock]
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn fetch_user_id_from_token(
        &self,
        access_token: &AccessToken,
    ) -> AppResult<Option<UserId>>;
}
