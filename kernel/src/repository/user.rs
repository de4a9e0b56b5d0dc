use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{id::UserId, user::User};

#[mockall::automock]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_current_user(&self, user_id: UserId) -> AppResult<Option<User>>;
}
