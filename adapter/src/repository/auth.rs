use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{auth::AccessToken, id::UserId},
    repository::auth::AuthRepository,
};
use shared::error::{AppError, AppResult};

use crate::database::ConnectionPool;

#[derive(new)]
pub struct AuthRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl AuthRepository for AuthRepositoryImpl {
    async fn fetch_user_id_from_token(
        &self,
        access_token: &AccessToken,
    ) -> AppResult<Option<UserId>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM access_tokens WHERE token = ?",
        )
        .bind(&access_token.0)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        row.map(|id| id.parse()).transpose().map_err(AppError::from)
    }
}
