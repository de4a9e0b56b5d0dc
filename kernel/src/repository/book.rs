use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    book::{event::UpdateActivation, Book},
    id::BookId,
};

/// The slice of the catalog the engine needs: custody-state reads and the
/// activation policy. Metadata CRUD stays with the external catalog service.
#[mockall::automock]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_by_id(&self, book_id: BookId) -> AppResult<Option<Book>>;
    // deactivation refuses while custody is in flight and cancels the queue
    async fn set_active(&self, event: UpdateActivation) -> AppResult<Book>;
}
