use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{
        book::{event::UpdateActivation, Book},
        id::BookId,
    },
    repository::book::BookRepository,
};
use shared::error::{AppError, AppResult};
use sqlx::SqliteConnection;

use crate::database::{model::book::BookRow, ConnectionPool};

#[derive(new)]
pub struct BookRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl BookRepository for BookRepositoryImpl {
    async fn find_by_id(&self, book_id: BookId) -> AppResult<Option<Book>> {
        sqlx::query_as::<_, BookRow>(
            "SELECT id, title, author, owner_id, club_id, is_available, location_id, is_active \
             FROM books WHERE id = ?",
        )
        .bind(book_id.to_string())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(Book::try_from)
        .transpose()
    }

    async fn set_active(&self, event: UpdateActivation) -> AppResult<Book> {
        let mut tx = self.db.begin().await?;

        let book = fetch_book(&mut *tx, event.book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;

        if !event.active {
            // a copy with custody in flight cannot be withdrawn
            let in_flight = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM circulation_transactions \
                 WHERE book_id = ? AND status IN (2, 4, 5, 6)",
            )
            .bind(event.book_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
            if in_flight > 0 {
                return Err(AppError::Conflict(
                    "the book is currently in an active borrow cycle".into(),
                ));
            }

            // everyone still waiting gets their request cancelled
            sqlx::query(
                "UPDATE circulation_transactions SET status = ? WHERE book_id = ? AND status = ?",
            )
            .bind(3i64)
            .bind(event.book_id.to_string())
            .bind(1i64)
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        }

        let res = sqlx::query("UPDATE books SET is_active = ? WHERE id = ?")
            .bind(event.active)
            .bind(event.book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::NoRowAffectedError("no book has been updated".into()));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(Book {
            active: event.active,
            ..book
        })
    }
}

async fn fetch_book(
    conn: &mut SqliteConnection,
    book_id: BookId,
) -> AppResult<Option<Book>> {
    sqlx::query_as::<_, BookRow>(
        "SELECT id, title, author, owner_id, club_id, is_available, location_id, is_active \
         FROM books WHERE id = ?",
    )
    .bind(book_id.to_string())
    .fetch_optional(conn)
    .await
    .map_err(AppError::SpecificOperationError)?
    .map(Book::try_from)
    .transpose()
}
