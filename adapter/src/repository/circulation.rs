use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use derive_new::new;
use kernel::{
    model::{
        book::{Book, BookListOptions},
        circulation::{
            event::AdmitRequest, permit, CirculationAction, CirculationTransaction,
            ReturnOutcome, TransactionStatus,
        },
        id::{BookId, ClubId, TransactionId, UserId},
        location::Location,
    },
    repository::circulation::CirculationRepository,
};
use shared::error::{AppError, AppResult};
use sqlx::SqliteConnection;

use crate::database::{
    model::{book::BookRow, circulation::TransactionRow, location::LocationRow},
    ConnectionPool,
};

const SELECT_TRANSACTION: &str = "SELECT id, book_id, club_id, borrower_id, lender_id, \
     status, request_date, pickup_date, return_date FROM circulation_transactions";

#[derive(new)]
pub struct CirculationRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl CirculationRepository for CirculationRepositoryImpl {
    async fn admit_request(&self, event: AdmitRequest) -> AppResult<CirculationTransaction> {
        let mut tx = self.db.begin().await?;

        let book = fetch_book(&mut *tx, event.book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;
        if !book.active {
            return Err(AppError::Conflict(
                "the book is not accepting new requests".into(),
            ));
        }
        if fetch_open_request(&mut *tx, event.book_id, event.borrower_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "there is already an open request for this book".into(),
            ));
        }

        let (status, lender_id) = if book.available {
            match book.location_id {
                // the copy is in the owner's hands: a normal request
                None => (TransactionStatus::Requested, book.owner_id),
                // the copy already waits at the pickup point: no
                // person-to-person approval needed
                Some(_) => (TransactionStatus::AwaitingPickup, book.owner_id),
            }
        } else {
            // the copy is out with a holder: queue behind whoever holds it
            let in_flight = sqlx::query_as::<_, TransactionRow>(&format!(
                "{SELECT_TRANSACTION} WHERE book_id = ? AND status IN (2, 4, 5) LIMIT 1"
            ))
            .bind(event.book_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?
            .map(CirculationTransaction::try_from)
            .transpose()?
            .ok_or_else(|| AppError::EntityNotFound("in-flight transaction not found".into()))?;
            (TransactionStatus::Requested, in_flight.borrower_id)
        };

        let created = CirculationTransaction {
            id: TransactionId::new(),
            book_id: event.book_id,
            club_id: event.club_id,
            borrower_id: event.borrower_id,
            lender_id,
            status,
            request_date: Utc::now(),
            pickup_date: None,
            return_date: None,
        };
        sqlx::query(
            "INSERT INTO circulation_transactions \
             (id, book_id, club_id, borrower_id, lender_id, status, request_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(created.id.to_string())
        .bind(created.book_id.to_string())
        .bind(created.club_id.to_string())
        .bind(created.borrower_id.to_string())
        .bind(created.lender_id.to_string())
        .bind(created.status.code())
        .bind(created.request_date)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if created.status == TransactionStatus::AwaitingPickup {
            // the copy is committed to this hand-off from the moment of
            // admission
            sqlx::query("UPDATE books SET is_available = 0 WHERE id = ?")
                .bind(created.book_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(AppError::SpecificOperationError)?;
        }

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(created)
    }

    async fn approve(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction> {
        let mut tx = self.db.begin().await?;
        let target =
            validated_target(&mut *tx, transaction_id, actor_id, CirculationAction::Approve)
                .await?;
        fetch_book(&mut *tx, target.book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;

        // the approving holder must already have the copy in hand before
        // promising it onward
        let unpicked = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE book_id = ? AND borrower_id = ? AND status IN (2, 4) \
             LIMIT 1"
        ))
        .bind(target.book_id.to_string())
        .bind(actor_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if unpicked.is_some() {
            return Err(AppError::Conflict("the book is not picked up yet".into()));
        }

        sqlx::query("UPDATE books SET is_available = 0, location_id = NULL WHERE id = ?")
            .bind(target.book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        update_status(&mut *tx, target.id, TransactionStatus::Approved).await?;

        // the queue behind this holder now waits on the incoming holder
        sqlx::query(
            "UPDATE circulation_transactions SET lender_id = ? \
             WHERE book_id = ? AND lender_id = ? AND status = 1 AND request_date > ?",
        )
        .bind(target.borrower_id.to_string())
        .bind(target.book_id.to_string())
        .bind(target.lender_id.to_string())
        .bind(target.request_date)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(CirculationTransaction {
            status: TransactionStatus::Approved,
            ..target
        })
    }

    async fn drop_off(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction> {
        let mut tx = self.db.begin().await?;
        let target =
            validated_target(&mut *tx, transaction_id, actor_id, CirculationAction::Drop).await?;
        fetch_book(&mut *tx, target.book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;
        let location = fetch_pickup_point(&mut *tx, target.club_id).await?;

        sqlx::query("UPDATE books SET location_id = ? WHERE id = ?")
            .bind(location.id.to_string())
            .bind(target.book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        update_status(&mut *tx, target.id, TransactionStatus::AwaitingPickup).await?;

        // dropping off for the next person closes out the holder's own borrow
        let prior = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE book_id = ? AND borrower_id = ? AND status = 5 LIMIT 1"
        ))
        .bind(target.book_id.to_string())
        .bind(actor_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if let Some(prior) = prior {
            sqlx::query(
                "UPDATE circulation_transactions SET status = ?, return_date = ? WHERE id = ?",
            )
            .bind(TransactionStatus::Returned.code())
            .bind(Utc::now())
            .bind(prior.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        }

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(CirculationTransaction {
            status: TransactionStatus::AwaitingPickup,
            ..target
        })
    }

    async fn pick_up(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction> {
        let mut tx = self.db.begin().await?;
        let target =
            validated_target(&mut *tx, transaction_id, actor_id, CirculationAction::Pickup)
                .await?;
        fetch_book(&mut *tx, target.book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;

        sqlx::query("UPDATE books SET location_id = NULL, is_available = 0 WHERE id = ?")
            .bind(target.book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

        let picked_up_at = Utc::now();
        let res = sqlx::query(
            "UPDATE circulation_transactions SET status = ?, pickup_date = ? WHERE id = ?",
        )
        .bind(TransactionStatus::PickedUp.code())
        .bind(picked_up_at)
        .bind(target.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::NoRowAffectedError(
                "no circulation transaction has been updated".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(CirculationTransaction {
            status: TransactionStatus::PickedUp,
            pickup_date: Some(picked_up_at),
            ..target
        })
    }

    async fn cancel(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction> {
        let mut tx = self.db.begin().await?;
        let target =
            validated_target(&mut *tx, transaction_id, actor_id, CirculationAction::Cancel)
                .await?;

        // a queued request carries no custody, so the book stays untouched
        update_status(&mut *tx, target.id, TransactionStatus::Cancelled).await?;

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(CirculationTransaction {
            status: TransactionStatus::Cancelled,
            ..target
        })
    }

    async fn initiate_return(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<CirculationTransaction> {
        let mut tx = self.db.begin().await?;
        let target = validated_target(
            &mut *tx,
            transaction_id,
            actor_id,
            CirculationAction::InitiateReturn,
        )
        .await?;

        update_status(&mut *tx, target.id, TransactionStatus::ReturnInitiated).await?;

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(CirculationTransaction {
            status: TransactionStatus::ReturnInitiated,
            ..target
        })
    }

    async fn finalize_return(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> AppResult<ReturnOutcome> {
        let mut tx = self.db.begin().await?;
        let target = validated_target(
            &mut *tx,
            transaction_id,
            actor_id,
            CirculationAction::FinalizeReturn,
        )
        .await?;
        fetch_book(&mut *tx, target.book_id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;
        let location = fetch_pickup_point(&mut *tx, target.club_id).await?;

        // whoever queued up behind the returning holder, oldest first
        let queue = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE book_id = ? AND lender_id = ? AND status IN (1, 2, 4) \
             ORDER BY request_date ASC, rowid ASC"
        ))
        .bind(target.book_id.to_string())
        .bind(actor_id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .into_iter()
        .map(CirculationTransaction::try_from)
        .collect::<AppResult<Vec<_>>>()?;

        let promoted = if let Some((head, rest)) = queue.split_first() {
            // the copy goes to the shared location, not to a person, so the
            // head of the queue skips the approval step entirely
            update_status(&mut *tx, head.id, TransactionStatus::AwaitingPickup).await?;
            sqlx::query("UPDATE books SET location_id = ?, is_available = 0 WHERE id = ?")
                .bind(location.id.to_string())
                .bind(target.book_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(AppError::SpecificOperationError)?;
            for waiting in rest {
                sqlx::query("UPDATE circulation_transactions SET lender_id = ? WHERE id = ?")
                    .bind(head.borrower_id.to_string())
                    .bind(waiting.id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::SpecificOperationError)?;
            }
            Some(CirculationTransaction {
                status: TransactionStatus::AwaitingPickup,
                ..head.clone()
            })
        } else {
            // nobody is waiting: the copy rests at the pickup point, free
            sqlx::query("UPDATE books SET location_id = ?, is_available = 1 WHERE id = ?")
                .bind(location.id.to_string())
                .bind(target.book_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(AppError::SpecificOperationError)?;
            None
        };

        let returned_at = Utc::now();
        let res = sqlx::query(
            "UPDATE circulation_transactions SET status = ?, return_date = ? WHERE id = ?",
        )
        .bind(TransactionStatus::Returned.code())
        .bind(returned_at)
        .bind(target.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::NoRowAffectedError(
                "no circulation transaction has been updated".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(ReturnOutcome {
            returned: CirculationTransaction {
                status: TransactionStatus::Returned,
                return_date: Some(returned_at),
                ..target
            },
            promoted,
        })
    }

    async fn open_request_for(
        &self,
        book_id: BookId,
        borrower_id: UserId,
    ) -> AppResult<Option<CirculationTransaction>> {
        let mut conn = self.acquire().await?;
        fetch_open_request(&mut conn, book_id, borrower_id).await
    }

    async fn in_flight_transaction(
        &self,
        book_id: BookId,
    ) -> AppResult<Option<CirculationTransaction>> {
        let mut conn = self.acquire().await?;
        fetch_in_flight(&mut conn, book_id).await
    }

    async fn queue_behind(
        &self,
        book_id: BookId,
        holder_id: UserId,
    ) -> AppResult<Vec<CirculationTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE book_id = ? AND lender_id = ? AND status = 1 \
             ORDER BY request_date ASC, rowid ASC"
        ))
        .bind(book_id.to_string())
        .bind(holder_id.to_string())
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows_into(rows)
    }

    async fn find_borrowed_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE borrower_id = ? AND status IN (5, 6) \
             ORDER BY request_date DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id.to_string())
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows_into(rows)
    }

    async fn find_requesting_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE borrower_id = ? AND status IN (1, 2, 4) \
             ORDER BY request_date DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id.to_string())
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows_into(rows)
    }

    async fn find_lending_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE lender_id = ? AND status IN (1, 2) \
             ORDER BY request_date ASC, rowid ASC LIMIT ? OFFSET ?"
        ))
        .bind(user_id.to_string())
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        let list = rows_into(rows)?;

        // one entry per book: the request the holder should act on next
        let mut seen = HashSet::new();
        Ok(list
            .into_iter()
            .filter(|t| seen.insert(t.book_id))
            .collect())
    }

    async fn find_history_by_user(
        &self,
        user_id: UserId,
        options: BookListOptions,
    ) -> AppResult<Vec<CirculationTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE borrower_id = ? AND status = 7 \
             ORDER BY request_date DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id.to_string())
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows_into(rows)
    }

    async fn find_history_by_book(
        &self,
        book_id: BookId,
    ) -> AppResult<Vec<CirculationTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE book_id = ? ORDER BY request_date DESC, rowid DESC"
        ))
        .bind(book_id.to_string())
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows_into(rows)
    }
}

impl CirculationRepositoryImpl {
    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.db
            .inner_ref()
            .acquire()
            .await
            .map_err(AppError::SpecificOperationError)
    }
}

// Loads the target row and runs the checks shared by every hand-off action:
// existence, the actor guard, then the state machine.
async fn validated_target(
    conn: &mut SqliteConnection,
    transaction_id: TransactionId,
    actor_id: UserId,
    action: CirculationAction,
) -> AppResult<CirculationTransaction> {
    let target = fetch_transaction(conn, transaction_id)
        .await?
        .ok_or_else(|| AppError::EntityNotFound("transaction not found".into()))?;
    if !permit(action, &target, actor_id) {
        return Err(AppError::UnauthorizedError);
    }
    let (required, _) = action.transition();
    if target.status != required {
        return Err(AppError::Conflict(format!(
            "the transaction is {}, expected {required}",
            target.status
        )));
    }
    Ok(target)
}

async fn fetch_transaction(
    conn: &mut SqliteConnection,
    transaction_id: TransactionId,
) -> AppResult<Option<CirculationTransaction>> {
    sqlx::query_as::<_, TransactionRow>(&format!("{SELECT_TRANSACTION} WHERE id = ?"))
        .bind(transaction_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(CirculationTransaction::try_from)
        .transpose()
}

async fn fetch_book(conn: &mut SqliteConnection, book_id: BookId) -> AppResult<Option<Book>> {
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

async fn fetch_open_request(
    conn: &mut SqliteConnection,
    book_id: BookId,
    borrower_id: UserId,
) -> AppResult<Option<CirculationTransaction>> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        "{SELECT_TRANSACTION} WHERE book_id = ? AND borrower_id = ? \
         AND status IN (1, 2, 4, 5, 6) LIMIT 1"
    ))
    .bind(book_id.to_string())
    .bind(borrower_id.to_string())
    .fetch_optional(conn)
    .await
    .map_err(AppError::SpecificOperationError)?
    .map(CirculationTransaction::try_from)
    .transpose()
}

async fn fetch_in_flight(
    conn: &mut SqliteConnection,
    book_id: BookId,
) -> AppResult<Option<CirculationTransaction>> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        "{SELECT_TRANSACTION} WHERE book_id = ? AND status IN (2, 4, 5, 6) LIMIT 1"
    ))
    .bind(book_id.to_string())
    .fetch_optional(conn)
    .await
    .map_err(AppError::SpecificOperationError)?
    .map(CirculationTransaction::try_from)
    .transpose()
}

async fn fetch_pickup_point(conn: &mut SqliteConnection, club_id: ClubId) -> AppResult<Location> {
    sqlx::query_as::<_, LocationRow>("SELECT id, club_id, address FROM locations WHERE club_id = ?")
        .bind(club_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(Location::try_from)
        .transpose()?
        .ok_or_else(|| AppError::EntityNotFound("pickup point not found".into()))
}

async fn update_status(
    conn: &mut SqliteConnection,
    transaction_id: TransactionId,
    status: TransactionStatus,
) -> AppResult<()> {
    let res = sqlx::query("UPDATE circulation_transactions SET status = ? WHERE id = ?")
        .bind(status.code())
        .bind(transaction_id.to_string())
        .execute(conn)
        .await
        .map_err(AppError::SpecificOperationError)?;
    if res.rows_affected() < 1 {
        return Err(AppError::NoRowAffectedError(
            "no circulation transaction has been updated".into(),
        ));
    }
    Ok(())
}

fn rows_into(rows: Vec<TransactionRow>) -> AppResult<Vec<CirculationTransaction>> {
    rows.into_iter()
        .map(CirculationTransaction::try_from)
        .collect()
}

#[cfg(test)]
mod tests {
    use kernel::model::{book::event::UpdateActivation, id::LocationId};
    use kernel::repository::book::BookRepository;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::{database::setup_schema, repository::book::BookRepositoryImpl};

    async fn connect() -> ConnectionPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let pool = ConnectionPool::new(pool);
        setup_schema(&pool).await.unwrap();
        pool
    }

    async fn insert_user(pool: &ConnectionPool, name: &str) -> UserId {
        let id = UserId::new();
        sqlx::query("INSERT INTO users (id, name, email) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(format!("{name}@example.com"))
            .execute(pool.inner_ref())
            .await
            .unwrap();
        id
    }

    async fn insert_location(pool: &ConnectionPool, club_id: ClubId) -> LocationId {
        let id = LocationId::new();
        sqlx::query("INSERT INTO locations (id, club_id, address) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(club_id.to_string())
            .bind("clubhouse shelf")
            .execute(pool.inner_ref())
            .await
            .unwrap();
        id
    }

    async fn insert_book(pool: &ConnectionPool, owner_id: UserId, club_id: ClubId) -> BookId {
        let id = BookId::new();
        sqlx::query(
            "INSERT INTO books (id, title, author, owner_id, club_id, is_available, is_active) \
             VALUES (?, ?, ?, ?, ?, 1, 1)",
        )
        .bind(id.to_string())
        .bind("The Master and Margarita")
        .bind("Mikhail Bulgakov")
        .bind(owner_id.to_string())
        .bind(club_id.to_string())
        .execute(pool.inner_ref())
        .await
        .unwrap();
        id
    }

    struct Fixture {
        pool: ConnectionPool,
        repo: CirculationRepositoryImpl,
        books: BookRepositoryImpl,
        owner: UserId,
        reader: UserId,
        second_reader: UserId,
        club_id: ClubId,
        location_id: LocationId,
        book_id: BookId,
    }

    impl Fixture {
        async fn new() -> Self {
            let pool = connect().await;
            let owner = insert_user(&pool, "owner").await;
            let reader = insert_user(&pool, "reader").await;
            let second_reader = insert_user(&pool, "second-reader").await;
            let club_id = ClubId::new();
            let location_id = insert_location(&pool, club_id).await;
            let book_id = insert_book(&pool, owner, club_id).await;
            Self {
                repo: CirculationRepositoryImpl::new(pool.clone()),
                books: BookRepositoryImpl::new(pool.clone()),
                pool,
                owner,
                reader,
                second_reader,
                club_id,
                location_id,
                book_id,
            }
        }

        fn admit(&self, borrower_id: UserId) -> AdmitRequest {
            AdmitRequest {
                book_id: self.book_id,
                borrower_id,
                club_id: self.club_id,
            }
        }

        async fn book(&self) -> Book {
            self.books.find_by_id(self.book_id).await.unwrap().unwrap()
        }
    }

    fn page() -> BookListOptions {
        BookListOptions {
            limit: 20,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn admission_against_the_owner_joins_the_queue() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        assert_eq!(t1.status, TransactionStatus::Requested);
        assert_eq!(t1.lender_id, f.owner);

        let book = f.book().await;
        assert!(book.available);
        assert_eq!(book.location_id, None);

        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();
        assert_eq!(t2.lender_id, f.owner);
        assert!(t1.request_date <= t2.request_date);

        let queue = f.repo.queue_behind(f.book_id, f.owner).await.unwrap();
        assert_eq!(
            queue.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![t1.id, t2.id]
        );
    }

    #[tokio::test]
    async fn a_borrower_cannot_hold_two_open_requests() {
        let f = Fixture::new().await;
        f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let err = f.repo.admit_request(f.admit(f.reader)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn an_inactive_book_accepts_no_requests() {
        let f = Fixture::new().await;
        f.books
            .set_active(UpdateActivation {
                book_id: f.book_id,
                active: false,
            })
            .await
            .unwrap();
        let err = f.repo.admit_request(f.admit(f.reader)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn admission_on_an_unknown_book_is_not_found() {
        let f = Fixture::new().await;
        let err = f
            .repo
            .admit_request(AdmitRequest {
                book_id: BookId::new(),
                borrower_id: f.reader,
                club_id: f.club_id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn approval_claims_the_copy_and_repoints_the_queue() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();

        let approved = f.repo.approve(t1.id, f.owner).await.unwrap();
        assert_eq!(approved.status, TransactionStatus::Approved);

        let book = f.book().await;
        assert!(!book.available);
        assert_eq!(book.location_id, None);

        // the queue now waits on the incoming holder
        let reassigned = f
            .repo
            .open_request_for(f.book_id, f.second_reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reassigned.id, t2.id);
        assert_eq!(reassigned.lender_id, f.reader);

        let in_flight = f
            .repo
            .in_flight_transaction(f.book_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(in_flight.id, t1.id);
    }

    #[tokio::test]
    async fn only_the_lender_may_approve() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let err = f.repo.approve(t1.id, f.second_reader).await.unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedError));
    }

    #[tokio::test]
    async fn approval_is_not_repeatable() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        f.repo.approve(t1.id, f.owner).await.unwrap();
        let err = f.repo.approve(t1.id, f.owner).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn drop_and_pickup_move_the_copy_through_the_location() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        f.repo.approve(t1.id, f.owner).await.unwrap();

        let dropped = f.repo.drop_off(t1.id, f.owner).await.unwrap();
        assert_eq!(dropped.status, TransactionStatus::AwaitingPickup);
        let book = f.book().await;
        assert_eq!(book.location_id, Some(f.location_id));
        assert!(!book.available);

        let err = f.repo.pick_up(t1.id, f.second_reader).await.unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedError));

        let picked = f.repo.pick_up(t1.id, f.reader).await.unwrap();
        assert_eq!(picked.status, TransactionStatus::PickedUp);
        assert!(picked.pickup_date.is_some());
        let book = f.book().await;
        assert_eq!(book.location_id, None);
        assert!(!book.available);
    }

    #[tokio::test]
    async fn cancelling_keeps_the_book_untouched_and_is_terminal() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();

        let err = f.repo.cancel(t1.id, f.second_reader).await.unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedError));

        let cancelled = f.repo.cancel(t1.id, f.reader).await.unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        let book = f.book().await;
        assert!(book.available);
        assert!(book.location_id.is_none());

        let err = f.repo.cancel(t1.id, f.reader).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn a_finalized_return_promotes_the_oldest_waiting_request() {
        let f = Fixture::new().await;
        let third_reader = insert_user(&f.pool, "third-reader").await;

        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();
        let t3 = f.repo.admit_request(f.admit(third_reader)).await.unwrap();

        f.repo.approve(t1.id, f.owner).await.unwrap();
        f.repo.drop_off(t1.id, f.owner).await.unwrap();
        f.repo.pick_up(t1.id, f.reader).await.unwrap();
        f.repo.initiate_return(t1.id, f.reader).await.unwrap();

        let outcome = f.repo.finalize_return(t1.id, f.reader).await.unwrap();
        assert_eq!(outcome.returned.status, TransactionStatus::Returned);
        assert!(outcome.returned.return_date.is_some());

        let promoted = outcome.promoted.unwrap();
        assert_eq!(promoted.id, t2.id);
        assert_eq!(promoted.status, TransactionStatus::AwaitingPickup);
        // the promoted request still names the returning holder
        assert_eq!(promoted.lender_id, f.reader);

        let book = f.book().await;
        assert_eq!(book.location_id, Some(f.location_id));
        assert!(!book.available);

        // the rest of the queue waits on the promoted borrower now
        let remaining = f
            .repo
            .open_request_for(f.book_id, third_reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining.id, t3.id);
        assert_eq!(remaining.lender_id, f.second_reader);

        let in_flight = f
            .repo
            .in_flight_transaction(f.book_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(in_flight.id, t2.id);

        let err = f.repo.initiate_return(t1.id, f.reader).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn a_return_with_nobody_waiting_frees_the_copy() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        f.repo.approve(t1.id, f.owner).await.unwrap();
        f.repo.drop_off(t1.id, f.owner).await.unwrap();
        f.repo.pick_up(t1.id, f.reader).await.unwrap();
        f.repo.initiate_return(t1.id, f.reader).await.unwrap();

        let outcome = f.repo.finalize_return(t1.id, f.reader).await.unwrap();
        assert!(outcome.promoted.is_none());

        let book = f.book().await;
        assert!(book.available);
        assert_eq!(book.location_id, Some(f.location_id));
        assert!(f
            .repo
            .in_flight_transaction(f.book_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn a_copy_waiting_at_the_pickup_point_skips_approval() {
        let f = Fixture::new().await;
        // leave the copy resting at the club after a full cycle
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        f.repo.approve(t1.id, f.owner).await.unwrap();
        f.repo.drop_off(t1.id, f.owner).await.unwrap();
        f.repo.pick_up(t1.id, f.reader).await.unwrap();
        f.repo.initiate_return(t1.id, f.reader).await.unwrap();
        f.repo.finalize_return(t1.id, f.reader).await.unwrap();

        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();
        assert_eq!(t2.status, TransactionStatus::AwaitingPickup);
        assert_eq!(t2.lender_id, f.owner);

        let book = f.book().await;
        assert!(!book.available);
        assert_eq!(book.location_id, Some(f.location_id));

        let picked = f.repo.pick_up(t2.id, f.second_reader).await.unwrap();
        assert_eq!(picked.status, TransactionStatus::PickedUp);
    }

    #[tokio::test]
    async fn a_holder_must_pick_up_before_approving_onward() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();

        f.repo.approve(t1.id, f.owner).await.unwrap();
        f.repo.drop_off(t1.id, f.owner).await.unwrap();

        // the copy is still on the shelf waiting for the first reader
        let err = f.repo.approve(t2.id, f.reader).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        f.repo.pick_up(t1.id, f.reader).await.unwrap();
        let approved = f.repo.approve(t2.id, f.reader).await.unwrap();
        assert_eq!(approved.status, TransactionStatus::Approved);
    }

    #[tokio::test]
    async fn dropping_for_the_next_holder_closes_the_own_borrow() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();

        f.repo.approve(t1.id, f.owner).await.unwrap();
        f.repo.drop_off(t1.id, f.owner).await.unwrap();
        f.repo.pick_up(t1.id, f.reader).await.unwrap();
        f.repo.approve(t2.id, f.reader).await.unwrap();

        let dropped = f.repo.drop_off(t2.id, f.reader).await.unwrap();
        assert_eq!(dropped.status, TransactionStatus::AwaitingPickup);

        // the first borrow closed out on the way to the shelf
        let history = f.repo.find_history_by_user(f.reader, page()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, t1.id);
        assert!(history[0].return_date.is_some());

        let book = f.book().await;
        assert_eq!(book.location_id, Some(f.location_id));
    }

    #[tokio::test]
    async fn listings_follow_the_transaction_lifecycle() {
        let f = Fixture::new().await;
        let t1 = f.repo.admit_request(f.admit(f.reader)).await.unwrap();
        let t2 = f
            .repo
            .admit_request(f.admit(f.second_reader))
            .await
            .unwrap();

        // one oldest entry per book on the owner's hand-off worklist
        let lending = f.repo.find_lending_by_user(f.owner, page()).await.unwrap();
        assert_eq!(lending.len(), 1);
        assert_eq!(lending[0].id, t1.id);

        let requesting = f
            .repo
            .find_requesting_by_user(f.second_reader, page())
            .await
            .unwrap();
        assert_eq!(requesting.len(), 1);
        assert_eq!(requesting[0].id, t2.id);

        f.repo.approve(t1.id, f.owner).await.unwrap();
        f.repo.drop_off(t1.id, f.owner).await.unwrap();
        f.repo.pick_up(t1.id, f.reader).await.unwrap();

        let borrowed = f.repo.find_borrowed_by_user(f.reader, page()).await.unwrap();
        assert_eq!(borrowed.len(), 1);
        assert_eq!(borrowed[0].id, t1.id);

        f.repo.initiate_return(t1.id, f.reader).await.unwrap();
        f.repo.finalize_return(t1.id, f.reader).await.unwrap();

        let history = f.repo.find_history_by_book(f.book_id).await.unwrap();
        assert_eq!(history.len(), 2);
        let returned = history.iter().find(|t| t.id == t1.id).unwrap();
        assert_eq!(returned.status, TransactionStatus::Returned);

        assert!(f
            .repo
            .find_borrowed_by_user(f.reader, page())
            .await
            .unwrap()
            .is_empty());
    }
}
