use axum::{
    extract::{Path, State},
    Json,
};
use kernel::model::book::event::UpdateActivation;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};
use uuid::Uuid;

use crate::{
    extractor::AuthorizedUser,
    model::{
        book::{BookResponse, UpdateActivationBody},
        circulation::TransactionResponse,
    },
};

pub async fn show_book(
    _user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<BookResponse>> {
    let book = registry
        .book_repository()
        .find_by_id(book_id.into())
        .await?
        .ok_or_else(|| AppError::EntityNotFound("book not found".into()))?;
    Ok(Json(book.into()))
}

// the requests currently waiting on the acting user as holder
pub async fn show_queue(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Vec<TransactionResponse>>> {
    let queue = registry
        .circulation_repository()
        .queue_behind(book_id.into(), user.id())
        .await?;
    Ok(Json(queue.into_iter().map(Into::into).collect()))
}

pub async fn show_book_history(
    _user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Vec<TransactionResponse>>> {
    let history = registry
        .circulation_repository()
        .find_history_by_book(book_id.into())
        .await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

// the catalog's activation hook; refuses while custody is in flight
pub async fn update_activation(
    _user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<UpdateActivationBody>,
) -> AppResult<Json<BookResponse>> {
    let book = registry
        .book_repository()
        .set_active(UpdateActivation {
            book_id: book_id.into(),
            active: req.active,
        })
        .await?;
    Ok(Json(book.into()))
}
