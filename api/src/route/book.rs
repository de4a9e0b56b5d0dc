use axum::{
    routing::{get, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::book::{show_book, show_book_history, show_queue, update_activation};

pub fn build_book_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/:book_id", get(show_book))
        .route("/:book_id/queue", get(show_queue))
        .route("/:book_id/history", get(show_book_history))
        .route("/:book_id/active", put(update_activation));

    Router::new().nest("/books", routers)
}
