use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::circulation::{
    admit_request, approve, cancel, drop_off, finalize_return, initiate_return, pick_up,
    show_borrowed, show_history, show_lending, show_requesting,
};

pub fn build_circulation_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/", post(admit_request))
        .route("/borrowed", get(show_borrowed))
        .route("/requesting", get(show_requesting))
        .route("/lending", get(show_lending))
        .route("/history", get(show_history))
        .route("/:transaction_id/approve", put(approve))
        .route("/:transaction_id/drop", put(drop_off))
        .route("/:transaction_id/pickup", put(pick_up))
        .route("/:transaction_id/cancel", put(cancel))
        .route("/:transaction_id/return/initiate", put(initiate_return))
        .route("/:transaction_id/return/finalize", put(finalize_return));

    Router::new().nest("/circulations", routers)
}
