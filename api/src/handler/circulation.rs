use axum::{
    extract::{Path, Query, State},
    Json,
};
use garde::Validate;
use kernel::{
    model::{
        circulation::event::AdmitRequest,
        id::{BookId, ClubId},
    },
    notifier::CirculationNotice,
};
use registry::AppRegistry;
use shared::error::AppResult;
use uuid::Uuid;

use super::notify;
use crate::{
    extractor::AuthorizedUser,
    model::circulation::{
        AdmitRequestBody, ListQuery, ReturnOutcomeResponse, TransactionListResponse,
        TransactionResponse,
    },
};

pub async fn admit_request(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Json(req): Json<AdmitRequestBody>,
) -> AppResult<Json<TransactionResponse>> {
    req.validate(&())?;
    let event = AdmitRequest {
        book_id: req.book_id.parse::<BookId>()?,
        borrower_id: user.id(),
        club_id: req.club_id.parse::<ClubId>()?,
    };
    let created = registry
        .circulation_repository()
        .admit_request(event)
        .await?;
    notify(
        registry.notification_dispatcher(),
        CirculationNotice::RequestCreated(created.clone()),
    )
    .await;
    Ok(Json(created.into()))
}

pub async fn approve(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<TransactionResponse>> {
    let approved = registry
        .circulation_repository()
        .approve(transaction_id.into(), user.id())
        .await?;
    notify(
        registry.notification_dispatcher(),
        CirculationNotice::HandOffApproved(approved.clone()),
    )
    .await;
    Ok(Json(approved.into()))
}

pub async fn drop_off(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<TransactionResponse>> {
    let dropped = registry
        .circulation_repository()
        .drop_off(transaction_id.into(), user.id())
        .await?;
    notify(
        registry.notification_dispatcher(),
        CirculationNotice::ReadyForPickup(dropped.clone()),
    )
    .await;
    Ok(Json(dropped.into()))
}

pub async fn pick_up(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<TransactionResponse>> {
    let picked = registry
        .circulation_repository()
        .pick_up(transaction_id.into(), user.id())
        .await?;
    Ok(Json(picked.into()))
}

pub async fn cancel(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<TransactionResponse>> {
    let cancelled = registry
        .circulation_repository()
        .cancel(transaction_id.into(), user.id())
        .await?;
    Ok(Json(cancelled.into()))
}

pub async fn initiate_return(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<TransactionResponse>> {
    let initiated = registry
        .circulation_repository()
        .initiate_return(transaction_id.into(), user.id())
        .await?;
    Ok(Json(initiated.into()))
}

pub async fn finalize_return(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Json<ReturnOutcomeResponse>> {
    let outcome = registry
        .circulation_repository()
        .finalize_return(transaction_id.into(), user.id())
        .await?;
    notify(
        registry.notification_dispatcher(),
        CirculationNotice::Returned(outcome.returned.clone()),
    )
    .await;
    if let Some(promoted) = outcome.promoted.clone() {
        notify(
            registry.notification_dispatcher(),
            CirculationNotice::ReadyForPickup(promoted),
        )
        .await;
    }
    Ok(Json(outcome.into()))
}

pub async fn show_borrowed(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let (limit, offset) = (query.limit, query.offset);
    let items = registry
        .circulation_repository()
        .find_borrowed_by_user(user.id(), query.into())
        .await?;
    Ok(Json(TransactionListResponse {
        items: items.into_iter().map(Into::into).collect(),
        limit,
        offset,
    }))
}

pub async fn show_requesting(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let (limit, offset) = (query.limit, query.offset);
    let items = registry
        .circulation_repository()
        .find_requesting_by_user(user.id(), query.into())
        .await?;
    Ok(Json(TransactionListResponse {
        items: items.into_iter().map(Into::into).collect(),
        limit,
        offset,
    }))
}

pub async fn show_lending(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let (limit, offset) = (query.limit, query.offset);
    let items = registry
        .circulation_repository()
        .find_lending_by_user(user.id(), query.into())
        .await?;
    Ok(Json(TransactionListResponse {
        items: items.into_iter().map(Into::into).collect(),
        limit,
        offset,
    }))
}

pub async fn show_history(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let (limit, offset) = (query.limit, query.offset);
    let items = registry
        .circulation_repository()
        .find_history_by_user(user.id(), query.into())
        .await?;
    Ok(Json(TransactionListResponse {
        items: items.into_iter().map(Into::into).collect(),
        limit,
        offset,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use kernel::model::{
        auth::AccessToken,
        circulation::{CirculationTransaction, TransactionStatus},
        id::{TransactionId, UserId},
        user::User,
    };
    use kernel::notifier::{MockNotificationDispatcher, NotificationDispatcher};
    use kernel::repository::circulation::{CirculationRepository, MockCirculationRepository};
    use registry::MockAppRegistryExt;
    use shared::error::AppError;

    use super::*;

    fn authorized(user_id: UserId) -> AuthorizedUser {
        AuthorizedUser {
            access_token: AccessToken("test-token".into()),
            user: User {
                id: user_id,
                name: "reader".into(),
                email: "reader@example.com".into(),
            },
        }
    }

    fn transaction(borrower_id: UserId, lender_id: UserId) -> CirculationTransaction {
        CirculationTransaction {
            id: TransactionId::new(),
            book_id: BookId::new(),
            club_id: ClubId::new(),
            borrower_id,
            lender_id,
            status: TransactionStatus::Requested,
            request_date: Utc::now(),
            pickup_date: None,
            return_date: None,
        }
    }

    fn registry_with(repo: MockCirculationRepository) -> AppRegistry {
        let repo: Arc<dyn CirculationRepository> = Arc::new(repo);
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher.expect_dispatch().returning(|_| Ok(()));
        let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(dispatcher);

        let mut registry = MockAppRegistryExt::new();
        registry
            .expect_circulation_repository()
            .returning(move || repo.clone());
        registry
            .expect_notification_dispatcher()
            .returning(move || dispatcher.clone());
        Arc::new(registry)
    }

    #[tokio::test]
    async fn admitting_a_request_returns_the_created_transaction() {
        let actor = UserId::new();
        let created = transaction(actor, UserId::new());
        let expected_id = created.id.to_string();

        let mut repo = MockCirculationRepository::new();
        repo.expect_admit_request()
            .returning(move |_| Ok(created.clone()));
        let registry = registry_with(repo);

        let body = AdmitRequestBody {
            book_id: BookId::new().to_string(),
            club_id: ClubId::new().to_string(),
        };
        let Json(res) = admit_request(authorized(actor), State(registry), Json(body))
            .await
            .unwrap();
        assert_eq!(res.id, expected_id);
        assert_eq!(res.status, "Requested");
    }

    #[tokio::test]
    async fn an_empty_book_id_fails_validation() {
        let actor = UserId::new();
        let registry = registry_with(MockCirculationRepository::new());

        let body = AdmitRequestBody {
            book_id: "".into(),
            club_id: ClubId::new().to_string(),
        };
        let err = admit_request(authorized(actor), State(registry), Json(body))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn repository_errors_pass_through_untouched() {
        let actor = UserId::new();
        let mut repo = MockCirculationRepository::new();
        repo.expect_approve()
            .returning(|_, _| Err(AppError::UnauthorizedError));
        let registry = registry_with(repo);

        let err = approve(authorized(actor), State(registry), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedError));
    }
}
