use std::sync::Arc;

use adapter::{
    database::ConnectionPool,
    notifier::TracingNotificationDispatcher,
    repository::{
        auth::AuthRepositoryImpl, book::BookRepositoryImpl,
        circulation::CirculationRepositoryImpl, location::LocationRepositoryImpl,
        user::UserRepositoryImpl,
    },
};
use kernel::{
    notifier::NotificationDispatcher,
    repository::{
        auth::AuthRepository, book::BookRepository, circulation::CirculationRepository,
        location::LocationRepository, user::UserRepository,
    },
};

/// The handler layer resolves every collaborator through this trait, which
/// keeps handlers testable against mock registries.
#[mockall::automock]
pub trait AppRegistryExt: Send + Sync {
    fn circulation_repository(&self) -> Arc<dyn CirculationRepository>;
    fn book_repository(&self) -> Arc<dyn BookRepository>;
    fn location_repository(&self) -> Arc<dyn LocationRepository>;
    fn auth_repository(&self) -> Arc<dyn AuthRepository>;
    fn user_repository(&self) -> Arc<dyn UserRepository>;
    fn notification_dispatcher(&self) -> Arc<dyn NotificationDispatcher>;
}

pub type AppRegistry = Arc<dyn AppRegistryExt>;

#[derive(Clone)]
pub struct AppRegistryImpl {
    circulation_repository: Arc<dyn CirculationRepository>,
    book_repository: Arc<dyn BookRepository>,
    location_repository: Arc<dyn LocationRepository>,
    auth_repository: Arc<dyn AuthRepository>,
    user_repository: Arc<dyn UserRepository>,
    notification_dispatcher: Arc<dyn NotificationDispatcher>,
}

impl AppRegistryImpl {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            circulation_repository: Arc::new(CirculationRepositoryImpl::new(pool.clone())),
            book_repository: Arc::new(BookRepositoryImpl::new(pool.clone())),
            location_repository: Arc::new(LocationRepositoryImpl::new(pool.clone())),
            auth_repository: Arc::new(AuthRepositoryImpl::new(pool.clone())),
            user_repository: Arc::new(UserRepositoryImpl::new(pool)),
            notification_dispatcher: Arc::new(TracingNotificationDispatcher::new()),
        }
    }
}

impl AppRegistryExt for AppRegistryImpl {
    fn circulation_repository(&self) -> Arc<dyn CirculationRepository> {
        self.circulation_repository.clone()
    }

    fn book_repository(&self) -> Arc<dyn BookRepository> {
        self.book_repository.clone()
    }

    fn location_repository(&self) -> Arc<dyn LocationRepository> {
        self.location_repository.clone()
    }

    fn auth_repository(&self) -> Arc<dyn AuthRepository> {
        self.auth_repository.clone()
    }

    fn user_repository(&self) -> Arc<dyn UserRepository> {
        self.user_repository.clone()
    }

    fn notification_dispatcher(&self) -> Arc<dyn NotificationDispatcher> {
        self.notification_dispatcher.clone()
    }
}
