use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{id::ClubId, location::Location},
    repository::location::LocationRepository,
};
use shared::error::{AppError, AppResult};

use crate::database::{model::location::LocationRow, ConnectionPool};

#[derive(new)]
pub struct LocationRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl LocationRepository for LocationRepositoryImpl {
    async fn pickup_point_for_club(&self, club_id: ClubId) -> AppResult<Option<Location>> {
        sqlx::query_as::<_, LocationRow>(
            "SELECT id, club_id, address FROM locations WHERE club_id = ?",
        )
        .bind(club_id.to_string())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?
        .map(Location::try_from)
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use kernel::model::id::LocationId;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::database::setup_schema;

    #[tokio::test]
    async fn resolves_the_club_pickup_point() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let pool = ConnectionPool::new(pool);
        setup_schema(&pool).await.unwrap();

        let club_id = ClubId::new();
        let location_id = LocationId::new();
        sqlx::query("INSERT INTO locations (id, club_id, address) VALUES (?, ?, ?)")
            .bind(location_id.to_string())
            .bind(club_id.to_string())
            .bind("clubhouse shelf")
            .execute(pool.inner_ref())
            .await
            .unwrap();

        let repo = LocationRepositoryImpl::new(pool);
        let found = repo.pickup_point_for_club(club_id).await.unwrap().unwrap();
        assert_eq!(found.id, location_id);
        assert!(repo
            .pickup_point_for_club(ClubId::new())
            .await
            .unwrap()
            .is_none());
    }
}
