use kernel::model::location::Location;
use shared::error::AppError;

#[derive(sqlx::FromRow)]
pub struct LocationRow {
    pub id: String,
    pub club_id: String,
    pub address: String,
}

impl TryFrom<LocationRow> for Location {
    type Error = AppError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.parse()?,
            club_id: row.club_id.parse()?,
            address: row.address,
        })
    }
}
