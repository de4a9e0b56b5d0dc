use kernel::model::book::Book;
use shared::error::AppError;

#[derive(sqlx::FromRow)]
pub struct BookRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub owner_id: String,
    pub club_id: String,
    pub is_available: bool,
    pub location_id: Option<String>,
    pub is_active: bool,
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.parse()?,
            title: row.title,
            author: row.author,
            owner_id: row.owner_id.parse()?,
            club_id: row.club_id.parse()?,
            available: row.is_available,
            location_id: row.location_id.map(|v| v.parse()).transpose()?,
            active: row.is_active,
        })
    }
}
