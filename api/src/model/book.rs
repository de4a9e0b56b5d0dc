use kernel::model::book::Book;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivationBody {
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub owner_id: String,
    pub club_id: String,
    pub available: bool,
    pub location_id: Option<String>,
    pub active: bool,
}

impl From<Book> for BookResponse {
    fn from(value: Book) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.title,
            author: value.author,
            owner_id: value.owner_id.to_string(),
            club_id: value.club_id.to_string(),
            available: value.available,
            location_id: value.location_id.map(|id| id.to_string()),
            active: value.active,
        }
    }
}
