use kernel::model::user::User;
use shared::error::AppError;

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.parse()?,
            name: row.name,
            email: row.email,
        })
    }
}
