use super::id::UserId;

pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}
