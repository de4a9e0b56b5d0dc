use chrono::{DateTime, Utc};
use kernel::model::circulation::{CirculationTransaction, TransactionStatus};
use shared::error::AppError;

#[derive(sqlx::FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub book_id: String,
    pub club_id: String,
    pub borrower_id: String,
    pub lender_id: String,
    pub status: i64,
    pub request_date: DateTime<Utc>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for CirculationTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.parse()?,
            book_id: row.book_id.parse()?,
            club_id: row.club_id.parse()?,
            borrower_id: row.borrower_id.parse()?,
            lender_id: row.lender_id.parse()?,
            status: TransactionStatus::try_from(row.status)?,
            request_date: row.request_date,
            pickup_date: row.pickup_date,
            return_date: row.return_date,
        })
    }
}
