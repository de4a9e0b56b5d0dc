use chrono::{DateTime, Utc};
use garde::Validate;
use kernel::model::{
    book::BookListOptions,
    circulation::{CirculationTransaction, ReturnOutcome},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdmitRequestBody {
    #[garde(length(min = 1))]
    pub book_id: String,
    #[garde(length(min = 1))]
    pub club_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl From<ListQuery> for BookListOptions {
    fn from(value: ListQuery) -> Self {
        Self {
            limit: value.limit,
            offset: value.offset,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: String,
    pub book_id: String,
    pub club_id: String,
    pub borrower_id: String,
    pub lender_id: String,
    pub status: String,
    pub request_date: DateTime<Utc>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
}

impl From<CirculationTransaction> for TransactionResponse {
    fn from(value: CirculationTransaction) -> Self {
        Self {
            id: value.id.to_string(),
            book_id: value.book_id.to_string(),
            club_id: value.club_id.to_string(),
            borrower_id: value.borrower_id.to_string(),
            lender_id: value.lender_id.to_string(),
            status: value.status.to_string(),
            request_date: value.request_date,
            pickup_date: value.pickup_date,
            return_date: value.return_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListResponse {
    pub items: Vec<TransactionResponse>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOutcomeResponse {
    pub returned: TransactionResponse,
    pub promoted: Option<TransactionResponse>,
}

impl From<ReturnOutcome> for ReturnOutcomeResponse {
    fn from(value: ReturnOutcome) -> Self {
        Self {
            returned: value.returned.into(),
            promoted: value.promoted.map(Into::into),
        }
    }
}
