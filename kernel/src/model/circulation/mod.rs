use chrono::{DateTime, Utc};
use shared::error::AppError;

use super::id::{BookId, ClubId, TransactionId, UserId};

pub mod event;

/// Custody states of a hand-off. The discriminants are the storage codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum TransactionStatus {
    Requested = 1,
    Approved = 2,
    Cancelled = 3,
    AwaitingPickup = 4,
    PickedUp = 5,
    ReturnInitiated = 6,
    Returned = 7,
}

impl TransactionStatus {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Terminal states accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// The states that carry exclusive custody of the copy. At most one
    /// transaction per book may sit in any of these at a time.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::AwaitingPickup | Self::PickedUp | Self::ReturnInitiated
        )
    }
}

impl TryFrom<i64> for TransactionStatus {
    type Error = AppError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Requested),
            2 => Ok(Self::Approved),
            3 => Ok(Self::Cancelled),
            4 => Ok(Self::AwaitingPickup),
            5 => Ok(Self::PickedUp),
            6 => Ok(Self::ReturnInitiated),
            7 => Ok(Self::Returned),
            v => Err(AppError::ConversionEntityError(format!(
                "unknown transaction status code: {v}"
            ))),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Requested => "Requested",
            Self::Approved => "Approved",
            Self::Cancelled => "Cancelled",
            Self::AwaitingPickup => "AwaitingPickup",
            Self::PickedUp => "PickedUp",
            Self::ReturnInitiated => "ReturnInitiated",
            Self::Returned => "Returned",
        };
        f.write_str(label)
    }
}

/// One custody request/hand-off. Rows are never deleted; they mutate in
/// place until they reach a terminal status. `lender_id` names whoever the
/// borrower must currently deal with, which is rewritten as custody moves
/// down the chain.
#[derive(Debug, Clone)]
pub struct CirculationTransaction {
    pub id: TransactionId,
    pub book_id: BookId,
    pub club_id: ClubId,
    pub borrower_id: UserId,
    pub lender_id: UserId,
    pub status: TransactionStatus,
    pub request_date: DateTime<Utc>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
}

/// Outcome of a finalized return: the closed transaction plus the queued
/// request promoted to the pickup point, when the queue was non-empty.
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub returned: CirculationTransaction,
    pub promoted: Option<CirculationTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CirculationAction {
    Approve,
    Drop,
    Pickup,
    Cancel,
    InitiateReturn,
    FinalizeReturn,
}

impl CirculationAction {
    /// The status a transaction must hold before the action, and the status
    /// it lands in afterwards.
    pub fn transition(self) -> (TransactionStatus, TransactionStatus) {
        match self {
            Self::Approve => (TransactionStatus::Requested, TransactionStatus::Approved),
            Self::Drop => (
                TransactionStatus::Approved,
                TransactionStatus::AwaitingPickup,
            ),
            Self::Pickup => (
                TransactionStatus::AwaitingPickup,
                TransactionStatus::PickedUp,
            ),
            Self::Cancel => (TransactionStatus::Requested, TransactionStatus::Cancelled),
            Self::InitiateReturn => (
                TransactionStatus::PickedUp,
                TransactionStatus::ReturnInitiated,
            ),
            Self::FinalizeReturn => (
                TransactionStatus::ReturnInitiated,
                TransactionStatus::Returned,
            ),
        }
    }
}

/// Per-action actor check. Approve and drop belong to the lender side of the
/// hand-off, everything else to the borrower. Violations surface as
/// `Unauthorized`, never as a silent no-op.
pub fn permit(
    action: CirculationAction,
    transaction: &CirculationTransaction,
    actor_id: UserId,
) -> bool {
    match action {
        CirculationAction::Approve | CirculationAction::Drop => {
            transaction.lender_id == actor_id
        }
        CirculationAction::Pickup
        | CirculationAction::Cancel
        | CirculationAction::InitiateReturn
        | CirculationAction::FinalizeReturn => transaction.borrower_id == actor_id,
    }
}
