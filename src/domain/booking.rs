use crate::domain::money::MoneyAmount;
use crate::domain::{AgencyId, AgentId, BookingId};
use crate::error::Error;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking lifecycle state machine.
///
/// `InternalProcessing → {Pending, WaitingForResponse} → Confirmed →
/// PendingCancellation → Cancelled`, with `Rejected`/`Discarded` reachable
/// from the early states. Terminal states are never re-opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    InternalProcessing,
    Pending,
    WaitingForResponse,
    Confirmed,
    PendingCancellation,
    Cancelled,
    Rejected,
    Discarded,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Rejected | BookingStatus::Discarded
        )
    }

    pub fn valid_transitions(self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            InternalProcessing => &[
                Pending,
                WaitingForResponse,
                Confirmed,
                PendingCancellation,
                Rejected,
                Discarded,
            ],
            Pending => &[
                WaitingForResponse,
                Confirmed,
                PendingCancellation,
                Rejected,
                Discarded,
            ],
            WaitingForResponse => &[
                Pending,
                Confirmed,
                PendingCancellation,
                Rejected,
                Discarded,
            ],
            Confirmed => &[PendingCancellation],
            PendingCancellation => &[Cancelled],
            Cancelled | Rejected | Discarded => &[],
        }
    }

    pub fn can_transition(self, to: BookingStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Payment fulfilment state machine.
///
/// `NotPaid → Authorized → Captured`; `Voided` undoes an authorization,
/// `Refunded` undoes a capture. Charge-style payments (no authorization
/// phase) go straight from `NotPaid` to `Captured`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    NotPaid,
    Authorized,
    Captured,
    Voided,
    Refunded,
}

impl PaymentStatus {
    pub fn valid_transitions(self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            NotPaid => &[Authorized, Captured],
            Authorized => &[Captured, Voided],
            Captured => &[Refunded],
            Voided | Refunded => &[],
        }
    }

    pub fn can_transition(self, to: PaymentStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Account,
    CreditCard,
    BankTransfer,
}

/// Payment status as reported by the ledger or the card gateway.
///
/// Only a subset has a booking-level meaning; the rest is skipped by the
/// payment callback bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayPaymentStatus {
    Created,
    Authorized,
    Captured,
    Voided,
    Refunded,
    Failed,
}

/// A payment event handed to the callback bridge.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub reference_code: String,
    pub status: GatewayPaymentStatus,
    pub method: PaymentMethod,
}

/// One threshold of a cancellation-penalty schedule: cancelling on or after
/// `from` forfeits `percent` of the total price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationPolicy {
    pub from: NaiveDate,
    pub percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// Unique business key correlating the booking to ledger operations.
    pub reference_code: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_price: MoneyAmount,
    pub check_in: NaiveDate,
    pub deadline: Option<NaiveDate>,
    pub agency_id: AgencyId,
    pub agent_id: AgentId,
    pub supplier: String,
    pub cancellation_policies: Vec<CancellationPolicy>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Moves the booking to `to`, rejecting transitions the state machine
    /// does not allow.
    pub fn transition(&mut self, to: BookingStatus) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Moves the payment status, treating a same-state update as a no-op so
    /// replayed gateway callbacks stay idempotent.
    pub fn set_payment_status(&mut self, to: PaymentStatus) -> Result<(), Error> {
        if self.payment_status == to {
            return Ok(());
        }
        if !self.payment_status.can_transition(to) {
            return Err(Error::InvalidTransition {
                from: self.payment_status.to_string(),
                to: to.to_string(),
            });
        }
        self.payment_status = to;
        Ok(())
    }

    /// The date by which the booking must be paid or cancelled; falls back
    /// to check-in when the supplier gave no explicit deadline.
    pub fn payment_deadline(&self) -> NaiveDate {
        self.deadline.unwrap_or(self.check_in)
    }

    /// Penalty percentage applicable at `as_of`: the latest threshold at or
    /// before that date, clamped to `[0, 100]` so a malformed schedule can
    /// never forfeit more than the price. Before the first threshold there
    /// is no penalty.
    pub fn penalty_percent(&self, as_of: NaiveDate) -> Decimal {
        self.cancellation_policies
            .iter()
            .filter(|policy| policy.from <= as_of)
            .max_by_key(|policy| policy.from)
            .map(|policy| policy.percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    }
}
