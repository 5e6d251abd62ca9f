use crate::application::bridge::PaymentCallbackBridge;
use crate::application::ledger::AccountLedgerService;
use crate::domain::booking::{
    Booking, BookingStatus, CancellationPolicy, GatewayPaymentStatus, PaymentMethod,
    PaymentStatus, PaymentUpdate,
};
use crate::domain::money::{Amount, Currency, MoneyAmount};
use crate::domain::ports::{
    BookingStoreRef, StatusUpdateMode, SupplierBookingStatus, SupplierGatewayRef,
};
use crate::domain::audit::Actor;
use crate::domain::{AccountId, AgencyId, AgentId, BookingId};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything needed to register a booking; ids and statuses are assigned
/// by the manager.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub reference_code: String,
    pub payment_method: PaymentMethod,
    pub total_price: MoneyAmount,
    pub check_in: NaiveDate,
    pub deadline: Option<NaiveDate>,
    pub agency_id: AgencyId,
    pub agent_id: AgentId,
    pub supplier: String,
    pub cancellation_policies: Vec<CancellationPolicy>,
}

/// Owns the booking status state machine and drives the ledger and the
/// payment bridge on its behalf.
pub struct BookingLifecycleManager {
    bookings: BookingStoreRef,
    supplier: SupplierGatewayRef,
    ledger: Arc<AccountLedgerService>,
    bridge: Arc<PaymentCallbackBridge>,
}

impl BookingLifecycleManager {
    pub fn new(
        bookings: BookingStoreRef,
        supplier: SupplierGatewayRef,
        ledger: Arc<AccountLedgerService>,
        bridge: Arc<PaymentCallbackBridge>,
    ) -> Self {
        Self {
            bookings,
            supplier,
            ledger,
            bridge,
        }
    }

    /// Creates the booking row at `InternalProcessing`.
    pub async fn register(
        &self,
        id: BookingId,
        draft: BookingDraft,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        if self
            .bookings
            .find_by_reference(&draft.reference_code)
            .await?
            .is_some()
        {
            return Err(Error::Validation(format!(
                "reference code {} is already in use",
                draft.reference_code
            )));
        }
        let booking = Booking {
            id,
            reference_code: draft.reference_code,
            status: BookingStatus::InternalProcessing,
            payment_status: PaymentStatus::NotPaid,
            payment_method: draft.payment_method,
            total_price: draft.total_price,
            check_in: draft.check_in,
            deadline: draft.deadline,
            agency_id: draft.agency_id,
            agent_id: draft.agent_id,
            supplier: draft.supplier,
            cancellation_policies: draft.cancellation_policies,
            created_at: now,
        };
        self.bookings.insert(booking.clone()).await?;
        info!(booking = id.0, reference = %booking.reference_code, "booking registered");
        Ok(booking)
    }

    /// Applies a supplier registration response to the booking status.
    pub async fn apply_supplier_response(
        &self,
        id: BookingId,
        response: SupplierBookingStatus,
    ) -> Result<Booking> {
        let mut booking = self.fetch(id).await?;
        let next = map_supplier_status(response);
        if booking.status != next {
            let previous = booking.status;
            booking.transition(next)?;
            self.bookings.update(booking.clone()).await?;
            info!(booking = id.0, from = %previous, to = %next, "supplier response applied");
        }
        Ok(booking)
    }

    /// Secures funds on the charging account, then finalizes with the
    /// supplier.
    ///
    /// A supplier failure after the money was authorized is compensated:
    /// the hold is voided and the booking is marked for cancellation, so no
    /// authorized-but-unconfirmed state survives the call.
    pub async fn confirm_and_pay(&self, id: BookingId, actor: Actor) -> Result<Booking> {
        let booking = self.fetch(id).await?;
        if !booking.status.can_transition(BookingStatus::Confirmed) {
            return Err(Error::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Confirmed.to_string(),
            });
        }

        let account_id = self.bridge.charging_account_id(&booking.reference_code).await?;
        let amount = Amount::new(booking.total_price.amount)?;
        let currency = booking.total_price.currency;
        self.ledger
            .authorize_money(
                account_id,
                amount,
                currency,
                "booking payment authorization",
                actor,
                Some(booking.reference_code.clone()),
            )
            .await?;

        match self.supplier.finalize(&booking).await {
            Ok(()) => {
                let mut booking = self
                    .bridge
                    .process_payment_changes(&PaymentUpdate {
                        reference_code: booking.reference_code.clone(),
                        status: GatewayPaymentStatus::Authorized,
                        method: booking.payment_method,
                    })
                    .await?;
                if let Err(transition_err) = booking.transition(BookingStatus::Confirmed) {
                    warn!(
                        booking = id.0,
                        error = %transition_err,
                        "booking moved while confirming, compensating the authorization"
                    );
                    self.unwind_authorization(id, account_id, amount, currency, actor)
                        .await?;
                    return Err(transition_err);
                }
                self.bookings.update(booking.clone()).await?;
                info!(booking = id.0, "booking confirmed with funds authorized");
                Ok(booking)
            }
            Err(supplier_err) => {
                warn!(
                    booking = id.0,
                    error = %supplier_err,
                    "supplier rejected finalization, compensating the authorization"
                );
                self.unwind_authorization(id, account_id, amount, currency, actor)
                    .await?;
                Err(supplier_err)
            }
        }
    }

    /// Unwinds a hold taken by `confirm_and_pay` when the confirmation could
    /// not complete: the authorization is voided and the booking marked for
    /// cancellation, so no authorized-but-unconfirmed state survives.
    async fn unwind_authorization(
        &self,
        id: BookingId,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        actor: Actor,
    ) -> Result<()> {
        let mut booking = self.fetch(id).await?;
        self.ledger
            .void_money(
                account_id,
                amount,
                currency,
                "compensating void after failed confirmation",
                actor,
                Some(booking.reference_code.clone()),
            )
            .await?;
        if booking.payment_status == PaymentStatus::Authorized {
            booking.set_payment_status(PaymentStatus::Voided)?;
        }
        if booking.status.can_transition(BookingStatus::PendingCancellation) {
            booking.transition(BookingStatus::PendingCancellation)?;
        }
        self.bookings.update(booking).await
    }

    /// Returns a cancelled booking's authorized hold to its account and
    /// records the void on the payment status.
    async fn release_hold(&self, booking: &Booking, actor: Actor) -> Result<Booking> {
        let account_id = self
            .bridge
            .charging_account_id(&booking.reference_code)
            .await?;
        let amount = Amount::new(booking.total_price.amount)?;
        self.ledger
            .void_money(
                account_id,
                amount,
                booking.total_price.currency,
                "cancellation released the hold",
                actor,
                Some(booking.reference_code.clone()),
            )
            .await?;
        self.bridge
            .process_payment_changes(&PaymentUpdate {
                reference_code: booking.reference_code.clone(),
                status: GatewayPaymentStatus::Voided,
                method: booking.payment_method,
            })
            .await
    }

    /// Cancels a confirmed booking.
    ///
    /// Already-cancelled bookings short-circuit as an idempotent success
    /// without touching the supplier. The supplier is asked first; a decline
    /// leaves local state untouched. On approval the booking moves to
    /// `PendingCancellation` synchronously, an account-paid authorized hold
    /// is voided back to the account, and, when the supplier reports
    /// synchronously, the status refreshes straight to `Cancelled`.
    pub async fn cancel(&self, id: BookingId, actor: Actor, today: NaiveDate) -> Result<Booking> {
        let mut booking = self.fetch(id).await?;
        if booking.status == BookingStatus::Cancelled {
            info!(booking = id.0, "already cancelled, nothing to do");
            return Ok(booking);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(Error::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }
        if today > booking.check_in {
            return Err(Error::CancellationAfterCheckIn(booking.check_in));
        }

        let decision = self.supplier.confirm_cancellation(&booking).await?;
        if !decision.approved {
            warn!(booking = id.0, "supplier declined the cancellation");
            return Err(Error::SupplierDeclined);
        }

        booking.transition(BookingStatus::PendingCancellation)?;
        self.bookings.update(booking.clone()).await?;
        info!(booking = id.0, mode = ?decision.update_mode, "cancellation accepted");

        // Card authorizations are the gateway's to void; the ledger only
        // holds account-paid funds.
        if booking.payment_status == PaymentStatus::Authorized
            && booking.payment_method == PaymentMethod::Account
        {
            booking = self.release_hold(&booking, actor).await?;
        }

        match decision.update_mode {
            StatusUpdateMode::Synchronous => self.refresh_status(id).await,
            StatusUpdateMode::Asynchronous => Ok(booking),
        }
    }

    /// Re-queries the supplier and folds the reported status back into the
    /// booking.
    pub async fn refresh_status(&self, id: BookingId) -> Result<Booking> {
        let mut booking = self.fetch(id).await?;
        let remote = self.supplier.current_status(&booking).await?;
        let next = map_supplier_status(remote);
        if booking.status != next {
            let previous = booking.status;
            booking.transition(next)?;
            self.bookings.update(booking.clone()).await?;
            info!(booking = id.0, from = %previous, to = %next, "status refreshed");
        }
        Ok(booking)
    }

    async fn fetch(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or(Error::BookingNotFound(id.0))
    }
}

fn map_supplier_status(status: SupplierBookingStatus) -> BookingStatus {
    match status {
        SupplierBookingStatus::Confirmed => BookingStatus::Confirmed,
        SupplierBookingStatus::Pending => BookingStatus::Pending,
        SupplierBookingStatus::WaitingForResponse => BookingStatus::WaitingForResponse,
        SupplierBookingStatus::Cancelled => BookingStatus::Cancelled,
        SupplierBookingStatus::Rejected => BookingStatus::Rejected,
    }
}
