use crate::domain::AccountId;
use crate::domain::booking::{
    Booking, BookingStatus, GatewayPaymentStatus, PaymentMethod, PaymentStatus, PaymentUpdate,
};
use crate::domain::money::MoneyAmount;
use crate::domain::ports::{AccountStoreRef, BookingStoreRef};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tracing::{debug, info};

/// Translates ledger/gateway payment events into booking-level truth.
///
/// This is the sole place where a payment status becomes a booking
/// `PaymentStatus`; everything else reads what it wrote.
pub struct PaymentCallbackBridge {
    bookings: BookingStoreRef,
    accounts: AccountStoreRef,
}

impl PaymentCallbackBridge {
    pub fn new(bookings: BookingStoreRef, accounts: AccountStoreRef) -> Self {
        Self { bookings, accounts }
    }

    /// Full price to charge for a booking.
    pub async fn charging_amount(&self, reference_code: &str) -> Result<MoneyAmount> {
        let booking = self.fetch(reference_code).await?;
        Ok(booking.total_price)
    }

    /// Price minus the cancellation penalty applicable at `as_of`.
    ///
    /// Bookings the supplier never confirmed (`Rejected`/`Discarded`) refund
    /// in full regardless of the date.
    pub async fn refundable_amount(
        &self,
        reference_code: &str,
        as_of: NaiveDate,
    ) -> Result<MoneyAmount> {
        let booking = self.fetch(reference_code).await?;
        if matches!(
            booking.status,
            BookingStatus::Rejected | BookingStatus::Discarded
        ) {
            return Ok(booking.total_price);
        }
        let percent = booking.penalty_percent(as_of);
        let penalty = booking.total_price.amount * percent / dec!(100);
        Ok(MoneyAmount::new(
            booking.total_price.amount - penalty,
            booking.total_price.currency,
        ))
    }

    /// Applies a payment event to the booking.
    ///
    /// Statuses with no booking-level meaning are skipped (logged), not
    /// errors: the gateway emits more states than the booking cares about.
    /// The payment method is persisted either way.
    pub async fn process_payment_changes(&self, update: &PaymentUpdate) -> Result<Booking> {
        let mut booking = self.fetch(&update.reference_code).await?;
        match map_payment_status(update.status) {
            Some(next) => {
                let previous = booking.payment_status;
                booking.set_payment_status(next)?;
                info!(
                    reference = %update.reference_code,
                    from = %previous,
                    to = %booking.payment_status,
                    "payment status applied"
                );
            }
            None => {
                debug!(
                    reference = %update.reference_code,
                    status = ?update.status,
                    "payment status skipped, no booking-level mapping"
                );
            }
        }
        booking.payment_method = update.method;
        self.bookings.update(booking.clone()).await?;
        Ok(booking)
    }

    /// Resolves `(owning agency, booking currency)` to the charging account.
    pub async fn charging_account_id(&self, reference_code: &str) -> Result<AccountId> {
        let booking = self.fetch(reference_code).await?;
        if booking.payment_method != PaymentMethod::Account {
            return Err(Error::NotAccountBased(reference_code.to_string()));
        }
        let account = self
            .accounts
            .find_by_agency(booking.agency_id, booking.total_price.currency)
            .await?
            .ok_or(Error::NoAccountForAgency {
                agency: booking.agency_id.0,
                currency: booking.total_price.currency,
            })?;
        Ok(account.id)
    }

    async fn fetch(&self, reference_code: &str) -> Result<Booking> {
        self.bookings
            .find_by_reference(reference_code)
            .await?
            .ok_or_else(|| Error::BookingReferenceNotFound(reference_code.to_string()))
    }
}

/// Gateway states with a booking-level counterpart. Exhaustive on purpose:
/// adding a gateway status forces a decision here.
fn map_payment_status(status: GatewayPaymentStatus) -> Option<PaymentStatus> {
    match status {
        GatewayPaymentStatus::Authorized => Some(PaymentStatus::Authorized),
        GatewayPaymentStatus::Captured => Some(PaymentStatus::Captured),
        GatewayPaymentStatus::Voided => Some(PaymentStatus::Voided),
        GatewayPaymentStatus::Refunded => Some(PaymentStatus::Refunded),
        GatewayPaymentStatus::Created | GatewayPaymentStatus::Failed => None,
    }
}
