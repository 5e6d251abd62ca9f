use crate::application::bridge::PaymentCallbackBridge;
use crate::application::ledger::AccountLedgerService;
use crate::application::lifecycle::BookingLifecycleManager;
use crate::config::BatchConfig;
use crate::domain::BookingId;
use crate::domain::audit::Actor;
use crate::domain::booking::{
    Booking, GatewayPaymentStatus, PaymentMethod, PaymentStatus, PaymentUpdate,
};
use crate::domain::money::Amount;
use crate::domain::ports::{BookingStoreRef, CardGatewayRef, DeadlineNotifierRef};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Ordered per-item outcome of a batch run, one line per input id.
///
/// A failed item becomes a failure line, never an error for the whole batch;
/// callers always get the full report back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    lines: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Drives deadline-driven operations across many bookings.
///
/// Selection queries are pure reads; apply operations process each id
/// independently so one bad booking cannot abort the rest. Duplicate ids in
/// one batch are applied once and reported as no-ops afterwards.
pub struct BatchOrchestrator {
    bookings: BookingStoreRef,
    lifecycle: Arc<BookingLifecycleManager>,
    ledger: Arc<AccountLedgerService>,
    bridge: Arc<PaymentCallbackBridge>,
    cards: CardGatewayRef,
    notifier: DeadlineNotifierRef,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(
        bookings: BookingStoreRef,
        lifecycle: Arc<BookingLifecycleManager>,
        ledger: Arc<AccountLedgerService>,
        bridge: Arc<PaymentCallbackBridge>,
        cards: CardGatewayRef,
        notifier: DeadlineNotifierRef,
        config: BatchConfig,
    ) -> Self {
        Self {
            bookings,
            lifecycle,
            ledger,
            bridge,
            cards,
            notifier,
            config,
        }
    }

    /// Unpaid bookings past the grace window.
    pub async fn select_for_cancellation(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>> {
        let cutoff = now - Duration::hours(self.config.cancellation_grace_hours);
        self.bookings.ids_for_cancellation(cutoff).await
    }

    /// Authorized account payments whose deadline has arrived.
    pub async fn select_for_capture(&self, date: NaiveDate) -> Result<Vec<BookingId>> {
        self.bookings.ids_for_capture(date).await
    }

    /// Card/bank-transfer payments whose deadline has arrived.
    pub async fn select_for_charge(&self, date: NaiveDate) -> Result<Vec<BookingId>> {
        self.bookings.ids_for_charge(date).await
    }

    /// Bookings whose deadline falls inside the notification window.
    pub async fn select_for_notification(&self, today: NaiveDate) -> Result<Vec<BookingId>> {
        self.bookings
            .ids_with_deadline_within(today, self.config.notification_window_days)
            .await
    }

    pub async fn cancel(&self, ids: &[BookingId], actor: Actor, today: NaiveDate) -> BatchReport {
        info!(count = ids.len(), actor = actor.id, "batch cancellation started");
        self.run(ids, move |id| async move {
            let booking = self.lifecycle.cancel(id, actor, today).await?;
            Ok(format!(
                "booking {id}: cancellation applied, status {}",
                booking.status
            ))
        })
        .await
    }

    pub async fn capture(&self, ids: &[BookingId], actor: Actor) -> BatchReport {
        info!(count = ids.len(), actor = actor.id, "batch capture started");
        self.run(ids, move |id| self.capture_one(id, actor)).await
    }

    pub async fn charge(&self, ids: &[BookingId], actor: Actor) -> BatchReport {
        info!(count = ids.len(), actor = actor.id, "batch charge started");
        self.run(ids, move |id| self.charge_one(id, actor)).await
    }

    pub async fn notify_deadline_approaching(&self, ids: &[BookingId]) -> BatchReport {
        info!(count = ids.len(), "batch deadline notification started");
        self.run(ids, move |id| self.notify_one(id)).await
    }

    /// Shared per-item loop: dedupe, isolate failures, keep going.
    async fn run<'a, F, Fut>(&'a self, ids: &[BookingId], mut apply: F) -> BatchReport
    where
        F: FnMut(BookingId) -> Fut,
        Fut: Future<Output = Result<String>> + 'a,
    {
        let mut report = BatchReport::new();
        let mut seen = HashSet::new();
        for &id in ids {
            if !seen.insert(id) {
                report.push(format!("booking {id}: already processed in this batch"));
                continue;
            }
            match apply(id).await {
                Ok(line) => report.push(line),
                Err(err) => {
                    warn!(booking = id.0, error = %err, "batch item failed");
                    report.push(format!("booking {id}: failed: {err}"));
                }
            }
        }
        report
    }

    async fn capture_one(&self, id: BookingId, actor: Actor) -> Result<String> {
        let booking = self.fetch(id).await?;
        if booking.payment_status != PaymentStatus::Authorized {
            return Err(Error::Validation(format!(
                "payment is {}, not Authorized",
                booking.payment_status
            )));
        }
        let account_id = self.bridge.charging_account_id(&booking.reference_code).await?;
        let amount = Amount::new(booking.total_price.amount)?;
        self.ledger
            .capture_money(
                account_id,
                amount,
                booking.total_price.currency,
                "deadline auto-capture",
                actor,
                Some(booking.reference_code.clone()),
            )
            .await?;
        self.bridge
            .process_payment_changes(&PaymentUpdate {
                reference_code: booking.reference_code.clone(),
                status: GatewayPaymentStatus::Captured,
                method: booking.payment_method,
            })
            .await?;
        Ok(format!("booking {id}: captured {}", booking.total_price))
    }

    async fn charge_one(&self, id: BookingId, _actor: Actor) -> Result<String> {
        let booking = self.fetch(id).await?;
        if booking.payment_method == PaymentMethod::Account {
            return Err(Error::NotAccountBased(format!(
                "{} is account-paid, capture applies instead",
                booking.reference_code
            )));
        }
        if booking.payment_status != PaymentStatus::NotPaid {
            return Err(Error::Validation(format!(
                "payment is {}, not NotPaid",
                booking.payment_status
            )));
        }
        let status = self.cards.charge(&booking).await?;
        if status != GatewayPaymentStatus::Captured {
            return Err(Error::Gateway(format!(
                "card charge not settled, gateway returned {status:?}"
            )));
        }
        self.bridge
            .process_payment_changes(&PaymentUpdate {
                reference_code: booking.reference_code.clone(),
                status,
                method: booking.payment_method,
            })
            .await?;
        Ok(format!("booking {id}: charged {}", booking.total_price))
    }

    async fn notify_one(&self, id: BookingId) -> Result<String> {
        let booking = self.fetch(id).await?;
        let deadline = booking.payment_deadline();
        self.notifier
            .deadline_approaching(&booking, deadline)
            .await?;
        Ok(format!("booking {id}: deadline {deadline} notification sent"))
    }

    async fn fetch(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or(Error::BookingNotFound(id.0))
    }
}
