use crate::domain::account::Account;
use crate::domain::audit::AuditLogEntry;
use crate::domain::booking::{Booking, GatewayPaymentStatus, PaymentMethod, PaymentStatus};
use crate::domain::money::Currency;
use crate::domain::ports::{
    AccountStore, AgencyDirectory, BookingStore, CancellationDecision, CardGateway,
    DeadlineNotifier, StatusUpdateMode, SupplierBookingStatus, SupplierGateway,
};
use crate::domain::{AccountId, AgencyId, BookingId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Everything behind one `RwLock` so a commit of row + audit entry (or of a
/// two-account transfer) is atomic, mirroring the transactional contract of
/// the real storage engine.
#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    audit: Vec<AuditLogEntry>,
    next_audit_id: u64,
    bookings: HashMap<BookingId, Booking>,
}

impl State {
    fn append_audit(&mut self, mut entry: AuditLogEntry) {
        self.next_audit_id += 1;
        entry.id = self.next_audit_id;
        self.audit.push(entry);
    }
}

/// In-memory account and booking store for tests and the demo driver.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn find_by_agency(
        &self,
        agency: AgencyId,
        currency: Currency,
    ) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.agency_id == agency && a.currency == currency)
            .cloned())
    }

    async fn insert(&self, account: Account) -> Result<()> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(Error::Storage(format!(
                "account {} already exists",
                account.id
            )));
        }
        state.accounts.insert(account.id, account);
        Ok(())
    }

    async fn commit(&self, account: Account, entry: AuditLogEntry) -> Result<()> {
        let mut state = self.state.write().await;
        state.accounts.insert(account.id, account);
        state.append_audit(entry);
        Ok(())
    }

    async fn commit_transfer(
        &self,
        payer: Account,
        recipient: Account,
        entries: [AuditLogEntry; 2],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.accounts.insert(payer.id, payer);
        state.accounts.insert(recipient.id, recipient);
        for entry in entries {
            state.append_audit(entry);
        }
        Ok(())
    }

    async fn deactivate_agency_accounts(&self, agency: AgencyId) -> Result<u32> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for account in state.accounts.values_mut() {
            if account.agency_id == agency && account.is_active {
                account.deactivate();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn audit_entries(&self, id: AccountId) -> Result<Vec<AuditLogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .filter(|entry| entry.account_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference_code: &str) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.reference_code == reference_code)
            .cloned())
    }

    async fn insert(&self, booking: Booking) -> Result<()> {
        let mut state = self.state.write().await;
        if state.bookings.contains_key(&booking.id) {
            return Err(Error::Storage(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        state.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.bookings.contains_key(&booking.id) {
            return Err(Error::BookingNotFound(booking.id.0));
        }
        state.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn ids_for_cancellation(&self, created_before: DateTime<Utc>) -> Result<Vec<BookingId>> {
        let state = self.state.read().await;
        let mut ids: Vec<BookingId> = state
            .bookings
            .values()
            .filter(|b| {
                !b.status.is_terminal()
                    && b.status != crate::domain::booking::BookingStatus::PendingCancellation
                    && !matches!(
                        b.payment_status,
                        PaymentStatus::Captured | PaymentStatus::Refunded
                    )
                    && b.created_at < created_before
            })
            .map(|b| b.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn ids_for_capture(&self, date: NaiveDate) -> Result<Vec<BookingId>> {
        let state = self.state.read().await;
        let mut ids: Vec<BookingId> = state
            .bookings
            .values()
            .filter(|b| {
                !b.status.is_terminal()
                    && b.payment_method == PaymentMethod::Account
                    && b.payment_status == PaymentStatus::Authorized
                    && b.payment_deadline() <= date
            })
            .map(|b| b.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn ids_for_charge(&self, date: NaiveDate) -> Result<Vec<BookingId>> {
        let state = self.state.read().await;
        let mut ids: Vec<BookingId> = state
            .bookings
            .values()
            .filter(|b| {
                !b.status.is_terminal()
                    && b.payment_method != PaymentMethod::Account
                    && b.payment_status == PaymentStatus::NotPaid
                    && b.payment_deadline() <= date
            })
            .map(|b| b.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn ids_with_deadline_within(
        &self,
        today: NaiveDate,
        window_days: u32,
    ) -> Result<Vec<BookingId>> {
        let window_end = today
            .checked_add_days(Days::new(window_days as u64))
            .unwrap_or(NaiveDate::MAX);
        let state = self.state.read().await;
        let mut ids: Vec<BookingId> = state
            .bookings
            .values()
            .filter(|b| {
                !b.status.is_terminal()
                    && matches!(
                        b.payment_status,
                        PaymentStatus::NotPaid | PaymentStatus::Authorized
                    )
                    && (today..=window_end).contains(&b.payment_deadline())
            })
            .map(|b| b.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Scriptable supplier double. Counts cancellation calls so tests can assert
/// the idempotent-cancel path never reaches the supplier.
pub struct StubSupplier {
    pub approve_cancellation: bool,
    pub update_mode: StatusUpdateMode,
    pub reported_status: Mutex<SupplierBookingStatus>,
    pub fail_finalize: bool,
    pub cancellation_calls: AtomicUsize,
}

impl Default for StubSupplier {
    fn default() -> Self {
        Self {
            approve_cancellation: true,
            update_mode: StatusUpdateMode::Synchronous,
            reported_status: Mutex::new(SupplierBookingStatus::Confirmed),
            fail_finalize: false,
            cancellation_calls: AtomicUsize::new(0),
        }
    }
}

impl StubSupplier {
    pub fn cancellation_calls(&self) -> usize {
        self.cancellation_calls.load(Ordering::Relaxed)
    }

    pub fn report(&self, status: SupplierBookingStatus) {
        *self.reported_status.lock() = status;
    }
}

#[async_trait]
impl SupplierGateway for StubSupplier {
    async fn confirm_cancellation(&self, _booking: &Booking) -> Result<CancellationDecision> {
        self.cancellation_calls.fetch_add(1, Ordering::Relaxed);
        Ok(CancellationDecision {
            approved: self.approve_cancellation,
            update_mode: self.update_mode,
        })
    }

    async fn current_status(&self, _booking: &Booking) -> Result<SupplierBookingStatus> {
        Ok(*self.reported_status.lock())
    }

    async fn finalize(&self, booking: &Booking) -> Result<()> {
        if self.fail_finalize {
            return Err(Error::Supplier(format!(
                "{} rejected {}",
                booking.supplier, booking.reference_code
            )));
        }
        Ok(())
    }
}

/// Card gateway double returning a fixed outcome.
pub struct StubCardGateway {
    pub outcome: GatewayPaymentStatus,
}

impl Default for StubCardGateway {
    fn default() -> Self {
        Self {
            outcome: GatewayPaymentStatus::Captured,
        }
    }
}

#[async_trait]
impl CardGateway for StubCardGateway {
    async fn charge(&self, _booking: &Booking) -> Result<GatewayPaymentStatus> {
        Ok(self.outcome)
    }
}

/// Agency tree backed by a child → parent map.
#[derive(Default)]
pub struct InMemoryAgencyDirectory {
    parents: HashMap<AgencyId, AgencyId>,
}

impl InMemoryAgencyDirectory {
    pub fn with_child(mut self, parent: AgencyId, child: AgencyId) -> Self {
        self.parents.insert(child, parent);
        self
    }
}

#[async_trait]
impl AgencyDirectory for InMemoryAgencyDirectory {
    async fn is_direct_child(&self, parent: AgencyId, child: AgencyId) -> Result<bool> {
        Ok(self.parents.get(&child) == Some(&parent))
    }
}

/// Notifier double that records what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(BookingId, NaiveDate)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(BookingId, NaiveDate)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl DeadlineNotifier for RecordingNotifier {
    async fn deadline_approaching(&self, booking: &Booking, deadline: NaiveDate) -> Result<()> {
        self.sent.lock().push((booking.id, deadline));
        Ok(())
    }
}
