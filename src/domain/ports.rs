use crate::domain::account::Account;
use crate::domain::audit::AuditLogEntry;
use crate::domain::booking::{Booking, GatewayPaymentStatus};
use crate::domain::money::Currency;
use crate::domain::{AccountId, AgencyId, BookingId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

/// Storage port for accounts and their audit trail.
///
/// `commit` and `commit_transfer` are the only ways a balance change reaches
/// storage, and each persists the mutated row(s) together with the audit
/// entry(ies) in one transaction: both land or neither does.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: AccountId) -> Result<Option<Account>>;

    /// Resolves the account a booking charges against.
    async fn find_by_agency(
        &self,
        agency: AgencyId,
        currency: Currency,
    ) -> Result<Option<Account>>;

    async fn insert(&self, account: Account) -> Result<()>;

    /// Persists one mutated account and its audit entry atomically.
    async fn commit(&self, account: Account, entry: AuditLogEntry) -> Result<()>;

    /// Persists both sides of a transfer and their audit entries atomically.
    async fn commit_transfer(
        &self,
        payer: Account,
        recipient: Account,
        entries: [AuditLogEntry; 2],
    ) -> Result<()>;

    /// Soft-disables every account of an agency; returns how many changed.
    async fn deactivate_agency_accounts(&self, agency: AgencyId) -> Result<u32>;

    async fn audit_entries(&self, id: AccountId) -> Result<Vec<AuditLogEntry>>;
}

/// Storage port for bookings, including the batch selection reads.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;

    async fn find_by_reference(&self, reference_code: &str) -> Result<Option<Booking>>;

    async fn insert(&self, booking: Booking) -> Result<()>;

    async fn update(&self, booking: Booking) -> Result<()>;

    /// Not-yet-captured bookings in active states, created before the grace
    /// cutoff.
    async fn ids_for_cancellation(&self, created_before: DateTime<Utc>) -> Result<Vec<BookingId>>;

    /// Account-paid bookings with an authorized hold whose deadline is on or
    /// before `date`.
    async fn ids_for_capture(&self, date: NaiveDate) -> Result<Vec<BookingId>>;

    /// Card/bank-transfer bookings still unpaid whose deadline is on or
    /// before `date`.
    async fn ids_for_charge(&self, date: NaiveDate) -> Result<Vec<BookingId>>;

    /// Unsettled bookings with a payment deadline inside
    /// `[today, today + window_days]`.
    async fn ids_with_deadline_within(
        &self,
        today: NaiveDate,
        window_days: u32,
    ) -> Result<Vec<BookingId>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Booking,
}

/// Proof of lock ownership, handed back on release. Stale tokens (a lease
/// that expired and was stolen) release as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(pub u64);

/// Named mutual exclusion keyed by `(kind, id)`.
///
/// Serializes every check-then-mutate sequence on one account. Acquisition
/// waits a bounded time and fails with `Error::LockUnavailable` instead of
/// blocking forever; re-entrant acquisition is not supported.
#[async_trait]
pub trait EntityLocker: Send + Sync {
    async fn acquire(&self, kind: EntityKind, id: u64) -> Result<LockToken>;

    async fn release(&self, kind: EntityKind, id: u64, token: LockToken);
}

/// How a supplier delivers status updates after a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdateMode {
    /// The final status is available right away; refresh synchronously.
    Synchronous,
    /// The supplier pushes the final status later; leave the booking in
    /// `PendingCancellation` until a refresh arrives.
    Asynchronous,
}

#[derive(Debug, Clone, Copy)]
pub struct CancellationDecision {
    pub approved: bool,
    pub update_mode: StatusUpdateMode,
}

/// Booking status as the supplier reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierBookingStatus {
    Confirmed,
    Pending,
    WaitingForResponse,
    Cancelled,
    Rejected,
}

/// Accommodation supplier, consumed as opaque success/failure.
#[async_trait]
pub trait SupplierGateway: Send + Sync {
    /// Asks the supplier to approve a cancellation. Called before any local
    /// mutation; a declined decision must leave the booking untouched.
    async fn confirm_cancellation(&self, booking: &Booking) -> Result<CancellationDecision>;

    async fn current_status(&self, booking: &Booking) -> Result<SupplierBookingStatus>;

    /// Finalizes a registration once funds are secured.
    async fn finalize(&self, booking: &Booking) -> Result<()>;
}

/// Card/bank gateway for deadline-triggered charges. The wire protocol is
/// out of scope; only the resulting status matters here.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn charge(&self, booking: &Booking) -> Result<GatewayPaymentStatus>;
}

/// Agency hierarchy lookups for inter-agency transfers.
#[async_trait]
pub trait AgencyDirectory: Send + Sync {
    async fn is_direct_child(&self, parent: AgencyId, child: AgencyId) -> Result<bool>;
}

/// Outbound deadline notifications. Templating and delivery live elsewhere.
#[async_trait]
pub trait DeadlineNotifier: Send + Sync {
    async fn deadline_approaching(&self, booking: &Booking, deadline: NaiveDate) -> Result<()>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type EntityLockerRef = Arc<dyn EntityLocker>;
pub type SupplierGatewayRef = Arc<dyn SupplierGateway>;
pub type CardGatewayRef = Arc<dyn CardGateway>;
pub type AgencyDirectoryRef = Arc<dyn AgencyDirectory>;
pub type DeadlineNotifierRef = Arc<dyn DeadlineNotifier>;
