#![allow(dead_code)]

use bookpay::application::batch::BatchOrchestrator;
use bookpay::application::bridge::PaymentCallbackBridge;
use bookpay::application::ledger::AccountLedgerService;
use bookpay::application::lifecycle::BookingLifecycleManager;
use bookpay::config::BatchConfig;
use bookpay::domain::account::Account;
use bookpay::domain::audit::Actor;
use bookpay::domain::booking::{
    Booking, BookingStatus, CancellationPolicy, PaymentMethod, PaymentStatus,
};
use bookpay::domain::money::{Amount, Currency, MoneyAmount};
use bookpay::domain::ports::{AccountStore, BookingStore};
use bookpay::domain::{AccountId, AgencyId, AgentId, BookingId};
use bookpay::infrastructure::in_memory::{
    InMemoryAgencyDirectory, InMemoryStore, RecordingNotifier, StubCardGateway, StubSupplier,
};
use bookpay::infrastructure::locker::LeaseLocker;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const PARENT_AGENCY: AgencyId = AgencyId(1);
pub const CHILD_AGENCY: AgencyId = AgencyId(2);
pub const OTHER_AGENCY: AgencyId = AgencyId(9);

/// Fully wired service stack over in-memory infrastructure.
pub struct TestEnv {
    pub store: Arc<InMemoryStore>,
    pub locker: Arc<LeaseLocker>,
    pub supplier: Arc<StubSupplier>,
    pub notifier: Arc<RecordingNotifier>,
    pub ledger: Arc<AccountLedgerService>,
    pub bridge: Arc<PaymentCallbackBridge>,
    pub lifecycle: Arc<BookingLifecycleManager>,
    pub orchestrator: BatchOrchestrator,
}

pub fn env() -> TestEnv {
    build(StubSupplier::default(), StubCardGateway::default())
}

pub fn build(supplier: StubSupplier, cards: StubCardGateway) -> TestEnv {
    let config = BatchConfig::default();
    let store = Arc::new(InMemoryStore::new());
    let locker = Arc::new(LeaseLocker::from_config(&config));
    let supplier = Arc::new(supplier);
    let notifier = Arc::new(RecordingNotifier::default());
    let agencies = Arc::new(
        InMemoryAgencyDirectory::default().with_child(PARENT_AGENCY, CHILD_AGENCY),
    );

    let ledger = Arc::new(AccountLedgerService::new(
        store.clone(),
        locker.clone(),
        agencies,
    ));
    let bridge = Arc::new(PaymentCallbackBridge::new(store.clone(), store.clone()));
    let lifecycle = Arc::new(BookingLifecycleManager::new(
        store.clone(),
        supplier.clone(),
        ledger.clone(),
        bridge.clone(),
    ));
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        lifecycle.clone(),
        ledger.clone(),
        bridge.clone(),
        Arc::new(cards),
        notifier.clone(),
        config,
    );

    TestEnv {
        store,
        locker,
        supplier,
        notifier,
        ledger,
        bridge,
        lifecycle,
        orchestrator,
    }
}

pub async fn seed_account(
    env: &TestEnv,
    id: AccountId,
    agency: AgencyId,
    currency: Currency,
    balance: Decimal,
) -> Account {
    AccountStore::insert(env.store.as_ref(), Account::new(id, agency, currency))
        .await
        .unwrap();
    if balance > Decimal::ZERO {
        env.ledger
            .add_money(
                id,
                Amount::new(balance).unwrap(),
                currency,
                "test seed",
                Actor::admin(1),
            )
            .await
            .unwrap();
    }
    AccountStore::get(env.store.as_ref(), id)
        .await
        .unwrap()
        .unwrap()
}

/// A confirmed, unpaid, account-paid USD booking owned by the parent agency.
pub fn confirmed_booking(id: u64, reference: &str, today: NaiveDate) -> Booking {
    Booking {
        id: BookingId(id),
        reference_code: reference.to_string(),
        status: BookingStatus::Confirmed,
        payment_status: PaymentStatus::NotPaid,
        payment_method: PaymentMethod::Account,
        total_price: MoneyAmount::new(dec!(200.0), Currency::Usd),
        check_in: today + chrono::Days::new(10),
        deadline: None,
        agency_id: PARENT_AGENCY,
        agent_id: AgentId(7),
        supplier: "acme-hotels".to_string(),
        cancellation_policies: vec![CancellationPolicy {
            from: today + chrono::Days::new(5),
            percent: dec!(50),
        }],
        created_at: Utc::now(),
    }
}

pub async fn insert_booking(env: &TestEnv, booking: Booking) {
    BookingStore::insert(env.store.as_ref(), booking)
        .await
        .unwrap();
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
}
