mod common;

use bookpay::domain::audit::{Actor, AuditEventType};
use bookpay::domain::booking::{BookingStatus, PaymentMethod, PaymentStatus};
use bookpay::domain::money::{Amount, Currency, MoneyAmount};
use bookpay::domain::ports::{AccountStore, BookingStore, StatusUpdateMode, SupplierBookingStatus};
use bookpay::domain::{AccountId, AgentId, BookingId};
use bookpay::error::Error;
use bookpay::application::lifecycle::BookingDraft;
use bookpay::infrastructure::in_memory::{StubCardGateway, StubSupplier};
use chrono::{Days, Utc};
use common::{PARENT_AGENCY, build, confirmed_booking, env, insert_booking, seed_account, today};
use rust_decimal_macros::dec;

fn draft(reference: &str) -> BookingDraft {
    BookingDraft {
        reference_code: reference.to_string(),
        payment_method: PaymentMethod::Account,
        total_price: MoneyAmount::new(dec!(200.0), Currency::Usd),
        check_in: today() + Days::new(10),
        deadline: None,
        agency_id: PARENT_AGENCY,
        agent_id: AgentId(7),
        supplier: "acme-hotels".to_string(),
        cancellation_policies: Vec::new(),
    }
}

#[tokio::test]
async fn registration_starts_at_internal_processing() {
    let env = env();
    let booking = env
        .lifecycle
        .register(BookingId(1), draft("BK-1"), Utc::now())
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::InternalProcessing);
    assert_eq!(booking.payment_status, PaymentStatus::NotPaid);
}

#[tokio::test]
async fn duplicate_reference_codes_are_rejected() {
    let env = env();
    env.lifecycle
        .register(BookingId(1), draft("BK-1"), Utc::now())
        .await
        .unwrap();
    let result = env
        .lifecycle
        .register(BookingId(2), draft("BK-1"), Utc::now())
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn supplier_response_moves_the_status() {
    let env = env();
    env.lifecycle
        .register(BookingId(1), draft("BK-1"), Utc::now())
        .await
        .unwrap();
    let booking = env
        .lifecycle
        .apply_supplier_response(BookingId(1), SupplierBookingStatus::WaitingForResponse)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::WaitingForResponse);

    let booking = env
        .lifecycle
        .apply_supplier_response(BookingId(1), SupplierBookingStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Rejected);
}

#[tokio::test]
async fn confirm_and_pay_authorizes_and_confirms() {
    let env = env();
    seed_account(&env, AccountId(1), PARENT_AGENCY, Currency::Usd, dec!(500.0)).await;
    env.lifecycle
        .register(BookingId(1), draft("BK-1"), Utc::now())
        .await
        .unwrap();

    let booking = env
        .lifecycle
        .confirm_and_pay(BookingId(1), Actor::agent(7))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, PaymentStatus::Authorized);

    let entries = env.store.audit_entries(AccountId(1)).await.unwrap();
    let authorize = entries
        .iter()
        .find(|e| e.event_type == AuditEventType::Authorize)
        .unwrap();
    assert_eq!(authorize.amount, dec!(200.0));
    assert_eq!(authorize.reference_code.as_deref(), Some("BK-1"));
}

#[tokio::test]
async fn supplier_failure_compensates_the_authorization() {
    let supplier = StubSupplier {
        fail_finalize: true,
        ..Default::default()
    };
    let env = build(supplier, StubCardGateway::default());
    seed_account(&env, AccountId(1), PARENT_AGENCY, Currency::Usd, dec!(500.0)).await;
    env.lifecycle
        .register(BookingId(1), draft("BK-1"), Utc::now())
        .await
        .unwrap();

    let result = env
        .lifecycle
        .confirm_and_pay(BookingId(1), Actor::agent(7))
        .await;
    assert!(matches!(result, Err(Error::Supplier(_))));

    // The hold was voided; no authorized-but-unconfirmed state survives.
    let entries = env.store.audit_entries(AccountId(1)).await.unwrap();
    let kinds: Vec<_> = entries.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::Add,
            AuditEventType::Authorize,
            AuditEventType::Void
        ]
    );
    assert_eq!(entries.last().unwrap().balance_after, dec!(500.0));
    assert_eq!(entries.last().unwrap().authorized_after, dec!(0.0));

    let booking = BookingStore::get(env.store.as_ref(), BookingId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status, BookingStatus::PendingCancellation);
}

#[tokio::test]
async fn confirm_and_pay_rejects_bookings_marked_for_cancellation() {
    let env = env();
    seed_account(&env, AccountId(1), PARENT_AGENCY, Currency::Usd, dec!(500.0)).await;
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.status = BookingStatus::PendingCancellation;
    insert_booking(&env, booking).await;

    let result = env
        .lifecycle
        .confirm_and_pay(BookingId(1), Actor::agent(7))
        .await;
    assert!(matches!(result, Err(Error::InvalidTransition { .. })));

    // A rejected confirmation must not leave a hold on the account.
    let account = AccountStore::get(env.store.as_ref(), AccountId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.authorized, dec!(0.0));
    let entries = env.store.audit_entries(AccountId(1)).await.unwrap();
    assert_eq!(entries.len(), 1, "only the seeding entry");
}

#[tokio::test]
async fn cancelling_an_authorized_booking_releases_the_hold() {
    let env = env();
    seed_account(&env, AccountId(1), PARENT_AGENCY, Currency::Usd, dec!(500.0)).await;
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.payment_status = PaymentStatus::Authorized;
    insert_booking(&env, booking).await;
    env.ledger
        .authorize_money(
            AccountId(1),
            Amount::new(dec!(200.0)).unwrap(),
            Currency::Usd,
            "booking hold",
            Actor::agent(7),
            Some("BK-1".to_string()),
        )
        .await
        .unwrap();
    env.supplier.report(SupplierBookingStatus::Cancelled);

    let booking = env
        .lifecycle
        .cancel(BookingId(1), Actor::service(1), today())
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment_status, PaymentStatus::Voided);

    let account = AccountStore::get(env.store.as_ref(), AccountId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.authorized, dec!(0.0));
    assert_eq!(account.balance, dec!(500.0));
    let kinds: Vec<_> = env
        .store
        .audit_entries(AccountId(1))
        .await
        .unwrap()
        .iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::Add,
            AuditEventType::Authorize,
            AuditEventType::Void
        ]
    );
}

#[tokio::test]
async fn synchronous_cancellation_lands_on_cancelled() {
    let env = env();
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;
    env.supplier.report(SupplierBookingStatus::Cancelled);

    let booking = env.lifecycle.cancel(BookingId(1), Actor::service(1), today()).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(env.supplier.cancellation_calls(), 1);
}

#[tokio::test]
async fn asynchronous_cancellation_waits_in_pending() {
    let supplier = StubSupplier {
        update_mode: StatusUpdateMode::Asynchronous,
        ..Default::default()
    };
    let env = build(supplier, StubCardGateway::default());
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let booking = env.lifecycle.cancel(BookingId(1), Actor::service(1), today()).await.unwrap();
    assert_eq!(booking.status, BookingStatus::PendingCancellation);

    // The asynchronous supplier later reports the final state.
    env.supplier.report(SupplierBookingStatus::Cancelled);
    let booking = env.lifecycle.refresh_status(BookingId(1)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_is_an_idempotent_no_op() {
    let env = env();
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.status = BookingStatus::Cancelled;
    insert_booking(&env, booking).await;

    let booking = env.lifecycle.cancel(BookingId(1), Actor::service(1), today()).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(env.supplier.cancellation_calls(), 0, "no supplier round-trip");
}

#[tokio::test]
async fn cancellation_after_check_in_is_rejected() {
    let env = env();
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.check_in = today() - Days::new(1);
    insert_booking(&env, booking).await;

    let result = env.lifecycle.cancel(BookingId(1), Actor::service(1), today()).await;
    assert!(matches!(result, Err(Error::CancellationAfterCheckIn(_))));
}

#[tokio::test]
async fn only_confirmed_bookings_can_be_cancelled() {
    let env = env();
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.status = BookingStatus::Pending;
    insert_booking(&env, booking).await;

    let result = env.lifecycle.cancel(BookingId(1), Actor::service(1), today()).await;
    assert!(matches!(result, Err(Error::InvalidTransition { .. })));
}

#[tokio::test]
async fn declined_cancellation_leaves_local_state_untouched() {
    let supplier = StubSupplier {
        approve_cancellation: false,
        ..Default::default()
    };
    let env = build(supplier, StubCardGateway::default());
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let result = env.lifecycle.cancel(BookingId(1), Actor::service(1), today()).await;
    assert!(matches!(result, Err(Error::SupplierDeclined)));

    let booking = BookingStore::get(env.store.as_ref(), BookingId(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn refresh_folds_the_supplier_status_back_in() {
    let env = env();
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.status = BookingStatus::WaitingForResponse;
    insert_booking(&env, booking).await;
    env.supplier.report(SupplierBookingStatus::Confirmed);

    let booking = env.lifecycle.refresh_status(BookingId(1)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
}
