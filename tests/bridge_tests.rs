mod common;

use bookpay::domain::booking::{
    BookingStatus, GatewayPaymentStatus, PaymentMethod, PaymentStatus, PaymentUpdate,
};
use bookpay::domain::money::Currency;
use bookpay::domain::AccountId;
use bookpay::error::Error;
use chrono::Days;
use common::{PARENT_AGENCY, confirmed_booking, env, insert_booking, seed_account, today};
use rust_decimal_macros::dec;

#[tokio::test]
async fn charging_amount_is_the_total_price() {
    let env = env();
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let money = env.bridge.charging_amount("BK-1").await.unwrap();
    assert_eq!(money.amount, dec!(200.0));
    assert_eq!(money.currency, Currency::Usd);
}

#[tokio::test]
async fn unknown_reference_is_an_error() {
    let env = env();
    let result = env.bridge.charging_amount("BK-404").await;
    assert!(matches!(result, Err(Error::BookingReferenceNotFound(_))));
}

#[tokio::test]
async fn discarded_bookings_refund_in_full_regardless_of_date() {
    let env = env();
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.status = BookingStatus::Discarded;
    insert_booking(&env, booking).await;

    // Far past every penalty threshold.
    let late = today() + Days::new(300);
    let money = env.bridge.refundable_amount("BK-1", late).await.unwrap();
    assert_eq!(money.amount, dec!(200.0));
}

#[tokio::test]
async fn refund_before_any_threshold_is_the_full_price() {
    let env = env();
    // The fixture's 50% threshold starts at today + 5.
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let money = env.bridge.refundable_amount("BK-1", today()).await.unwrap();
    assert_eq!(money.amount, dec!(200.0));
}

#[tokio::test]
async fn refund_after_a_half_penalty_threshold_is_half() {
    let env = env();
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let after = today() + Days::new(6);
    let money = env.bridge.refundable_amount("BK-1", after).await.unwrap();
    assert_eq!(money.amount, dec!(100.0));
}

#[tokio::test]
async fn settlement_statuses_map_onto_the_booking() {
    let env = env();
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let booking = env
        .bridge
        .process_payment_changes(&PaymentUpdate {
            reference_code: "BK-1".to_string(),
            status: GatewayPaymentStatus::Captured,
            method: PaymentMethod::CreditCard,
        })
        .await
        .unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::Captured);
    assert_eq!(booking.payment_method, PaymentMethod::CreditCard);
}

#[tokio::test]
async fn unmapped_statuses_are_skipped_but_method_persists() {
    let env = env();
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let booking = env
        .bridge
        .process_payment_changes(&PaymentUpdate {
            reference_code: "BK-1".to_string(),
            status: GatewayPaymentStatus::Failed,
            method: PaymentMethod::BankTransfer,
        })
        .await
        .unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::NotPaid);
    assert_eq!(booking.payment_method, PaymentMethod::BankTransfer);
}

#[tokio::test]
async fn charging_account_resolves_by_agency_and_currency() {
    let env = env();
    seed_account(&env, AccountId(5), PARENT_AGENCY, Currency::Usd, dec!(0.0)).await;
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let account_id = env.bridge.charging_account_id("BK-1").await.unwrap();
    assert_eq!(account_id, AccountId(5));
}

#[tokio::test]
async fn non_account_payment_methods_have_no_charging_account() {
    let env = env();
    let mut booking = confirmed_booking(1, "BK-1", today());
    booking.payment_method = PaymentMethod::CreditCard;
    insert_booking(&env, booking).await;

    let result = env.bridge.charging_account_id("BK-1").await;
    assert!(matches!(result, Err(Error::NotAccountBased(_))));
}

#[tokio::test]
async fn missing_agency_account_is_reported() {
    let env = env();
    insert_booking(&env, confirmed_booking(1, "BK-1", today())).await;

    let result = env.bridge.charging_account_id("BK-1").await;
    assert!(matches!(
        result,
        Err(Error::NoAccountForAgency {
            agency: 1,
            currency: Currency::Usd
        })
    ));
}
