use bookpay::application::batch::BatchOrchestrator;
use bookpay::application::bridge::PaymentCallbackBridge;
use bookpay::application::ledger::AccountLedgerService;
use bookpay::application::lifecycle::{BookingDraft, BookingLifecycleManager};
use bookpay::config::BatchConfig;
use bookpay::domain::account::Account;
use bookpay::domain::audit::Actor;
use bookpay::domain::booking::{CancellationPolicy, PaymentMethod};
use bookpay::domain::money::{Amount, Currency, MoneyAmount};
use bookpay::domain::ports::{AccountStore, SupplierBookingStatus};
use bookpay::domain::{AccountId, AgencyId, AgentId, BookingId};
use bookpay::infrastructure::in_memory::{
    InMemoryAgencyDirectory, InMemoryStore, RecordingNotifier, StubCardGateway, StubSupplier,
};
use bookpay::infrastructure::locker::LeaseLocker;
use chrono::{Days, Duration, NaiveDate, Utc};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

/// Seeds an in-memory dataset and runs one deadline sweep (capture, charge,
/// cancel, notify), printing each batch report.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Batch configuration file (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sweep date, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let config: BatchConfig = match cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).into_diagnostic()?;
            serde_json::from_str(&text).into_diagnostic()?
        }
        None => BatchConfig::default(),
    };
    let today = match cli.date {
        Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d").into_diagnostic()?,
        None => Utc::now().date_naive(),
    };

    let store = Arc::new(InMemoryStore::new());
    let locker = Arc::new(LeaseLocker::from_config(&config));
    let agencies = Arc::new(InMemoryAgencyDirectory::default());
    let supplier = Arc::new(StubSupplier::default());

    let ledger = Arc::new(AccountLedgerService::new(
        store.clone(),
        locker,
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
        bridge,
        Arc::new(StubCardGateway::default()),
        Arc::new(RecordingNotifier::default()),
        config,
    );

    seed(&store, &ledger, &lifecycle, today).await?;
    let actor = Actor::service(1);

    let ids = orchestrator.select_for_capture(today).await.into_diagnostic()?;
    println!("== capture ==\n{}", orchestrator.capture(&ids, actor).await);

    let ids = orchestrator.select_for_charge(today).await.into_diagnostic()?;
    println!("== charge ==\n{}", orchestrator.charge(&ids, actor).await);

    supplier.report(SupplierBookingStatus::Cancelled);
    let ids = orchestrator
        .select_for_cancellation(Utc::now())
        .await
        .into_diagnostic()?;
    println!(
        "== cancel ==\n{}",
        orchestrator.cancel(&ids, actor, today).await
    );

    let ids = orchestrator
        .select_for_notification(today)
        .await
        .into_diagnostic()?;
    println!(
        "== notify ==\n{}",
        orchestrator.notify_deadline_approaching(&ids).await
    );

    let account = AccountStore::get(store.as_ref(), AccountId(1))
        .await
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("seeded account missing"))?;
    println!(
        "account 1: balance {} {}, authorized {}",
        account.balance, account.currency, account.authorized
    );
    Ok(())
}

async fn seed(
    store: &Arc<InMemoryStore>,
    ledger: &Arc<AccountLedgerService>,
    lifecycle: &Arc<BookingLifecycleManager>,
    today: NaiveDate,
) -> Result<()> {
    let agency = AgencyId(10);
    store
        .insert(Account::new(AccountId(1), agency, Currency::Usd))
        .await
        .into_diagnostic()?;
    ledger
        .add_money(
            AccountId(1),
            Amount::new(dec!(1000.0)).into_diagnostic()?,
            Currency::Usd,
            "initial funding",
            Actor::admin(1),
        )
        .await
        .into_diagnostic()?;

    let draft = |reference: &str, method, price, check_in_days, deadline| BookingDraft {
        reference_code: reference.to_string(),
        payment_method: method,
        total_price: MoneyAmount::new(price, Currency::Usd),
        check_in: today + Days::new(check_in_days),
        deadline,
        agency_id: agency,
        agent_id: AgentId(7),
        supplier: "acme-hotels".to_string(),
        cancellation_policies: vec![CancellationPolicy {
            from: today,
            percent: dec!(25),
        }],
    };

    // Authorized account booking past its deadline: auto-capture target.
    let deadline = today.pred_opt();
    lifecycle
        .register(
            BookingId(1),
            draft("BK-1001", PaymentMethod::Account, dec!(300.0), 10, deadline),
            Utc::now() - Duration::days(4),
        )
        .await
        .into_diagnostic()?;
    lifecycle
        .confirm_and_pay(BookingId(1), Actor::agent(7))
        .await
        .into_diagnostic()?;

    // Confirmed but unpaid and stale: auto-cancel target.
    lifecycle
        .register(
            BookingId(2),
            draft("BK-1002", PaymentMethod::Account, dec!(150.0), 15, None),
            Utc::now() - Duration::days(5),
        )
        .await
        .into_diagnostic()?;
    lifecycle
        .apply_supplier_response(BookingId(2), SupplierBookingStatus::Confirmed)
        .await
        .into_diagnostic()?;

    // Unpaid with a deadline coming up: notification target.
    let upcoming = Some(today + Days::new(2));
    lifecycle
        .register(
            BookingId(3),
            draft("BK-1003", PaymentMethod::Account, dec!(90.0), 20, upcoming),
            Utc::now(),
        )
        .await
        .into_diagnostic()?;
    lifecycle
        .apply_supplier_response(BookingId(3), SupplierBookingStatus::Confirmed)
        .await
        .into_diagnostic()?;

    // Card booking past its deadline: auto-charge target.
    lifecycle
        .register(
            BookingId(4),
            draft("BK-1004", PaymentMethod::CreditCard, dec!(220.0), 5, deadline),
            Utc::now(),
        )
        .await
        .into_diagnostic()?;
    lifecycle
        .apply_supplier_response(BookingId(4), SupplierBookingStatus::Confirmed)
        .await
        .into_diagnostic()?;

    Ok(())
}
