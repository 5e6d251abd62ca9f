use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::money::Currency;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected before any lock is taken or row touched.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("account {0} not found")]
    AccountNotFound(u64),
    #[error("account {0} is deactivated")]
    AccountInactive(u64),
    #[error("no {currency} account for agency {agency}")]
    NoAccountForAgency { agency: u64, currency: Currency },
    #[error("insufficient funds on account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: u64,
        balance: Decimal,
        requested: Decimal,
    },
    #[error(
        "insufficient authorized funds on account {account}: authorized {authorized}, requested {requested}"
    )]
    InsufficientAuthorized {
        account: u64,
        authorized: Decimal,
        requested: Decimal,
    },
    #[error("could not lock {entity} within the wait bound")]
    LockUnavailable { entity: String },
    #[error("booking {0} not found")]
    BookingNotFound(u64),
    #[error("booking with reference {0} not found")]
    BookingReferenceNotFound(String),
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("cancellation rejected: check-in date {0} has passed")]
    CancellationAfterCheckIn(NaiveDate),
    #[error("supplier declined the cancellation")]
    SupplierDeclined,
    #[error("supplier error: {0}")]
    Supplier(String),
    #[error("card gateway error: {0}")]
    Gateway(String),
    #[error("agency {child} is not a direct child of agency {parent}")]
    NotChildAgency { parent: u64, child: u64 },
    #[error("booking {0} is not paid from an account")]
    NotAccountBased(String),
    #[error("storage error: {0}")]
    Storage(String),
}
