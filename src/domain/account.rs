use crate::domain::money::{Amount, Currency};
use crate::domain::{AccountId, AgencyId};
use crate::error::Error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A currency-denominated balance owned by an agency.
///
/// `balance` holds spendable funds; `authorized` holds funds reserved for
/// bookings but not yet captured. Neither may be driven negative by a single
/// operation, and the check happens before the mutation so a failed operation
/// leaves the row untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub agency_id: AgencyId,
    /// Immutable after creation.
    pub currency: Currency,
    pub balance: Decimal,
    pub authorized: Decimal,
    pub is_active: bool,
}

impl Account {
    pub fn new(id: AccountId, agency_id: AgencyId, currency: Currency) -> Self {
        Self {
            id,
            agency_id,
            currency,
            balance: Decimal::ZERO,
            authorized: Decimal::ZERO,
            is_active: true,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "balance went negative: {}",
            self.balance
        );
        debug_assert!(
            self.authorized >= Decimal::ZERO,
            "authorized balance went negative: {}",
            self.authorized
        );
    }

    /// Increases the spendable balance.
    pub fn add(&mut self, amount: Amount) {
        self.balance += amount.value();
        self.assert_invariants();
    }

    /// Decreases the spendable balance.
    pub fn charge(&mut self, amount: Amount) -> Result<(), Error> {
        if self.balance < amount.value() {
            return Err(Error::InsufficientFunds {
                account: self.id.0,
                balance: self.balance,
                requested: amount.value(),
            });
        }
        self.balance -= amount.value();
        self.assert_invariants();
        Ok(())
    }

    /// Moves funds from the spendable balance into the authorized hold.
    pub fn authorize(&mut self, amount: Amount) -> Result<(), Error> {
        if self.balance < amount.value() {
            return Err(Error::InsufficientFunds {
                account: self.id.0,
                balance: self.balance,
                requested: amount.value(),
            });
        }
        self.balance -= amount.value();
        self.authorized += amount.value();
        self.assert_invariants();
        Ok(())
    }

    /// Consumes an authorized hold. The money already left `balance` at
    /// authorization time, so only `authorized` shrinks here.
    pub fn capture(&mut self, amount: Amount) -> Result<(), Error> {
        if self.authorized < amount.value() {
            return Err(Error::InsufficientAuthorized {
                account: self.id.0,
                authorized: self.authorized,
                requested: amount.value(),
            });
        }
        self.authorized -= amount.value();
        self.assert_invariants();
        Ok(())
    }

    /// Reverses an authorization, restoring the spendable balance.
    pub fn void_authorization(&mut self, amount: Amount) -> Result<(), Error> {
        if self.authorized < amount.value() {
            return Err(Error::InsufficientAuthorized {
                account: self.id.0,
                authorized: self.authorized,
                requested: amount.value(),
            });
        }
        self.authorized -= amount.value();
        self.balance += amount.value();
        self.assert_invariants();
        Ok(())
    }

    /// Soft-disable. Deactivated accounts reject every ledger operation but
    /// the row and its history stay in place.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
