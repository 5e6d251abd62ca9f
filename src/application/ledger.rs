use crate::domain::account::Account;
use crate::domain::audit::{Actor, AuditEventType, AuditLogEntry};
use crate::domain::money::{Amount, Currency};
use crate::domain::ports::{
    AccountStoreRef, AgencyDirectoryRef, EntityKind, EntityLockerRef, LockToken,
};
use crate::domain::{AccountId, AgencyId};
use crate::error::{Error, Result};
use tracing::{info, warn};

/// Balance mutations that touch a single account.
#[derive(Debug, Clone, Copy)]
enum BalanceOp {
    Add,
    Charge,
    Authorize,
    Capture,
    Void,
}

impl BalanceOp {
    fn event_type(self) -> AuditEventType {
        match self {
            BalanceOp::Add => AuditEventType::Add,
            BalanceOp::Charge => AuditEventType::Charge,
            BalanceOp::Authorize => AuditEventType::Authorize,
            BalanceOp::Capture => AuditEventType::Capture,
            BalanceOp::Void => AuditEventType::Void,
        }
    }
}

/// The only writer of account balances.
///
/// Every operation follows the same shape: validate inputs, acquire the
/// account lock, re-read the row and re-check the balance rule against fresh
/// state, then commit the mutation together with its audit entry in one
/// storage transaction. The lock is released on every exit path.
pub struct AccountLedgerService {
    accounts: AccountStoreRef,
    locker: EntityLockerRef,
    agencies: AgencyDirectoryRef,
}

impl AccountLedgerService {
    pub fn new(
        accounts: AccountStoreRef,
        locker: EntityLockerRef,
        agencies: AgencyDirectoryRef,
    ) -> Self {
        Self {
            accounts,
            locker,
            agencies,
        }
    }

    pub async fn add_money(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        reason: &str,
        actor: Actor,
    ) -> Result<Account> {
        self.mutate(account_id, BalanceOp::Add, amount, currency, reason, actor, None)
            .await
    }

    pub async fn charge_money(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        reason: &str,
        actor: Actor,
    ) -> Result<Account> {
        self.mutate(
            account_id,
            BalanceOp::Charge,
            amount,
            currency,
            reason,
            actor,
            None,
        )
        .await
    }

    pub async fn authorize_money(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        reason: &str,
        actor: Actor,
        reference_code: Option<String>,
    ) -> Result<Account> {
        self.mutate(
            account_id,
            BalanceOp::Authorize,
            amount,
            currency,
            reason,
            actor,
            reference_code,
        )
        .await
    }

    pub async fn capture_money(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        reason: &str,
        actor: Actor,
        reference_code: Option<String>,
    ) -> Result<Account> {
        self.mutate(
            account_id,
            BalanceOp::Capture,
            amount,
            currency,
            reason,
            actor,
            reference_code,
        )
        .await
    }

    pub async fn void_money(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: Currency,
        reason: &str,
        actor: Actor,
        reference_code: Option<String>,
    ) -> Result<Account> {
        self.mutate(
            account_id,
            BalanceOp::Void,
            amount,
            currency,
            reason,
            actor,
            reference_code,
        )
        .await
    }

    /// Moves money to the account of a direct child agency.
    ///
    /// Both rows and both audit entries commit in one transaction. Locks are
    /// taken in ascending account-id order so two crossing transfers cannot
    /// deadlock each other.
    pub async fn transfer_to_child_agency(
        &self,
        payer_id: AccountId,
        recipient_id: AccountId,
        amount: Amount,
        actor: Actor,
    ) -> Result<(Account, Account)> {
        if payer_id == recipient_id {
            return Err(Error::Validation(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let payer = self.fetch_active(payer_id).await?;
        let recipient = self.fetch_active(recipient_id).await?;
        if payer.currency != recipient.currency {
            return Err(Error::Validation(format!(
                "currency mismatch: payer is {}, recipient is {}",
                payer.currency, recipient.currency
            )));
        }
        if !self
            .agencies
            .is_direct_child(payer.agency_id, recipient.agency_id)
            .await?
        {
            return Err(Error::NotChildAgency {
                parent: payer.agency_id.0,
                child: recipient.agency_id.0,
            });
        }

        // Ascending-id lock order.
        let (first, second) = if payer_id < recipient_id {
            (payer_id, recipient_id)
        } else {
            (recipient_id, payer_id)
        };
        let first_token = self.locker.acquire(EntityKind::Account, first.0).await?;
        let second_token = match self.locker.acquire(EntityKind::Account, second.0).await {
            Ok(token) => token,
            Err(err) => {
                self.locker
                    .release(EntityKind::Account, first.0, first_token)
                    .await;
                return Err(err);
            }
        };

        let result = self
            .transfer_locked(payer_id, recipient_id, amount, actor)
            .await;

        self.locker
            .release(EntityKind::Account, second.0, second_token)
            .await;
        self.locker
            .release(EntityKind::Account, first.0, first_token)
            .await;
        result
    }

    /// Deactivation cascade: a deactivated counterparty takes all of its
    /// accounts down with it.
    pub async fn deactivate_counterparty_accounts(&self, agency: AgencyId) -> Result<u32> {
        let count = self.accounts.deactivate_agency_accounts(agency).await?;
        info!(agency = agency.0, count, "deactivated agency accounts");
        Ok(count)
    }

    async fn mutate(
        &self,
        account_id: AccountId,
        op: BalanceOp,
        amount: Amount,
        currency: Currency,
        reason: &str,
        actor: Actor,
        reference_code: Option<String>,
    ) -> Result<Account> {
        if reason.trim().is_empty() {
            return Err(Error::Validation("reason must not be empty".to_string()));
        }
        let account = self.fetch_active(account_id).await?;
        if account.currency != currency {
            return Err(Error::Validation(format!(
                "currency mismatch: account is {}, operation is {}",
                account.currency, currency
            )));
        }

        let token = self.lock_account(account_id).await?;
        let result = self
            .mutate_locked(account_id, op, amount, actor, reason, reference_code)
            .await;
        self.locker
            .release(EntityKind::Account, account_id.0, token)
            .await;

        match &result {
            Ok(account) => info!(
                account = account_id.0,
                event = ?op.event_type(),
                amount = %amount,
                balance = %account.balance,
                authorized = %account.authorized,
                "ledger operation committed"
            ),
            Err(err) => warn!(
                account = account_id.0,
                event = ?op.event_type(),
                amount = %amount,
                error = %err,
                "ledger operation rejected"
            ),
        }
        result
    }

    /// Runs inside the account's critical section: re-reads fresh state,
    /// applies the check-then-mutate, and commits row + audit atomically.
    async fn mutate_locked(
        &self,
        account_id: AccountId,
        op: BalanceOp,
        amount: Amount,
        actor: Actor,
        reason: &str,
        reference_code: Option<String>,
    ) -> Result<Account> {
        let mut account = self.fetch_active(account_id).await?;
        match op {
            BalanceOp::Add => account.add(amount),
            BalanceOp::Charge => account.charge(amount)?,
            BalanceOp::Authorize => account.authorize(amount)?,
            BalanceOp::Capture => account.capture(amount)?,
            BalanceOp::Void => account.void_authorization(amount)?,
        }
        let entry = AuditLogEntry::record(
            &account,
            op.event_type(),
            amount.value(),
            actor,
            reason,
            reference_code,
        );
        self.accounts.commit(account.clone(), entry).await?;
        Ok(account)
    }

    async fn transfer_locked(
        &self,
        payer_id: AccountId,
        recipient_id: AccountId,
        amount: Amount,
        actor: Actor,
    ) -> Result<(Account, Account)> {
        let mut payer = self.fetch_active(payer_id).await?;
        let mut recipient = self.fetch_active(recipient_id).await?;

        payer.charge(amount)?;
        recipient.add(amount);

        let reason = format!("transfer to agency {}", recipient.agency_id);
        let payer_entry = AuditLogEntry::record(
            &payer,
            AuditEventType::TransferToAgency,
            amount.value(),
            actor,
            &reason,
            None,
        );
        let reason = format!("transfer from agency {}", payer.agency_id);
        let recipient_entry = AuditLogEntry::record(
            &recipient,
            AuditEventType::TransferToAgency,
            amount.value(),
            actor,
            &reason,
            None,
        );
        self.accounts
            .commit_transfer(
                payer.clone(),
                recipient.clone(),
                [payer_entry, recipient_entry],
            )
            .await?;

        info!(
            payer = payer_id.0,
            recipient = recipient_id.0,
            amount = %amount,
            "inter-agency transfer committed"
        );
        Ok((payer, recipient))
    }

    async fn fetch_active(&self, id: AccountId) -> Result<Account> {
        let account = self
            .accounts
            .get(id)
            .await?
            .ok_or(Error::AccountNotFound(id.0))?;
        if !account.is_active {
            return Err(Error::AccountInactive(id.0));
        }
        Ok(account)
    }

    async fn lock_account(&self, id: AccountId) -> Result<LockToken> {
        self.locker.acquire(EntityKind::Account, id.0).await
    }
}
