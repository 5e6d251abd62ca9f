use crate::domain::AccountId;
use crate::domain::account::Account;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger operation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    Add,
    Charge,
    Authorize,
    Capture,
    Void,
    TransferToAgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorKind {
    Agent,
    Admin,
    ServiceAccount,
}

/// Who performed a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub kind: ActorKind,
}

impl Actor {
    pub fn agent(id: u64) -> Self {
        Self {
            id,
            kind: ActorKind::Agent,
        }
    }

    pub fn admin(id: u64) -> Self {
        Self {
            id,
            kind: ActorKind::Admin,
        }
    }

    pub fn service(id: u64) -> Self {
        Self {
            id,
            kind: ActorKind::ServiceAccount,
        }
    }
}

/// Immutable record of one balance mutation.
///
/// Append-only: entries are never updated or deleted, and every successful
/// mutation writes exactly one entry per account touched, in the same storage
/// transaction as the mutation itself. Balances are snapshots taken *after*
/// the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Assigned by the store on append.
    pub id: u64,
    pub account_id: AccountId,
    pub event_type: AuditEventType,
    pub amount: Decimal,
    pub actor: Actor,
    pub reason: String,
    pub balance_after: Decimal,
    pub authorized_after: Decimal,
    /// Business key correlating the entry to a booking, where one applies.
    pub reference_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Builds an entry from an account that has already been mutated.
    pub fn record(
        account: &Account,
        event_type: AuditEventType,
        amount: Decimal,
        actor: Actor,
        reason: &str,
        reference_code: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            account_id: account.id,
            event_type,
            amount,
            actor,
            reason: reason.to_string(),
            balance_after: account.balance,
            authorized_after: account.authorized,
            reference_code,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgencyId;
    use crate::domain::money::{Amount, Currency};
    use rust_decimal_macros::dec;

    #[test]
    fn record_snapshots_post_mutation_balances() {
        let mut account = Account::new(AccountId(7), AgencyId(1), Currency::Usd);
        account.add(Amount::new(dec!(250.0)).unwrap());

        let entry = AuditLogEntry::record(
            &account,
            AuditEventType::Add,
            dec!(250.0),
            Actor::admin(99),
            "initial top-up",
            None,
        );

        assert_eq!(entry.account_id, AccountId(7));
        assert_eq!(entry.balance_after, dec!(250.0));
        assert_eq!(entry.authorized_after, dec!(0.0));
        assert_eq!(entry.actor.kind, ActorKind::Admin);
    }
}
