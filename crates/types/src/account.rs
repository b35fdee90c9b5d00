//! Ledger accounts.

use serde::{Deserialize, Serialize};

use crate::types::{AccountFlags, AccountId, Identified};

/// A double-entry account.
///
/// Callers construct accounts with zero balances and a zero timestamp. The
/// ledger assigns `timestamp` on commit and afterwards changes the four
/// balances only by applying committed transfers that reference the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Account {
    /// Caller-assigned identity. Must be non-zero.
    pub id: AccountId,
    /// Opaque caller tag.
    pub user_data: u128,
    /// Amounts reserved by pending transfers debiting this account.
    pub debits_pending: u128,
    /// Amounts posted by transfers debiting this account.
    pub debits_posted: u128,
    /// Amounts reserved by pending transfers crediting this account.
    pub credits_pending: u128,
    /// Amounts posted by transfers crediting this account.
    pub credits_posted: u128,
    /// Partition the account belongs to. Must be non-zero.
    pub ledger: u32,
    /// Caller-defined category. Must be non-zero.
    pub code: u16,
    /// Chaining and balance-limit flags.
    pub flags: AccountFlags,
    /// Commit time in nanoseconds, assigned by the ledger.
    pub timestamp: u64,
}

impl Account {
    /// Creates an account with zero balances.
    pub fn new(id: impl Into<AccountId>, ledger: u32, code: u16) -> Self {
        Self { id: id.into(), ledger, code, ..Self::default() }
    }

    /// Sets the opaque caller tag.
    #[must_use]
    pub fn with_user_data(mut self, user_data: u128) -> Self {
        self.user_data = user_data;
        self
    }

    /// Replaces the flag set.
    #[must_use]
    pub fn with_flags(mut self, flags: AccountFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Debits minus credits over posted amounts, saturating at the `i128` range.
    pub fn posted_balance(&self) -> i128 {
        signed_difference(self.debits_posted, self.credits_posted)
    }

    /// Returns `true` if any balance is non-zero.
    pub fn has_balances(&self) -> bool {
        self.debits_pending != 0
            || self.debits_posted != 0
            || self.credits_pending != 0
            || self.credits_posted != 0
    }
}

impl Identified for Account {
    type Id = AccountId;

    fn record_id(&self) -> AccountId {
        self.id
    }
}

fn signed_difference(a: u128, b: u128) -> i128 {
    if a >= b {
        i128::try_from(a - b).unwrap_or(i128::MAX)
    } else {
        i128::try_from(b - a).map(|v| -v).unwrap_or(i128::MIN)
    }
}
