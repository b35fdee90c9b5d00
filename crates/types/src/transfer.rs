//! Ledger transfers and their kinds.

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Identified, TransferFlags, TransferId};

/// What a transfer does, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    /// Moves `amount` straight into the posted balances.
    Immediate,
    /// Reserves `amount` in the pending balances until posted, voided or expired.
    Pending,
    /// Resolves a pending transfer by posting it.
    Post,
    /// Resolves a pending transfer by releasing its reservation.
    Void,
}

/// A movement of value from a debit account to a credit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Transfer {
    /// Caller-assigned identity. Must be non-zero.
    pub id: TransferId,
    /// Account whose debits increase.
    pub debit_account_id: AccountId,
    /// Account whose credits increase.
    pub credit_account_id: AccountId,
    /// Amount moved. For post transfers zero means "the full pending amount".
    pub amount: u128,
    /// Pending transfer resolved by a post or void. Zero for every other kind.
    pub pending_id: TransferId,
    /// Opaque caller tag.
    pub user_data: u128,
    /// Seconds until a pending transfer expires. Zero never expires.
    pub timeout: u32,
    /// Partition shared with both accounts. Must be non-zero.
    pub ledger: u32,
    /// Caller-defined category. Must be non-zero.
    pub code: u16,
    /// Kind and chaining flags.
    pub flags: TransferFlags,
    /// Commit time in nanoseconds, assigned by the ledger.
    pub timestamp: u64,
}

impl Transfer {
    /// Creates an immediate transfer of `amount` from `debit` to `credit`.
    pub fn new(
        id: impl Into<TransferId>,
        debit: impl Into<AccountId>,
        credit: impl Into<AccountId>,
        amount: u128,
        ledger: u32,
        code: u16,
    ) -> Self {
        Self {
            id: id.into(),
            debit_account_id: debit.into(),
            credit_account_id: credit.into(),
            amount,
            ledger,
            code,
            ..Self::default()
        }
    }

    /// Creates a post or void transfer for the pending transfer `pending_id`.
    ///
    /// Account ids, ledger and code are left zero so the ledger takes them from
    /// the pending transfer. An `amount` of zero posts the full pending amount.
    pub fn resolving(
        id: impl Into<TransferId>,
        pending_id: impl Into<TransferId>,
        amount: u128,
        post: bool,
    ) -> Self {
        let flags = if post {
            TransferFlags::POST_PENDING_TRANSFER
        } else {
            TransferFlags::VOID_PENDING_TRANSFER
        };
        Self { id: id.into(), pending_id: pending_id.into(), amount, flags, ..Self::default() }
    }

    /// Sets the opaque caller tag.
    #[must_use]
    pub fn with_user_data(mut self, user_data: u128) -> Self {
        self.user_data = user_data;
        self
    }

    /// Replaces the flag set.
    #[must_use]
    pub fn with_flags(mut self, flags: TransferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the pending timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `true` if this event chains with the next one in its batch.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.flags.contains(TransferFlags::LINKED)
    }

    /// Classifies the transfer, or `None` when its kind flags are mutually exclusive.
    pub fn kind(&self) -> Option<TransferKind> {
        let pending = self.flags.contains(TransferFlags::PENDING);
        let post = self.flags.contains(TransferFlags::POST_PENDING_TRANSFER);
        let void = self.flags.contains(TransferFlags::VOID_PENDING_TRANSFER);
        match (pending, post, void) {
            (false, false, false) => Some(TransferKind::Immediate),
            (true, false, false) => Some(TransferKind::Pending),
            (false, true, false) => Some(TransferKind::Post),
            (false, false, true) => Some(TransferKind::Void),
            _ => None,
        }
    }
}

impl Identified for Transfer {
    type Id = TransferId;

    fn record_id(&self) -> TransferId {
        self.id
    }
}
