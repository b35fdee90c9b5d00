//! Client-side validation of accounts and transfers before submission.
//!
//! These checks are advisory fast-fail rules. They never replace the ledger's
//! decision: a record that passes may still be rejected by the ledger (unknown
//! accounts, exhausted limits, duplicates), and the client never reports a
//! success the ledger did not send.
//!
//! Each failure carries the result code the ledger is expected to return for
//! the same record, so callers can treat local and remote rejections alike.
//! Checks run in the ledger's order so that code is the first one it would hit.

use std::fmt;

use crate::{
    account::Account,
    results::{CreateAccountResult, CreateTransferResult},
    transfer::{Transfer, TransferKind},
    types::{AccountFlags, TransferFlags},
};

/// The ledger result a locally rejected record is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedResult {
    /// Rejected account.
    Account(CreateAccountResult),
    /// Rejected transfer.
    Transfer(CreateTransferResult),
}

/// Validation error with structured context.
///
/// Contains the specific constraint that was violated and the field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: &'static str,
    /// Description of the violated constraint.
    pub constraint: &'static str,
    /// Result code the ledger would return.
    pub expected: ExpectedResult,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// The expected account result, if this error came from [`validate_account`].
    pub fn account_result(&self) -> Option<CreateAccountResult> {
        match self.expected {
            ExpectedResult::Account(result) => Some(result),
            ExpectedResult::Transfer(_) => None,
        }
    }

    /// The expected transfer result, if this error came from [`validate_transfer`].
    pub fn transfer_result(&self) -> Option<CreateTransferResult> {
        match self.expected {
            ExpectedResult::Transfer(result) => Some(result),
            ExpectedResult::Account(_) => None,
        }
    }
}

fn account_error(
    field: &'static str,
    constraint: &'static str,
    result: CreateAccountResult,
) -> ValidationError {
    ValidationError { field, constraint, expected: ExpectedResult::Account(result) }
}

fn transfer_error(
    field: &'static str,
    constraint: &'static str,
    result: CreateTransferResult,
) -> ValidationError {
    ValidationError { field, constraint, expected: ExpectedResult::Transfer(result) }
}

/// Validates an account for submission.
///
/// # Errors
///
/// Returns [`ValidationError`] if the timestamp is set, reserved flag bits are
/// set, the id, ledger or code is zero, both balance-limit flags are set, or
/// any balance is non-zero.
pub fn validate_account(account: &Account) -> Result<(), ValidationError> {
    use CreateAccountResult as R;

    if account.timestamp != 0 {
        return Err(account_error("timestamp", "must be zero", R::TimestampMustBeZero));
    }
    if account.flags.has_reserved_bits() {
        return Err(account_error("flags", "reserved bits must be zero", R::ReservedFlag));
    }
    if account.id.is_zero() {
        return Err(account_error("id", "must not be zero", R::IdMustNotBeZero));
    }
    if account.ledger == 0 {
        return Err(account_error("ledger", "must not be zero", R::LedgerMustNotBeZero));
    }
    if account.code == 0 {
        return Err(account_error("code", "must not be zero", R::CodeMustNotBeZero));
    }
    if account.flags.contains(
        AccountFlags::DEBITS_MUST_NOT_EXCEED_CREDITS | AccountFlags::CREDITS_MUST_NOT_EXCEED_DEBITS,
    ) {
        return Err(account_error(
            "flags",
            "balance limits are mutually exclusive",
            R::MutuallyExclusiveFlags,
        ));
    }
    if account.debits_pending != 0 {
        return Err(account_error("debits_pending", "must be zero", R::DebitsPendingMustBeZero));
    }
    if account.debits_posted != 0 {
        return Err(account_error("debits_posted", "must be zero", R::DebitsPostedMustBeZero));
    }
    if account.credits_pending != 0 {
        return Err(account_error("credits_pending", "must be zero", R::CreditsPendingMustBeZero));
    }
    if account.credits_posted != 0 {
        return Err(account_error("credits_posted", "must be zero", R::CreditsPostedMustBeZero));
    }
    Ok(())
}

/// Validates a transfer for submission.
///
/// Post and void transfers may leave accounts, ledger, code and amount zero;
/// the ledger fills them from the pending transfer.
///
/// # Errors
///
/// Returns [`ValidationError`] on the first violated rule.
pub fn validate_transfer(transfer: &Transfer) -> Result<(), ValidationError> {
    use CreateTransferResult as R;

    if transfer.timestamp != 0 {
        return Err(transfer_error("timestamp", "must be zero", R::TimestampMustBeZero));
    }
    if transfer.flags.has_reserved_bits() {
        return Err(transfer_error("flags", "reserved bits must be zero", R::ReservedFlag));
    }
    if transfer.id.is_zero() {
        return Err(transfer_error("id", "must not be zero", R::IdMustNotBeZero));
    }
    let Some(kind) = transfer.kind() else {
        return Err(transfer_error(
            "flags",
            "pending, post and void are mutually exclusive",
            R::MutuallyExclusiveFlags,
        ));
    };

    match kind {
        TransferKind::Post | TransferKind::Void => {
            if transfer.pending_id.is_zero() {
                return Err(transfer_error(
                    "pending_id",
                    "must not be zero",
                    R::PendingIdMustNotBeZero,
                ));
            }
            if transfer.pending_id.value() == transfer.id.value() {
                return Err(transfer_error(
                    "pending_id",
                    "must differ from id",
                    R::PendingIdMustBeDifferent,
                ));
            }
            if transfer.timeout != 0 {
                return Err(transfer_error(
                    "timeout",
                    "only allowed on pending transfers",
                    R::TimeoutReservedForPendingTransfer,
                ));
            }
        },
        TransferKind::Immediate | TransferKind::Pending => {
            if !transfer.pending_id.is_zero() {
                return Err(transfer_error("pending_id", "must be zero", R::PendingIdMustBeZero));
            }
            if transfer.debit_account_id.is_zero() {
                return Err(transfer_error(
                    "debit_account_id",
                    "must not be zero",
                    R::DebitAccountIdMustNotBeZero,
                ));
            }
            if transfer.credit_account_id.is_zero() {
                return Err(transfer_error(
                    "credit_account_id",
                    "must not be zero",
                    R::CreditAccountIdMustNotBeZero,
                ));
            }
            if transfer.debit_account_id == transfer.credit_account_id {
                return Err(transfer_error(
                    "credit_account_id",
                    "must differ from debit_account_id",
                    R::AccountsMustBeDifferent,
                ));
            }
            if !transfer.flags.contains(TransferFlags::PENDING) && transfer.timeout != 0 {
                return Err(transfer_error(
                    "timeout",
                    "only allowed on pending transfers",
                    R::TimeoutReservedForPendingTransfer,
                ));
            }
            if transfer.ledger == 0 {
                return Err(transfer_error("ledger", "must not be zero", R::LedgerMustNotBeZero));
            }
            if transfer.code == 0 {
                return Err(transfer_error("code", "must not be zero", R::CodeMustNotBeZero));
            }
            if transfer.amount == 0 {
                return Err(transfer_error("amount", "must not be zero", R::AmountMustNotBeZero));
            }
        },
    }
    Ok(())
}
