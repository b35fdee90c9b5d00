//! Per-record result codes returned by create operations.
//!
//! The wire value of every code is its ordinal, and `0` is always `Ok`. The
//! ledger replies to a create batch with a sparse list of `(index, code)`
//! pairs naming only the events that did not succeed; [`expand_account_results`]
//! and [`expand_transfer_results`] rebuild the full per-record array.
//!
//! A code outside the known enumeration means the client and the ledger speak
//! different protocol versions. [`CreateAccountResult::from_value`] treats that
//! as a fatal invariant violation and panics. Use `TryFrom<u32>` to inspect a
//! raw code without panicking.

use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

use crate::codec::{CodecError, ResultIndexOutOfRangeSnafu};

/// A raw code that does not name any known result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(display("unknown {kind} code {code}"))]
pub struct UnknownResultCode {
    /// Name of the enumeration the code was decoded as.
    pub kind: &'static str,
    /// The raw wire value.
    pub code: u32,
}

/// Generates a closed result enumeration whose discriminant is the wire value.
macro_rules! define_result_code {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $value:literal => $label:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[repr(u32)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $value,
            )+
        }

        impl $name {
            /// Every code in ordinal order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the wire value.
            #[inline]
            #[must_use]
            pub const fn value(self) -> u32 {
                self as u32
            }

            /// Returns the position in the enumeration, equal to the wire value.
            #[inline]
            #[must_use]
            pub const fn ordinal(self) -> u32 {
                self as u32
            }

            /// Returns `true` for `Ok`.
            #[inline]
            #[must_use]
            pub const fn is_ok(self) -> bool {
                self as u32 == 0
            }

            /// Returns the snake_case name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            /// Converts a wire value, returning `None` for unknown codes.
            #[must_use]
            pub const fn from_u32(code: u32) -> Option<Self> {
                match code {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Decodes a wire value.
            ///
            /// # Panics
            ///
            /// Panics if `code` is not a known result. An unknown code means the
            /// ledger speaks a newer protocol than this client.
            #[allow(clippy::panic)]
            #[must_use]
            pub fn from_value(code: u32) -> Self {
                match Self::from_u32(code) {
                    Some(result) => result,
                    None => panic!("{}", UnknownResultCode { kind: stringify!($name), code }),
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = UnknownResultCode;

            fn try_from(code: u32) -> Result<Self, Self::Error> {
                Self::from_u32(code).ok_or(UnknownResultCode { kind: stringify!($name), code })
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(result: $name) -> Self {
                result.value()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_result_code!(
    /// Outcome of creating one account.
    CreateAccountResult {
        /// The account was created.
        Ok = 0 => "ok",
        /// Another event in the same linked chain failed.
        LinkedEventFailed = 1 => "linked_event_failed",
        /// The batch ended while a linked chain was still open.
        LinkedEventChainOpen = 2 => "linked_event_chain_open",
        ReservedFlag = 3 => "reserved_flag",
        ReservedField = 4 => "reserved_field",
        IdMustNotBeZero = 5 => "id_must_not_be_zero",
        LedgerMustNotBeZero = 6 => "ledger_must_not_be_zero",
        CodeMustNotBeZero = 7 => "code_must_not_be_zero",
        /// Both balance-limit flags were set.
        MutuallyExclusiveFlags = 8 => "mutually_exclusive_flags",
        OverflowsDebits = 9 => "overflows_debits",
        OverflowsCredits = 10 => "overflows_credits",
        ExceedsCredits = 11 => "exceeds_credits",
        ExceedsDebits = 12 => "exceeds_debits",
        ExistsWithDifferentFlags = 13 => "exists_with_different_flags",
        ExistsWithDifferentUserData = 14 => "exists_with_different_user_data",
        ExistsWithDifferentLedger = 15 => "exists_with_different_ledger",
        ExistsWithDifferentCode = 16 => "exists_with_different_code",
        /// An identical account already exists.
        Exists = 17 => "exists",
        DebitsPendingMustBeZero = 18 => "debits_pending_must_be_zero",
        DebitsPostedMustBeZero = 19 => "debits_posted_must_be_zero",
        CreditsPendingMustBeZero = 20 => "credits_pending_must_be_zero",
        CreditsPostedMustBeZero = 21 => "credits_posted_must_be_zero",
        TimestampMustBeZero = 22 => "timestamp_must_be_zero",
    }
);

define_result_code!(
    /// Outcome of creating one transfer.
    CreateTransferResult {
        /// The transfer was committed.
        Ok = 0 => "ok",
        /// Another event in the same linked chain failed.
        LinkedEventFailed = 1 => "linked_event_failed",
        /// The batch ended while a linked chain was still open.
        LinkedEventChainOpen = 2 => "linked_event_chain_open",
        TimestampMustBeZero = 3 => "timestamp_must_be_zero",
        ReservedFlag = 4 => "reserved_flag",
        ReservedField = 5 => "reserved_field",
        IdMustNotBeZero = 6 => "id_must_not_be_zero",
        DebitAccountIdMustNotBeZero = 7 => "debit_account_id_must_not_be_zero",
        CreditAccountIdMustNotBeZero = 8 => "credit_account_id_must_not_be_zero",
        AccountsMustBeDifferent = 9 => "accounts_must_be_different",
        PendingIdMustBeZero = 10 => "pending_id_must_be_zero",
        PendingIdMustNotBeZero = 11 => "pending_id_must_not_be_zero",
        PendingIdMustBeDifferent = 12 => "pending_id_must_be_different",
        TimeoutReservedForPendingTransfer = 13 => "timeout_reserved_for_pending_transfer",
        LedgerMustNotBeZero = 14 => "ledger_must_not_be_zero",
        CodeMustNotBeZero = 15 => "code_must_not_be_zero",
        AmountMustNotBeZero = 16 => "amount_must_not_be_zero",
        MutuallyExclusiveFlags = 17 => "mutually_exclusive_flags",
        DebitAccountNotFound = 18 => "debit_account_not_found",
        CreditAccountNotFound = 19 => "credit_account_not_found",
        AccountsMustHaveTheSameLedger = 20 => "accounts_must_have_the_same_ledger",
        TransferMustHaveTheSameLedgerAsAccounts = 21 => "transfer_must_have_the_same_ledger_as_accounts",
        PendingTransferNotFound = 22 => "pending_transfer_not_found",
        PendingTransferNotPending = 23 => "pending_transfer_not_pending",
        PendingTransferHasDifferentDebitAccountId = 24 => "pending_transfer_has_different_debit_account_id",
        PendingTransferHasDifferentCreditAccountId = 25 => "pending_transfer_has_different_credit_account_id",
        PendingTransferHasDifferentLedger = 26 => "pending_transfer_has_different_ledger",
        PendingTransferHasDifferentCode = 27 => "pending_transfer_has_different_code",
        ExceedsPendingTransferAmount = 28 => "exceeds_pending_transfer_amount",
        PendingTransferHasDifferentAmount = 29 => "pending_transfer_has_different_amount",
        PendingTransferAlreadyPosted = 30 => "pending_transfer_already_posted",
        PendingTransferAlreadyVoided = 31 => "pending_transfer_already_voided",
        PendingTransferExpired = 32 => "pending_transfer_expired",
        ExistsWithDifferentFlags = 33 => "exists_with_different_flags",
        ExistsWithDifferentDebitAccountId = 34 => "exists_with_different_debit_account_id",
        ExistsWithDifferentCreditAccountId = 35 => "exists_with_different_credit_account_id",
        ExistsWithDifferentPendingId = 36 => "exists_with_different_pending_id",
        ExistsWithDifferentUserData = 37 => "exists_with_different_user_data",
        ExistsWithDifferentTimeout = 38 => "exists_with_different_timeout",
        ExistsWithDifferentCode = 39 => "exists_with_different_code",
        ExistsWithDifferentAmount = 40 => "exists_with_different_amount",
        /// An identical transfer was already committed.
        Exists = 41 => "exists",
        OverflowsDebitsPending = 42 => "overflows_debits_pending",
        OverflowsCreditsPending = 43 => "overflows_credits_pending",
        OverflowsDebitsPosted = 44 => "overflows_debits_posted",
        OverflowsCreditsPosted = 45 => "overflows_credits_posted",
        OverflowsDebits = 46 => "overflows_debits",
        OverflowsCredits = 47 => "overflows_credits",
        OverflowsTimeout = 48 => "overflows_timeout",
        /// The debit account's limit flag forbids debits beyond its credits.
        ExceedsCredits = 49 => "exceeds_credits",
        /// The credit account's limit flag forbids credits beyond its debits.
        ExceedsDebits = 50 => "exceeds_debits",
    }
);

// ============================================================================
// Sparse reply items
// ============================================================================

/// A non-`Ok` outcome for the account at `index` in the submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreateAccountsResult {
    /// Position of the event in the submitted batch.
    pub index: u32,
    /// Outcome for that event.
    pub result: CreateAccountResult,
}

/// A non-`Ok` outcome for the transfer at `index` in the submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreateTransfersResult {
    /// Position of the event in the submitted batch.
    pub index: u32,
    /// Outcome for that event.
    pub result: CreateTransferResult,
}

/// Rebuilds the per-record outcome array of an account batch of `count` events.
///
/// Indices absent from `sparse` succeeded. An empty reply means every event
/// succeeded.
///
/// # Errors
///
/// Returns [`CodecError::ResultIndexOutOfRange`] if the reply names an index
/// outside the submitted batch.
pub fn expand_account_results(
    sparse: &[CreateAccountsResult],
    count: usize,
) -> Result<Vec<CreateAccountResult>, CodecError> {
    let mut results = vec![CreateAccountResult::Ok; count];
    for item in sparse {
        let index = item.index as usize;
        ensure!(index < count, ResultIndexOutOfRangeSnafu { index: item.index, count });
        results[index] = item.result;
    }
    Ok(results)
}

/// Rebuilds the per-record outcome array of a transfer batch of `count` events.
///
/// # Errors
///
/// Returns [`CodecError::ResultIndexOutOfRange`] if the reply names an index
/// outside the submitted batch.
pub fn expand_transfer_results(
    sparse: &[CreateTransfersResult],
    count: usize,
) -> Result<Vec<CreateTransferResult>, CodecError> {
    let mut results = vec![CreateTransferResult::Ok; count];
    for item in sparse {
        let index = item.index as usize;
        ensure!(index < count, ResultIndexOutOfRangeSnafu { index: item.index, count });
        results[index] = item.result;
    }
    Ok(results)
}
