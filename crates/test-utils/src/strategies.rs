//! Proptest strategies for Tally ledger records.
//!
//! Two families: `arb_*_record` strategies fill every field with arbitrary
//! values (codec coverage), while [`arb_account`] and [`arb_transfer`] produce
//! records a caller could legitimately submit.
//!
//! # Usage
//!
//! ```no_run
//! use tally_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn accounts_pass_validation(account in strategies::arb_account()) {
//!         prop_assert!(tally_types::validate_account(&account).is_ok());
//!     }
//! }
//! ```

use proptest::prelude::*;
use tally_types::{Account, AccountFlags, AccountId, Transfer, TransferFlags, TransferId};

/// Generates a non-zero 128-bit identifier.
pub fn arb_id() -> impl Strategy<Value = u128> {
    1..=u128::MAX
}

/// Generates a valid account flag set: empty, linked, or one balance limit.
pub fn arb_account_flags() -> impl Strategy<Value = AccountFlags> {
    prop::sample::select(vec![
        AccountFlags::empty(),
        AccountFlags::DEBITS_MUST_NOT_EXCEED_CREDITS,
        AccountFlags::CREDITS_MUST_NOT_EXCEED_DEBITS,
    ])
}

/// Generates an account ready to submit: non-zero id, ledger and code, zero
/// balances, no chaining.
pub fn arb_account() -> impl Strategy<Value = Account> {
    (arb_id(), 1u32.., 1u16.., any::<u128>(), arb_account_flags()).prop_map(
        |(id, ledger, code, user_data, flags)| {
            Account::new(id, ledger, code).with_user_data(user_data).with_flags(flags)
        },
    )
}

/// Generates 0 to `max` submittable accounts.
///
/// Ids are random, so collisions are possible but vanishingly rare.
pub fn arb_account_batch(max: usize) -> impl Strategy<Value = Vec<Account>> {
    proptest::collection::vec(arb_account(), 0..=max)
}

/// Generates an account with every field arbitrary, reserved flag bits included.
pub fn arb_account_record() -> impl Strategy<Value = Account> {
    (
        (any::<u128>(), any::<u128>(), any::<u128>(), any::<u128>()),
        (any::<u128>(), any::<u128>(), any::<u32>(), any::<u16>()),
        (any::<u16>(), any::<u64>()),
    )
        .prop_map(
            |(
                (id, user_data, debits_pending, debits_posted),
                (credits_pending, credits_posted, ledger, code),
                (flags, timestamp),
            )| Account {
                id: AccountId::new(id),
                user_data,
                debits_pending,
                debits_posted,
                credits_pending,
                credits_posted,
                ledger,
                code,
                flags: AccountFlags::from_bits_retain(flags),
                timestamp,
            },
        )
}

/// Generates a submittable immediate or pending transfer between two distinct
/// accounts on one ledger.
pub fn arb_transfer() -> impl Strategy<Value = Transfer> {
    (arb_id(), arb_id(), arb_id(), 1u128.., 1u32.., 1u16.., any::<bool>(), any::<u32>())
        .prop_filter("accounts must differ", |(_, debit, credit, ..)| debit != credit)
        .prop_map(|(id, debit, credit, amount, ledger, code, pending, timeout)| {
            let transfer = Transfer::new(id, debit, credit, amount, ledger, code);
            if pending {
                transfer.with_flags(TransferFlags::PENDING).with_timeout(timeout)
            } else {
                transfer
            }
        })
}

/// Generates a transfer with every field arbitrary.
pub fn arb_transfer_record() -> impl Strategy<Value = Transfer> {
    (
        (any::<u128>(), any::<u128>(), any::<u128>(), any::<u128>()),
        (any::<u128>(), any::<u128>(), any::<u32>(), any::<u32>()),
        (any::<u16>(), any::<u16>(), any::<u64>()),
    )
        .prop_map(
            |(
                (id, debit, credit, amount),
                (pending_id, user_data, timeout, ledger),
                (code, flags, timestamp),
            )| Transfer {
                id: TransferId::new(id),
                debit_account_id: AccountId::new(debit),
                credit_account_id: AccountId::new(credit),
                amount,
                pending_id: TransferId::new(pending_id),
                user_data,
                timeout,
                ledger,
                code,
                flags: TransferFlags::from_bits_retain(flags),
                timestamp,
            },
        )
}
