//! Batch codec properties over full-width records.
//!
//! Records come from the shared `tally-test-utils` strategies, so every field,
//! reserved flag bits included, takes arbitrary values.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use proptest::prelude::*;
use tally_test_utils::strategies::{arb_account_record, arb_transfer_record};
use tally_types::{
    Account, CodecError, DEFAULT_MAX_BODY_BYTES, Record, Transfer, decode_batch, encode_batch,
    max_batch_items,
};

const MAX_ITEMS: usize = max_batch_items::<Account>(DEFAULT_MAX_BODY_BYTES);

#[test]
fn test_full_message_of_accounts_round_trips() {
    let accounts: Vec<Account> =
        (1..=MAX_ITEMS as u128).map(|id| Account::new(id, 1, 1).with_user_data(id)).collect();

    let bytes = encode_batch(&accounts, DEFAULT_MAX_BODY_BYTES).unwrap();
    assert_eq!(bytes.len(), MAX_ITEMS * Account::SIZE);
    assert_eq!(decode_batch::<Account>(&bytes).unwrap(), accounts);

    let one_more = Account::new(MAX_ITEMS as u128 + 1, 1, 1);
    let overflowing: Vec<Account> = accounts.into_iter().chain([one_more]).collect();
    assert_eq!(
        encode_batch(&overflowing, DEFAULT_MAX_BODY_BYTES).unwrap_err(),
        CodecError::BatchTooLarge { count: MAX_ITEMS + 1, max_count: MAX_ITEMS }
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_account_batches_round_trip(
        accounts in proptest::collection::vec(arb_account_record(), 0..=MAX_ITEMS)
    ) {
        let bytes = encode_batch(&accounts, DEFAULT_MAX_BODY_BYTES).unwrap();
        prop_assert_eq!(bytes.len(), accounts.len() * Account::SIZE);
        let decoded: Vec<Account> = decode_batch(&bytes).unwrap();
        prop_assert_eq!(decoded, accounts);
    }

    #[test]
    fn prop_transfer_batches_round_trip(
        transfers in proptest::collection::vec(arb_transfer_record(), 0..=MAX_ITEMS)
    ) {
        let bytes = encode_batch(&transfers, DEFAULT_MAX_BODY_BYTES).unwrap();
        prop_assert_eq!(bytes.len(), transfers.len() * Transfer::SIZE);
        let decoded: Vec<Transfer> = decode_batch(&bytes).unwrap();
        prop_assert_eq!(decoded, transfers);
    }
}
