//! Record fixtures with random identifiers.
//!
//! Ids come from UUID v4 so tests sharing one mock ledger never collide.

use tally_types::{Account, Transfer};
use uuid::Uuid;

/// Returns a random non-zero 128-bit id.
pub fn random_id() -> u128 {
    // Version bits are always set, so a v4 UUID is never zero.
    Uuid::new_v4().as_u128()
}

/// Creates an account with a random id.
pub fn random_account(ledger: u32, code: u16) -> Account {
    Account::new(random_id(), ledger, code)
}

/// Creates `count` accounts with random ids.
pub fn random_accounts(count: usize, ledger: u32, code: u16) -> Vec<Account> {
    (0..count).map(|_| random_account(ledger, code)).collect()
}

/// Creates an immediate transfer from `debit` to `credit` with a random id.
///
/// Uses the debit account's ledger and code 1.
pub fn transfer_between(debit: &Account, credit: &Account, amount: u128) -> Transfer {
    Transfer::new(random_id(), debit.id, credit.id, amount, debit.ledger, 1)
}
