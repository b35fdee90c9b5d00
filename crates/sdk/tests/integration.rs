//! Integration tests for the Tally SDK against the in-process mock ledger.
//!
//! ## Test Categories
//!
//! - **Construction**: configuration validation
//! - **Accounts / Transfers**: blocking, single and async forms
//! - **Two-phase**: pending transfers posted, voided and expired
//! - **Limits**: client-side and server-side batch size limits
//! - **Concurrency**: admission beyond `max_concurrency`, close while busy

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use proptest::prelude::*;
use tally_sdk::{
    Account, AccountId, ClientConfig, CreateAccountResult, CreateTransferResult, LedgerClient,
    RequestStatus, SdkError, Transfer, TransferFlags, TransferId, index_by_id,
    mock::MockLedgerServer,
};
use tally_test_utils::{
    assert_eventually, random_account, random_accounts, random_id, strategies, transfer_between,
    wait_until,
};
use tally_types::{MESSAGE_SIZE_MAX, max_batch_items};

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_with(server: &MockLedgerServer, max_concurrency: usize) -> LedgerClient {
    init_tracing();
    let config = ClientConfig::builder()
        .with_replica_address("3001")
        .with_max_concurrency(max_concurrency)
        .build()
        .unwrap();
    LedgerClient::new(config, server.transport()).unwrap()
}

fn client(server: &MockLedgerServer) -> LedgerClient {
    client_with(server, 32)
}

/// Two accounts on ledger 720 with codes 1 and 2, already created.
fn funded_pair(client: &LedgerClient) -> (Account, Account) {
    let account1 = random_account(720, 1);
    let account2 = random_account(720, 2);
    assert!(client.create_accounts(&[account1, account2]).unwrap().is_empty());
    (account1, account2)
}

/// Async form of [`funded_pair`]; blocking calls must not run on a runtime thread.
async fn funded_pair_async(client: &LedgerClient) -> (Account, Account) {
    let account1 = random_account(720, 1);
    let account2 = random_account(720, 2);
    let created = client.create_accounts_async(&[account1, account2]).unwrap().await.unwrap();
    assert!(created.is_empty());
    (account1, account2)
}

fn assert_accounts(expected: &Account, actual: &Account) {
    assert_eq!(expected.id, actual.id);
    assert_eq!(expected.user_data, actual.user_data);
    assert_eq!(expected.ledger, actual.ledger);
    assert_eq!(expected.code, actual.code);
    assert_eq!(expected.flags, actual.flags);
}

fn assert_transfers(expected: &Transfer, actual: &Transfer) {
    assert_eq!(expected.id, actual.id);
    assert_eq!(expected.debit_account_id, actual.debit_account_id);
    assert_eq!(expected.credit_account_id, actual.credit_account_id);
    assert_eq!(expected.user_data, actual.user_data);
    assert_eq!(expected.ledger, actual.ledger);
    assert_eq!(expected.code, actual.code);
    assert_eq!(expected.flags, actual.flags);
    assert_eq!(expected.amount, actual.amount);
    assert_eq!(expected.timeout, actual.timeout);
    assert_eq!(expected.pending_id, actual.pending_id);
    assert_ne!(actual.timestamp, 0);
}

fn lookup_pair(client: &LedgerClient, a: &Account, b: &Account) -> (Account, Account) {
    let found = client.lookup_accounts(&[a.id, b.id]).unwrap();
    assert_eq!(found.len(), 2);
    (found[0], found[1])
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_config_rejects_empty_replica_list() {
    let err = ClientConfig::builder().build().unwrap_err();
    assert!(matches!(err, SdkError::Config { .. }));
}

#[test]
fn test_config_rejects_empty_replica_address() {
    let err = ClientConfig::builder().with_replica_address("").build().unwrap_err();
    assert!(matches!(err, SdkError::InvalidAddress { .. }));
}

#[test]
fn test_config_rejects_out_of_range_port() {
    let err =
        ClientConfig::builder().with_replica_address("127.0.0.1:99999").build().unwrap_err();
    assert!(matches!(err, SdkError::InvalidAddress { .. }));
}

#[test]
fn test_config_rejects_zero_concurrency() {
    let err = ClientConfig::builder()
        .with_replica_address("3001")
        .with_max_concurrency(0)
        .build()
        .unwrap_err();
    assert!(matches!(err, SdkError::Config { .. }));
}

// ============================================================================
// Accounts
// ============================================================================

#[test]
fn test_create_accounts() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let accounts = random_accounts(2, 720, 1);

    assert!(client.create_accounts(&accounts).unwrap().is_empty());

    let ids: Vec<AccountId> = accounts.iter().map(|a| a.id).collect();
    let found = client.lookup_accounts(&ids).unwrap();
    assert_eq!(found.len(), accounts.len());
    for (expected, actual) in accounts.iter().zip(&found) {
        assert_accounts(expected, actual);
        assert_ne!(actual.timestamp, 0);
        assert!(!actual.has_balances());
    }
}

#[test]
fn test_create_single_account() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let account = random_account(720, 1).with_user_data(7);

    assert_eq!(client.create_account(&account).unwrap(), CreateAccountResult::Ok);
    let found = client.lookup_account(account.id).unwrap().unwrap();
    assert_accounts(&account, &found);

    assert_eq!(client.create_account(&account).unwrap(), CreateAccountResult::Exists);
}

#[test]
fn test_create_invalid_account() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);

    let result = client.create_account(&Account::default()).unwrap();
    assert_eq!(result, CreateAccountResult::IdMustNotBeZero);
    assert!(client.lookup_account(AccountId::ZERO).unwrap().is_none());
}

#[tokio::test]
async fn test_create_accounts_async() {
    let server = MockLedgerServer::start().unwrap();
    server.inject_delay(50);
    let client = client(&server);
    let accounts = random_accounts(2, 720, 1);

    let create = client.create_accounts_async(&accounts).unwrap();
    assert!(!create.is_done());
    assert!(assert_eventually(Duration::from_secs(2), || create.is_done()).await);
    assert!(create.await.unwrap().is_empty());

    let lookup = client.lookup_accounts_async(&[accounts[0].id, accounts[1].id]).unwrap();
    assert!(!lookup.is_done());
    let found = lookup.await.unwrap();
    assert_accounts(&accounts[0], &found[0]);
    assert_accounts(&accounts[1], &found[1]);
}

#[test]
fn test_lookup_omits_unknown_ids() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);
    let missing = AccountId::new(random_id());

    let found = client.lookup_accounts(&[account2.id, missing, account1.id]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, account2.id);
    assert_eq!(found[1].id, account1.id);

    let by_id = index_by_id(found);
    assert!(by_id.contains_key(&account1.id));
    assert!(!by_id.contains_key(&missing));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_created_accounts_read_back_in_order(batch in strategies::arb_account_batch(16)) {
        let server = MockLedgerServer::start().unwrap();
        let client = client(&server);

        prop_assert!(client.create_accounts(&batch).unwrap().is_empty());

        let ids: Vec<AccountId> = batch.iter().rev().map(|a| a.id).collect();
        let found = client.lookup_accounts(&ids).unwrap();
        prop_assert_eq!(found.len(), batch.len());
        for (expected, actual) in batch.iter().rev().zip(&found) {
            prop_assert_eq!(expected.id, actual.id);
            prop_assert_eq!(expected.flags, actual.flags);
            prop_assert_eq!(expected.user_data, actual.user_data);
            prop_assert!(!actual.has_balances());
        }
    }
}

// ============================================================================
// Transfers
// ============================================================================

#[test]
fn test_create_transfers() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);

    let transfer = transfer_between(&account2, &account1, 100);
    assert!(client.create_transfers(&[transfer]).unwrap().is_empty());

    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert_accounts(&account1, &found1);
    assert_accounts(&account2, &found2);
    assert_eq!(found1.credits_posted, 100);
    assert_eq!(found1.debits_posted, 0);
    assert_eq!(found2.debits_posted, 100);
    assert_eq!(found2.credits_posted, 0);

    let transfers = client.lookup_transfers(&[transfer.id]).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_transfers(&transfer, &transfers[0]);
}

#[test]
fn test_create_single_transfer() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let account1 = random_account(720, 1);
    let account2 = random_account(720, 2);
    assert_eq!(client.create_account(&account1).unwrap(), CreateAccountResult::Ok);
    assert_eq!(client.create_account(&account2).unwrap(), CreateAccountResult::Ok);

    let transfer = Transfer::new(random_id(), account2.id, account1.id, 100, 720, 1);
    assert_eq!(client.create_transfer(&transfer).unwrap(), CreateTransferResult::Ok);

    let found1 = client.lookup_account(account1.id).unwrap().unwrap();
    let found2 = client.lookup_account(account2.id).unwrap().unwrap();
    assert_eq!(found1.credits_posted, 100);
    assert_eq!(found2.debits_posted, 100);

    let found = client.lookup_transfer(transfer.id).unwrap().unwrap();
    assert_transfers(&transfer, &found);
}

#[test]
fn test_create_invalid_transfer() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);

    let result = client.create_transfer(&Transfer::default()).unwrap();
    assert_eq!(result, CreateTransferResult::IdMustNotBeZero);
    assert!(client.lookup_transfer(TransferId::ZERO).unwrap().is_none());
}

#[tokio::test]
async fn test_create_transfers_async() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair_async(&client).await;

    server.inject_delay(50);
    let transfer = transfer_between(&account2, &account1, 100);
    let create = client.create_transfers_async(&[transfer]).unwrap();
    assert!(!create.is_done());
    assert!(create.await.unwrap().is_empty());

    let lookup = client.lookup_transfers_async(&[transfer.id]).unwrap();
    assert!(!lookup.is_done());
    let found = lookup.await.unwrap();
    assert_eq!(found.len(), 1);
    assert_transfers(&transfer, &found[0]);
}

#[tokio::test]
async fn test_async_handles_can_be_joined() {
    let server = MockLedgerServer::start().unwrap();
    let client = client_with(&server, 4);
    let (account1, account2) = funded_pair_async(&client).await;

    let pending: Vec<_> = (0..8)
        .map(|_| client.create_transfers_async(&[transfer_between(&account2, &account1, 5)]))
        .collect::<Result<_, _>>()
        .unwrap();
    for results in futures::future::join_all(pending).await {
        assert!(results.unwrap().is_empty());
    }

    let found = client.lookup_accounts_async(&[account1.id]).unwrap().await.unwrap();
    assert_eq!(found[0].credits_posted, 40);
}

#[test]
fn test_create_linked_transfers() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);

    let transfer1 = Transfer::new(random_id(), account2.id, account1.id, 100, 720, 1)
        .with_flags(TransferFlags::LINKED);
    let transfer2 = Transfer::new(random_id(), account1.id, account2.id, 49, 720, 1);
    assert!(client.create_transfers(&[transfer1, transfer2]).unwrap().is_empty());

    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert_eq!(found1.credits_posted, 100);
    assert_eq!(found1.debits_posted, 49);
    assert_eq!(found2.credits_posted, 49);
    assert_eq!(found2.debits_posted, 100);

    let transfers = client.lookup_transfers(&[transfer1.id, transfer2.id]).unwrap();
    assert_eq!(transfers.len(), 2);
    assert_transfers(&transfer1, &transfers[0]);
    assert_transfers(&transfer2, &transfers[1]);
}

#[test]
fn test_failed_link_rolls_back_the_chain() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);

    let chained = Transfer::new(random_id(), account2.id, account1.id, 100, 720, 1)
        .with_flags(TransferFlags::LINKED);
    let broken = Transfer::new(random_id(), account2.id, AccountId::new(random_id()), 1, 720, 1);
    let independent = transfer_between(&account2, &account1, 7);

    let results = client.create_transfers(&[chained, broken, independent]).unwrap();
    let codes: Vec<_> = results.iter().map(|r| (r.index, r.result)).collect();
    assert_eq!(
        codes,
        vec![
            (0, CreateTransferResult::LinkedEventFailed),
            (1, CreateTransferResult::CreditAccountNotFound),
        ]
    );

    let (found1, _) = lookup_pair(&client, &account1, &account2);
    assert_eq!(found1.credits_posted, 7);
    assert!(client.lookup_transfer(chained.id).unwrap().is_none());
}

// ============================================================================
// Two-phase transfers
// ============================================================================

fn create_pending(client: &LedgerClient, debit: &Account, credit: &Account) -> Transfer {
    let pending = Transfer::new(random_id(), debit.id, credit.id, 100, 720, 1)
        .with_flags(TransferFlags::PENDING)
        .with_timeout(u32::MAX);
    assert_eq!(client.create_transfer(&pending).unwrap(), CreateTransferResult::Ok);
    pending
}

#[test]
fn test_create_pending_transfers_and_post() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);

    let pending = create_pending(&client, &account2, &account1);
    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert_eq!((found1.credits_pending, found1.credits_posted), (100, 0));
    assert_eq!((found2.debits_pending, found2.debits_posted), (100, 0));
    assert_transfers(&pending, &client.lookup_transfer(pending.id).unwrap().unwrap());

    let post = Transfer::new(random_id(), account2.id, account1.id, 100, 720, 1)
        .with_flags(TransferFlags::POST_PENDING_TRANSFER);
    let post = Transfer { pending_id: pending.id, ..post };
    assert_eq!(client.create_transfer(&post).unwrap(), CreateTransferResult::Ok);

    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert_eq!((found1.credits_pending, found1.credits_posted), (0, 100));
    assert_eq!((found1.debits_pending, found1.debits_posted), (0, 0));
    assert_eq!((found2.debits_pending, found2.debits_posted), (0, 100));
    assert_eq!((found2.credits_pending, found2.credits_posted), (0, 0));
    assert_transfers(&post, &client.lookup_transfer(post.id).unwrap().unwrap());

    let again = Transfer::resolving(random_id(), pending.id, 0, true);
    assert_eq!(
        client.create_transfer(&again).unwrap(),
        CreateTransferResult::PendingTransferAlreadyPosted
    );
}

#[test]
fn test_create_pending_transfers_and_void() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);

    let pending = create_pending(&client, &account2, &account1);
    let void = Transfer::resolving(random_id(), pending.id, 0, false);
    assert_eq!(client.create_transfer(&void).unwrap(), CreateTransferResult::Ok);

    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert!(!found1.has_balances());
    assert!(!found2.has_balances());

    let stored = client.lookup_transfer(void.id).unwrap().unwrap();
    assert_eq!(stored.amount, 100);
    assert_eq!(stored.debit_account_id, account2.id);

    let again = Transfer::resolving(random_id(), pending.id, 0, false);
    assert_eq!(
        client.create_transfer(&again).unwrap(),
        CreateTransferResult::PendingTransferAlreadyVoided
    );
}

#[test]
fn test_expired_pending_transfer_cannot_be_posted() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let (account1, account2) = funded_pair(&client);

    let pending = Transfer::new(random_id(), account2.id, account1.id, 100, 720, 1)
        .with_flags(TransferFlags::PENDING)
        .with_timeout(10);
    assert_eq!(client.create_transfer(&pending).unwrap(), CreateTransferResult::Ok);

    server.advance_clock(11);
    let post = Transfer::resolving(random_id(), pending.id, 0, true);
    assert_eq!(
        client.create_transfer(&post).unwrap(),
        CreateTransferResult::PendingTransferExpired
    );

    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert!(!found1.has_balances());
    assert!(!found2.has_balances());
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_create_accounts_too_much_data() {
    let server = MockLedgerServer::start().unwrap();
    init_tracing();
    let config = ClientConfig::builder()
        .with_replica_address("3001")
        .with_max_message_bytes(2 * MESSAGE_SIZE_MAX)
        .build()
        .unwrap();
    let client = LedgerClient::new(config, server.transport()).unwrap();

    let accounts = random_accounts(10_000, 1, 1);
    let err = client.create_accounts(&accounts).unwrap_err();
    assert_eq!(err.request_status(), Some(RequestStatus::TooMuchData));
    assert!(server.account(accounts[0].id).is_none());
}

#[test]
fn test_create_transfers_too_much_data() {
    let server = MockLedgerServer::start().unwrap();
    let config = ClientConfig::builder()
        .with_replica_address("3001")
        .with_max_message_bytes(2 * MESSAGE_SIZE_MAX)
        .build()
        .unwrap();
    let client = LedgerClient::new(config, server.transport()).unwrap();

    let transfers: Vec<_> =
        (0..10_000).map(|_| Transfer::new(random_id(), 1u128, 2u128, 1, 1, 1)).collect();
    let err = client.create_transfers(&transfers).unwrap_err();
    assert!(matches!(err, SdkError::Request { status: RequestStatus::TooMuchData }));
}

#[test]
fn test_oversized_batch_fails_locally() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let max = max_batch_items::<Account>(client.config().max_message_bytes());

    let accounts = random_accounts(max + 1, 1, 1);
    let err = client.create_accounts(&accounts).unwrap_err();
    assert!(matches!(
        err,
        SdkError::BatchTooLarge { count, max_count } if count == max + 1 && max_count == max
    ));
    assert_eq!(server.request_count(), 0);

    assert!(client.create_accounts(&accounts[..max]).unwrap().is_empty());
    assert_eq!(server.request_count(), 1);
}

// ============================================================================
// Concurrency
// ============================================================================

const TASKS: usize = 12;
const MAX_CONCURRENCY: usize = TASKS / 4;

fn spawn_transfer_tasks(
    client: &LedgerClient,
    debit: &Account,
    credit: &Account,
) -> Vec<thread::JoinHandle<Result<CreateTransferResult, SdkError>>> {
    (0..TASKS)
        .map(|_| {
            let client = client.clone();
            let transfer = Transfer::new(random_id(), debit.id, credit.id, 100, 720, 1);
            thread::spawn(move || client.create_transfer(&transfer))
        })
        .collect()
}

#[test]
fn test_concurrent_tasks() {
    let server = MockLedgerServer::start().unwrap();
    server.inject_delay(5);
    let client = client_with(&server, MAX_CONCURRENCY);
    let (account1, account2) = funded_pair(&client);

    let peak = Arc::new(AtomicUsize::new(0));
    let watcher = {
        let client = client.clone();
        let peak = Arc::clone(&peak);
        thread::spawn(move || {
            for _ in 0..200 {
                peak.fetch_max(client.in_flight(), Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    for task in spawn_transfer_tasks(&client, &account2, &account1) {
        assert_eq!(task.join().unwrap().unwrap(), CreateTransferResult::Ok);
    }
    watcher.join().unwrap();
    assert!(peak.load(Ordering::SeqCst) <= MAX_CONCURRENCY);

    let (found1, found2) = lookup_pair(&client, &account1, &account2);
    assert_eq!(found1.credits_posted, 100 * TASKS as u128);
    assert_eq!(found1.debits_posted, 0);
    assert_eq!(found2.debits_posted, 100 * TASKS as u128);
    assert_eq!(found2.credits_posted, 0);
}

#[test]
fn test_close_with_concurrent_tasks() {
    let server = MockLedgerServer::start().unwrap();
    let client = client_with(&server, MAX_CONCURRENCY);
    let (account1, account2) = funded_pair(&client);
    server.inject_delay(20);

    let mut tasks = spawn_transfer_tasks(&client, &account2, &account1);
    let first = tasks.remove(0).join().unwrap();
    assert_eq!(first.unwrap(), CreateTransferResult::Ok);

    client.close();
    assert_eq!(client.in_flight(), 0);

    let mut succeeded = 1;
    for task in tasks {
        match task.join().unwrap() {
            Ok(result) => {
                assert_eq!(result, CreateTransferResult::Ok);
                succeeded += 1;
            },
            Err(err) => assert!(err.is_closed(), "unexpected {err:?}"),
        }
    }

    let found = server.account(account1.id).unwrap();
    assert_eq!(found.credits_posted, 100 * succeeded);
    let late = transfer_between(&account2, &account1, 1);
    assert!(client.create_transfer(&late).unwrap_err().is_closed());
}

#[test]
fn test_transport_failure_is_isolated() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let account = random_account(1, 1);

    server.inject_transport_errors(1);
    let err = client.create_account(&account).unwrap_err();
    assert!(err.is_retryable());
    assert!(server.account(account.id).is_none());

    assert_eq!(client.create_account(&account).unwrap(), CreateAccountResult::Ok);
    assert_eq!(client.in_flight(), 0);
}

#[test]
fn test_lost_reply_fails_request_without_hanging() {
    let server = MockLedgerServer::start().unwrap();
    let client = client(&server);
    let account = random_account(1, 1);

    server.drop_next_replies(1);
    let err = client.create_account(&account).unwrap_err();
    assert!(matches!(err, SdkError::Transport { .. }));
    assert!(wait_until(Duration::from_secs(1), || client.in_flight() == 0));

    assert_eq!(client.create_account(&account).unwrap(), CreateAccountResult::Exists);
}
