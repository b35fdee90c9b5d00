//! The public client.

use std::{collections::HashMap, fmt, slice, sync::Arc};

use snafu::ensure;
use tally_types::{
    Account, AccountId, CreateAccountResult, CreateAccountsResult, CreateTransferResult,
    CreateTransfersResult, Identified, Operation, Record, Transfer, TransferId, ValidationError,
    decode_batch, encode_batch, expand_account_results, expand_transfer_results, validate_account,
    validate_transfer,
};
use tracing::warn;

use crate::{
    config::{ClientConfig, ValidationMode},
    dispatcher::{Dispatcher, PendingReply},
    error::{MalformedReplySnafu, RequestSnafu, Result, ValidationSnafu},
    transport::{Reply, Transport},
};

/// Client for a replicated double-entry ledger.
///
/// Every operation comes in a blocking form and an `_async` form. Both go
/// through the same path: validate locally, encode, wait for a concurrency
/// slot, hand the batch to the transport, then decode the reply. The async
/// form blocks only until a slot is free and returns a [`PendingReply`] that
/// can be awaited.
///
/// Cloning is cheap; clones share one dispatcher and one concurrency limit.
///
/// # Results
///
/// Per-record outcomes are values, not errors. `create_accounts` and
/// `create_transfers` return only the records that did not succeed, as
/// `(index, result)` pairs; an empty vector means the whole batch succeeded.
/// Use [`expand_account_results`] to rebuild a full per-record array.
///
/// # Lookups
///
/// Lookups filter: ids the ledger does not know are omitted, and the records
/// found come back in request order. Single lookups return `None` for an
/// unknown id. [`index_by_id`] keys a lookup result for positional access.
///
/// # Blocking calls
///
/// The blocking forms park the calling thread until the reply arrives and
/// must not be called from inside an async runtime. Await the `_async` forms
/// there instead.
///
/// # Shutdown
///
/// [`close()`](Self::close) stops admitting requests, fails callers waiting
/// for a slot with `SdkError::ClientClosed`, waits for every in-flight request
/// to complete, then shuts the transport down. Dropping the last clone closes
/// the client.
///
/// # Example
///
/// ```no_run
/// # use tally_sdk::{ClientConfig, LedgerClient, mock::MockLedgerServer};
/// # use tally_types::Account;
/// # fn example() -> tally_sdk::Result<()> {
/// let server = MockLedgerServer::start()?;
/// let config = ClientConfig::builder().with_replica_address("3001").build()?;
/// let client = LedgerClient::new(config, server.transport())?;
///
/// let errors = client.create_accounts(&[Account::new(1u128, 720, 1)])?;
/// assert!(errors.is_empty());
/// client.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LedgerClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    dispatcher: Dispatcher,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.dispatcher.close();
    }
}

impl LedgerClient {
    /// Creates a client that sends through `transport`.
    ///
    /// # Errors
    ///
    /// Construction itself does not fail once `config` has been built; the
    /// `Result` leaves room for transports that validate addresses eagerly.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let dispatcher = Dispatcher::new(
            transport,
            config.cluster(),
            config.max_concurrency(),
            Arc::clone(config.metrics()),
        );
        tracing::debug!(
            cluster = config.cluster(),
            replicas = config.replica_addresses().len(),
            max_concurrency = config.max_concurrency(),
            "Client created"
        );
        Ok(Self { inner: Arc::new(ClientInner { config, dispatcher }) })
    }

    /// Returns the client's configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the number of requests awaiting a reply.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.dispatcher.in_flight()
    }

    /// Returns `true` once [`close()`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.dispatcher.is_closed()
    }

    /// Closes the client, waiting for in-flight requests to complete.
    ///
    /// Idempotent and safe to call from any thread.
    pub fn close(&self) {
        self.inner.dispatcher.close();
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Creates one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails as a whole; the account's own
    /// outcome is the returned value.
    pub fn create_account(&self, account: &Account) -> Result<CreateAccountResult> {
        let sparse = self.create_accounts(slice::from_ref(account))?;
        single_result(expand_account_results(&sparse, 1)?)
    }

    /// Creates a batch of accounts, returning the non-`Ok` outcomes.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::BatchTooLarge` before sending if the batch does not
    /// fit in one message, `SdkError::Request` if the ledger rejects the whole
    /// batch, and `SdkError::ClientClosed` after [`close()`](Self::close).
    pub fn create_accounts(&self, accounts: &[Account]) -> Result<Vec<CreateAccountsResult>> {
        self.create_accounts_async(accounts)?.wait()
    }

    /// Creates a batch of accounts without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns local and lifecycle errors immediately; request and transport
    /// errors are delivered through the returned handle.
    pub fn create_accounts_async(
        &self,
        accounts: &[Account],
    ) -> Result<PendingReply<Vec<CreateAccountsResult>>> {
        self.validate(accounts, validate_account, Operation::CreateAccounts)?;
        let count = accounts.len();
        self.dispatch(Operation::CreateAccounts, accounts, move |reply| {
            let sparse: Vec<CreateAccountsResult> = decode_batch(&reply.body)?;
            expand_account_results(&sparse, count)?;
            Ok(sparse)
        })
    }

    /// Looks up one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn lookup_account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.lookup_accounts(&[id])?.into_iter().next())
    }

    /// Looks up accounts, returning those found in request order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn lookup_accounts(&self, ids: &[AccountId]) -> Result<Vec<Account>> {
        self.lookup_accounts_async(ids)?.wait()
    }

    /// Looks up accounts without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns local and lifecycle errors immediately.
    pub fn lookup_accounts_async(&self, ids: &[AccountId]) -> Result<PendingReply<Vec<Account>>> {
        let count = ids.len();
        self.dispatch(Operation::LookupAccounts, ids, move |reply| decode_lookup(&reply, count))
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Creates one transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails as a whole; the transfer's own
    /// outcome is the returned value.
    pub fn create_transfer(&self, transfer: &Transfer) -> Result<CreateTransferResult> {
        let sparse = self.create_transfers(slice::from_ref(transfer))?;
        single_result(expand_transfer_results(&sparse, 1)?)
    }

    /// Creates a batch of transfers, returning the non-`Ok` outcomes.
    ///
    /// Linked chains succeed or fail as a unit; every member of a failed
    /// chain appears in the result.
    ///
    /// # Errors
    ///
    /// Same as [`create_accounts`](Self::create_accounts).
    pub fn create_transfers(&self, transfers: &[Transfer]) -> Result<Vec<CreateTransfersResult>> {
        self.create_transfers_async(transfers)?.wait()
    }

    /// Creates a batch of transfers without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns local and lifecycle errors immediately; request and transport
    /// errors are delivered through the returned handle.
    pub fn create_transfers_async(
        &self,
        transfers: &[Transfer],
    ) -> Result<PendingReply<Vec<CreateTransfersResult>>> {
        self.validate(transfers, validate_transfer, Operation::CreateTransfers)?;
        let count = transfers.len();
        self.dispatch(Operation::CreateTransfers, transfers, move |reply| {
            let sparse: Vec<CreateTransfersResult> = decode_batch(&reply.body)?;
            expand_transfer_results(&sparse, count)?;
            Ok(sparse)
        })
    }

    /// Looks up one transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn lookup_transfer(&self, id: TransferId) -> Result<Option<Transfer>> {
        Ok(self.lookup_transfers(&[id])?.into_iter().next())
    }

    /// Looks up transfers, returning those found in request order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn lookup_transfers(&self, ids: &[TransferId]) -> Result<Vec<Transfer>> {
        self.lookup_transfers_async(ids)?.wait()
    }

    /// Looks up transfers without waiting for the reply.
    ///
    /// # Errors
    ///
    /// Returns local and lifecycle errors immediately.
    pub fn lookup_transfers_async(
        &self,
        ids: &[TransferId],
    ) -> Result<PendingReply<Vec<Transfer>>> {
        let count = ids.len();
        self.dispatch(Operation::LookupTransfers, ids, move |reply| decode_lookup(&reply, count))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn validate<R>(
        &self,
        records: &[R],
        validate: fn(&R) -> std::result::Result<(), ValidationError>,
        operation: Operation,
    ) -> Result<()> {
        let mode = self.inner.config.validation();
        for (index, record) in records.iter().enumerate() {
            let Err(err) = validate(record) else { continue };
            match mode {
                ValidationMode::Enforce => {
                    return ValidationSnafu { index, message: err.to_string() }.fail();
                },
                ValidationMode::Advisory => {
                    warn!(
                        %operation,
                        index,
                        field = err.field,
                        constraint = err.constraint,
                        "Record fails client-side validation, sending anyway"
                    );
                },
            }
        }
        Ok(())
    }

    fn dispatch<R, T, F>(
        &self,
        operation: Operation,
        records: &[R],
        decode: F,
    ) -> Result<PendingReply<T>>
    where
        R: Record,
        T: 'static,
        F: FnOnce(Reply) -> Result<T> + Send + 'static,
    {
        let body = encode_batch(records, self.inner.config.max_message_bytes())?;
        let pending = self.inner.dispatcher.submit(operation, body, records.len())?;
        Ok(pending.map(move |reply| {
            ensure!(reply.status.is_ok(), RequestSnafu { status: reply.status });
            decode(reply)
        }))
    }
}

impl fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClient")
            .field("cluster", &self.inner.config.cluster())
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Keys lookup results by id.
///
/// Lookups omit unknown ids, so positions in the reply do not line up with
/// positions in the request. This rebuilds the mapping.
pub fn index_by_id<R: Identified>(records: Vec<R>) -> HashMap<R::Id, R> {
    records.into_iter().map(|record| (record.record_id(), record)).collect()
}

fn single_result<T: Copy>(results: Vec<T>) -> Result<T> {
    match results.first() {
        Some(result) => Ok(*result),
        None => MalformedReplySnafu { message: "missing result for single record" }.fail(),
    }
}

fn decode_lookup<R: Record>(reply: &Reply, requested: usize) -> Result<Vec<R>> {
    let records: Vec<R> = decode_batch(&reply.body)?;
    ensure!(
        records.len() <= requested,
        MalformedReplySnafu {
            message: format!("lookup of {requested} ids returned {} records", records.len())
        }
    );
    Ok(records)
}
