//! In-process mock ledger for SDK testing.
//!
//! [`MockLedgerServer`] implements [`Transport`] and applies the ledger's
//! double-entry rules to an in-memory state, so the client can be exercised
//! end to end without a cluster.
//!
//! # Features
//!
//! - **Ledger semantics**: validation, linked chains, pending/post/void,
//!   balance limits, overflow checks and `Exists` detection
//! - **Request-level checks**: `TooMuchData` and `InvalidDataSize`
//! - **Failure injection**: transport errors, lost replies and delays
//! - **Controllable clock**: advance time to expire pending transfers
//!
//! Packets are processed one at a time, in arrival order, on a dedicated
//! worker thread. Replies are delivered from that thread.
//!
//! # Example
//!
//! ```no_run
//! use tally_sdk::{ClientConfig, LedgerClient, mock::MockLedgerServer};
//! use tally_types::{Account, AccountId};
//!
//! # fn example() -> tally_sdk::Result<()> {
//! let server = MockLedgerServer::start()?;
//! let config = ClientConfig::builder().with_replica_address("3001").build()?;
//! let client = LedgerClient::new(config, server.transport())?;
//!
//! client.create_accounts(&[Account::new(1u128, 720, 1)])?;
//! assert!(server.account(AccountId::new(1)).is_some());
//! # Ok(())
//! # }
//! ```

use std::{
    cmp,
    collections::HashMap,
    sync::{
        Arc, mpsc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use tally_types::{
    Account, AccountFlags, AccountId, CreateAccountResult, CreateAccountsResult,
    CreateTransferResult, CreateTransfersResult, DEFAULT_MAX_BODY_BYTES, Operation, Record,
    RequestStatus, Transfer, TransferFlags, TransferId, TransferKind, decode_batch, encode_batch,
    validate_account, validate_transfer,
};
use tracing::{debug, warn};

use crate::{
    error::{Result, TransportSnafu},
    transport::{Packet, Reply, ReplySink, Transport},
};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

// =============================================================================
// Ledger state
// =============================================================================

/// Resolution state of a pending transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStatus {
    Pending,
    Posted,
    Voided,
    Expired,
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    accounts: HashMap<AccountId, Account>,
    transfers: HashMap<TransferId, Transfer>,
    pending: HashMap<TransferId, PendingStatus>,
    /// Last timestamp assigned. Survives chain rollbacks so timestamps stay monotonic.
    last_timestamp: u64,
}

/// A create event processed in batch order.
trait Event: Copy {
    type Code: Copy + PartialEq;

    const OK: Self::Code;
    const LINKED_EVENT_FAILED: Self::Code;
    const LINKED_EVENT_CHAIN_OPEN: Self::Code;

    fn is_linked(&self) -> bool;

    fn apply(&self, ledger: &mut Ledger, now: u64) -> Self::Code;
}

impl Event for Account {
    type Code = CreateAccountResult;

    const OK: Self::Code = CreateAccountResult::Ok;
    const LINKED_EVENT_FAILED: Self::Code = CreateAccountResult::LinkedEventFailed;
    const LINKED_EVENT_CHAIN_OPEN: Self::Code = CreateAccountResult::LinkedEventChainOpen;

    fn is_linked(&self) -> bool {
        self.flags.contains(AccountFlags::LINKED)
    }

    fn apply(&self, ledger: &mut Ledger, now: u64) -> Self::Code {
        ledger.create_account(self, now)
    }
}

impl Event for Transfer {
    type Code = CreateTransferResult;

    const OK: Self::Code = CreateTransferResult::Ok;
    const LINKED_EVENT_FAILED: Self::Code = CreateTransferResult::LinkedEventFailed;
    const LINKED_EVENT_CHAIN_OPEN: Self::Code = CreateTransferResult::LinkedEventChainOpen;

    fn is_linked(&self) -> bool {
        Transfer::is_linked(self)
    }

    fn apply(&self, ledger: &mut Ledger, now: u64) -> Self::Code {
        ledger.create_transfer(self, now)
    }
}

impl Ledger {
    fn peek_timestamp(&self, now: u64) -> u64 {
        cmp::max(self.last_timestamp.saturating_add(1), now)
    }

    fn next_timestamp(&mut self, now: u64) -> u64 {
        self.last_timestamp = self.peek_timestamp(now);
        self.last_timestamp
    }

    fn restore(&mut self, snapshot: Ledger) {
        let last_timestamp = self.last_timestamp;
        *self = snapshot;
        self.last_timestamp = last_timestamp;
    }

    /// Applies `events` in order and returns the sparse `(index, code)` list.
    ///
    /// A linked chain runs against a snapshot; the first failure restores it
    /// and marks every other member `LinkedEventFailed`.
    fn create_batch<E: Event>(&mut self, events: &[E], now: u64) -> Vec<(u32, E::Code)> {
        let mut results = Vec::new();
        let mut chain: Option<(usize, Option<Ledger>)> = None;
        let mut chain_broken = false;

        for (index, event) in events.iter().enumerate() {
            let linked = event.is_linked();
            if linked && chain.is_none() {
                chain = Some((index, Some(self.clone())));
            }

            let code = if linked && index + 1 == events.len() {
                E::LINKED_EVENT_CHAIN_OPEN
            } else if chain_broken {
                E::LINKED_EVENT_FAILED
            } else {
                event.apply(self, now)
            };

            if code != E::OK {
                if let Some((start, snapshot)) = chain.as_mut()
                    && !chain_broken
                {
                    if let Some(snapshot) = snapshot.take() {
                        self.restore(snapshot);
                    }
                    results.extend((*start..index).map(|i| (i as u32, E::LINKED_EVENT_FAILED)));
                    chain_broken = true;
                }
                results.push((index as u32, code));
            }

            if !linked {
                chain = None;
                chain_broken = false;
            }
        }
        results
    }

    fn create_account(&mut self, account: &Account, now: u64) -> CreateAccountResult {
        use CreateAccountResult as R;

        if let Some(code) = validate_account(account).err().and_then(|e| e.account_result()) {
            return code;
        }
        if let Some(existing) = self.accounts.get(&account.id) {
            return if existing.flags != account.flags {
                R::ExistsWithDifferentFlags
            } else if existing.user_data != account.user_data {
                R::ExistsWithDifferentUserData
            } else if existing.ledger != account.ledger {
                R::ExistsWithDifferentLedger
            } else if existing.code != account.code {
                R::ExistsWithDifferentCode
            } else {
                R::Exists
            };
        }

        let timestamp = self.next_timestamp(now);
        self.accounts.insert(account.id, Account { timestamp, ..*account });
        R::Ok
    }

    fn create_transfer(&mut self, transfer: &Transfer, now: u64) -> CreateTransferResult {
        if let Some(code) = validate_transfer(transfer).err().and_then(|e| e.transfer_result()) {
            return code;
        }
        let Some(kind) = transfer.kind() else {
            return CreateTransferResult::MutuallyExclusiveFlags;
        };
        if let Some(existing) = self.transfers.get(&transfer.id) {
            return transfer_exists(existing, transfer);
        }
        match kind {
            TransferKind::Immediate | TransferKind::Pending => {
                self.move_funds(transfer, kind == TransferKind::Pending, now)
            },
            TransferKind::Post | TransferKind::Void => {
                self.resolve_pending(transfer, kind == TransferKind::Post, now)
            },
        }
    }

    fn move_funds(&mut self, transfer: &Transfer, pending: bool, now: u64) -> CreateTransferResult {
        use CreateTransferResult as R;

        let Some(mut debit) = self.accounts.get(&transfer.debit_account_id).copied() else {
            return R::DebitAccountNotFound;
        };
        let Some(mut credit) = self.accounts.get(&transfer.credit_account_id).copied() else {
            return R::CreditAccountNotFound;
        };
        if debit.ledger != credit.ledger {
            return R::AccountsMustHaveTheSameLedger;
        }
        if transfer.ledger != debit.ledger {
            return R::TransferMustHaveTheSameLedgerAsAccounts;
        }
        if pending
            && transfer.timeout != 0
            && self.peek_timestamp(now).checked_add(timeout_nanos(transfer.timeout)).is_none()
        {
            return R::OverflowsTimeout;
        }

        let amount = transfer.amount;
        if pending {
            let Some(debits) = debit.debits_pending.checked_add(amount) else {
                return R::OverflowsDebitsPending;
            };
            let Some(credits) = credit.credits_pending.checked_add(amount) else {
                return R::OverflowsCreditsPending;
            };
            debit.debits_pending = debits;
            credit.credits_pending = credits;
        } else {
            let Some(debits) = debit.debits_posted.checked_add(amount) else {
                return R::OverflowsDebitsPosted;
            };
            let Some(credits) = credit.credits_posted.checked_add(amount) else {
                return R::OverflowsCreditsPosted;
            };
            debit.debits_posted = debits;
            credit.credits_posted = credits;
        }
        if debit.debits_pending.checked_add(debit.debits_posted).is_none() {
            return R::OverflowsDebits;
        }
        if credit.credits_pending.checked_add(credit.credits_posted).is_none() {
            return R::OverflowsCredits;
        }
        if exceeds_credits(&debit) {
            return R::ExceedsCredits;
        }
        if exceeds_debits(&credit) {
            return R::ExceedsDebits;
        }

        let timestamp = self.next_timestamp(now);
        self.accounts.insert(debit.id, debit);
        self.accounts.insert(credit.id, credit);
        self.transfers.insert(transfer.id, Transfer { timestamp, ..*transfer });
        if pending {
            self.pending.insert(transfer.id, PendingStatus::Pending);
        }
        R::Ok
    }

    fn resolve_pending(
        &mut self,
        transfer: &Transfer,
        post: bool,
        now: u64,
    ) -> CreateTransferResult {
        use CreateTransferResult as R;

        let Some(pending) = self.transfers.get(&transfer.pending_id).copied() else {
            return R::PendingTransferNotFound;
        };
        if !pending.flags.contains(TransferFlags::PENDING) {
            return R::PendingTransferNotPending;
        }
        if differs(transfer.debit_account_id, pending.debit_account_id) {
            return R::PendingTransferHasDifferentDebitAccountId;
        }
        if differs(transfer.credit_account_id, pending.credit_account_id) {
            return R::PendingTransferHasDifferentCreditAccountId;
        }
        if differs(transfer.ledger, pending.ledger) {
            return R::PendingTransferHasDifferentLedger;
        }
        if differs(transfer.code, pending.code) {
            return R::PendingTransferHasDifferentCode;
        }

        let amount = if transfer.amount == 0 { pending.amount } else { transfer.amount };
        if amount > pending.amount {
            return R::ExceedsPendingTransferAmount;
        }
        if !post && amount != pending.amount {
            return R::PendingTransferHasDifferentAmount;
        }
        match self.pending.get(&pending.id) {
            Some(PendingStatus::Posted) => return R::PendingTransferAlreadyPosted,
            Some(PendingStatus::Voided) => return R::PendingTransferAlreadyVoided,
            Some(PendingStatus::Expired) => return R::PendingTransferExpired,
            Some(PendingStatus::Pending) | None => {},
        }

        let Some(mut debit) = self.accounts.get(&pending.debit_account_id).copied() else {
            return R::DebitAccountNotFound;
        };
        let Some(mut credit) = self.accounts.get(&pending.credit_account_id).copied() else {
            return R::CreditAccountNotFound;
        };
        debit.debits_pending = debit.debits_pending.saturating_sub(pending.amount);
        credit.credits_pending = credit.credits_pending.saturating_sub(pending.amount);
        if post {
            let Some(debits) = debit.debits_posted.checked_add(amount) else {
                return R::OverflowsDebitsPosted;
            };
            let Some(credits) = credit.credits_posted.checked_add(amount) else {
                return R::OverflowsCreditsPosted;
            };
            debit.debits_posted = debits;
            credit.credits_posted = credits;
        }

        let timestamp = self.next_timestamp(now);
        self.accounts.insert(debit.id, debit);
        self.accounts.insert(credit.id, credit);
        self.transfers.insert(
            transfer.id,
            Transfer {
                debit_account_id: pending.debit_account_id,
                credit_account_id: pending.credit_account_id,
                ledger: pending.ledger,
                code: pending.code,
                amount,
                timestamp,
                ..*transfer
            },
        );
        let status = if post { PendingStatus::Posted } else { PendingStatus::Voided };
        self.pending.insert(pending.id, status);
        R::Ok
    }

    /// Releases the reservations of pending transfers whose timeout has elapsed.
    fn expire_pending(&mut self, now: u64) {
        let expired: Vec<Transfer> = self
            .pending
            .iter()
            .filter(|(_, status)| **status == PendingStatus::Pending)
            .filter_map(|(id, _)| self.transfers.get(id))
            .filter(|transfer| expires_at(transfer).is_some_and(|at| at <= now))
            .copied()
            .collect();

        for transfer in expired {
            if let Some(debit) = self.accounts.get_mut(&transfer.debit_account_id) {
                debit.debits_pending = debit.debits_pending.saturating_sub(transfer.amount);
            }
            if let Some(credit) = self.accounts.get_mut(&transfer.credit_account_id) {
                credit.credits_pending = credit.credits_pending.saturating_sub(transfer.amount);
            }
            self.pending.insert(transfer.id, PendingStatus::Expired);
            debug!(transfer_id = %transfer.id, "Pending transfer expired");
        }
    }
}

fn timeout_nanos(timeout: u32) -> u64 {
    u64::from(timeout) * NANOS_PER_SECOND
}

fn expires_at(transfer: &Transfer) -> Option<u64> {
    (transfer.timeout != 0)
        .then(|| transfer.timestamp.saturating_add(timeout_nanos(transfer.timeout)))
}

/// A field left zero on a post or void inherits the pending transfer's value.
fn differs<T: PartialEq + Default>(submitted: T, stored: T) -> bool {
    submitted != T::default() && submitted != stored
}

fn exceeds_credits(account: &Account) -> bool {
    account.flags.contains(AccountFlags::DEBITS_MUST_NOT_EXCEED_CREDITS)
        && account.debits_pending.saturating_add(account.debits_posted) > account.credits_posted
}

fn exceeds_debits(account: &Account) -> bool {
    account.flags.contains(AccountFlags::CREDITS_MUST_NOT_EXCEED_DEBITS)
        && account.credits_pending.saturating_add(account.credits_posted) > account.debits_posted
}

fn transfer_exists(existing: &Transfer, submitted: &Transfer) -> CreateTransferResult {
    use CreateTransferResult as R;

    if existing.flags != submitted.flags {
        R::ExistsWithDifferentFlags
    } else if differs(submitted.debit_account_id, existing.debit_account_id) {
        R::ExistsWithDifferentDebitAccountId
    } else if differs(submitted.credit_account_id, existing.credit_account_id) {
        R::ExistsWithDifferentCreditAccountId
    } else if existing.pending_id != submitted.pending_id {
        R::ExistsWithDifferentPendingId
    } else if existing.user_data != submitted.user_data {
        R::ExistsWithDifferentUserData
    } else if existing.timeout != submitted.timeout {
        R::ExistsWithDifferentTimeout
    } else if differs(submitted.code, existing.code) {
        R::ExistsWithDifferentCode
    } else if differs(submitted.amount, existing.amount) {
        R::ExistsWithDifferentAmount
    } else {
        R::Exists
    }
}

// =============================================================================
// Request handling
// =============================================================================

struct Job {
    packet: Packet,
    sink: ReplySink,
}

/// Shared state for the mock server.
#[derive(Debug)]
struct MockState {
    ledger: Mutex<Ledger>,
    /// Largest request or reply body accepted.
    max_body_bytes: usize,
    /// Delay applied before each request (milliseconds).
    delay_ms: AtomicU64,
    /// Number of upcoming requests to fail with a transport error.
    transport_errors: AtomicUsize,
    /// Number of upcoming replies to drop after processing.
    dropped_replies: AtomicUsize,
    /// Total requests received.
    request_count: AtomicUsize,
    /// Added to the wall clock.
    clock_offset_ns: AtomicU64,
}

impl MockState {
    fn new(max_body_bytes: usize) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            max_body_bytes,
            delay_ms: AtomicU64::new(0),
            transport_errors: AtomicUsize::new(0),
            dropped_replies: AtomicUsize::new(0),
            request_count: AtomicUsize::new(0),
            clock_offset_ns: AtomicU64::new(0),
        }
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        wall.saturating_add(self.clock_offset_ns.load(Ordering::SeqCst))
    }

    fn handle(&self, job: Job) {
        let Job { packet, sink } = job;
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            thread::sleep(Duration::from_millis(delay_ms));
        }
        if take_one(&self.transport_errors) {
            warn!(request_id = %packet.id, "Injected transport error");
            sink.on_transport_error("injected transport error");
            return;
        }

        let reply = self.process(&packet);
        debug!(
            request_id = %packet.id,
            operation = %packet.operation,
            body_len = packet.body.len(),
            status = %reply.status,
            "Mock ledger processed request"
        );

        if take_one(&self.dropped_replies) {
            warn!(request_id = %packet.id, "Dropping reply");
            drop(sink);
            return;
        }
        sink.on_reply(reply);
    }

    fn process(&self, packet: &Packet) -> Reply {
        let operation = packet.operation;
        let len = packet.body.len();
        let record_size = operation.request_record_size();
        let reply_len = (len / record_size).saturating_mul(operation.reply_record_size());
        if len > self.max_body_bytes || reply_len > self.max_body_bytes {
            return Reply::rejected(RequestStatus::TooMuchData);
        }
        if len % record_size != 0 {
            return Reply::rejected(RequestStatus::InvalidDataSize);
        }

        let now = self.now();
        let mut ledger = self.ledger.lock();
        ledger.expire_pending(now);

        match operation {
            Operation::CreateAccounts => {
                let Ok(accounts) = decode_batch::<Account>(&packet.body) else {
                    return Reply::rejected(RequestStatus::InvalidDataSize);
                };
                let results: Vec<_> = ledger
                    .create_batch(&accounts, now)
                    .into_iter()
                    .map(|(index, result)| CreateAccountsResult { index, result })
                    .collect();
                encode_reply(&results)
            },
            Operation::CreateTransfers => {
                let Ok(transfers) = decode_batch::<Transfer>(&packet.body) else {
                    return Reply::rejected(RequestStatus::InvalidDataSize);
                };
                let results: Vec<_> = ledger
                    .create_batch(&transfers, now)
                    .into_iter()
                    .map(|(index, result)| CreateTransfersResult { index, result })
                    .collect();
                encode_reply(&results)
            },
            Operation::LookupAccounts => {
                let Ok(ids) = decode_batch::<AccountId>(&packet.body) else {
                    return Reply::rejected(RequestStatus::InvalidDataSize);
                };
                let found: Vec<Account> =
                    ids.iter().filter_map(|id| ledger.accounts.get(id).copied()).collect();
                encode_reply(&found)
            },
            Operation::LookupTransfers => {
                let Ok(ids) = decode_batch::<TransferId>(&packet.body) else {
                    return Reply::rejected(RequestStatus::InvalidDataSize);
                };
                let found: Vec<Transfer> =
                    ids.iter().filter_map(|id| ledger.transfers.get(id).copied()).collect();
                encode_reply(&found)
            },
        }
    }
}

/// Decrements `counter` if positive, returning whether it did.
fn take_one(counter: &AtomicUsize) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

fn encode_reply<R: Record>(records: &[R]) -> Reply {
    match encode_batch(records, usize::MAX) {
        Ok(body) => Reply::ok(body),
        Err(_) => Reply::rejected(RequestStatus::TooMuchData),
    }
}

// =============================================================================
// Transport
// =============================================================================

#[derive(Debug)]
struct MockTransport {
    state: Arc<MockState>,
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
}

impl Transport for MockTransport {
    fn send(&self, packet: Packet, sink: ReplySink) -> Result<()> {
        let jobs = self.jobs.lock();
        let Some(jobs) = jobs.as_ref() else {
            return TransportSnafu { message: "mock ledger server is shut down" }.fail();
        };
        // A failed send hands the job back; dropping its sink fails the request.
        jobs.send(Job { packet, sink })
            .map_err(|_| TransportSnafu { message: "mock ledger worker exited" }.build())
    }

    fn shutdown(&self) {
        debug!(
            requests = self.state.request_count.load(Ordering::SeqCst),
            "Client released mock transport"
        );
    }
}

/// In-process ledger server for tests.
///
/// Any number of clients may share one server through [`transport()`](Self::transport).
/// A client closing does not stop the server; dropping the server does.
#[derive(Debug)]
pub struct MockLedgerServer {
    transport: Arc<MockTransport>,
    worker: Option<JoinHandle<()>>,
}

impl MockLedgerServer {
    /// Starts a server accepting the default message body size.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Transport` if the worker thread cannot be spawned.
    pub fn start() -> Result<Self> {
        Self::start_with_limit(DEFAULT_MAX_BODY_BYTES)
    }

    /// Starts a server that rejects bodies over `max_body_bytes` with
    /// `RequestStatus::TooMuchData`.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Transport` if the worker thread cannot be spawned.
    pub fn start_with_limit(max_body_bytes: usize) -> Result<Self> {
        let state = Arc::new(MockState::new(max_body_bytes));
        let (jobs, queue) = mpsc::channel::<Job>();

        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("tally-mock-ledger".to_string())
            .spawn(move || {
                for job in queue {
                    worker_state.handle(job);
                }
                debug!("Mock ledger worker stopped");
            })
            .map_err(|e| {
                TransportSnafu { message: format!("failed to spawn mock ledger worker: {e}") }
                    .build()
            })?;

        debug!(max_body_bytes, "Mock ledger server started");
        Ok(Self {
            transport: Arc::new(MockTransport { state, jobs: Mutex::new(Some(jobs)) }),
            worker: Some(worker),
        })
    }

    /// Returns a transport handle for [`LedgerClient::new`](crate::LedgerClient::new).
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport) as Arc<dyn Transport>
    }

    fn state(&self) -> &MockState {
        &self.transport.state
    }

    /// Injects a delay before every subsequent request.
    ///
    /// Set to 0 to disable.
    pub fn inject_delay(&self, millis: u64) {
        self.state().delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Fails the next `count` requests with a transport error, unprocessed.
    pub fn inject_transport_errors(&self, count: usize) {
        self.state().transport_errors.store(count, Ordering::SeqCst);
    }

    /// Processes the next `count` requests but drops their replies.
    pub fn drop_next_replies(&self, count: usize) {
        self.state().dropped_replies.store(count, Ordering::SeqCst);
    }

    /// Moves the ledger clock forward.
    pub fn advance_clock(&self, seconds: u64) {
        let nanos = seconds.saturating_mul(NANOS_PER_SECOND);
        let offset = &self.state().clock_offset_ns;
        let _ = offset.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            Some(current.saturating_add(nanos))
        });
    }

    /// Returns the total number of requests received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state().request_count.load(Ordering::SeqCst)
    }

    /// Returns the committed state of an account.
    #[must_use]
    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.state().ledger.lock().accounts.get(&id).copied()
    }

    /// Returns a committed transfer.
    #[must_use]
    pub fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.state().ledger.lock().transfers.get(&id).copied()
    }

    /// Resets ledger state, counters and injected failures.
    pub fn reset(&self) {
        let state = self.state();
        *state.ledger.lock() = Ledger::default();
        state.delay_ms.store(0, Ordering::SeqCst);
        state.transport_errors.store(0, Ordering::SeqCst);
        state.dropped_replies.store(0, Ordering::SeqCst);
        state.request_count.store(0, Ordering::SeqCst);
        state.clock_offset_ns.store(0, Ordering::SeqCst);
    }

    /// Stops accepting requests, finishes queued ones and joins the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.transport.jobs.lock().take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("Mock ledger worker panicked");
        }
    }
}

impl Drop for MockLedgerServer {
    fn drop(&mut self) {
        self.stop();
    }
}
