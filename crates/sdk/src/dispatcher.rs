//! Bounded-concurrency request dispatch.
//!
//! The dispatcher owns the only shared mutable state of a client: the number
//! of requests in flight and the correlation table mapping each outstanding
//! [`RequestId`] to the slot its caller waits on. Both live behind one mutex,
//! so admitting, completing and closing are atomic with respect to each other.
//!
//! ## Lifecycle
//!
//! ```text
//! Open ──close()──► Closing ──table drained──► Closed
//! ```
//!
//! - `Open`: `submit` blocks while `max_concurrency` requests are in flight.
//! - `Closing`: `submit` fails with `ClientClosed`, including callers that were
//!   already blocked waiting for a slot. In-flight requests still complete.
//! - `Closed`: the table is empty and the transport has been shut down.
//!
//! Every request resolves exactly once: by its reply, by a transport failure,
//! or by the transport dropping its [`ReplySink`].

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Once,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    time::Instant,
};

use parking_lot::{Condvar, Mutex};
use snafu::ensure;
use tally_types::Operation;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    error::{ClientClosedSnafu, Result, TransportSnafu},
    metrics::SdkMetrics,
    transport::{Packet, Reply, ReplySink, RequestId, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Closing,
    Closed,
}

/// A request waiting for its reply.
struct Entry {
    operation: Operation,
    record_count: usize,
    submitted_at: Instant,
    reply_tx: oneshot::Sender<Result<Reply>>,
    done: Arc<AtomicBool>,
}

struct State {
    phase: Phase,
    next_id: u64,
    table: HashMap<RequestId, Entry>,
}

/// State shared between the dispatcher and every outstanding [`ReplySink`].
pub(crate) struct Shared {
    state: Mutex<State>,
    /// Signalled when a slot frees up or closing begins.
    slot_freed: Condvar,
    /// Signalled when the correlation table becomes empty.
    drained: Condvar,
    metrics: Arc<dyn SdkMetrics>,
}

impl Shared {
    /// Resolves request `id`. Returns `false` if it was not outstanding.
    pub(crate) fn complete(&self, id: RequestId, outcome: Result<Reply>) -> bool {
        let mut state = self.state.lock();
        let Some(entry) = state.table.remove(&id) else {
            return false;
        };

        let latency = entry.submitted_at.elapsed();
        let success = matches!(&outcome, Ok(reply) if reply.status.is_ok());
        entry.done.store(true, Ordering::Release);
        // The caller may have dropped its handle; the slot is freed regardless.
        let _ = entry.reply_tx.send(outcome);

        self.slot_freed.notify_one();
        let remaining = state.table.len();
        if remaining == 0 {
            self.drained.notify_all();
        }
        drop(state);

        self.metrics.record_request(entry.operation, latency, success);
        debug!(
            request_id = %id,
            operation = %entry.operation,
            record_count = entry.record_count,
            latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX),
            success,
            remaining,
            "Request completed"
        );
        true
    }
}

/// Admission gate and correlation table for one client.
pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    cluster: u32,
    max_concurrency: usize,
    released: Once,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        cluster: u32,
        max_concurrency: usize,
        metrics: Arc<dyn SdkMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State { phase: Phase::Open, next_id: 1, table: HashMap::new() }),
                slot_freed: Condvar::new(),
                drained: Condvar::new(),
                metrics,
            }),
            transport,
            cluster,
            max_concurrency,
            released: Once::new(),
        }
    }

    /// Admits one request and hands it to the transport.
    ///
    /// Blocks while `max_concurrency` requests are in flight. Returns as soon
    /// as the transport accepts the packet; the reply arrives through the
    /// returned handle.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::ClientClosed` if the dispatcher is closing or closed,
    /// including when closing begins while this call waits for a slot.
    /// Returns the transport's error if it refuses the packet.
    pub(crate) fn submit(
        &self,
        operation: Operation,
        body: Vec<u8>,
        record_count: usize,
    ) -> Result<PendingReply<Reply>> {
        let started = Instant::now();
        let mut state = self.shared.state.lock();
        loop {
            ensure!(state.phase == Phase::Open, ClientClosedSnafu);
            if state.table.len() < self.max_concurrency {
                break;
            }
            self.shared.slot_freed.wait(&mut state);
        }

        let id = RequestId::new(state.next_id);
        state.next_id += 1;
        let (reply_tx, reply_rx) = oneshot::channel();
        let done = Arc::new(AtomicBool::new(false));
        state.table.insert(
            id,
            Entry {
                operation,
                record_count,
                submitted_at: Instant::now(),
                reply_tx,
                done: Arc::clone(&done),
            },
        );
        let in_flight = state.table.len();
        drop(state);

        let waited = started.elapsed();
        self.shared.metrics.record_admission_wait(operation, waited);
        debug!(
            request_id = %id,
            %operation,
            record_count,
            in_flight,
            admission_wait_us = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX),
            "Submitting request"
        );

        let packet = Packet { id, cluster: self.cluster, operation, body };
        let sink = ReplySink::new(id, Arc::clone(&self.shared));
        if let Err(err) = self.transport.send(packet, sink) {
            warn!(request_id = %id, %operation, error = %err, "Transport refused request");
            self.shared.complete(id, Err(TransportSnafu { message: err.to_string() }.build()));
            return Err(err);
        }

        Ok(PendingReply::new(reply_rx, done))
    }

    /// Stops admitting, waits for every in-flight request, then shuts the
    /// transport down.
    ///
    /// Idempotent. Concurrent callers all return once the transport is shut
    /// down.
    pub(crate) fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.phase == Phase::Open {
            state.phase = Phase::Closing;
            info!(in_flight = state.table.len(), "Closing client");
            self.shared.slot_freed.notify_all();
        }
        while !state.table.is_empty() {
            self.shared.drained.wait(&mut state);
        }
        state.phase = Phase::Closed;
        drop(state);

        self.released.call_once(|| {
            self.transport.shutdown();
            info!("Client closed");
        });
    }

    /// Returns `true` once `close` has been called.
    pub(crate) fn is_closed(&self) -> bool {
        self.shared.state.lock().phase != Phase::Open
    }

    /// Returns the number of requests awaiting a reply.
    pub(crate) fn in_flight(&self) -> usize {
        self.shared.state.lock().table.len()
    }
}

// ============================================================================
// PendingReply
// ============================================================================

type Decoder<T> = Box<dyn FnOnce(Reply) -> Result<T> + Send>;

/// The single-resolution slot a caller waits on.
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain thread.
/// Decoding happens on the consumer side when the value is taken, never on
/// the transport thread.
#[must_use = "a pending reply does nothing unless waited on or awaited"]
pub struct PendingReply<T> {
    reply_rx: oneshot::Receiver<Result<Reply>>,
    done: Arc<AtomicBool>,
    decode: Option<Decoder<T>>,
}

impl PendingReply<Reply> {
    fn new(reply_rx: oneshot::Receiver<Result<Reply>>, done: Arc<AtomicBool>) -> Self {
        Self { reply_rx, done, decode: Some(Box::new(Ok)) }
    }
}

impl<T: 'static> PendingReply<T> {
    /// Returns `true` once the reply (or a failure) has arrived.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Chains a conversion applied when the value is taken.
    pub fn map<U, F>(mut self, f: F) -> PendingReply<U>
    where
        U: 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let decode = self.decode.take();
        PendingReply {
            reply_rx: self.reply_rx,
            done: self.done,
            decode: decode.map(|inner| -> Decoder<U> { Box::new(move |reply| f(inner(reply)?)) }),
        }
    }

    /// Blocks the current thread until the reply arrives.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime, as do the blocking
    /// `LedgerClient` calls built on it. Await the handle there instead.
    ///
    /// # Errors
    ///
    /// Returns the request's failure, or the conversion's error.
    pub fn wait(self) -> Result<T> {
        let PendingReply { reply_rx, decode, .. } = self;
        finish(reply_rx.blocking_recv(), decode)
    }
}

/// Resolves a received outcome through the decode step, which runs at most once.
fn finish<T>(
    outcome: std::result::Result<Result<Reply>, oneshot::error::RecvError>,
    decode: Option<Decoder<T>>,
) -> Result<T> {
    let reply = match outcome {
        Ok(reply) => reply?,
        Err(_) => return TransportSnafu { message: "reply channel closed" }.fail(),
    };
    match decode {
        Some(decode) => decode(reply),
        None => TransportSnafu { message: "reply already taken" }.fail(),
    }
}

impl<T: 'static> Future for PendingReply<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.reply_rx).poll(cx) {
            Poll::Ready(outcome) => Poll::Ready(finish(outcome, this.decode.take())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for PendingReply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("done", &self.done.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        thread,
        time::Duration,
    };

    use tally_types::RequestStatus;

    use super::*;
    use crate::{error::SdkError, metrics::NoopSdkMetrics};

    /// Holds sinks until the test releases them.
    #[derive(Debug, Default)]
    struct HoldingTransport {
        held: Mutex<Vec<(Packet, ReplySink)>>,
        sent: AtomicUsize,
        shutdowns: AtomicUsize,
        refuse: AtomicBool,
    }

    impl HoldingTransport {
        fn release_one(&self, reply: Reply) -> Option<Packet> {
            let (packet, sink) = {
                let mut held = self.held.lock();
                if held.is_empty() {
                    return None;
                }
                held.remove(0)
            };
            sink.on_reply(reply);
            Some(packet)
        }

        fn held(&self) -> usize {
            self.held.lock().len()
        }
    }

    impl Transport for HoldingTransport {
        fn send(&self, packet: Packet, sink: ReplySink) -> Result<()> {
            if self.refuse.load(Ordering::SeqCst) {
                return TransportSnafu { message: "refused" }.fail();
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            self.held.lock().push((packet, sink));
            Ok(())
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispatcher(max_concurrency: usize) -> (Arc<Dispatcher>, Arc<HoldingTransport>) {
        let transport = Arc::new(HoldingTransport::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            0,
            max_concurrency,
            Arc::new(NoopSdkMetrics),
        );
        (Arc::new(dispatcher), transport)
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within 5s");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_reply_resolves_pending() {
        let (dispatcher, transport) = dispatcher(2);
        let pending = dispatcher.submit(Operation::LookupAccounts, vec![1; 16], 1).unwrap();
        assert!(!pending.is_done());
        assert_eq!(dispatcher.in_flight(), 1);

        let packet = transport.release_one(Reply::ok(vec![9])).unwrap();
        assert_eq!(packet.operation, Operation::LookupAccounts);
        assert_eq!(packet.body, vec![1; 16]);
        assert!(pending.is_done());
        assert_eq!(pending.wait().unwrap(), Reply::ok(vec![9]));
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let (dispatcher, transport) = dispatcher(4);
        let _a = dispatcher.submit(Operation::LookupAccounts, Vec::new(), 0).unwrap();
        let _b = dispatcher.submit(Operation::LookupAccounts, Vec::new(), 0).unwrap();
        let held = transport.held.lock();
        assert_ne!(held[0].0.id, held[1].0.id);
    }

    #[test]
    fn test_map_decodes_on_wait() {
        let (dispatcher, transport) = dispatcher(1);
        let pending = dispatcher
            .submit(Operation::LookupAccounts, Vec::new(), 0)
            .unwrap()
            .map(|reply| Ok(reply.body.len()));
        transport.release_one(Reply::ok(vec![0; 5]));
        assert_eq!(pending.wait().unwrap(), 5);
    }

    #[test]
    fn test_wait_propagates_decode_error() {
        let (dispatcher, transport) = dispatcher(1);
        let pending = dispatcher
            .submit(Operation::LookupAccounts, Vec::new(), 0)
            .unwrap()
            .map(|reply| Ok(reply.body.len()))
            .map(|len| -> Result<usize> {
                crate::error::MalformedReplySnafu { message: format!("{len} bytes") }.fail()
            });
        transport.release_one(Reply::ok(vec![0; 3]));
        let err = pending.wait().unwrap_err();
        assert!(matches!(err, SdkError::MalformedReply { ref message } if message == "3 bytes"));
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn test_transport_error_fails_only_that_request() {
        let (dispatcher, transport) = dispatcher(2);
        let first = dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).unwrap();
        let second = dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).unwrap();

        let (_, sink) = transport.held.lock().remove(0);
        sink.on_transport_error("connection reset");
        transport.release_one(Reply::ok(Vec::new()));

        assert!(matches!(first.wait(), Err(SdkError::Transport { .. })));
        assert!(second.wait().is_ok());
    }

    #[test]
    fn test_dropped_sink_fails_request() {
        let (dispatcher, transport) = dispatcher(1);
        let pending = dispatcher.submit(Operation::CreateTransfers, Vec::new(), 0).unwrap();
        transport.held.lock().clear();
        let err = pending.wait().unwrap_err();
        assert!(err.to_string().contains("reply channel dropped"));
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn test_refused_send_frees_slot() {
        let (dispatcher, transport) = dispatcher(1);
        transport.refuse.store(true, Ordering::SeqCst);
        let err = dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).unwrap_err();
        assert!(matches!(err, SdkError::Transport { .. }));
        assert_eq!(dispatcher.in_flight(), 0);

        transport.refuse.store(false, Ordering::SeqCst);
        assert!(dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).is_ok());
    }

    #[test]
    fn test_excess_submitters_block_until_slot_frees() {
        let (dispatcher, transport) = dispatcher(1);
        let first = dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).unwrap();

        let blocked = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!blocked.is_finished());
        assert_eq!(transport.sent.load(Ordering::SeqCst), 1);

        transport.release_one(Reply::ok(Vec::new()));
        first.wait().unwrap();
        let second = blocked.join().unwrap().unwrap();
        assert_eq!(transport.sent.load(Ordering::SeqCst), 2);

        transport.release_one(Reply::ok(Vec::new()));
        second.wait().unwrap();
    }

    #[test]
    fn test_close_drains_in_flight_requests() {
        let (dispatcher, transport) = dispatcher(2);
        let pending = dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).unwrap();

        let closer = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.close())
        };
        wait_until(|| dispatcher.is_closed());
        thread::sleep(Duration::from_millis(20));
        assert!(!closer.is_finished());
        assert_eq!(transport.shutdowns.load(Ordering::SeqCst), 0);
        assert!(matches!(
            dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0),
            Err(SdkError::ClientClosed)
        ));

        transport.release_one(Reply::rejected(RequestStatus::TooMuchData));
        closer.join().unwrap();
        assert_eq!(pending.wait().unwrap().status, RequestStatus::TooMuchData);
        assert_eq!(transport.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_wakes_blocked_submitters() {
        let (dispatcher, transport) = dispatcher(1);
        let first = dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0).unwrap();
        let blocked = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.submit(Operation::CreateAccounts, Vec::new(), 0))
        };
        thread::sleep(Duration::from_millis(20));

        let closer = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.close())
        };
        assert!(matches!(blocked.join().unwrap(), Err(SdkError::ClientClosed)));

        transport.release_one(Reply::ok(Vec::new()));
        closer.join().unwrap();
        assert!(first.wait().is_ok());
        assert_eq!(transport.held(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (dispatcher, transport) = dispatcher(1);
        dispatcher.close();
        dispatcher.close();
        let concurrent: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || dispatcher.close())
            })
            .collect();
        for handle in concurrent {
            handle.join().unwrap();
        }
        assert_eq!(transport.shutdowns.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_closed());
    }

    #[tokio::test]
    async fn test_pending_reply_is_a_future() {
        let (dispatcher, transport) = dispatcher(1);
        let pending = dispatcher
            .submit(Operation::LookupTransfers, Vec::new(), 0)
            .unwrap()
            .map(|reply| Ok(reply.status));
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            transport.release_one(Reply::ok(Vec::new()));
        });
        assert_eq!(pending.await.unwrap(), RequestStatus::Ok);
        releaser.join().unwrap();
    }
}
