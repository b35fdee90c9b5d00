//! The boundary between the client and whatever carries bytes to the ledger.
//!
//! A [`Transport`] receives one [`Packet`] per admitted request together with a
//! [`ReplySink`]. It must eventually resolve the sink exactly once, from any
//! thread, with either [`ReplySink::on_reply`] or
//! [`ReplySink::on_transport_error`]. Dropping an unresolved sink fails the
//! request with a transport error, so a transport that loses a request can
//! never leave its caller waiting forever.
//!
//! Connection setup, addressing and retry are the transport's business.

use std::{fmt, sync::Arc};

use tally_types::{Operation, RequestStatus};
use tracing::warn;

use crate::{
    dispatcher::Shared,
    error::{Result, TransportSnafu},
};

/// Correlates a reply with the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a request id from a raw value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlation id assigned by the dispatcher.
    pub id: RequestId,
    /// Cluster the request is addressed to.
    pub cluster: u32,
    /// Batched operation.
    pub operation: Operation,
    /// Encoded records.
    pub body: Vec<u8>,
}

/// One inbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Whole-request outcome.
    pub status: RequestStatus,
    /// Encoded reply records. Empty unless `status` is `Ok`.
    pub body: Vec<u8>,
}

impl Reply {
    /// A successful reply carrying `body`.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: RequestStatus::Ok, body }
    }

    /// A whole-request rejection.
    pub fn rejected(status: RequestStatus) -> Self {
        Self { status, body: Vec::new() }
    }
}

/// Carries packets to the ledger.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Hands `packet` to the transport.
    ///
    /// Must not block waiting for the reply. The reply, or a failure, is
    /// delivered later through `sink`, possibly on another thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet could not be accepted at all. The
    /// request is then failed immediately and `sink` is discarded.
    fn send(&self, packet: Packet, sink: ReplySink) -> Result<()>;

    /// Releases transport resources.
    ///
    /// Called exactly once, after every outstanding request has completed.
    fn shutdown(&self) {}
}

/// Single-use handle that routes a reply back to the waiting caller.
#[must_use = "dropping a sink fails its request"]
pub struct ReplySink {
    id: RequestId,
    shared: Arc<Shared>,
    resolved: bool,
}

impl ReplySink {
    pub(crate) fn new(id: RequestId, shared: Arc<Shared>) -> Self {
        Self { id, shared, resolved: false }
    }

    /// Returns the id of the request this sink resolves.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Delivers the ledger's reply.
    pub fn on_reply(mut self, reply: Reply) {
        self.resolve(Ok(reply));
    }

    /// Fails the request with `cause`.
    pub fn on_transport_error(mut self, cause: impl Into<String>) {
        self.resolve(Err(TransportSnafu { message: cause.into() }.build()));
    }

    fn resolve(&mut self, outcome: Result<Reply>) {
        self.resolved = true;
        if !self.shared.complete(self.id, outcome) {
            warn!(request_id = %self.id, "Reply for unknown request ignored");
        }
    }
}

impl fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySink").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Drop for ReplySink {
    fn drop(&mut self) {
        if !self.resolved {
            self.resolve(Err(TransportSnafu { message: "reply channel dropped" }.build()));
        }
    }
}
