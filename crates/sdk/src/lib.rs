//! Rust SDK for the Tally replicated double-entry ledger.
//!
//! The client turns batches of fixed-size records into requests, admits at
//! most `max_concurrency` of them at a time, hands them to a [`Transport`],
//! and routes each asynchronous reply back to the caller waiting on it.
//!
//! # Features
//!
//! - **Batched operations**: create and look up accounts and transfers in batches
//! - **Blocking or async**: every operation has a blocking form and an `_async`
//!   form returning an awaitable [`PendingReply`]
//! - **Bounded concurrency**: excess callers wait for a slot instead of failing
//! - **Graceful close**: in-flight requests drain before the transport shuts down
//! - **Pluggable transport**: any [`Transport`] implementation; [`mock`] ships an
//!   in-process ledger for tests
//!
//! # Quick Start
//!
//! ```no_run
//! use tally_sdk::{ClientConfig, LedgerClient, mock::MockLedgerServer};
//! use tally_types::{Account, Transfer};
//!
//! fn main() -> tally_sdk::Result<()> {
//!     let server = MockLedgerServer::start()?;
//!     let config = ClientConfig::builder()
//!         .with_replica_address("3001")
//!         .with_max_concurrency(8)
//!         .build()?;
//!     let client = LedgerClient::new(config, server.transport())?;
//!
//!     let errors = client.create_accounts(&[
//!         Account::new(1u128, 720, 1),
//!         Account::new(2u128, 720, 1),
//!     ])?;
//!     assert!(errors.is_empty());
//!
//!     let errors = client.create_transfers(&[Transfer::new(1u128, 2u128, 1u128, 100, 720, 1)])?;
//!     assert!(errors.is_empty());
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  LedgerClient (Public API)                  │
//! │  create_accounts │ create_transfers │ lookup_* │ *_async    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                Validation + Batch Codec                     │
//! │   Advisory checks │ Fixed-layout encode │ Reply decode      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Dispatcher                             │
//! │   Admission gate │ Correlation table │ Close draining       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Transport                              │
//! │   Packet out │ ReplySink in │ MockLedgerServer              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod dispatcher;
mod error;
pub mod metrics;
pub mod mock;
pub mod transport;

// Public API exports
pub use client::{LedgerClient, index_by_id};
pub use config::{ClientConfig, ClientConfigBuilder, ReplicaAddress, ValidationMode};
pub use dispatcher::PendingReply;
pub use error::{Result, SdkError};
pub use metrics::{MetricsSdkMetrics, NoopSdkMetrics, SdkMetrics};
pub use transport::{Packet, Reply, ReplySink, RequestId, Transport};

// Re-export the record types callers build batches from
pub use tally_types::{
    Account, AccountFlags, AccountId, CreateAccountResult, CreateAccountsResult,
    CreateTransferResult, CreateTransfersResult, Operation, RequestStatus, Transfer,
    TransferFlags, TransferId,
};
