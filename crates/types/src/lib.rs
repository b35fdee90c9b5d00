//! Ledger records, result codes, and the batch codec for the Tally client.
//!
//! This crate provides the foundational types used by the SDK:
//! - Identifier and flag types (AccountId, TransferFlags, etc.)
//! - Account and transfer records with client-side validation
//! - Per-record result codes and sparse result expansion
//! - Fixed-layout little-endian batch encoding
//! - Operation and request-status constants

pub mod account;
pub mod codec;
pub mod protocol;
pub mod results;
pub mod transfer;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use account::Account;
pub use codec::{CodecError, Record, decode_batch, encode_batch, max_batch_items};
pub use protocol::{DEFAULT_MAX_BODY_BYTES, HEADER_SIZE, MESSAGE_SIZE_MAX, Operation, RequestStatus};
pub use results::{
    CreateAccountResult, CreateAccountsResult, CreateTransferResult, CreateTransfersResult,
    UnknownResultCode, expand_account_results, expand_transfer_results,
};
pub use transfer::{Transfer, TransferKind};
pub use types::*;
pub use validation::{ExpectedResult, ValidationError, validate_account, validate_transfer};
