//! Operations, request-level status codes and message size limits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    account::Account,
    codec::Record,
    results::{CreateAccountsResult, CreateTransfersResult},
    transfer::Transfer,
    types::{AccountId, TransferId},
};

/// Largest message the ledger accepts, header included.
pub const MESSAGE_SIZE_MAX: usize = 1024 * 1024;

/// Size of the message header that precedes every body.
pub const HEADER_SIZE: usize = 128;

/// Largest body a single request can carry.
pub const DEFAULT_MAX_BODY_BYTES: usize = MESSAGE_SIZE_MAX - HEADER_SIZE;

/// A batched ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Operation {
    /// Body: accounts. Reply: sparse [`CreateAccountsResult`]s.
    CreateAccounts = 128,
    /// Body: transfers. Reply: sparse [`CreateTransfersResult`]s.
    CreateTransfers = 129,
    /// Body: account ids. Reply: the accounts found, in request order.
    LookupAccounts = 130,
    /// Body: transfer ids. Reply: the transfers found, in request order.
    LookupTransfers = 131,
}

impl Operation {
    /// Returns the wire value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a wire value, returning `None` for unknown operations.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            128 => Some(Self::CreateAccounts),
            129 => Some(Self::CreateTransfers),
            130 => Some(Self::LookupAccounts),
            131 => Some(Self::LookupTransfers),
            _ => None,
        }
    }

    /// Width of one record in the request body.
    pub const fn request_record_size(self) -> usize {
        match self {
            Self::CreateAccounts => Account::SIZE,
            Self::CreateTransfers => Transfer::SIZE,
            Self::LookupAccounts => AccountId::SIZE,
            Self::LookupTransfers => TransferId::SIZE,
        }
    }

    /// Width of one record in the reply body.
    pub const fn reply_record_size(self) -> usize {
        match self {
            Self::CreateAccounts => CreateAccountsResult::SIZE,
            Self::CreateTransfers => CreateTransfersResult::SIZE,
            Self::LookupAccounts => Account::SIZE,
            Self::LookupTransfers => Transfer::SIZE,
        }
    }

    /// Returns the operation name used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAccounts => "create_accounts",
            Self::CreateTransfers => "create_transfers",
            Self::LookupAccounts => "lookup_accounts",
            Self::LookupTransfers => "lookup_transfers",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-request outcome, distinct from per-record results.
///
/// Anything but `Ok` means the ledger rejected the batch as a unit and no
/// record in it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RequestStatus {
    /// The batch was processed; inspect per-record results.
    Ok = 0,
    /// The batch holds more records than the ledger accepts in one message.
    TooMuchData = 1,
    /// The operation is not recognised.
    InvalidOperation = 2,
    /// The body is not a whole number of records.
    InvalidDataSize = 3,
}

impl RequestStatus {
    /// Returns `true` for `Ok`.
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::TooMuchData => "too_much_data",
            Self::InvalidOperation => "invalid_operation",
            Self::InvalidDataSize => "invalid_data_size",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::max_batch_items;

    #[test]
    fn test_default_body_limit() {
        assert_eq!(DEFAULT_MAX_BODY_BYTES, 1_048_448);
        assert_eq!(max_batch_items::<Account>(DEFAULT_MAX_BODY_BYTES), 8191);
        assert_eq!(max_batch_items::<Transfer>(DEFAULT_MAX_BODY_BYTES), 8191);
    }

    #[test]
    fn test_operation_wire_values() {
        for op in [
            Operation::CreateAccounts,
            Operation::CreateTransfers,
            Operation::LookupAccounts,
            Operation::LookupTransfers,
        ] {
            assert_eq!(Operation::from_u8(op.as_u8()), Some(op));
        }
        assert_eq!(Operation::from_u8(0), None);
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(Operation::CreateAccounts.request_record_size(), 128);
        assert_eq!(Operation::CreateAccounts.reply_record_size(), 8);
        assert_eq!(Operation::LookupTransfers.request_record_size(), 16);
        assert_eq!(Operation::LookupTransfers.reply_record_size(), 128);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RequestStatus::TooMuchData.to_string(), "too_much_data");
        assert!(RequestStatus::Ok.is_ok());
        assert!(!RequestStatus::InvalidDataSize.is_ok());
    }
}
