//! SDK error types.
//!
//! Errors fall into four groups:
//! - **Local errors**: invalid construction arguments and oversized batches,
//!   raised before anything is sent
//! - **Request errors**: the ledger rejected a whole batch (`TooMuchData`)
//! - **Transport errors**: an in-flight request failed; only that request is affected
//! - **Lifecycle errors**: the client was closed
//!
//! Per-record business outcomes are never errors. They are returned as
//! [`CreateAccountResult`](tally_types::CreateAccountResult) and
//! [`CreateTransferResult`](tally_types::CreateTransferResult) values.

use snafu::{Location, Snafu};
use tally_types::{CodecError, RequestStatus};

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SdkError {
    /// Configuration validation error.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// A replica address could not be parsed.
    #[snafu(display("Invalid replica address '{address}': {message}"))]
    InvalidAddress {
        /// The rejected entry.
        address: String,
        /// Parse error description.
        message: String,
    },

    /// The batch does not fit in one message.
    #[snafu(display("Batch of {count} records exceeds the limit of {max_count} per message"))]
    BatchTooLarge {
        /// Records submitted.
        count: usize,
        /// Records that fit in one message.
        max_count: usize,
    },

    /// The reply could not be decoded.
    #[snafu(display("Malformed reply: {message}"))]
    MalformedReply {
        /// Decode error description.
        message: String,
    },

    /// A record failed client-side validation in enforcing mode.
    #[snafu(display("Record {index} failed validation: {message}"))]
    Validation {
        /// Position of the record in the batch.
        index: usize,
        /// The violated constraint.
        message: String,
    },

    /// The ledger rejected the whole batch.
    #[snafu(display("Request rejected: {status}"))]
    Request {
        /// Request-level status returned by the ledger.
        status: RequestStatus,
    },

    /// The request failed in transit.
    #[snafu(display("Transport error at {location}: {message}"))]
    Transport {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// The client was closed.
    #[snafu(display("Client closed"))]
    ClientClosed,
}

impl SdkError {
    /// Returns true if the request may succeed when submitted again.
    ///
    /// Only transport failures are transient. A batch that failed in transit
    /// may or may not have been applied; resubmission is safe because the
    /// ledger answers duplicates with `Exists`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Config { .. }
            | Self::InvalidAddress { .. }
            | Self::BatchTooLarge { .. }
            | Self::MalformedReply { .. }
            | Self::Validation { .. }
            | Self::Request { .. }
            | Self::ClientClosed => false,
        }
    }

    /// Returns true if the error reports a closed client.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClientClosed)
    }

    /// Returns the request-level status if the ledger rejected the batch.
    #[must_use]
    pub fn request_status(&self) -> Option<RequestStatus> {
        match self {
            Self::Request { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<CodecError> for SdkError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::BatchTooLarge { count, max_count } => {
                Self::BatchTooLarge { count, max_count }
            },
            other => Self::MalformedReply { message: other.to_string() },
        }
    }
}
