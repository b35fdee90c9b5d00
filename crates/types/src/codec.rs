//! Fixed-layout batch encoding.
//!
//! A batch is the concatenation of fixed-width records with no delimiters or
//! per-record length prefixes; the record count is implied by the message
//! length. Every integer is little-endian and every record type has stable
//! field offsets, so encoding is a pure function of the input slice and is safe
//! to call from any number of threads at once.
//!
//! Account layout (128 bytes):
//!
//! | Offset  | Field           |
//! |---------|-----------------|
//! | 0..16   | id              |
//! | 16..32  | user_data       |
//! | 32..48  | debits_pending  |
//! | 48..64  | debits_posted   |
//! | 64..80  | credits_pending |
//! | 80..96  | credits_posted  |
//! | 96..100 | ledger          |
//! | 100..102| code            |
//! | 102..104| flags           |
//! | 104..112| timestamp       |
//! | 112..128| reserved (zero) |
//!
//! Transfer layout (128 bytes):
//!
//! | Offset  | Field             |
//! |---------|-------------------|
//! | 0..16   | id                |
//! | 16..32  | debit_account_id  |
//! | 32..48  | credit_account_id |
//! | 48..64  | amount            |
//! | 64..80  | pending_id        |
//! | 80..96  | user_data         |
//! | 96..100 | timeout           |
//! | 100..104| ledger            |
//! | 104..106| code              |
//! | 106..108| flags             |
//! | 108..116| timestamp         |
//! | 116..128| reserved (zero)   |
//!
//! Create results are 8 bytes (`index: u32`, `result: u32`) and lookup ids are
//! 16 bytes.

use snafu::{Snafu, ensure};

use crate::{
    account::Account,
    results::{
        CreateAccountResult, CreateAccountsResult, CreateTransferResult, CreateTransfersResult,
    },
    transfer::Transfer,
    types::{AccountFlags, AccountId, TransferFlags, TransferId},
};

/// Error type for codec operations.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    /// The batch does not fit in one message.
    #[snafu(display("Batch of {count} records exceeds the limit of {max_count} per message"))]
    BatchTooLarge {
        /// Records submitted.
        count: usize,
        /// Records that fit in one message.
        max_count: usize,
    },

    /// A reply body is not a whole number of records.
    #[snafu(display(
        "Reply of {len} bytes is not a multiple of the {record_size}-byte record size"
    ))]
    MalformedReply {
        /// Reply body length.
        len: usize,
        /// Expected record width.
        record_size: usize,
    },

    /// A sparse result names an event outside the submitted batch.
    #[snafu(display("Result index {index} is outside a batch of {count} records"))]
    ResultIndexOutOfRange {
        /// Index named by the reply.
        index: u32,
        /// Records submitted.
        count: usize,
    },
}

/// A fixed-width wire record.
pub trait Record: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Writes the record into `buf`, which is exactly [`Self::SIZE`] bytes.
    fn encode_into(&self, buf: &mut [u8]);

    /// Reads a record from `buf`, which is exactly [`Self::SIZE`] bytes.
    fn decode_from(buf: &[u8]) -> Self;
}

/// Number of `R` records that fit in `max_bytes`.
#[inline]
pub const fn max_batch_items<R: Record>(max_bytes: usize) -> usize {
    max_bytes / R::SIZE
}

/// Encodes `records` into one message body.
///
/// # Errors
///
/// Returns `CodecError::BatchTooLarge` if `records.len() * R::SIZE` exceeds
/// `max_bytes`.
pub fn encode_batch<R: Record>(records: &[R], max_bytes: usize) -> Result<Vec<u8>, CodecError> {
    let max_count = max_batch_items::<R>(max_bytes);
    ensure!(records.len() <= max_count, BatchTooLargeSnafu { count: records.len(), max_count });

    let mut buf = vec![0u8; records.len() * R::SIZE];
    for (record, chunk) in records.iter().zip(buf.chunks_exact_mut(R::SIZE)) {
        record.encode_into(chunk);
    }
    Ok(buf)
}

/// Decodes a message body into records, preserving order.
///
/// # Errors
///
/// Returns `CodecError::MalformedReply` if `bytes` is not a multiple of `R::SIZE`.
pub fn decode_batch<R: Record>(bytes: &[u8]) -> Result<Vec<R>, CodecError> {
    ensure!(
        bytes.len() % R::SIZE == 0,
        MalformedReplySnafu { len: bytes.len(), record_size: R::SIZE }
    );
    Ok(bytes.chunks_exact(R::SIZE).map(R::decode_from).collect())
}

// ============================================================================
// Field helpers
// ============================================================================

#[inline]
fn put_u128(buf: &mut [u8], offset: usize, value: u128) {
    buf[offset..offset + 16].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn get_u128(buf: &[u8], offset: usize) -> u128 {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&buf[offset..offset + 16]);
    u128::from_le_bytes(bytes)
}

#[inline]
fn get_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[inline]
fn get_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn get_u16(buf: &[u8], offset: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&buf[offset..offset + 2]);
    u16::from_le_bytes(bytes)
}

// ============================================================================
// Record implementations
// ============================================================================

impl Record for Account {
    const SIZE: usize = 128;

    fn encode_into(&self, buf: &mut [u8]) {
        put_u128(buf, 0, self.id.value());
        put_u128(buf, 16, self.user_data);
        put_u128(buf, 32, self.debits_pending);
        put_u128(buf, 48, self.debits_posted);
        put_u128(buf, 64, self.credits_pending);
        put_u128(buf, 80, self.credits_posted);
        put_u32(buf, 96, self.ledger);
        put_u16(buf, 100, self.code);
        put_u16(buf, 102, self.flags.bits());
        put_u64(buf, 104, self.timestamp);
        buf[112..128].fill(0);
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            id: AccountId::new(get_u128(buf, 0)),
            user_data: get_u128(buf, 16),
            debits_pending: get_u128(buf, 32),
            debits_posted: get_u128(buf, 48),
            credits_pending: get_u128(buf, 64),
            credits_posted: get_u128(buf, 80),
            ledger: get_u32(buf, 96),
            code: get_u16(buf, 100),
            flags: AccountFlags::from_bits_retain(get_u16(buf, 102)),
            timestamp: get_u64(buf, 104),
        }
    }
}

impl Record for Transfer {
    const SIZE: usize = 128;

    fn encode_into(&self, buf: &mut [u8]) {
        put_u128(buf, 0, self.id.value());
        put_u128(buf, 16, self.debit_account_id.value());
        put_u128(buf, 32, self.credit_account_id.value());
        put_u128(buf, 48, self.amount);
        put_u128(buf, 64, self.pending_id.value());
        put_u128(buf, 80, self.user_data);
        put_u32(buf, 96, self.timeout);
        put_u32(buf, 100, self.ledger);
        put_u16(buf, 104, self.code);
        put_u16(buf, 106, self.flags.bits());
        put_u64(buf, 108, self.timestamp);
        buf[116..128].fill(0);
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            id: TransferId::new(get_u128(buf, 0)),
            debit_account_id: AccountId::new(get_u128(buf, 16)),
            credit_account_id: AccountId::new(get_u128(buf, 32)),
            amount: get_u128(buf, 48),
            pending_id: TransferId::new(get_u128(buf, 64)),
            user_data: get_u128(buf, 80),
            timeout: get_u32(buf, 96),
            ledger: get_u32(buf, 100),
            code: get_u16(buf, 104),
            flags: TransferFlags::from_bits_retain(get_u16(buf, 106)),
            timestamp: get_u64(buf, 108),
        }
    }
}

impl Record for AccountId {
    const SIZE: usize = 16;

    fn encode_into(&self, buf: &mut [u8]) {
        put_u128(buf, 0, self.value());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self::new(get_u128(buf, 0))
    }
}

impl Record for TransferId {
    const SIZE: usize = 16;

    fn encode_into(&self, buf: &mut [u8]) {
        put_u128(buf, 0, self.value());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self::new(get_u128(buf, 0))
    }
}

/// Decoding panics on result codes this client does not know.
impl Record for CreateAccountsResult {
    const SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.index);
        put_u32(buf, 4, self.result.value());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            index: get_u32(buf, 0),
            result: CreateAccountResult::from_value(get_u32(buf, 4)),
        }
    }
}

/// Decoding panics on result codes this client does not know.
impl Record for CreateTransfersResult {
    const SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.index);
        put_u32(buf, 4, self.result.value());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            index: get_u32(buf, 0),
            result: CreateTransferResult::from_value(get_u32(buf, 4)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_account() -> Account {
        let mut account = Account::new(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10u128, 720, 7)
            .with_user_data(u128::MAX)
            .with_flags(AccountFlags::LINKED | AccountFlags::DEBITS_MUST_NOT_EXCEED_CREDITS);
        account.debits_pending = 1;
        account.debits_posted = 2;
        account.credits_pending = 3;
        account.credits_posted = 4;
        account.timestamp = 0xdead_beef;
        account
    }

    #[test]
    fn test_account_field_offsets() {
        let bytes = encode_batch(&[sample_account()], 128).unwrap();
        assert_eq!(bytes.len(), 128);
        assert_eq!(bytes[0], 0x10);
        assert_eq!(bytes[15], 0x01);
        assert!(bytes[16..32].iter().all(|b| *b == 0xff));
        assert_eq!(bytes[32], 1);
        assert_eq!(bytes[48], 2);
        assert_eq!(bytes[64], 3);
        assert_eq!(bytes[80], 4);
        assert_eq!(&bytes[96..100], &720u32.to_le_bytes());
        assert_eq!(&bytes[100..102], &7u16.to_le_bytes());
        assert_eq!(&bytes[102..104], &3u16.to_le_bytes());
        assert_eq!(&bytes[104..112], &0xdead_beefu64.to_le_bytes());
        assert!(bytes[112..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_transfer_field_offsets() {
        let transfer = Transfer::new(1u128, 2u128, 3u128, 100, 720, 1)
            .with_flags(TransferFlags::PENDING)
            .with_timeout(60);
        let bytes = encode_batch(&[transfer], 128).unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[16], 2);
        assert_eq!(bytes[32], 3);
        assert_eq!(bytes[48], 100);
        assert_eq!(&bytes[96..100], &60u32.to_le_bytes());
        assert_eq!(&bytes[100..104], &720u32.to_le_bytes());
        assert_eq!(&bytes[104..106], &1u16.to_le_bytes());
        assert_eq!(&bytes[106..108], &2u16.to_le_bytes());
        assert!(bytes[116..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let accounts: Vec<Account> = (1..=5u128).map(|id| Account::new(id, 1, 1)).collect();
        let bytes = encode_batch(&accounts, 1024).unwrap();
        let decoded: Vec<Account> = decode_batch(&bytes).unwrap();
        assert_eq!(decoded, accounts);
    }

    #[test]
    fn test_empty_batch() {
        let bytes = encode_batch::<Transfer>(&[], 128).unwrap();
        assert!(bytes.is_empty());
        assert!(decode_batch::<Transfer>(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_batch_too_large() {
        let accounts = vec![sample_account(); 3];
        let err = encode_batch(&accounts, 2 * 128 + 127).unwrap_err();
        assert_eq!(err, CodecError::BatchTooLarge { count: 3, max_count: 2 });
        assert!(encode_batch(&accounts, 3 * 128).is_ok());
    }

    #[test]
    fn test_malformed_reply() {
        let err = decode_batch::<CreateAccountsResult>(&[0u8; 12]).unwrap_err();
        assert_eq!(err, CodecError::MalformedReply { len: 12, record_size: 8 });
    }

    #[test]
    fn test_result_records() {
        let items = [
            CreateTransfersResult { index: 0, result: CreateTransferResult::LinkedEventFailed },
            CreateTransfersResult { index: 1, result: CreateTransferResult::ExceedsCredits },
        ];
        let bytes = encode_batch(&items, 64).unwrap();
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &49u32.to_le_bytes());
        assert_eq!(decode_batch::<CreateTransfersResult>(&bytes).unwrap(), items);
    }

    #[test]
    #[should_panic(expected = "unknown CreateAccountResult code")]
    fn test_unknown_result_code_in_reply_panics() {
        let mut bytes = [0u8; 8];
        bytes[4..8].copy_from_slice(&999u32.to_le_bytes());
        let _ = decode_batch::<CreateAccountsResult>(&bytes);
    }

    #[test]
    fn test_max_batch_items() {
        assert_eq!(max_batch_items::<Account>(1024), 8);
        assert_eq!(max_batch_items::<AccountId>(1024), 64);
        assert_eq!(max_batch_items::<Transfer>(127), 0);
    }

    proptest! {
        #[test]
        fn prop_oversized_batches_are_rejected(extra in 1usize..8) {
            let ids: Vec<AccountId> = (0..(4 + extra) as u128).map(AccountId::new).collect();
            let err = encode_batch(&ids, 4 * AccountId::SIZE).unwrap_err();
            prop_assert_eq!(err, CodecError::BatchTooLarge { count: 4 + extra, max_count: 4 });
        }
    }
}
