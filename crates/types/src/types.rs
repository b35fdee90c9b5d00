//! Identifier and flag types shared by accounts and transfers.
//!
//! Identifiers are 128-bit values assigned by the caller. Zero is reserved as
//! the "unset" value and is rejected by the ledger for primary keys.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a numeric type for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<inner>` and `Into<inner>` conversions
/// - `Display` with a semantic prefix (e.g., `account:123`)
/// - `new()` constructor, `value()` accessor, and `is_zero()`
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $inner:ty, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// The unset identifier.
            pub const ZERO: Self = Self(0);

            /// Creates a new identifier from a raw value.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }

            /// Returns `true` for the unset identifier.
            #[inline]
            pub const fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = <$inner as std::str::FromStr>::Err;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<$inner>().map(Self)
            }
        }
    };
}

define_id!(
    /// Caller-assigned identifier of an account.
    ///
    /// # Display
    ///
    /// Formats with `account:` prefix: `account:42`.
    AccountId, u128, "account"
);

define_id!(
    /// Caller-assigned identifier of a transfer.
    ///
    /// Also used as the `pending_id` reference from a post or void transfer to
    /// the pending transfer it resolves.
    ///
    /// # Display
    ///
    /// Formats with `transfer:` prefix: `transfer:7`.
    TransferId, u128, "transfer"
);

/// A record keyed by a caller-assigned identifier.
pub trait Identified {
    /// Identifier type.
    type Id: Copy + Eq + std::hash::Hash + fmt::Debug;

    /// Returns the record's identifier.
    fn record_id(&self) -> Self::Id;
}

// ============================================================================
// Flag Sets
// ============================================================================

/// Generates a `u16` flag-set newtype with named bits.
///
/// Bits outside the declared set are reserved. They survive encode/decode
/// untouched (`from_bits_retain`) so the ledger can reject them, and
/// [`has_reserved_bits`](AccountFlags::has_reserved_bits) reports them locally.
macro_rules! define_flags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$flag_meta:meta])*
                $flag:ident = $bit:expr;
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u16);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self($bit);
            )+

            /// Mask of every named bit.
            pub const KNOWN: u16 = 0 $(| $bit)+;

            /// The empty set.
            #[inline]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Builds a set from raw bits, keeping reserved bits.
            #[inline]
            pub const fn from_bits_retain(bits: u16) -> Self {
                Self(bits)
            }

            /// Returns the raw bits.
            #[inline]
            pub const fn bits(self) -> u16 {
                self.0
            }

            /// Returns `true` if every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns `true` if no bit is set.
            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Returns `true` if any bit outside the named set is present.
            #[inline]
            pub const fn has_reserved_bits(self) -> bool {
                self.0 & !Self::KNOWN != 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

define_flags!(
    /// Flags controlling how an account participates in a batch and which
    /// balance limits the ledger enforces on it.
    AccountFlags {
        /// Chains this event with the next one in the batch.
        LINKED = 1 << 0;
        /// Rejects transfers that would make `debits_pending + debits_posted`
        /// exceed `credits_posted`.
        DEBITS_MUST_NOT_EXCEED_CREDITS = 1 << 1;
        /// Rejects transfers that would make `credits_pending + credits_posted`
        /// exceed `debits_posted`.
        CREDITS_MUST_NOT_EXCEED_DEBITS = 1 << 2;
    }
);

define_flags!(
    /// Flags selecting the transfer kind and batch chaining.
    TransferFlags {
        /// Chains this event with the next one in the batch.
        LINKED = 1 << 0;
        /// Reserves the amount in the pending balances.
        PENDING = 1 << 1;
        /// Posts the pending transfer named by `pending_id`.
        POST_PENDING_TRANSFER = 1 << 2;
        /// Voids the pending transfer named by `pending_id`.
        VOID_PENDING_TRANSFER = 1 << 3;
    }
);
