//! Account key derivation.
//!
//! Every account folder is named by an opaque identifier string, and the key
//! that encrypts its records is derived from that identifier alone. Two
//! literal forms exist, distinguished purely by shape:
//!
//! - exactly 32 characters: a wide identifier. The host encodes it as
//!   UTF-16-LE before folding it into the key, so only even key bytes are
//!   touched and only the first 16 characters fit before the encoded form
//!   runs off the end of the 32-byte key.
//! - anything shorter: a decimal 64-bit account number. The eight
//!   little-endian value bytes are folded into the front of the key.
//!
//! Identifiers longer than 32 characters can never be valid and fail
//! immediately.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the derived key in bytes.
pub const KEY_SIZE: usize = 32;

/// Length of a wide (non-numeric) account identifier.
const WIDE_ID_LEN: usize = 32;

/// Smallest value accepted for a numeric account identifier.
///
/// Real numeric account IDs are 17-digit values well above this floor;
/// anything below it is rejected as not an account number at all.
const NUMERIC_ID_FLOOR: u64 = 0x0100_0000_0000_0000;

/// Published base constant the per-account key is derived from.
///
/// This is a fixed domain constant shared with the host application, not a
/// runtime secret.
const BASE_KEY: [u8; KEY_SIZE] = [
    0x35, 0xec, 0x33, 0x77, 0xf3, 0x5d, 0xb0, 0xea, 0xbe, 0x6b, 0x83, 0x11, 0x54, 0x03, 0xeb,
    0xfb, 0x27, 0x25, 0x64, 0x2e, 0xd5, 0x49, 0x06, 0x29, 0x05, 0x78, 0xbd, 0x60, 0xba, 0x4a,
    0xa7, 0x87,
];

/// Derived per-account encryption key.
///
/// The key is zeroized when dropped and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccountKey {
    bytes: [u8; KEY_SIZE],
}

impl AccountKey {
    /// Returns the raw key bytes.
    ///
    /// # Security
    ///
    /// Do not log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derives the encryption key for an account identifier.
///
/// Returns `None` when the identifier matches neither literal form. The
/// failure is permanent for a given identifier: callers cache it and never
/// retry.
#[must_use]
pub fn derive_account_key(account_id: &str) -> Option<AccountKey> {
    // Nothing valid is longer than a wide identifier.
    if account_id.len() > WIDE_ID_LEN {
        return None;
    }

    let mut bytes = BASE_KEY;

    if account_id.len() == WIDE_ID_LEN {
        // Wide form. The UTF-16-LE encoding doubles the identifier to 64
        // bytes, so the second half falls off the end of the key and the
        // odd (high) bytes XOR with zero. No character validation.
        for (i, ch) in account_id.bytes().take(WIDE_ID_LEN / 2).enumerate() {
            bytes[2 * i] ^= ch;
        }
        return Some(AccountKey { bytes });
    }

    // Numeric form: parse the leading run of digits. Trailing non-digit
    // characters after a valid prefix are tolerated.
    let digits = &account_id[..account_id
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(account_id.len())];
    let uid: u64 = digits.parse().ok()?;
    if uid < NUMERIC_ID_FLOOR {
        return None;
    }

    for (i, b) in uid.to_le_bytes().iter().enumerate() {
        bytes[i] ^= b;
    }
    Some(AccountKey { bytes })
}
