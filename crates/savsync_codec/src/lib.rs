//! # savsync codec
//!
//! Reversible transform between the two representations of a save record:
//! the human-editable plaintext document and the opaque binary blob the host
//! application reads and writes.
//!
//! The blob format is fixed by the host and must round-trip byte for byte:
//!
//! ```text
//! zlib(plaintext) | uncompressed_len: u32 LE | PKCS#7 pad to 16 | AES-256-ECB
//! ```
//!
//! The 256-bit key is derived per account from the folder's identifier
//! string; see [`derive_account_key`] for the two accepted identifier forms.
//!
//! ## Usage
//!
//! ```
//! use savsync_codec::{decode_save, derive_account_key, encode_save};
//!
//! let key = derive_account_key("72057594037927937").unwrap();
//! let blob = encode_save(b"hello", &key).unwrap();
//! assert_eq!(decode_save(&blob, &key).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod digest;
mod encoder;
mod error;
mod key;

pub use decoder::decode_save;
pub use digest::content_hash;
pub use encoder::encode_save;
pub use error::{CodecError, CodecResult};
pub use key::{derive_account_key, AccountKey, KEY_SIZE};
