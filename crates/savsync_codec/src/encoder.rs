//! Plaintext-to-blob encoding.
//!
//! The wire format must match the host application byte for byte:
//!
//! ```text
//! zlib(plaintext) | uncompressed_len: u32 LE | PKCS#7 pad to 16 | AES-256-ECB
//! ```
//!
//! A buffer that is already block-aligned still receives a full 16-byte
//! padding block, so the pad count is always in `[1, 16]`.

use crate::error::{CodecError, CodecResult};
use crate::key::AccountKey;
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Cipher block size in bytes.
pub(crate) const BLOCK_SIZE: usize = 16;

/// Size of the uncompressed-length trailer in bytes.
pub(crate) const LEN_TRAILER_SIZE: usize = 4;

/// Encodes a plaintext record into an encrypted blob.
///
/// # Errors
///
/// Returns [`CodecError::EmptyInput`] for a zero-length buffer; callers are
/// required to skip empty source files entirely rather than encode them.
pub fn encode_save(plaintext: &[u8], key: &AccountKey) -> CodecResult<Vec<u8>> {
    if plaintext.is_empty() {
        return Err(CodecError::EmptyInput);
    }
    let declared = u32::try_from(plaintext.len()).map_err(|_| CodecError::InputTooLarge {
        len: plaintext.len(),
    })?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(plaintext)
        .map_err(|e| CodecError::compression_failed(e.to_string()))?;
    let mut framed = encoder
        .finish()
        .map_err(|e| CodecError::compression_failed(e.to_string()))?;

    framed.extend_from_slice(&declared.to_le_bytes());

    // Always pad, even when already aligned.
    let pad = BLOCK_SIZE - (framed.len() % BLOCK_SIZE);
    framed.resize(framed.len() + pad, pad as u8);

    let cipher = Aes256::new(GenericArray::from_slice(key.as_bytes()));
    for block in framed.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    Ok(framed)
}
