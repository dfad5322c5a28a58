//! Blob-to-plaintext decoding.
//!
//! Reverses [`encode_save`](crate::encode_save) exactly: ECB-decrypt the whole
//! blob, strip the PKCS#7 padding by the count in the last byte, read the
//! 4-byte little-endian uncompressed length, and inflate the remainder. The
//! inflated data must fill the declared length exactly.

use crate::encoder::{BLOCK_SIZE, LEN_TRAILER_SIZE};
use crate::error::{CodecError, CodecResult};
use crate::key::AccountKey;
use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use aes::Aes256;
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Decodes an encrypted blob back into the plaintext record.
///
/// # Errors
///
/// Fails on an empty or misaligned blob, a padding byte outside `[1, 16]`,
/// a blob too short to carry the length trailer, or inflated output that
/// does not match the declared uncompressed length.
pub fn decode_save(blob: &[u8], key: &AccountKey) -> CodecResult<Vec<u8>> {
    if blob.is_empty() {
        return Err(CodecError::EmptyInput);
    }
    if blob.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::Misaligned { len: blob.len() });
    }

    let mut framed = blob.to_vec();
    let cipher = Aes256::new(GenericArray::from_slice(key.as_bytes()));
    for block in framed.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    // A single pad count, no per-byte validation; the host writes the same.
    let pad = *framed.last().unwrap_or(&0);
    if pad == 0 || pad as usize > BLOCK_SIZE || pad as usize > framed.len() {
        return Err(CodecError::InvalidPadding { value: pad });
    }
    framed.truncate(framed.len() - pad as usize);

    if framed.len() < LEN_TRAILER_SIZE {
        return Err(CodecError::Truncated { len: framed.len() });
    }
    let trailer_at = framed.len() - LEN_TRAILER_SIZE;
    let mut trailer = [0u8; LEN_TRAILER_SIZE];
    trailer.copy_from_slice(&framed[trailer_at..]);
    let declared = u32::from_le_bytes(trailer);
    framed.truncate(trailer_at);

    let mut plaintext = Vec::with_capacity(declared as usize);
    ZlibDecoder::new(framed.as_slice())
        .read_to_end(&mut plaintext)
        .map_err(|e| CodecError::decompression_failed(e.to_string()))?;

    if plaintext.len() != declared as usize {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: plaintext.len(),
        });
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_save;
    use crate::key::derive_account_key;
    use aes::cipher::BlockEncrypt;

    fn test_key() -> AccountKey {
        derive_account_key("72057594037927937").unwrap()
    }

    /// Encrypts an already framed-and-padded buffer, bypassing the encoder.
    fn raw_encrypt(mut framed: Vec<u8>, key: &AccountKey) -> Vec<u8> {
        let cipher = Aes256::new(GenericArray::from_slice(key.as_bytes()));
        for block in framed.chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        framed
    }

    #[test]
    fn hello_round_trip() {
        let key = test_key();
        let blob = encode_save(b"hello", &key).unwrap();
        assert_eq!(decode_save(&blob, &key).unwrap(), b"hello");
    }

    #[test]
    fn empty_blob_is_rejected() {
        assert_eq!(decode_save(b"", &test_key()), Err(CodecError::EmptyInput));
    }

    #[test]
    fn misaligned_blob_is_rejected() {
        let err = decode_save(&[0u8; 17], &test_key()).unwrap_err();
        assert_eq!(err, CodecError::Misaligned { len: 17 });
    }

    #[test]
    fn zero_pad_byte_is_rejected() {
        let key = test_key();
        let blob = raw_encrypt(vec![0u8; BLOCK_SIZE], &key);
        assert_eq!(
            decode_save(&blob, &key),
            Err(CodecError::InvalidPadding { value: 0 })
        );
    }

    #[test]
    fn oversized_pad_byte_is_rejected() {
        let key = test_key();
        let mut framed = vec![0u8; BLOCK_SIZE];
        framed[BLOCK_SIZE - 1] = 17;
        let blob = raw_encrypt(framed, &key);
        assert_eq!(
            decode_save(&blob, &key),
            Err(CodecError::InvalidPadding { value: 17 })
        );
    }

    #[test]
    fn pad_consuming_whole_blob_leaves_no_trailer() {
        let key = test_key();
        let mut framed = vec![0u8; BLOCK_SIZE];
        framed[BLOCK_SIZE - 1] = 16;
        let blob = raw_encrypt(framed, &key);
        assert_eq!(decode_save(&blob, &key), Err(CodecError::Truncated { len: 0 }));
    }

    #[test]
    fn corrupted_stream_is_rejected() {
        let key = test_key();
        let mut blob = encode_save(b"some plaintext that compresses", &key).unwrap();
        // Garble the first block; the zlib header lands there.
        blob[0] ^= 0xff;
        assert!(matches!(
            decode_save(&blob, &key),
            Err(CodecError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn wrong_declared_length_is_rejected() {
        let key = test_key();
        // Frame "hi" by hand with a declared length of 3.
        let mut framed = Vec::new();
        {
            use flate2::write::ZlibEncoder;
            use flate2::Compression;
            use std::io::Write;
            let mut enc = ZlibEncoder::new(&mut framed, Compression::default());
            enc.write_all(b"hi").unwrap();
            enc.finish().unwrap();
        }
        framed.extend_from_slice(&3u32.to_le_bytes());
        let pad = BLOCK_SIZE - (framed.len() % BLOCK_SIZE);
        framed.resize(framed.len() + pad, pad as u8);

        let blob = raw_encrypt(framed, &key);
        assert_eq!(
            decode_save(&blob, &key),
            Err(CodecError::LengthMismatch {
                declared: 3,
                actual: 2
            })
        );
    }
}
