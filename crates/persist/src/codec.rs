//! CBOR + zstd encoding and sha256 content hashes.

use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

const ZSTD_LEVEL: i32 = 3;

pub(crate) fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

pub(crate) fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

pub(crate) fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), ZSTD_LEVEL)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub(crate) fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

/// CBOR, then zstd.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    zstd_compress(&cbor_serialize(value)?)
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    cbor_deserialize(&zstd_decompress(data)?)
}

/// Lowercase hex sha256.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn encode_decode_preserves_value() {
        let value = vec![(1u64, "one".to_string()), (2, "two".to_string())];
        let bytes = encode(&value).unwrap();
        let back: Vec<(u64, String)> = decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode::<Vec<u64>>(b"not zstd at all").is_err());
    }
}
