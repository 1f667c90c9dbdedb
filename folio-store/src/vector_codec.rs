//! Packing/unpacking float32 vectors as little-endian blobs (component C4).

use crate::error::{Result, StoreError};

/// Pack a vector of `f32` into a little-endian byte blob of length `4 * dim`.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian byte blob into a vector of `f32`, rejecting blobs
/// whose length is not exactly `4 * dim`.
pub fn decode(blob: &[u8], dim: usize) -> Result<Vec<f32>> {
    let expected = dim * 4;
    if blob.len() != expected {
        return Err(StoreError::BlobShapeMismatch {
            dim,
            expected,
            actual: blob.len(),
        });
    }
    let mut out = Vec::with_capacity(dim);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bit_exact() {
        let original = vec![1.0f32, -2.5, 0.0, f32::MIN_POSITIVE, 3.1415926];
        let blob = encode(&original);
        assert_eq!(blob.len(), original.len() * 4);
        let decoded = decode(&blob, original.len()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn rejects_mismatched_blob_length() {
        let blob = encode(&[1.0, 2.0, 3.0]);
        let err = decode(&blob, 4).unwrap_err();
        match err {
            StoreError::BlobShapeMismatch {
                dim,
                expected,
                actual,
            } => {
                assert_eq!(dim, 4);
                assert_eq!(expected, 16);
                assert_eq!(actual, 12);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
