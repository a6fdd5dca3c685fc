//! Conversion between little-endian PCM bytes and 16-bit samples.

use crate::error::AudioError;
use crate::AudioResult;

/// Decode one little-endian byte pair into a sample.
#[inline]
pub fn sample_from_le_pair(low: u8, high: u8) -> i16 {
    i16::from_le_bytes([low, high])
}

/// Decode little-endian PCM bytes into samples.
///
/// This is the portable path and is always available.
pub fn bytes_to_samples(bytes: &[u8]) -> AudioResult<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::OddByteCount(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| sample_from_le_pair(pair[0], pair[1]))
        .collect())
}

/// Reinterpret little-endian PCM bytes as samples without copying.
///
/// Returns `None` when the platform is big-endian, the buffer is not
/// aligned for `i16`, or the length is odd. Callers fall back to
/// [`bytes_to_samples`] in that case.
pub fn samples_zero_copy(bytes: &[u8]) -> Option<&[i16]> {
    if cfg!(target_endian = "big") || bytes.len() % 2 != 0 {
        return None;
    }
    if (bytes.as_ptr() as usize) % std::mem::align_of::<i16>() != 0 {
        return None;
    }

    // Alignment, length and byte order were checked above.
    Some(unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const i16, bytes.len() / 2) })
}

/// Encode samples as little-endian PCM bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
