//! Uncompressed L16 payloads.

use crate::error::CodecError;
use crate::{AudioDecoder, CodecKind, CodecResult};

/// Converts network-order L16 samples to the little-endian layout the
/// rest of the pipeline expects.
#[derive(Debug, Default)]
pub struct PcmDecoder;

impl PcmDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for PcmDecoder {
    fn decode(&mut self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        if frame.len() % 2 != 0 {
            return Err(CodecError::InvalidFrame(format!(
                "L16 frame of {} bytes",
                frame.len()
            )));
        }

        let mut pcm = Vec::with_capacity(frame.len());
        for pair in frame.chunks_exact(2) {
            pcm.push(pair[1]);
            pcm.push(pair[0]);
        }
        Ok(pcm)
    }

    fn kind(&self) -> CodecKind {
        CodecKind::Pcm
    }

    fn name(&self) -> &'static str {
        "pcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_to_little_endian() {
        let mut decoder = PcmDecoder::new();
        let out = decoder.decode(&[0x12, 0x34, 0xFF, 0xFE]).unwrap();
        assert_eq!(out, vec![0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn test_odd_length_rejected() {
        let mut decoder = PcmDecoder::new();
        assert!(matches!(
            decoder.decode(&[1, 2, 3]),
            Err(CodecError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_empty_frame_is_empty_pcm() {
        let mut decoder = PcmDecoder::new();
        assert!(decoder.decode(&[]).unwrap().is_empty());
    }
}
