//! Volume mapping and PCM normalization.
//!
//! The same mapping drives both the gain applied to local PCM and the
//! `volume` parameter sent to remote receivers, which expect a dB value.

/// Attenuation that receivers treat as silence.
pub const MUTED_VOLUME_DB: f64 = -144.0;

/// Width of the audible control range below unity gain.
pub const VOLUME_RANGE_DB: f64 = 30.0;

/// Map a linear volume in `0.0..=1.0` to receiver dB.
///
/// `0` is full attenuation, `1` is unity, and everything in between maps
/// linearly onto `-30..0`. Out-of-range and NaN inputs are clamped.
pub fn volume_to_db(volume: f64) -> f64 {
    if volume.is_nan() || volume <= 0.0 {
        MUTED_VOLUME_DB
    } else if volume >= 1.0 {
        0.0
    } else {
        volume * VOLUME_RANGE_DB - VOLUME_RANGE_DB
    }
}

/// Convert a dB value to a linear amplitude multiplier.
pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Linear multiplier applied to samples for a given volume.
pub fn volume_to_gain(volume: f64) -> f64 {
    db_to_gain(volume_to_db(volume))
}

/// Scale little-endian 16-bit PCM in place for `volume`.
///
/// A trailing odd byte is left untouched.
pub fn normalize_audio(pcm: &mut [u8], volume: f64) {
    let gain = volume_to_gain(volume);
    if gain == 1.0 {
        return;
    }

    for pair in pcm.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        let scaled = (sample as f64 * gain)
            .round()
            .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        pair.copy_from_slice(&scaled.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiobridge_audio::{bytes_to_samples, samples_to_bytes};
    use proptest::prelude::*;

    #[test]
    fn test_mapping_endpoints() {
        assert_eq!(volume_to_db(0.0), MUTED_VOLUME_DB);
        assert_eq!(volume_to_db(1.0), 0.0);
        assert_eq!(volume_to_db(0.5), -15.0);
        assert_eq!(volume_to_db(-3.0), MUTED_VOLUME_DB);
        assert_eq!(volume_to_db(7.0), 0.0);
        assert_eq!(volume_to_db(f64::NAN), MUTED_VOLUME_DB);
    }

    #[test]
    fn test_unity_gain() {
        assert_eq!(volume_to_gain(1.0), 1.0);
    }

    #[test]
    fn test_half_volume_attenuates() {
        let mut pcm = samples_to_bytes(&[10000, -10000]);
        normalize_audio(&mut pcm, 0.5);
        let samples = bytes_to_samples(&pcm).unwrap();

        // -15 dB is a factor of about 0.178.
        assert_eq!(samples, vec![1778, -1778]);
    }

    #[test]
    fn test_odd_trailing_byte_untouched() {
        let mut pcm = vec![0xFF, 0x7F, 0xAB];
        normalize_audio(&mut pcm, 0.0);
        assert_eq!(pcm, vec![0, 0, 0xAB]);
    }

    proptest! {
        #[test]
        fn prop_full_volume_is_identity(samples in proptest::collection::vec(any::<i16>(), 0..512)) {
            let mut pcm = samples_to_bytes(&samples);
            normalize_audio(&mut pcm, 1.0);
            prop_assert_eq!(bytes_to_samples(&pcm).unwrap(), samples);
        }

        #[test]
        fn prop_zero_volume_is_silent(samples in proptest::collection::vec(any::<i16>(), 0..512)) {
            let mut pcm = samples_to_bytes(&samples);
            normalize_audio(&mut pcm, 0.0);
            prop_assert!(bytes_to_samples(&pcm).unwrap().iter().all(|&s| s == 0));
        }

        #[test]
        fn prop_never_amplifies(
            samples in proptest::collection::vec(any::<i16>(), 0..256),
            volume in 0.0f64..=1.0,
        ) {
            let mut pcm = samples_to_bytes(&samples);
            normalize_audio(&mut pcm, volume);
            let out = bytes_to_samples(&pcm).unwrap();
            for (before, after) in samples.iter().zip(out.iter()) {
                prop_assert!((*after as i32).abs() <= (*before as i32).abs());
            }
        }

        #[test]
        fn prop_mapping_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(volume_to_db(lo) <= volume_to_db(hi));
        }

        #[test]
        fn prop_mapping_linear_inside_range(v in 0.001f64..0.999) {
            let expected = v * VOLUME_RANGE_DB - VOLUME_RANGE_DB;
            prop_assert!((volume_to_db(v) - expected).abs() < 1e-9);
            prop_assert!(volume_to_db(v) > -VOLUME_RANGE_DB && volume_to_db(v) < 0.0);
        }
    }
}
