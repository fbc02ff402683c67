//! Linear ratio ↔ decibel conversion
//!
//! Selection works on linear power ratios throughout. These helpers exist
//! for the reporting boundary and log fields only.
//!
//! ## Example
//!
//! ```rust
//! use bft_core::units::{ratio_to_db, db_to_ratio};
//!
//! assert!((ratio_to_db(100.0) - 20.0).abs() < 1e-10);
//! assert!((db_to_ratio(-3.0) - 0.501187).abs() < 1e-6);
//! ```

/// Floor applied before the logarithm; a blocked sector reports -300 dB.
const RATIO_FLOOR: f64 = 1e-30;

/// Convert a linear power ratio to dB: `10 * log10(x)`.
#[inline]
pub fn ratio_to_db(ratio: f64) -> f64 {
    10.0 * ratio.abs().max(RATIO_FLOOR).log10()
}

/// Convert dB back to a linear power ratio: `10^(db/10)`.
#[inline]
pub fn db_to_ratio(db: f64) -> f64 {
    10.0f64.powf(db / 10.0)
}

/// Batch convert ratios to dB.
pub fn ratios_to_db(input: &[f64]) -> Vec<f64> {
    input.iter().map(|&r| ratio_to_db(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_to_db() {
        assert!((ratio_to_db(1.0) - 0.0).abs() < 1e-10);
        assert!((ratio_to_db(10.0) - 10.0).abs() < 1e-10);
        assert!((ratio_to_db(0.01) - (-20.0)).abs() < 1e-10);
    }

    #[test]
    fn test_blocked_sector_is_floored() {
        assert!((ratio_to_db(0.0) - (-300.0)).abs() < 1e-10);
    }

    #[test]
    fn test_db_roundtrip() {
        for &val in &[0.001, 0.3, 1.0, 42.0, 1000.0] {
            let recovered = db_to_ratio(ratio_to_db(val));
            assert!(
                (recovered - val).abs() / val < 1e-10,
                "roundtrip failed for {val}"
            );
        }
    }

    #[test]
    fn test_batch() {
        let db = ratios_to_db(&[1.0, 100.0]);
        assert_eq!(db.len(), 2);
        assert!((db[1] - 20.0).abs() < 1e-10);
    }
}
