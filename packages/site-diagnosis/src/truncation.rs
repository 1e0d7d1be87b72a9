//! Keep-fraction arithmetic shared by the budget fitter and the invoker.

use serde::Serialize;
use std::fmt;

/// Largest absolute cut taken by a single shrink step.
pub const MAX_SHRINK_STEP: f64 = 0.05;

/// Proportion of a text retained after truncation. Always in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct KeepFraction(f64);

impl KeepFraction {
    /// Keep everything.
    pub const FULL: Self = Self(1.0);

    /// Returns `None` unless `0 < value <= 1`.
    pub fn new(value: f64) -> Option<Self> {
        (value > 0.0 && value <= 1.0).then_some(Self(value))
    }

    /// `min(budget / used, 1)`, the fraction that scales `used` down to `budget`.
    ///
    /// An empty measurement keeps everything. A zero budget is clamped to the
    /// smallest positive fraction so the invariant holds.
    pub fn fitting(budget: usize, used: usize) -> Self {
        if used == 0 || budget >= used {
            return Self::FULL;
        }
        let ratio = budget as f64 / used as f64;
        Self(ratio.max(f64::MIN_POSITIVE))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Next fraction after an input-too-large rejection.
    ///
    /// Subtracts `min(0.05, self / 2)`: a flat 5% cut while the fraction is large
    /// and a halving once it drops below 0.1. Returns `None` once the halving
    /// underflows and the result would be zero or no smaller, so every returned
    /// fraction is positive and strictly below `self`.
    pub fn shrink(self) -> Option<Self> {
        let step = MAX_SHRINK_STEP.min(self.0 / 2.0);
        let next = self.0 - step;
        (next > 0.0 && next < self.0).then_some(Self(next))
    }

    /// Number of characters kept out of `len`: `floor(len * fraction)`.
    pub fn apply_to_len(self, len: usize) -> usize {
        if self.0 >= 1.0 {
            return len;
        }
        ((len as f64) * self.0).floor() as usize
    }
}

impl Default for KeepFraction {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for KeepFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Keep the first `floor(chars * fraction)` characters of `text`.
///
/// Character based, not token or word aware: the cut may land mid-word.
pub fn truncate_chars(text: &str, fraction: KeepFraction) -> String {
    let total = text.chars().count();
    let keep = fraction.apply_to_len(total);
    if keep >= total {
        return text.to_string();
    }
    text.chars().take(keep).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(KeepFraction::new(0.0).is_none());
        assert!(KeepFraction::new(-0.5).is_none());
        assert!(KeepFraction::new(1.01).is_none());
        assert!(KeepFraction::new(f64::NAN).is_none());
        assert_eq!(KeepFraction::new(1.0), Some(KeepFraction::FULL));
    }

    #[test]
    fn test_fitting() {
        assert_eq!(KeepFraction::fitting(100, 0), KeepFraction::FULL);
        assert_eq!(KeepFraction::fitting(100, 50), KeepFraction::FULL);
        assert_eq!(KeepFraction::fitting(100, 400).value(), 0.25);
        assert!(KeepFraction::fitting(0, 400).value() > 0.0);
    }

    #[test]
    fn test_shrink_flat_then_halving() {
        let f = KeepFraction::FULL.shrink().unwrap();
        assert!((f.value() - 0.95).abs() < 1e-12);

        let small = KeepFraction::new(0.08).unwrap().shrink().unwrap();
        assert!((small.value() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_shrink_sequence_strictly_decreasing_until_exhausted() {
        let mut current = KeepFraction::FULL;
        let mut steps = 0;
        while let Some(next) = current.shrink() {
            assert!(next.value() < current.value());
            assert!(next.value() > 0.0);
            current = next;
            steps += 1;
            assert!(steps < 2000, "shrinking never bottomed out");
        }
        assert!(steps > 40);
    }

    #[test]
    fn test_smallest_fraction_cannot_shrink() {
        let smallest = KeepFraction::new(f64::from_bits(1)).unwrap();
        assert_eq!(smallest.shrink(), None);

        let floor = KeepFraction::fitting(0, 400);
        let mut current = floor;
        while let Some(next) = current.shrink() {
            current = next;
        }
        assert!(current.value() > 0.0);
        assert!(current.value() <= floor.value());
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo wörld", KeepFraction::new(0.5).unwrap()), "héllo");
        assert_eq!(truncate_chars("abc", KeepFraction::FULL), "abc");
        assert_eq!(truncate_chars("abc", KeepFraction::new(0.1).unwrap()), "");
    }

    proptest! {
        #[test]
        fn prop_truncated_length_bounded(text in ".{0,200}", fraction in 0.0001f64..=1.0) {
            let kf = KeepFraction::new(fraction).unwrap();
            let full = text.chars().count();
            let kept = truncate_chars(&text, kf).chars().count();
            prop_assert!(kept as f64 <= (full as f64 * fraction).ceil());
            prop_assert!(text.starts_with(&truncate_chars(&text, kf)));
        }
    }
}
