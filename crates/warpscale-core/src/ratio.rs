//! Symmetric "close enough" test between two magnitudes.

/// True iff `v1` and `v2` are each within a factor of `1/threshold` of
/// the other, i.e. `threshold*v1 < v2 && threshold*v2 < v1`.
///
/// `threshold` is expected in `(0, 1)`. Zero, negative, or NaN inputs
/// never pass.
pub fn within_threshold(threshold: f64, v1: f64, v2: f64) -> bool {
    if !(threshold > 0.0 && threshold < 1.0) || !(v1 > 0.0 && v2 > 0.0) {
        return false;
    }
    threshold * v1 < v2 && threshold * v2 < v1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_values_pass() {
        assert!(within_threshold(0.8, 100.0, 90.0));
        assert!(within_threshold(0.5, 10.0, 10.0));
    }

    #[test]
    fn distant_values_fail() {
        // 0.8 * 100 = 80, which is not below 70.
        assert!(!within_threshold(0.8, 100.0, 70.0));
        assert!(!within_threshold(0.5, 1.0, 3.0));
    }

    #[test]
    fn symmetric() {
        let pairs = [(100.0, 70.0), (10.0, 12.0), (3.0, 1.0), (0.0, 5.0), (42.0, 42.0)];
        for t in [0.1, 0.5, 0.8, 0.99] {
            for (a, b) in pairs {
                assert_eq!(within_threshold(t, a, b), within_threshold(t, b, a));
            }
        }
    }

    #[test]
    fn degenerate_inputs_fail_closed() {
        assert!(!within_threshold(0.5, 0.0, 0.0));
        assert!(!within_threshold(0.5, -4.0, -4.0));
        assert!(!within_threshold(0.5, f64::NAN, 1.0));
        assert!(!within_threshold(0.0, 1.0, 1.0));
        assert!(!within_threshold(1.0, 1.0, 1.0));
    }
}
