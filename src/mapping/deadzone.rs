//! Axis deadzone filter

/// Readings with a magnitude below this are treated as noise
pub const AXIS_DEADZONE: f64 = 0.05;

/// Zeroes near-zero axis noise and passes everything else through unchanged.
///
/// Unlike a rescaling deadzone, values outside the band are not stretched and
/// not rounded; rounding to the wire precision happens in the payload builder.
pub fn apply_deadzone(raw: f64) -> f64 {
    if raw.abs() < AXIS_DEADZONE {
        0.0
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_band_is_zero() {
        for raw in [0.0, 0.01, -0.01, 0.049, -0.049, 0.0499999] {
            assert_eq!(apply_deadzone(raw), 0.0, "raw = {raw}");
        }
    }

    #[test]
    fn outside_band_is_identity() {
        for raw in [0.05, -0.05, 0.123, -0.32, 1.0, -1.0] {
            assert_eq!(apply_deadzone(raw), raw, "raw = {raw}");
        }
    }

    #[test]
    fn negative_noise_yields_positive_zero() {
        assert!(apply_deadzone(-0.02).is_sign_positive());
    }
}
