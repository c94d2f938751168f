//! Numeric conversion and formatting helpers for cubespex-gui.

/// Convert usize to f64 with allowed precision loss.
#[allow(clippy::cast_precision_loss)]
pub fn usize_to_f64(value: usize) -> f64 {
    value as f64
}

/// Convert usize to f32 with allowed precision loss.
#[allow(clippy::cast_precision_loss)]
pub fn usize_to_f32(value: usize) -> f32 {
    value as f32
}

/// Convert f32 to u8 with clamping to [0, 255].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn f32_to_u8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 255.0);
    clamped.round() as u8
}

/// Narrow a normalised f64 to f32.
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_f32(value: f64) -> f32 {
    value as f32
}

/// Format an angle in degrees as sexagesimal `±dd:mm:ss.s`, or in hours
/// when `hours` is set (right ascension).
#[must_use]
pub fn sexagesimal(degrees: f64, hours: bool) -> String {
    let value = if hours {
        degrees.rem_euclid(360.0) / 15.0
    } else {
        degrees
    };
    let sign = if value < 0.0 { "-" } else { "" };
    let total = (value.abs() * 36_000.0).round() / 10.0;
    let whole = (total / 3600.0).floor();
    let minutes = ((total - whole * 3600.0) / 60.0).floor();
    let seconds = total - whole * 3600.0 - minutes * 60.0;
    format!("{sign}{whole:02}:{minutes:02}:{seconds:04.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_u8_clamps() {
        assert_eq!(f32_to_u8(-3.0), 0);
        assert_eq!(f32_to_u8(127.6), 128);
        assert_eq!(f32_to_u8(900.0), 255);
    }

    #[test]
    fn test_sexagesimal() {
        assert_eq!(sexagesimal(150.0, true), "10:00:00.0");
        assert_eq!(sexagesimal(-20.5, false), "-20:30:00.0");
        assert_eq!(sexagesimal(-15.0, true), "23:00:00.0");
    }
}
