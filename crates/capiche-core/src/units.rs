//! Physical constants, unit scaling and number formatting.
//!
//! All lengths in capiche are in microns. The field solver reports
//! capacitance per unit length in F/m for a 2D cross-section drawn in
//! microns; everything the fitter reports is in aF/um (per unit length) or
//! aF/um^2 (per unit area).

/// Vacuum permittivity in aF/um.
pub const EPSILON_0: f64 = 8.854;

/// Multiplier from solver units (F/m) to aF/um.
pub const SOLVER_TO_AF_PER_UM: f64 = 1e12;

/// Convert a raw solver capacitance to aF/um.
pub fn to_af_per_um(raw: f64) -> f64 {
    raw * SOLVER_TO_AF_PER_UM
}

/// Generate `start, start + step, ...` up to but excluding `stop`.
///
/// Negative steps count downward. A zero step, or a step pointing away from
/// `stop`, yields an empty range.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step == 0.0 || !step.is_finite() {
        return Vec::new();
    }
    let span = (stop - start) / step;
    if span <= 0.0 {
        return Vec::new();
    }
    let count = span.ceil() as usize;
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Format a length for a result table or cache key (four decimals).
pub fn format_length(value: f64) -> String {
    let s = format!("{:.4}", value);
    // "-0.0000" and "0.0000" must key identically
    if s.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        "0.0000".to_string()
    } else {
        s
    }
}

/// Format a value with `digits` significant figures, trimming trailing zeros
/// the way `%g` does.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() {
            "0".to_string()
        } else {
            format!("{}", value)
        };
    }

    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;

    if exponent < -4 || exponent >= digits as i32 {
        let formatted = format!("{:.*e}", digits - 1, value);
        match formatted.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", trim_zeros(mantissa), exp),
            None => formatted,
        }
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arange_upward() {
        let values = arange(0.14, 1.5, 0.25);
        assert_eq!(values.len(), 6);
        assert!((values[0] - 0.14).abs() < 1e-12);
        assert!((values[5] - 1.39).abs() < 1e-12);
    }

    #[test]
    fn test_arange_downward_and_empty() {
        let values = arange(-0.075, -1.0, -0.25);
        assert_eq!(values.len(), 4);
        assert!((values[3] + 0.825).abs() < 1e-12);

        assert!(arange(1.0, 0.0, 0.25).is_empty());
        assert!(arange(0.0, 1.0, 0.0).is_empty());
    }

    #[test]
    fn test_format_length() {
        assert_eq!(format_length(0.15), "0.1500");
        assert_eq!(format_length(-0.0), "0.0000");
        assert_eq!(format_length(-0.00001), "0.0000");
        assert_eq!(format_length(-2.5), "-2.5000");
    }

    #[test]
    fn test_format_significant() {
        assert_eq!(format_significant(1.0663e-10, 5), "1.0663e-10");
        assert_eq!(format_significant(1.5e-10, 5), "1.5e-10");
        assert_eq!(format_significant(106.63, 5), "106.63");
        assert_eq!(format_significant(0.25, 5), "0.25");
        assert_eq!(format_significant(0.0, 5), "0");
    }

    #[test]
    fn test_solver_scale() {
        assert!((to_af_per_um(1.0663e-10) - 106.63).abs() < 1e-9);
    }
}
