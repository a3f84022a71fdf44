use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Sub};

/// A ratio that may be undefined.
///
/// Division by zero, non-finite inputs and any arithmetic involving an
/// undefined operand all produce [`Ratio::UNDEFINED`]. Serialized as a plain
/// number, or `null` when undefined.
///
/// # Example
/// ```rust
/// use coverage::models::ratio::Ratio;
///
/// assert_eq!(Ratio::of(50.0, 100.0).value(), Some(0.5));
/// assert!(!Ratio::of(0.0, 0.0).is_defined());
/// assert!(!(Ratio::new(0.5) - Ratio::UNDEFINED).is_defined());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ratio(Option<f64>);

impl Ratio {
    pub const UNDEFINED: Ratio = Ratio(None);

    /// Wrap a value, treating NaN and infinities as undefined
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Ratio(Some(value))
        } else {
            Ratio::UNDEFINED
        }
    }

    /// `numerator / denominator`, undefined when the denominator is zero
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            return Ratio::UNDEFINED;
        }
        Ratio::new(numerator / denominator)
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(self) -> bool {
        self.0.is_some()
    }

    /// Multiply by a constant, e.g. 1000.0 for a rate per thousand
    pub fn scaled(self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    pub fn map<F: FnOnce(f64) -> f64>(self, f: F) -> Self {
        match self.0 {
            Some(v) => Ratio::new(f(v)),
            None => Ratio::UNDEFINED,
        }
    }

    /// Relative change from `self` to `later`: `(later - self) / self`
    pub fn relative_change_to(self, later: Ratio) -> Ratio {
        (later - self) / self
    }

    /// Whether the value strictly exceeds 1.0 (more events than eligible population)
    pub fn exceeds_unity(self) -> bool {
        matches!(self.0, Some(v) if v > 1.0)
    }

    /// Whether the value meets or exceeds `threshold`; undefined never does
    pub fn meets(self, threshold: f64) -> bool {
        matches!(self.0, Some(v) if v >= threshold)
    }
}

impl From<Option<f64>> for Ratio {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Ratio::new(v),
            None => Ratio::UNDEFINED,
        }
    }
}

impl Sub for Ratio {
    type Output = Ratio;

    fn sub(self, rhs: Ratio) -> Ratio {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => Ratio::new(a - b),
            _ => Ratio::UNDEFINED,
        }
    }
}

impl Div for Ratio {
    type Output = Ratio;

    fn div(self, rhs: Ratio) -> Ratio {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => Ratio::of(a, b),
            _ => Ratio::UNDEFINED,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.1}%", v * 100.0),
            None => write!(f, "n/a"),
        }
    }
}

/// Arithmetic mean of the defined values; undefined if there are none
pub fn mean_defined<I: IntoIterator<Item = Ratio>>(values: I) -> Ratio {
    let (sum, count) = values
        .into_iter()
        .filter_map(Ratio::value)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        Ratio::UNDEFINED
    } else {
        Ratio::new(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(ratio: Ratio, expected: f64) -> bool {
        ratio.value().is_some_and(|v| (v - expected).abs() < 1e-9)
    }

    #[test]
    fn test_zero_denominator_is_undefined() {
        assert_eq!(Ratio::of(0.0, 0.0), Ratio::UNDEFINED);
        assert_eq!(Ratio::of(10.0, 0.0), Ratio::UNDEFINED);
    }

    #[test]
    fn test_not_clamped_above_one() {
        let ratio = Ratio::of(120.0, 100.0);
        assert!(approx(ratio, 1.2));
        assert!(ratio.exceeds_unity());
    }

    #[test]
    fn test_undefined_propagates() {
        let defined = Ratio::new(0.3);
        assert!(!(defined - Ratio::UNDEFINED).is_defined());
        assert!(!(Ratio::UNDEFINED - defined).is_defined());
        assert!(!(defined / Ratio::UNDEFINED).is_defined());
        assert!(!(defined / Ratio::new(0.0)).is_defined());
        assert!(!Ratio::UNDEFINED.scaled(1000.0).is_defined());
    }

    #[test]
    fn test_non_finite_becomes_undefined() {
        assert!(!Ratio::new(f64::NAN).is_defined());
        assert!(!Ratio::new(f64::INFINITY).is_defined());
        assert!(!Ratio::of(f64::NAN, 2.0).is_defined());
    }

    #[test]
    fn test_relative_change() {
        assert!(approx(Ratio::new(0.20).relative_change_to(Ratio::new(0.30)), 0.5));
        assert!(approx(Ratio::new(0.40).relative_change_to(Ratio::new(0.30)), -0.25));
        assert!(!Ratio::new(0.0).relative_change_to(Ratio::new(0.30)).is_defined());
        assert!(!Ratio::UNDEFINED.relative_change_to(Ratio::new(0.30)).is_defined());
    }

    #[test]
    fn test_mean_skips_undefined() {
        let mean = mean_defined(vec![Ratio::new(0.2), Ratio::UNDEFINED, Ratio::new(0.4)]);
        assert!(approx(mean, 0.3));
        assert!(!mean_defined(vec![Ratio::UNDEFINED]).is_defined());
        assert!(!mean_defined(Vec::new()).is_defined());
    }

    #[test]
    fn test_meets_threshold() {
        assert!(Ratio::new(0.45).meets(0.45));
        assert!(!Ratio::new(0.44).meets(0.45));
        assert!(!Ratio::UNDEFINED.meets(0.0));
    }

    #[test]
    fn test_serializes_undefined_as_null() {
        let json = serde_json::to_string(&vec![Ratio::new(0.5), Ratio::UNDEFINED]).unwrap();
        assert_eq!(json, "[0.5,null]");
        let back: Vec<Ratio> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Ratio::new(0.5), Ratio::UNDEFINED]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ratio::new(0.453).to_string(), "45.3%");
        assert_eq!(Ratio::UNDEFINED.to_string(), "n/a");
    }
}
