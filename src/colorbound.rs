use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ColorBoundError {
    #[error("invalid color bound {0:?}: expected a number, \"fit\" or \"tileNN\"")]
    Unrecognized(String),

    #[error("percentile {0} is outside 0..=100")]
    PercentileRange(f64),
}

/// Lower or upper end of a pseudocolor scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorBound {
    Fixed(f64),
    /// Data minimum for the lower bound, maximum for the upper one
    DataExtent,
    /// Percentile (0..=100) of the flattened map
    Percentile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

impl FromStr for ColorBound {
    type Err = ColorBoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("fit") {
            return Ok(ColorBound::DataExtent);
        }
        if let Some(percent) = text.strip_prefix("tile") {
            let p = percent
                .parse::<f64>()
                .map_err(|_| ColorBoundError::Unrecognized(s.to_string()))?;
            if !(0.0..=100.0).contains(&p) {
                return Err(ColorBoundError::PercentileRange(p));
            }
            return Ok(ColorBound::Percentile(p));
        }
        text.parse::<f64>()
            .map(ColorBound::Fixed)
            .map_err(|_| ColorBoundError::Unrecognized(s.to_string()))
    }
}

impl fmt::Display for ColorBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorBound::Fixed(v) => write!(f, "{v}"),
            ColorBound::DataExtent => write!(f, "fit"),
            ColorBound::Percentile(p) => write!(f, "tile{p}"),
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Resolve a bound against the map values. An absent bound falls back to
/// `mean -/+ nsigma * variance`.
pub fn resolve_bound(bound: Option<ColorBound>, side: BoundSide, values: &[f64], nsigma: f64) -> f64 {
    match bound {
        Some(ColorBound::Fixed(v)) => v,
        Some(ColorBound::DataExtent) => match side {
            BoundSide::Lower => values.iter().cloned().fold(f64::INFINITY, f64::min),
            BoundSide::Upper => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        },
        Some(ColorBound::Percentile(p)) => percentile(values, p),
        None => {
            let spread = variance(values) * nsigma;
            match side {
                BoundSide::Lower => mean(values) - spread,
                BoundSide::Upper => mean(values) + spread,
            }
        }
    }
}

/// Resolved `(vmin, vmax)` pair.
pub fn resolve_range(
    vmin: Option<ColorBound>,
    vmax: Option<ColorBound>,
    values: &[f64],
    nsigma: f64,
) -> (f64, f64) {
    (
        resolve_bound(vmin, BoundSide::Lower, values, nsigma),
        resolve_bound(vmax, BoundSide::Upper, values, nsigma),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_forms() {
        assert_eq!("0.25".parse::<ColorBound>(), Ok(ColorBound::Fixed(0.25)));
        assert_eq!("-3".parse::<ColorBound>(), Ok(ColorBound::Fixed(-3.0)));
        assert_eq!("fit".parse::<ColorBound>(), Ok(ColorBound::DataExtent));
        assert_eq!("tile50".parse::<ColorBound>(), Ok(ColorBound::Percentile(50.0)));
        assert_eq!("tile100".parse::<ColorBound>(), Ok(ColorBound::Percentile(100.0)));
    }

    #[test]
    fn rejects_unknown_text() {
        assert!(matches!(
            "auto".parse::<ColorBound>(),
            Err(ColorBoundError::Unrecognized(_))
        ));
        assert!(matches!(
            "tilexx".parse::<ColorBound>(),
            Err(ColorBoundError::Unrecognized(_))
        ));
        assert_eq!(
            "tile150".parse::<ColorBound>(),
            Err(ColorBoundError::PercentileRange(150.0))
        );
    }

    #[test]
    fn fit_resolves_to_exact_extent() {
        let map = [3.0, -1.5, 7.25, 0.0];
        assert_eq!(resolve_bound(Some(ColorBound::DataExtent), BoundSide::Lower, &map, 3.0), -1.5);
        assert_eq!(resolve_bound(Some(ColorBound::DataExtent), BoundSide::Upper, &map, 3.0), 7.25);
    }

    #[test]
    fn tile50_is_the_median() {
        let odd = [5.0, 1.0, 3.0, 9.0, 7.0];
        assert_eq!(resolve_bound(Some(ColorBound::Percentile(50.0)), BoundSide::Lower, &odd, 1.0), 5.0);
        let even = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(resolve_bound(Some(ColorBound::Percentile(50.0)), BoundSide::Upper, &even, 1.0), 2.5);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values: Vec<f64> = (0..=10).map(|v| v as f64).collect();
        assert!((percentile(&values, 25.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 100.0), 10.0);
        assert!((percentile(&[1.0, 2.0], 10.0) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn missing_bounds_use_mean_and_variance() {
        let map = [1.0, 2.0, 3.0, 4.0];
        // mean 2.5, population variance 1.25
        let (lo, hi) = resolve_range(None, None, &map, 2.0);
        assert!((lo - 0.0).abs() < 1e-12);
        assert!((hi - 5.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_bounds_pass_through() {
        let (lo, hi) = resolve_range(Some(ColorBound::Fixed(-1.0)), Some(ColorBound::Fixed(1.0)), &[], 3.0);
        assert_eq!((lo, hi), (-1.0, 1.0));
    }

    #[test]
    fn display_round_trips_cli_text() {
        assert_eq!(ColorBound::Percentile(50.0).to_string(), "tile50");
        assert_eq!(ColorBound::DataExtent.to_string(), "fit");
    }
}
