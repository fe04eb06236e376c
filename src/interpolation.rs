//! Interpolation policies shared by cross-section lookup and distribution
//! sampling.
//!
//! Variant names follow the ENDF convention: the first word is the scaling of
//! the dependent (y) axis, the second the scaling of the independent (x) axis.
//! `LinLog` therefore means y is linear in ln(x).

use serde::{Deserialize, Serialize};

use crate::error::{CollisionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Interpolation {
    #[serde(rename = "lin-lin")]
    #[default]
    LinLin,
    #[serde(rename = "lin-log")]
    LinLog,
    #[serde(rename = "log-lin")]
    LogLin,
    #[serde(rename = "log-log")]
    LogLog,
}

impl Interpolation {
    pub const ALL: [Interpolation; 4] = [
        Interpolation::LinLin,
        Interpolation::LinLog,
        Interpolation::LogLin,
        Interpolation::LogLog,
    ];

    /// Map an ENDF interpolation code (2..=5) to a policy.
    pub fn from_endf_code(code: i32) -> Result<Self> {
        match code {
            2 => Ok(Interpolation::LinLin),
            3 => Ok(Interpolation::LinLog),
            4 => Ok(Interpolation::LogLin),
            5 => Ok(Interpolation::LogLog),
            _ => Err(CollisionError::Domain(format!(
                "unsupported ENDF interpolation code {}",
                code
            ))),
        }
    }

    pub fn endf_code(&self) -> i32 {
        match self {
            Interpolation::LinLin => 2,
            Interpolation::LinLog => 3,
            Interpolation::LogLin => 4,
            Interpolation::LogLog => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interpolation::LinLin => "LinLin",
            Interpolation::LinLog => "LinLog",
            Interpolation::LogLin => "LogLin",
            Interpolation::LogLog => "LogLog",
        }
    }

    #[inline]
    pub fn log_x(&self) -> bool {
        matches!(self, Interpolation::LinLog | Interpolation::LogLog)
    }

    #[inline]
    pub fn log_y(&self) -> bool {
        matches!(self, Interpolation::LogLin | Interpolation::LogLog)
    }

    fn check_x(&self, values: &[f64]) -> Result<()> {
        if self.log_x() {
            if let Some(v) = values.iter().find(|v| **v <= 0.0) {
                return Err(CollisionError::Domain(format!(
                    "{} interpolation requires positive independent values, got {}",
                    self.name(),
                    v
                )));
            }
        }
        Ok(())
    }

    fn check_y(&self, values: &[f64]) -> Result<()> {
        if self.log_y() {
            if let Some(v) = values.iter().find(|v| **v <= 0.0) {
                return Err(CollisionError::Domain(format!(
                    "{} interpolation requires positive dependent values, got {}",
                    self.name(),
                    v
                )));
            }
        }
        Ok(())
    }

    /// Position of `x` within `[x0, x1]` on the processed independent axis.
    /// 0 at `x0`, 1 at `x1`.
    pub fn fraction(&self, x0: f64, x1: f64, x: f64) -> Result<f64> {
        self.check_x(&[x0, x1, x])?;
        if x1 <= x0 {
            return Err(CollisionError::Domain(format!(
                "interpolation interval [{}, {}] is empty",
                x0, x1
            )));
        }
        if x == x0 {
            return Ok(0.0);
        }
        if x == x1 {
            return Ok(1.0);
        }
        if self.log_x() {
            Ok((x / x0).ln() / (x1 / x0).ln())
        } else {
            Ok((x - x0) / (x1 - x0))
        }
    }

    /// Interpolate y at `x` between (x0, y0) and (x1, y1).
    pub fn interpolate(&self, x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> Result<f64> {
        self.check_y(&[y0, y1])?;
        let t = self.fraction(x0, x1, x)?;
        if t == 0.0 {
            return Ok(y0);
        }
        if t == 1.0 {
            return Ok(y1);
        }
        if self.log_y() {
            Ok(y0 * (y1 / y0).powf(t))
        } else {
            Ok(y0 + t * (y1 - y0))
        }
    }

    /// Inverse of [`Interpolation::interpolate`]: the x at which the
    /// interpolant between the two points takes the value `y`.
    pub fn invert(&self, x0: f64, x1: f64, y0: f64, y1: f64, y: f64) -> Result<f64> {
        self.check_x(&[x0, x1])?;
        self.check_y(&[y0, y1, y])?;
        if x1 <= x0 {
            return Err(CollisionError::Domain(format!(
                "interpolation interval [{}, {}] is empty",
                x0, x1
            )));
        }
        if y == y0 || y0 == y1 {
            return Ok(x0);
        }
        if y == y1 {
            return Ok(x1);
        }

        let t = if self.log_y() {
            (y / y0).ln() / (y1 / y0).ln()
        } else {
            (y - y0) / (y1 - y0)
        };

        if self.log_x() {
            Ok(x0 * (x1 / x0).powf(t))
        } else {
            Ok(x0 + t * (x1 - x0))
        }
    }

    /// Evaluate a tabulated function at `x` with this policy.
    ///
    /// Fails with `EnergyOutOfRange` outside the grid; grid points return the
    /// tabulated value exactly.
    pub fn evaluate_table(&self, xs: &[f64], ys: &[f64], x: f64) -> Result<f64> {
        if xs.is_empty() || xs.len() != ys.len() {
            return Err(CollisionError::invalid_table(format!(
                "table has {} grid points and {} values",
                xs.len(),
                ys.len()
            )));
        }
        let idx = find_interval(xs, x).ok_or(CollisionError::EnergyOutOfRange {
            energy: x,
            min: xs[0],
            max: xs[xs.len() - 1],
        })?;
        if xs[idx] == x {
            return Ok(ys[idx]);
        }
        self.interpolate(xs[idx], xs[idx + 1], ys[idx], ys[idx + 1], x)
    }
}

/// Index `i` with `xs[i] <= x < xs[i + 1]`, or the last interval when `x`
/// equals the final grid point. `None` when `x` is outside the grid.
pub(crate) fn find_interval(xs: &[f64], x: f64) -> Option<usize> {
    let n = xs.len();
    if n == 0 || x.is_nan() || x < xs[0] || x > xs[n - 1] {
        return None;
    }
    if n == 1 {
        return Some(0);
    }
    if x == xs[n - 1] {
        return Some(n - 2);
    }

    let mut low = 0usize;
    let mut high = n - 1; // invariant: xs[low] <= x < xs[high]
    while high - low > 1 {
        let mid = (low + high) >> 1;
        if xs[mid] <= x {
            low = mid;
        } else {
            high = mid;
        }
    }
    Some(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lin_lin_midpoint() {
        let y = Interpolation::LinLin
            .interpolate(1.0, 3.0, 2.0, 6.0, 2.0)
            .unwrap();
        assert!((y - 4.0).abs() < 1e-14);
    }

    #[test]
    fn test_log_log_power_law() {
        // y = x^2 is a straight line on log-log axes
        let y = Interpolation::LogLog
            .interpolate(1.0, 10.0, 1.0, 100.0, 3.0)
            .unwrap();
        assert!((y - 9.0).abs() < 1e-12, "y = {}", y);
    }

    #[test]
    fn test_lin_log_and_log_lin() {
        // y linear in ln(x)
        let y = Interpolation::LinLog
            .interpolate(1.0, std::f64::consts::E, 0.0, 1.0, 1.0_f64.exp().sqrt())
            .unwrap();
        assert!((y - 0.5).abs() < 1e-12);

        // ln(y) linear in x
        let y = Interpolation::LogLin
            .interpolate(0.0, 2.0, 1.0, 100.0, 1.0)
            .unwrap();
        assert!((y - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_policies_reject_non_positive() {
        assert!(matches!(
            Interpolation::LogLog.interpolate(0.0, 1.0, 1.0, 2.0, 0.5),
            Err(CollisionError::Domain(_))
        ));
        assert!(matches!(
            Interpolation::LogLin.interpolate(0.0, 1.0, 0.0, 2.0, 0.5),
            Err(CollisionError::Domain(_))
        ));
        assert!(matches!(
            Interpolation::LinLog.interpolate(-1.0, 1.0, 1.0, 2.0, 0.5),
            Err(CollisionError::Domain(_))
        ));
        // linear y axis tolerates zero
        assert!(Interpolation::LinLog
            .interpolate(1.0, 2.0, 0.0, 2.0, 1.5)
            .is_ok());
    }

    #[test]
    fn test_invert_round_trip_inside_interval() {
        for policy in Interpolation::ALL {
            let y = policy.interpolate(1.0, 4.0, 2.0, 8.0, 2.5).unwrap();
            let x = policy.invert(1.0, 4.0, 2.0, 8.0, y).unwrap();
            assert!((x - 2.5).abs() < 1e-12, "{}: x = {}", policy.name(), x);
        }
    }

    #[test]
    fn test_evaluate_table() {
        let xs = [0.5, 1.0, 2.0, 5.0];
        let ys = [1.0, 2.0, 3.0, 4.0];
        let policy = Interpolation::LinLin;

        assert_eq!(policy.evaluate_table(&xs, &ys, 1.0).unwrap(), 2.0);
        assert_eq!(policy.evaluate_table(&xs, &ys, 1.5).unwrap(), 2.5);
        assert_eq!(policy.evaluate_table(&xs, &ys, 0.5).unwrap(), 1.0);
        assert_eq!(policy.evaluate_table(&xs, &ys, 5.0).unwrap(), 4.0);
        assert!(matches!(
            policy.evaluate_table(&xs, &ys, 0.1),
            Err(CollisionError::EnergyOutOfRange { .. })
        ));
        assert!(matches!(
            policy.evaluate_table(&xs, &ys, 10.0),
            Err(CollisionError::EnergyOutOfRange { .. })
        ));
    }

    #[test]
    fn test_find_interval() {
        let xs = [1.0, 2.0, 3.0];
        assert_eq!(find_interval(&xs, 1.0), Some(0));
        assert_eq!(find_interval(&xs, 2.0), Some(1));
        assert_eq!(find_interval(&xs, 2.5), Some(1));
        assert_eq!(find_interval(&xs, 3.0), Some(1));
        assert_eq!(find_interval(&xs, 3.5), None);
        assert_eq!(find_interval(&xs, f64::NAN), None);
    }

    #[test]
    fn test_endf_codes() {
        for policy in Interpolation::ALL {
            assert_eq!(Interpolation::from_endf_code(policy.endf_code()).unwrap(), policy);
        }
        assert!(Interpolation::from_endf_code(1).is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Interpolation::LogLin).unwrap();
        assert_eq!(json, "\"log-lin\"");
        let policy: Interpolation = serde_json::from_str("\"log-log\"").unwrap();
        assert_eq!(policy, Interpolation::LogLog);
    }

    proptest! {
        #[test]
        fn prop_endpoints_are_exact(
            x0 in 1e-6f64..1e3,
            width in 1e-3f64..1e3,
            y0 in 1e-6f64..1e6,
            y1 in 1e-6f64..1e6,
        ) {
            let x1 = x0 + width;
            for policy in Interpolation::ALL {
                prop_assert_eq!(policy.interpolate(x0, x1, y0, y1, x0).unwrap(), y0);
                prop_assert_eq!(policy.interpolate(x0, x1, y0, y1, x1).unwrap(), y1);
                prop_assert_eq!(policy.invert(x0, x1, y0, y1, y0).unwrap(), x0);
                prop_assert_eq!(policy.invert(x0, x1, y0, y1, y1).unwrap(), x1);
            }
        }
    }
}
