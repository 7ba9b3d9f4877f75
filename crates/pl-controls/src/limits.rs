//! Controller output limits and the strategies that enforce them.

use crate::error::ControlResult;
use pl_core::ensure_range;
use serde::{Deserialize, Serialize};

/// Inclusive bounds on the controller command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    pub u_min: f64,
    pub u_max: f64,
}

impl ControlLimits {
    /// Create limits, rejecting non-finite bounds and `u_min > u_max`.
    pub fn new(u_min: f64, u_max: f64) -> ControlResult<Self> {
        let (u_min, u_max) = ensure_range(u_min, u_max, "u_lim")?;
        Ok(Self { u_min, u_max })
    }

    pub fn clip(&self, u: f64) -> f64 {
        u.clamp(self.u_min, self.u_max)
    }

    /// The bound that `u` violates, if any.
    pub fn violated_bound(&self, u: f64) -> Option<f64> {
        if u > self.u_max {
            Some(self.u_max)
        } else if u < self.u_min {
            Some(self.u_min)
        } else {
            None
        }
    }
}

/// How the controller command is kept within its limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitStrategy {
    /// No limits configured; the raw command drives the plant.
    Unbounded,
    /// Saturate the command. The integral keeps following the error unless
    /// `relax` pulls an out-of-range integral state back to the limit.
    Clamp { limits: ControlLimits, relax: bool },
    /// Stretch `t_cl` and `t_n` by a common factor so the command lands on
    /// the violated limit.
    GainSchedule { limits: ControlLimits },
}

impl LimitStrategy {
    /// Pick the strategy for a parameter set. Gain scheduling wins over
    /// clamping; without limits neither applies.
    pub fn select(u_lim: Option<ControlLimits>, adapt_t: bool, relax: bool) -> Self {
        match (u_lim, adapt_t) {
            (None, _) => Self::Unbounded,
            (Some(limits), true) => Self::GainSchedule { limits },
            (Some(limits), false) => Self::Clamp { limits, relax },
        }
    }
}

/// Common time-constant factor that moves the command `raw = p + u` onto
/// the violated bound, where `p` is the proportional part at nominal gains.
///
/// Scaling both time constants by `k` turns the command into `p / k + u`,
/// so `k = (raw - u) / (bound - u)`. Returns:
/// - `1.0` when `raw` is within limits
/// - `k >= 1` when the integral state lies inside the limits
/// - `1.0` when the integral state is beyond the bound and the proportional
///   part already pulls back toward it (caller clamps instead)
/// - `INFINITY` when the integral state sits on or beyond the bound and the
///   error pushes further out (proportional and integral action vanish)
pub fn schedule_factor(raw: f64, u: f64, limits: &ControlLimits) -> f64 {
    let Some(bound) = limits.violated_bound(raw) else {
        return 1.0;
    };
    let k = (raw - u) / (bound - u);
    if k >= 1.0 {
        k
    } else if k > 0.0 {
        1.0
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> ControlLimits {
        ControlLimits::new(-1.0, 1.0).unwrap()
    }

    #[test]
    fn rejects_inverted_limits() {
        assert!(ControlLimits::new(1.0, -1.0).is_err());
        assert!(ControlLimits::new(f64::NAN, 1.0).is_err());
        assert!(ControlLimits::new(0.5, 0.5).is_ok());
    }

    #[test]
    fn strategy_selection() {
        let lim = unit();
        assert_eq!(LimitStrategy::select(None, true, true), LimitStrategy::Unbounded);
        assert_eq!(
            LimitStrategy::select(Some(lim), true, true),
            LimitStrategy::GainSchedule { limits: lim }
        );
        assert_eq!(
            LimitStrategy::select(Some(lim), false, false),
            LimitStrategy::Clamp {
                limits: lim,
                relax: false
            }
        );
    }

    #[test]
    fn factor_within_limits_is_one() {
        assert_eq!(schedule_factor(0.5, 0.2, &unit()), 1.0);
        assert_eq!(schedule_factor(1.0, 0.0, &unit()), 1.0);
    }

    #[test]
    fn factor_lands_on_bound() {
        let lim = unit();
        // p = 2, u = 0 -> k = 2
        assert_eq!(schedule_factor(2.0, 0.0, &lim), 2.0);
        // p = -3, u = 0.5 -> k = 2
        let k = schedule_factor(-2.5, 0.5, &lim);
        assert!(((-3.0 / k) + 0.5 - lim.u_min).abs() < 1e-12);
    }

    #[test]
    fn factor_saturated_integral() {
        let lim = unit();
        // integral on the bound, error pushing outward
        assert_eq!(schedule_factor(1.5, 1.0, &lim), f64::INFINITY);
        assert_eq!(schedule_factor(-1.5, -1.0, &lim), f64::INFINITY);
        // integral beyond the bound, proportional part pulling back
        assert_eq!(schedule_factor(1.5, 2.0, &lim), 1.0);
    }
}
