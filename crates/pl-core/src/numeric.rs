use crate::{CoreError, CoreResult};

/// Floating point type used throughout system
pub type Real = f64;

/// Absolute and relative error tolerances
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Tolerances {
    /// Error weight for a component whose magnitude is `scale`.
    pub fn weight(&self, scale: Real) -> Real {
        self.abs + self.rel * scale.abs()
    }
}

pub fn ensure_finite(v: Real, what: &'static str) -> CoreResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Finite and strictly greater than zero.
pub fn ensure_positive(v: Real, what: &'static str) -> CoreResult<Real> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CoreError::NotPositive { what, value: v })
    }
}

/// Both bounds finite and `lo <= hi`.
pub fn ensure_range(lo: Real, hi: Real, what: &'static str) -> CoreResult<(Real, Real)> {
    ensure_finite(lo, what)?;
    ensure_finite(hi, what)?;
    if lo > hi {
        return Err(CoreError::InvalidRange { what, lo, hi });
    }
    Ok((lo, hi))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn ensure_range_accepts_ordered_bounds(a in -1e6_f64..1e6, b in -1e6_f64..1e6) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert_eq!(ensure_range(lo, hi, "range"), Ok((lo, hi)));
            if lo < hi {
                prop_assert!(ensure_range(hi, lo, "range").is_err());
            }
        }

        #[test]
        fn weight_is_at_least_abs(abs in 1e-15_f64..1.0, rel in 0.0_f64..1.0, scale in -1e6_f64..1e6) {
            let tol = Tolerances { abs, rel };
            prop_assert!(tol.weight(scale) >= abs);
        }
    }
}
