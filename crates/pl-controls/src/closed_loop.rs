//! Closed-loop PI model: first-order integrator plant under PI control.
//!
//! State `(x, u, r)`:
//! - `x`: process variable, `c_p * dx/dt = u_ctrl - ul(t)`
//! - `u`: integral (load estimate), `du/dt = (ref - x) / (t_cl * t_n)`
//! - `r`: ideal closed-loop reference, `dr/dt = (sp(t) - r) / t_cl`
//!
//! The controller command is `u_ctrl = (sp(t) - x) / t_cl + u`, subject to
//! the configured [`LimitStrategy`]. In [`IntegralMode::Setpoint`] the
//! integral error uses `sp(t)` directly and `r` is inert.

use crate::error::ControlResult;
use crate::limits::{ControlLimits, LimitStrategy, schedule_factor};
use crate::signal::Signal;
use pl_core::ensure_positive;
use serde::{Deserialize, Serialize};

/// Integral relaxation time constant as a fraction of `t_cl`.
const RELAX_FRACTION: f64 = 1.0 / 20.0;

/// PI loop parameters, fixed for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiParams {
    /// Plant inertia.
    pub c_p: f64,
    /// Closed-loop time constant (seconds).
    pub t_cl: f64,
    /// Integral time constant (seconds).
    pub t_n: f64,
    /// Drive the integral with the reference trajectory instead of the setpoint.
    #[serde(default)]
    pub use_ref: bool,
    /// Handle limits by scaling time constants instead of clamping.
    #[serde(default)]
    pub adapt_t: bool,
    /// Command limits; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u_lim: Option<ControlLimits>,
    /// While clamping, pull an out-of-range integral state back to the limit.
    #[serde(default)]
    pub integrator_relax: bool,
}

impl Default for PiParams {
    fn default() -> Self {
        Self {
            c_p: 1.0,
            t_cl: 0.5,
            t_n: 1.5,
            use_ref: false,
            adapt_t: false,
            u_lim: None,
            integrator_relax: false,
        }
    }
}

impl PiParams {
    pub fn with_limits(mut self, u_min: f64, u_max: f64) -> ControlResult<Self> {
        self.u_lim = Some(ControlLimits::new(u_min, u_max)?);
        Ok(self)
    }

    pub fn with_reference(mut self, use_ref: bool) -> Self {
        self.use_ref = use_ref;
        self
    }

    pub fn with_gain_scheduling(mut self, adapt_t: bool) -> Self {
        self.adapt_t = adapt_t;
        self
    }
}

/// Error signal driving the integral action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegralMode {
    /// `sp(t) - x`
    Setpoint,
    /// `r - x`, with `r` the ideal first-order closed-loop response.
    Reference,
}

/// Fixed three-component loop state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClosedLoopState {
    pub x: f64,
    pub u: f64,
    pub r: f64,
}

impl ClosedLoopState {
    pub fn new(x: f64, u: f64, r: f64) -> Self {
        Self { x, u, r }
    }

    pub fn add(&self, other: &Self) -> Self {
        Self {
            x: self.x + other.x,
            u: self.u + other.u,
            r: self.r + other.r,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            u: self.u * s,
            r: self.r * s,
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.u, self.r]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.u.is_finite() && self.r.is_finite()
    }
}

/// Everything the model computes at one `(t, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Time derivative of the state.
    pub derivative: ClosedLoopState,
    /// Command at nominal time constants, before any limiting.
    pub u_ctrl_raw: f64,
    /// Command applied to the plant.
    pub u_ctrl: f64,
    /// Effective closed-loop time constant.
    pub t_cl_eff: f64,
    /// Effective integral time constant.
    pub t_n_eff: f64,
    /// Common scale factor applied by gain scheduling (1 when inactive).
    ///
    /// `INFINITY` while the integral state sits on or beyond the violated
    /// bound and the error pushes further out. Both effective time constants
    /// are then infinite, the derivatives of `u` and `r` are zero and the
    /// ratio `t_n_eff / t_cl_eff` is undefined.
    pub schedule_factor: f64,
    /// Reference the integral error is measured against.
    pub reference: f64,
    pub sp: f64,
    pub ul: f64,
}

/// Closed-loop vector field.
///
/// Holds no mutable state: every quantity, including gain scheduling, is
/// recomputed from `(t, y)` on each call.
pub struct ClosedLoopModel {
    c_p: f64,
    t_cl: f64,
    t_n: f64,
    mode: IntegralMode,
    strategy: LimitStrategy,
    sp: Box<dyn Signal>,
    ul: Box<dyn Signal>,
}

impl std::fmt::Debug for ClosedLoopModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosedLoopModel")
            .field("c_p", &self.c_p)
            .field("t_cl", &self.t_cl)
            .field("t_n", &self.t_n)
            .field("mode", &self.mode)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl ClosedLoopModel {
    /// Build the model, validating `c_p`, `t_cl`, `t_n` and the limits.
    ///
    /// # Arguments
    ///
    /// * `params` - Loop parameters
    /// * `sp` - Setpoint signal
    /// * `ul` - Load signal
    pub fn new(
        params: &PiParams,
        sp: impl Signal + 'static,
        ul: impl Signal + 'static,
    ) -> ControlResult<Self> {
        let c_p = ensure_positive(params.c_p, "c_p")?;
        let t_cl = ensure_positive(params.t_cl, "t_cl")?;
        let t_n = ensure_positive(params.t_n, "t_n")?;
        let u_lim = params
            .u_lim
            .map(|lim| ControlLimits::new(lim.u_min, lim.u_max))
            .transpose()?;

        let mode = if params.use_ref {
            IntegralMode::Reference
        } else {
            IntegralMode::Setpoint
        };
        let strategy = LimitStrategy::select(u_lim, params.adapt_t, params.integrator_relax);

        Ok(Self {
            c_p,
            t_cl,
            t_n,
            mode,
            strategy,
            sp: Box::new(sp),
            ul: Box::new(ul),
        })
    }

    pub fn integral_mode(&self) -> IntegralMode {
        self.mode
    }

    pub fn limit_strategy(&self) -> LimitStrategy {
        self.strategy
    }

    /// Evaluate the vector field and the derived controller quantities.
    pub fn evaluate(&self, t: f64, y: &ClosedLoopState) -> Evaluation {
        let sp = self.sp.value(t);
        let ul = self.ul.value(t);
        let error = sp - y.x;
        let u_ctrl_raw = error / self.t_cl + y.u;

        let (factor, u_ctrl) = match self.strategy {
            LimitStrategy::Unbounded => (1.0, u_ctrl_raw),
            LimitStrategy::Clamp { limits, .. } => (1.0, limits.clip(u_ctrl_raw)),
            LimitStrategy::GainSchedule { limits } => {
                let k = schedule_factor(u_ctrl_raw, y.u, &limits);
                let u_ctrl = if k.is_finite() && k > 1.0 {
                    error / (self.t_cl * k) + y.u
                } else {
                    limits.clip(error / (self.t_cl * k) + y.u)
                };
                (k, u_ctrl)
            }
        };
        let t_cl_eff = self.t_cl * factor;
        let t_n_eff = self.t_n * factor;

        let (reference, drdt) = match self.mode {
            IntegralMode::Setpoint => (sp, 0.0),
            IntegralMode::Reference => (y.r, (sp - y.r) / t_cl_eff),
        };

        let mut dudt = (reference - y.x) / (t_cl_eff * t_n_eff);
        if let LimitStrategy::Clamp {
            limits,
            relax: true,
        } = self.strategy
        {
            dudt = self.relax_integral(dudt, y.u, &limits);
        }

        let dxdt = (u_ctrl - ul) / self.c_p;

        Evaluation {
            derivative: ClosedLoopState {
                x: dxdt,
                u: dudt,
                r: drdt,
            },
            u_ctrl_raw,
            u_ctrl,
            t_cl_eff,
            t_n_eff,
            schedule_factor: factor,
            reference,
            sp,
            ul,
        }
    }

    /// Time derivative `dy/dt` at `(t, y)`.
    pub fn derivative(&self, t: f64, y: &ClosedLoopState) -> ClosedLoopState {
        self.evaluate(t, y).derivative
    }

    /// Command applied to the plant at `(t, y)`.
    pub fn u_ctrl(&self, t: f64, y: &ClosedLoopState) -> f64 {
        self.evaluate(t, y).u_ctrl
    }

    /// Value reported for `r`: the state itself, or `sp(t)` when inert.
    pub fn reported_reference(&self, t: f64, y: &ClosedLoopState) -> f64 {
        match self.mode {
            IntegralMode::Setpoint => self.sp.value(t),
            IntegralMode::Reference => y.r,
        }
    }

    fn relax_integral(&self, dudt: f64, u: f64, limits: &ControlLimits) -> f64 {
        let t_relax = self.t_cl * RELAX_FRACTION;
        if dudt < 0.0 && u <= limits.u_min {
            (limits.u_min - u) / t_relax
        } else if dudt > 0.0 && u >= limits.u_max {
            (limits.u_max - u) / t_relax
        } else {
            dudt
        }
    }
}
