//! Simulation runner: integrates a model over a span and samples the state.

use crate::error::{FailureReason, SimError, SimResult};
use crate::integrator::{DormandPrince45, EmbeddedIntegrator, ForwardEuler, Integrator, RK4};
use crate::model::TransientModel;
use pl_core::Tolerances;
use tracing::{debug, trace, warn};

/// Step size safety factor for the adaptive controller.
const SAFETY: f64 = 0.9;
/// Bounds on the per-step change of the adaptive step size.
const SHRINK_MIN: f64 = 0.2;
const GROW_MAX: f64 = 5.0;
/// Smallest adaptive step, relative to `max(1, |t|)`.
const MIN_STEP_REL: f64 = 1e-12;

/// Integrator selection for simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// Adaptive Dormand-Prince 5(4) with error control (default).
    #[default]
    DormandPrince45,
    /// 4th-order Runge-Kutta with fixed step `dt`.
    RK4,
    /// Forward Euler with fixed step `dt`.
    ForwardEuler,
}

/// Times at which the state is reported.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleTimes {
    /// `n` evenly spaced samples covering the span, both ends included.
    Resolution(usize),
    /// Explicit, non-decreasing times within the span.
    Explicit(Vec<f64>),
}

impl SampleTimes {
    /// Concrete sample times for the span `[t_start, t_end]`.
    pub fn resolve(&self, t_start: f64, t_end: f64) -> SimResult<Vec<f64>> {
        match self {
            SampleTimes::Resolution(0) => Err(SimError::InvalidArg {
                what: "resolution must be at least one sample",
            }),
            SampleTimes::Resolution(1) => Ok(vec![t_start]),
            SampleTimes::Resolution(n) => {
                let span = t_end - t_start;
                let last = n - 1;
                Ok((0..*n)
                    .map(|i| {
                        if i == last {
                            t_end
                        } else {
                            t_start + span * (i as f64) / (last as f64)
                        }
                    })
                    .collect())
            }
            SampleTimes::Explicit(times) => {
                if times.is_empty() {
                    return Err(SimError::InvalidArg {
                        what: "evaluation times must not be empty",
                    });
                }
                if times.iter().any(|t| !t.is_finite() || *t < t_start || *t > t_end) {
                    return Err(SimError::InvalidArg {
                        what: "evaluation times must lie within the span",
                    });
                }
                if times.windows(2).any(|w| w[1] < w[0]) {
                    return Err(SimError::InvalidArg {
                        what: "evaluation times must be non-decreasing",
                    });
                }
                Ok(times.clone())
            }
        }
    }
}

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct SimOptions {
    /// Start of the span (seconds)
    pub t_start: f64,
    /// End of the span (seconds)
    pub t_end: f64,
    /// Reported sample times
    pub samples: SampleTimes,
    /// Integrator type (default: adaptive Dormand-Prince)
    pub integrator: IntegratorType,
    /// Fixed time step for RK4 / forward Euler (seconds)
    pub dt: f64,
    /// Error tolerances for the adaptive integrator
    pub tolerances: Tolerances,
    /// First adaptive step; defaults to 1e-4 of the span
    pub initial_step: Option<f64>,
    /// Largest adaptive step; defaults to the span
    pub max_step: Option<f64>,
    /// Maximum number of step attempts (safety limit)
    pub max_steps: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 20.0,
            samples: SampleTimes::Resolution(1000),
            integrator: IntegratorType::default(),
            dt: 1e-3,
            tolerances: Tolerances {
                abs: 1e-9,
                rel: 1e-7,
            },
            initial_step: None,
            max_step: None,
            max_steps: 1_000_000,
        }
    }
}

impl SimOptions {
    /// Span `[t_start, t_end]` with `n` evenly spaced samples.
    pub fn with_span(t_start: f64, t_end: f64, n: usize) -> Self {
        Self {
            t_start,
            t_end,
            samples: SampleTimes::Resolution(n),
            ..Self::default()
        }
    }

    fn validate(&self) -> SimResult<Vec<f64>> {
        if !self.t_start.is_finite() || !self.t_end.is_finite() {
            return Err(SimError::InvalidArg {
                what: "span bounds must be finite",
            });
        }
        if self.t_end <= self.t_start {
            return Err(SimError::InvalidArg {
                what: "t_end must be greater than t_start",
            });
        }
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if !(self.tolerances.abs > 0.0) || !self.tolerances.abs.is_finite() {
            return Err(SimError::InvalidArg {
                what: "absolute tolerance must be positive",
            });
        }
        if !(self.tolerances.rel >= 0.0) || !self.tolerances.rel.is_finite() {
            return Err(SimError::InvalidArg {
                what: "relative tolerance must be non-negative",
            });
        }
        if self.max_step.is_some_and(|h| !(h > 0.0)) {
            return Err(SimError::InvalidArg {
                what: "max_step must be positive",
            });
        }
        if self.initial_step.is_some_and(|h| !(h > 0.0)) {
            return Err(SimError::InvalidArg {
                what: "initial_step must be positive",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        self.samples.resolve(self.t_start, self.t_end)
    }
}

/// Record of simulation results.
#[derive(Clone, Debug)]
pub struct SimRecord<S> {
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// State snapshots
    pub x: Vec<S>,
}

/// Run a transient simulation and collect the state at every sample time.
pub fn run_sim<M: TransientModel>(
    model: &M,
    opts: &SimOptions,
) -> SimResult<SimRecord<M::State>> {
    let mut record = SimRecord {
        t: Vec::new(),
        x: Vec::new(),
    };
    run_sim_with_observer(model, opts, |t, x| {
        record.t.push(t);
        record.x.push(x.clone());
    })?;
    Ok(record)
}

/// Run a transient simulation, handing each sample to `on_sample` in time
/// order. Samples delivered before a failure remain valid.
pub fn run_sim_with_observer<M, F>(model: &M, opts: &SimOptions, mut on_sample: F) -> SimResult<()>
where
    M: TransientModel,
    F: FnMut(f64, &M::State),
{
    let times = opts.validate()?;
    debug!(
        t_start = opts.t_start,
        t_end = opts.t_end,
        samples = times.len(),
        integrator = ?opts.integrator,
        "starting simulation"
    );

    let mut t = opts.t_start;
    let mut x = model.initial_state();
    if !model.is_finite(&x) {
        return Err(SimError::failed(t, FailureReason::NonFinite));
    }

    let span = opts.t_end - opts.t_start;
    let h_max = opts.max_step.unwrap_or(span);
    let mut stepper = Stepper {
        opts,
        h: opts.initial_step.unwrap_or(span * 1e-4).min(h_max),
        h_max,
        attempts: 0,
        rejected: 0,
    };

    for &target in &times {
        if target > t {
            let advanced = match opts.integrator {
                IntegratorType::DormandPrince45 => {
                    stepper.advance_adaptive(model, &DormandPrince45, t, x, target)
                }
                IntegratorType::RK4 => stepper.advance_fixed(model, &RK4, t, x, target),
                IntegratorType::ForwardEuler => {
                    stepper.advance_fixed(model, &ForwardEuler, t, x, target)
                }
            };
            x = match advanced {
                Ok(x) => x,
                Err(e) => {
                    warn!(error = %e, attempts = stepper.attempts, "simulation failed");
                    return Err(e);
                }
            };
            t = target;
        }
        on_sample(t, &x);
    }

    debug!(
        attempts = stepper.attempts,
        rejected = stepper.rejected,
        "simulation finished"
    );
    Ok(())
}

/// Step bookkeeping shared across sample intervals.
struct Stepper<'a> {
    opts: &'a SimOptions,
    /// Next adaptive step proposal
    h: f64,
    h_max: f64,
    attempts: usize,
    rejected: usize,
}

impl Stepper<'_> {
    fn count_attempt(&mut self, t: f64) -> SimResult<()> {
        if self.attempts >= self.opts.max_steps {
            return Err(SimError::failed(
                t,
                FailureReason::StepBudgetExhausted {
                    max_steps: self.opts.max_steps,
                },
            ));
        }
        self.attempts += 1;
        Ok(())
    }

    fn advance_fixed<M: TransientModel, I: Integrator>(
        &mut self,
        model: &M,
        integrator: &I,
        mut t: f64,
        mut x: M::State,
        target: f64,
    ) -> SimResult<M::State> {
        let dt = self.opts.dt;
        while t < target {
            self.count_attempt(t)?;
            let remaining = target - t;
            let last = remaining <= dt * (1.0 + 1e-9);
            let h = if last { remaining } else { dt };

            let x_new = integrator.step(model, t, &x, h)?;
            if !model.is_finite(&x_new) {
                return Err(SimError::failed(t, FailureReason::NonFinite));
            }
            x = x_new;
            t = if last { target } else { t + h };
        }
        Ok(x)
    }

    fn advance_adaptive<M: TransientModel, I: EmbeddedIntegrator>(
        &mut self,
        model: &M,
        integrator: &I,
        mut t: f64,
        mut x: M::State,
        target: f64,
    ) -> SimResult<M::State> {
        let exponent = -1.0 / (I::ERROR_ORDER as f64 + 1.0);
        while t < target {
            self.count_attempt(t)?;
            let h_min = MIN_STEP_REL * t.abs().max(1.0);
            let remaining = target - t;
            let last = remaining <= self.h * (1.0 + 1e-9);
            let dt = if last { remaining } else { self.h };

            let (x_new, err) = integrator.step_with_error(model, t, &x, dt)?;
            if !model.is_finite(&x_new) || !model.is_finite(&err) {
                self.rejected += 1;
                self.h = dt * SHRINK_MIN;
                trace!(t, dt, "non-finite step rejected");
                if self.h < h_min {
                    return Err(SimError::failed(t, FailureReason::NonFinite));
                }
                continue;
            }

            let norm = model.error_norm(&err, &x, &x_new, self.opts.tolerances);
            let factor = if norm == 0.0 {
                GROW_MAX
            } else {
                (SAFETY * norm.powf(exponent)).clamp(SHRINK_MIN, GROW_MAX)
            };

            if norm <= 1.0 {
                let proposed = dt * factor;
                // a step shortened to hit the sample time does not bound the next one
                self.h = if dt < self.h {
                    self.h.max(proposed)
                } else {
                    proposed
                }
                .min(self.h_max);
                x = x_new;
                t = if last { target } else { t + dt };
            } else {
                self.rejected += 1;
                self.h = dt * factor;
                trace!(t, dt, norm, "step rejected");
                if self.h < h_min {
                    return Err(SimError::failed(
                        t,
                        FailureReason::StepSizeUnderflow { h: self.h },
                    ));
                }
            }
        }
        Ok(x)
    }
}
