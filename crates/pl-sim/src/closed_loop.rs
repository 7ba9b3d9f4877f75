//! Closed-loop PI simulation: drives [`ClosedLoopModel`] through the runner
//! and reports controller quantities alongside the integrated state.

use crate::error::{SimError, SimResult};
use crate::model::TransientModel;
use crate::sim::{SimOptions, run_sim_with_observer};
use pl_controls::{ClosedLoopModel, ClosedLoopState};
use pl_core::Tolerances;
use serde::{Deserialize, Serialize};

/// Adapter exposing a [`ClosedLoopModel`] as a [`TransientModel`].
#[derive(Debug)]
pub struct ClosedLoopSystem<'a> {
    model: &'a ClosedLoopModel,
    initial: ClosedLoopState,
}

impl<'a> ClosedLoopSystem<'a> {
    pub fn new(model: &'a ClosedLoopModel, initial: ClosedLoopState) -> Self {
        Self { model, initial }
    }
}

impl TransientModel for ClosedLoopSystem<'_> {
    type State = ClosedLoopState;

    fn initial_state(&self) -> ClosedLoopState {
        self.initial
    }

    fn rhs(&self, t: f64, x: &ClosedLoopState) -> SimResult<ClosedLoopState> {
        Ok(self.model.derivative(t, x))
    }

    fn add(&self, a: &ClosedLoopState, b: &ClosedLoopState) -> ClosedLoopState {
        a.add(b)
    }

    fn scale(&self, a: &ClosedLoopState, scale: f64) -> ClosedLoopState {
        a.scale(scale)
    }

    fn is_finite(&self, x: &ClosedLoopState) -> bool {
        x.is_finite()
    }

    fn error_norm(
        &self,
        err: &ClosedLoopState,
        y0: &ClosedLoopState,
        y1: &ClosedLoopState,
        tol: Tolerances,
    ) -> f64 {
        let err = err.to_array();
        let y0 = y0.to_array();
        let y1 = y1.to_array();
        let sum_sq: f64 = (0..3)
            .map(|i| {
                let w = tol.weight(y0[i].abs().max(y1[i].abs()));
                (err[i] / w).powi(2)
            })
            .sum();
        (sum_sq / 3.0).sqrt()
    }
}

/// One reported point of a closed-loop run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    /// Process variable
    pub x: f64,
    /// Integral state (load estimate)
    pub u: f64,
    /// Reference: the integrated trajectory, or `sp(t)` when inert
    pub r: f64,
    /// Command applied to the plant
    pub u_ctrl: f64,
    pub sp: f64,
    pub ul: f64,
}

impl Sample {
    /// Derive the reported quantities for state `y` at time `t`.
    pub fn observe(model: &ClosedLoopModel, t: f64, y: &ClosedLoopState) -> Self {
        let ev = model.evaluate(t, y);
        Self {
            t,
            x: y.x,
            u: y.u,
            r: model.reported_reference(t, y),
            u_ctrl: ev.u_ctrl,
            sp: ev.sp,
            ul: ev.ul,
        }
    }
}

/// Ordered samples of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub samples: Vec<Sample>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// First sample at or after `t`.
    pub fn at(&self, t: f64) -> Option<&Sample> {
        self.samples.iter().find(|s| s.t >= t)
    }

    pub fn times(&self) -> Vec<f64> {
        self.column(|s| s.t)
    }

    pub fn column(&self, f: impl Fn(&Sample) -> f64) -> Vec<f64> {
        self.samples.iter().map(f).collect()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Integrate the closed loop from `initial` and sample it per `opts`.
///
/// On numerical failure the error carries the samples recorded before the
/// last valid time.
pub fn simulate(
    model: &ClosedLoopModel,
    initial: ClosedLoopState,
    opts: &SimOptions,
) -> SimResult<Trajectory> {
    let system = ClosedLoopSystem::new(model, initial);
    let mut trajectory = Trajectory::default();
    let outcome = run_sim_with_observer(&system, opts, |t, y| {
        trajectory.samples.push(Sample::observe(model, t, y));
    });

    match outcome {
        Ok(()) => Ok(trajectory),
        Err(SimError::IntegrationFailed { t_last, reason, .. }) => {
            Err(SimError::IntegrationFailed {
                t_last,
                reason,
                partial: Some(Box::new(trajectory)),
            })
        }
        Err(e) => Err(e),
    }
}
