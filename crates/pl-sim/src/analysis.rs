//! Step-response metrics for closed-loop trajectories.

use crate::closed_loop::{Sample, Trajectory};
use serde::Serialize;

/// Summary of the response of `x` to a setpoint change within a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepMetrics {
    /// `x` at the start of the window
    pub initial: f64,
    /// Setpoint at the end of the window
    pub target: f64,
    /// Largest excursion of `x` beyond `target` in the step direction (>= 0)
    pub overshoot: f64,
    /// Overshoot relative to the step size (0 for a zero step)
    pub overshoot_fraction: f64,
    /// Time of the peak excursion in the step direction
    pub peak_time: f64,
    /// Time after which `x` stays within the band around `target`
    pub settling_time: Option<f64>,
    /// Final process variable
    pub steady_x: f64,
    /// Final integral state
    pub steady_u: f64,
    /// Integrated absolute error `|sp - x|` (trapezoidal)
    pub iae: f64,
}

/// Metrics over samples with `t_from <= t <= t_to`.
///
/// `band` is relative to the step size (e.g. 0.02 for a 2% band); for a zero
/// step it is used as an absolute band. Returns `None` with fewer than two
/// samples in the window.
pub fn step_metrics(traj: &Trajectory, t_from: f64, t_to: f64, band: f64) -> Option<StepMetrics> {
    let window: Vec<&Sample> = traj
        .iter()
        .filter(|s| s.t >= t_from && s.t <= t_to)
        .collect();
    if window.len() < 2 {
        return None;
    }
    let first = window[0];
    let last = window[window.len() - 1];

    let initial = first.x;
    let target = last.sp;
    let step = target - initial;
    let direction = if step > 0.0 {
        1.0
    } else if step < 0.0 {
        -1.0
    } else {
        0.0
    };

    let (peak_time, peak) = window
        .iter()
        .map(|s| (s.t, direction * (s.x - target)))
        .fold((first.t, f64::NEG_INFINITY), |acc, cur| {
            if cur.1 > acc.1 { cur } else { acc }
        });
    let overshoot = if direction == 0.0 { 0.0 } else { peak.max(0.0) };
    let overshoot_fraction = if step == 0.0 {
        0.0
    } else {
        overshoot / step.abs()
    };

    let tol = if step == 0.0 { band } else { band * step.abs() };
    let settling_time = match window.iter().rposition(|s| (s.x - target).abs() > tol) {
        None => Some(first.t),
        Some(i) if i + 1 < window.len() => Some(window[i + 1].t),
        Some(_) => None,
    };

    let iae: f64 = window
        .windows(2)
        .map(|w| {
            let e0 = (w[0].sp - w[0].x).abs();
            let e1 = (w[1].sp - w[1].x).abs();
            0.5 * (e0 + e1) * (w[1].t - w[0].t)
        })
        .sum();

    Some(StepMetrics {
        initial,
        target,
        overshoot,
        overshoot_fraction,
        peak_time,
        settling_time,
        steady_x: last.x,
        steady_u: last.u,
        iae,
    })
}
