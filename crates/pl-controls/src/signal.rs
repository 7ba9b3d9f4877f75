//! Exogenous time signals (setpoint and load trajectories).

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Deterministic scalar function of time.
///
/// Implementations must return the same value for the same `t`, independent
/// of call order. Any `Fn(f64) -> f64` closure is a signal.
pub trait Signal {
    /// Signal value at time `t` (seconds).
    fn value(&self, t: f64) -> f64;
}

impl<F> Signal for F
where
    F: Fn(f64) -> f64,
{
    fn value(&self, t: f64) -> f64 {
        self(t)
    }
}

/// Constant signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: f64,
}

impl Signal for Constant {
    fn value(&self, _t: f64) -> f64 {
        self.value
    }
}

/// Step from `before` to `after` at time `at` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub at: f64,
    #[serde(default)]
    pub before: f64,
    pub after: f64,
}

impl Step {
    /// Step from zero to `after` at time `at`.
    pub fn new(at: f64, after: f64) -> Self {
        Self {
            at,
            before: 0.0,
            after,
        }
    }
}

impl Signal for Step {
    fn value(&self, t: f64) -> f64 {
        if t >= self.at { self.after } else { self.before }
    }
}

/// Ramp starting at `start` from `initial` with `slope` per second.
///
/// With a `limit`, the ramp holds once it reaches that value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub start: f64,
    pub slope: f64,
    #[serde(default)]
    pub initial: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

impl Signal for Ramp {
    fn value(&self, t: f64) -> f64 {
        if t < self.start {
            return self.initial;
        }
        let v = self.initial + self.slope * (t - self.start);
        match self.limit {
            Some(limit) if self.slope >= 0.0 => v.min(limit),
            Some(limit) => v.max(limit),
            None => v,
        }
    }
}

/// Sinusoid `offset + amplitude * sin(2*pi*t/period + phase)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sine {
    pub amplitude: f64,
    pub period: f64,
    #[serde(default)]
    pub phase: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Signal for Sine {
    fn value(&self, t: f64) -> f64 {
        let omega = 2.0 * std::f64::consts::PI / self.period;
        self.offset + self.amplitude * (omega * t + self.phase).sin()
    }
}

/// Serializable signal description used by scenario files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalSpec {
    Constant(Constant),
    Step(Step),
    Ramp(Ramp),
    Sine(Sine),
    /// Sum of the listed signals (zero when empty).
    Sum { terms: Vec<SignalSpec> },
}

impl SignalSpec {
    pub fn constant(value: f64) -> Self {
        Self::Constant(Constant { value })
    }

    pub fn step(at: f64, after: f64) -> Self {
        Self::Step(Step::new(at, after))
    }

    /// Check that every parameter is finite and periods are positive.
    pub fn validate(&self) -> ControlResult<()> {
        let finite = |v: f64, what: &str| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(ControlError::InvalidSignal {
                    what: format!("{what} must be finite, got {v}"),
                })
            }
        };
        match self {
            Self::Constant(c) => finite(c.value, "constant value"),
            Self::Step(s) => {
                finite(s.at, "step time")?;
                finite(s.before, "step initial value")?;
                finite(s.after, "step final value")
            }
            Self::Ramp(r) => {
                finite(r.start, "ramp start")?;
                finite(r.slope, "ramp slope")?;
                finite(r.initial, "ramp initial value")?;
                if let Some(limit) = r.limit {
                    finite(limit, "ramp limit")?;
                }
                Ok(())
            }
            Self::Sine(s) => {
                finite(s.amplitude, "sine amplitude")?;
                finite(s.phase, "sine phase")?;
                finite(s.offset, "sine offset")?;
                finite(s.period, "sine period")?;
                if s.period <= 0.0 {
                    return Err(ControlError::InvalidSignal {
                        what: format!("sine period must be positive, got {}", s.period),
                    });
                }
                Ok(())
            }
            Self::Sum { terms } => terms.iter().try_for_each(SignalSpec::validate),
        }
    }
}

impl Signal for SignalSpec {
    fn value(&self, t: f64) -> f64 {
        match self {
            Self::Constant(c) => c.value(t),
            Self::Step(s) => s.value(t),
            Self::Ramp(r) => r.value(t),
            Self::Sine(s) => s.value(t),
            Self::Sum { terms } => terms.iter().map(|term| term.value(t)).sum(),
        }
    }
}
