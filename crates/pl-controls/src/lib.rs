//! Continuous-time PI control primitives for pi-loop.
//!
//! This crate provides the closed-loop model that the simulation driver
//! integrates: a first-order integrator plant driven by a PI controller,
//! with exogenous setpoint and load signals.
//!
//! # Architecture
//!
//! - Signals are deterministic scalar functions of time ([`Signal`])
//! - Controller variants are fixed at construction ([`IntegralMode`],
//!   [`LimitStrategy`]) so evaluation dispatches once per call
//! - The model is pure: [`ClosedLoopModel::evaluate`] holds no state between
//!   calls, so adaptive solvers may evaluate it at any time, in any order

pub mod closed_loop;
pub mod error;
pub mod limits;
pub mod signal;

pub use closed_loop::{ClosedLoopModel, ClosedLoopState, Evaluation, IntegralMode, PiParams};
pub use error::{ControlError, ControlResult};
pub use limits::{ControlLimits, LimitStrategy};
pub use signal::{Constant, Ramp, Signal, SignalSpec, Sine, Step};
