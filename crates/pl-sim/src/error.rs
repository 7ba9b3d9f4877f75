//! Error types for simulation operations.

use crate::closed_loop::Trajectory;
use thiserror::Error;

/// Why a numerical integration stopped early.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureReason {
    #[error("non-finite state or derivative")]
    NonFinite,

    #[error("step size {h:e} fell below the minimum")]
    StepSizeUnderflow { h: f64 },

    #[error("step budget of {max_steps} exhausted")]
    StepBudgetExhausted { max_steps: usize },
}

/// Errors encountered during transient simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Integration stopped at `t_last`, the last time with a valid state.
    /// Closed-loop runs attach the samples recorded before the failure.
    #[error("Integration failed at t = {t_last}: {reason}")]
    IntegrationFailed {
        t_last: f64,
        reason: FailureReason,
        partial: Option<Box<Trajectory>>,
    },
}

impl SimError {
    pub(crate) fn failed(t_last: f64, reason: FailureReason) -> Self {
        SimError::IntegrationFailed {
            t_last,
            reason,
            partial: None,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
