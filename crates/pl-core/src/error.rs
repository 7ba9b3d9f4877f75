use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Value for {what} must be strictly positive, got {value}")]
    NotPositive { what: &'static str, value: f64 },

    #[error("Invalid range for {what}: lower {lo} exceeds upper {hi}")]
    InvalidRange { what: &'static str, lo: f64, hi: f64 },
}
