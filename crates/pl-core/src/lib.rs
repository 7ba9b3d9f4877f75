//! pl-core: shared foundation for pi-loop.
//!
//! Contains:
//! - numeric (Real, tolerances, argument checks)
//! - error (shared error types)

pub mod error;
pub mod numeric;

pub use error::{CoreError, CoreResult};
pub use numeric::*;
