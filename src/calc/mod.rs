//! Closed-form techno-economic calculators.
//!
//! Both calculators are plain arithmetic over their inputs; they validate
//! the inputs and return [`ServiceError::InvalidInput`](crate::error::ServiceError)
//! for values outside their domain.

pub mod ammonia;
pub mod hydrogen;

pub use ammonia::{AmmoniaBalance, ammonia_balance};
pub use hydrogen::{LcohBreakdown, LcohInputs, levelized_cost};

/// Rounds half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
