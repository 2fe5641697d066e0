//! Built-in model library.
//!
//! Each model exposes a fixed list of named ports. The runtime binds the
//! ports to value references from the artifact's description, so
//! artifacts are free to choose their own references.

mod first_order;
mod oscillator;
mod pump;

pub use first_order::FirstOrder;
pub use oscillator::Oscillator;
pub use pump::PumpPid;

use super::description::ModelDescription;
use super::error::{ModelError, ModelResult};

/// Model kinds understood by [`create`].
pub const KINDS: &[&str] = &["first_order", "oscillator", "pump_pid"];

/// Most internal sub-steps a single communication step may take.
pub(crate) const MAX_SUBSTEPS: usize = 1_000;

/// Continuous-time dynamics of a built-in model.
pub trait Dynamics: Send {
    /// Port names, in the order `ports` slices are laid out.
    fn ports(&self) -> &'static [&'static str];

    /// Reads parameters and initial state. `params` resolves a variable
    /// name to its current value.
    fn initialize(&mut self, params: &dyn Fn(&str) -> Option<f64>, ports: &mut [f64]);

    /// Integrates over `h` seconds, reading inputs from and writing
    /// outputs to `ports`.
    fn advance(&mut self, ports: &mut [f64], h: f64);

    /// Longest communication step [`Dynamics::advance`] accepts.
    fn max_step_size(&self) -> f64 {
        f64::INFINITY
    }
}

/// Instantiates the dynamics for the description's model kind.
///
/// # Errors
///
/// Returns [`ModelError::UnknownKind`] if the kind is not in [`KINDS`].
pub fn create(description: &ModelDescription) -> ModelResult<Box<dyn Dynamics>> {
    match description.kind.as_str() {
        "first_order" => Ok(Box::new(FirstOrder::default())),
        "oscillator" => Ok(Box::new(Oscillator::default())),
        "pump_pid" => Ok(Box::new(PumpPid::default())),
        other => Err(ModelError::UnknownKind(other.to_string())),
    }
}

/// Splits `h` into equal sub-steps no longer than `max_h`.
pub(crate) fn substeps(h: f64, max_h: f64) -> (usize, f64) {
    let n = (h / max_h).ceil().max(1.0) as usize;
    (n, h / n as f64)
}
