//! Simulation artifacts and the co-simulation runtime.

pub mod artifact;
pub mod builtin;
pub mod description;
pub mod error;
pub mod runtime;

pub use artifact::{ArtifactStore, ExtractedArtifact};
pub use description::{Causality, DefaultExperiment, ModelDescription, ScalarVariable};
pub use error::{ModelError, ModelResult};
pub use runtime::{BuiltinRuntime, CoSimulation, Runtime};

/// Extracts, instantiates and initializes `name` in one go.
///
/// Returns the initialized handle together with the extraction it was
/// built from; the caller must keep both alive for as long as the handle
/// is used.
///
/// # Errors
///
/// Propagates extraction, instantiation and initialization failures.
pub fn open(
    store: &ArtifactStore,
    runtime: &dyn Runtime,
    name: &str,
    instance_name: &str,
    start_time: f64,
) -> ModelResult<(ExtractedArtifact, Box<dyn CoSimulation>)> {
    let extracted = store.extract(name)?;
    let mut handle = runtime.instantiate(&extracted, instance_name)?;
    handle.setup_experiment(start_time, None)?;
    handle.enter_initialization_mode()?;
    handle.exit_initialization_mode()?;
    Ok((extracted, handle))
}
