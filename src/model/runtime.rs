//! Co-simulation runtime seam and the built-in instance implementation.
//!
//! [`CoSimulation`] mirrors the FMI 2.0 co-simulation calling sequence:
//!
//! ```text
//! instantiate -> setup_experiment -> enter_initialization_mode
//!             -> exit_initialization_mode -> (set_real / do_step / get_real)*
//!             -> terminate -> drop
//! ```
//!
//! Dropping a handle frees the instance, so callers never need an explicit
//! `free_instance`.

use std::collections::BTreeMap;

use tracing::debug;

use super::artifact::ExtractedArtifact;
use super::builtin::{self, Dynamics};
use super::description::{Causality, ModelDescription};
use super::error::{ModelError, ModelResult};

/// Relative tolerance when matching a requested communication point.
const TIME_TOLERANCE: f64 = 1e-9;

/// A live simulation instance.
pub trait CoSimulation: Send {
    /// Declares the experiment start time (and optional stop time).
    fn setup_experiment(&mut self, start_time: f64, stop_time: Option<f64>) -> ModelResult<()>;

    fn enter_initialization_mode(&mut self) -> ModelResult<()>;

    fn exit_initialization_mode(&mut self) -> ModelResult<()>;

    /// Writes real values to the given value references.
    fn set_real(&mut self, refs: &[u32], values: &[f64]) -> ModelResult<()>;

    /// Reads real values for the given value references, in order.
    fn get_real(&self, refs: &[u32]) -> ModelResult<Vec<f64>>;

    /// Advances the instance from `current_communication_point` by `step_size`.
    fn do_step(&mut self, current_communication_point: f64, step_size: f64) -> ModelResult<()>;

    fn terminate(&mut self) -> ModelResult<()>;

    /// Instance name given at instantiation.
    fn instance_name(&self) -> &str;
}

/// Creates simulation instances from extracted artifacts.
pub trait Runtime: Send + Sync {
    /// Instantiates `artifact` under `instance_name`.
    ///
    /// # Errors
    ///
    /// Fails when the artifact's model kind is not supported by this runtime.
    fn instantiate(
        &self,
        artifact: &ExtractedArtifact,
        instance_name: &str,
    ) -> ModelResult<Box<dyn CoSimulation>>;
}

/// Runtime backed by the crate's built-in model library.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinRuntime;

impl Runtime for BuiltinRuntime {
    fn instantiate(
        &self,
        artifact: &ExtractedArtifact,
        instance_name: &str,
    ) -> ModelResult<Box<dyn CoSimulation>> {
        let instance = Instance::new(artifact.description(), instance_name)?;
        Ok(Box::new(instance))
    }
}

/// Lifecycle state of an [`Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Instantiated,
    ExperimentSet,
    Initialization,
    Stepping,
    Terminated,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Instantiated => "instantiated",
            Self::ExperimentSet => "experiment-set",
            Self::Initialization => "initialization",
            Self::Stepping => "step",
            Self::Terminated => "terminated",
        }
    }
}

/// Instance of a built-in model.
///
/// Holds the current value of every declared variable keyed by value
/// reference. Before each step the model's ports are gathered from that
/// table, and the updated ports are written back afterwards.
pub struct Instance {
    name: String,
    phase: Phase,
    time: f64,
    values: BTreeMap<u32, f64>,
    causality: BTreeMap<u32, (String, Causality)>,
    names: BTreeMap<String, u32>,
    ports: Vec<u32>,
    model: Box<dyn Dynamics>,
}

impl Instance {
    /// Builds an instance for `description`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownKind`] for unsupported kinds and
    /// [`ModelError::UnknownVariable`] when the description lacks a port the
    /// model needs.
    pub fn new(description: &ModelDescription, name: &str) -> ModelResult<Self> {
        let model = builtin::create(description)?;
        let ports = model
            .ports()
            .iter()
            .map(|port| description.value_reference(port))
            .collect::<ModelResult<Vec<_>>>()?;

        let values = description
            .variables
            .iter()
            .map(|v| (v.value_reference, v.start.unwrap_or(0.0)))
            .collect();
        let causality = description
            .variables
            .iter()
            .map(|v| (v.value_reference, (v.name.clone(), v.causality)))
            .collect();
        let names = description
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.value_reference))
            .collect();

        debug!(instance = name, model = %description.model_name, "instantiated");
        Ok(Self {
            name: name.to_string(),
            phase: Phase::Instantiated,
            time: description.default_experiment.start_time,
            values,
            causality,
            names,
            ports,
            model,
        })
    }

    /// Current instance time.
    pub fn time(&self) -> f64 {
        self.time
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> ModelResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ModelError::Lifecycle {
                operation,
                state: self.phase.as_str(),
            })
        }
    }

    fn gather(&self) -> Vec<f64> {
        self.ports
            .iter()
            .map(|vr| self.values.get(vr).copied().unwrap_or(0.0))
            .collect()
    }

    fn scatter(&mut self, ports: &[f64]) {
        for (vr, value) in self.ports.iter().zip(ports) {
            self.values.insert(*vr, *value);
        }
    }
}

impl CoSimulation for Instance {
    fn setup_experiment(&mut self, start_time: f64, _stop_time: Option<f64>) -> ModelResult<()> {
        self.require("setup_experiment", &[Phase::Instantiated])?;
        self.time = start_time;
        self.phase = Phase::ExperimentSet;
        Ok(())
    }

    fn enter_initialization_mode(&mut self) -> ModelResult<()> {
        self.require(
            "enter_initialization_mode",
            &[Phase::Instantiated, Phase::ExperimentSet],
        )?;
        self.phase = Phase::Initialization;
        Ok(())
    }

    fn exit_initialization_mode(&mut self) -> ModelResult<()> {
        self.require("exit_initialization_mode", &[Phase::Initialization])?;
        let mut ports = self.gather();
        let lookup = |name: &str| {
            self.names
                .get(name)
                .and_then(|vr| self.values.get(vr))
                .copied()
        };
        self.model.initialize(&lookup, &mut ports);
        self.scatter(&ports);
        self.phase = Phase::Stepping;
        Ok(())
    }

    fn set_real(&mut self, refs: &[u32], values: &[f64]) -> ModelResult<()> {
        self.require(
            "set_real",
            &[
                Phase::Instantiated,
                Phase::ExperimentSet,
                Phase::Initialization,
                Phase::Stepping,
            ],
        )?;
        if refs.len() != values.len() {
            return Err(ModelError::Invalid(format!(
                "set_real got {} references and {} values",
                refs.len(),
                values.len()
            )));
        }

        for (vr, value) in refs.iter().zip(values) {
            let (name, causality) = self
                .causality
                .get(vr)
                .ok_or(ModelError::UnknownValueReference(*vr))?;
            let settable = match causality {
                Causality::Input => true,
                Causality::Parameter => self.phase != Phase::Stepping,
                _ => false,
            };
            if !settable {
                return Err(ModelError::NotSettable {
                    name: name.clone(),
                    causality: causality.to_string(),
                });
            }
            self.values.insert(*vr, *value);
        }
        Ok(())
    }

    fn get_real(&self, refs: &[u32]) -> ModelResult<Vec<f64>> {
        refs.iter()
            .map(|vr| {
                self.values
                    .get(vr)
                    .copied()
                    .ok_or(ModelError::UnknownValueReference(*vr))
            })
            .collect()
    }

    fn do_step(&mut self, current_communication_point: f64, step_size: f64) -> ModelResult<()> {
        self.require("do_step", &[Phase::Stepping])?;
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(ModelError::InvalidStepSize(step_size));
        }
        let max = self.model.max_step_size();
        if step_size > max * (1.0 + TIME_TOLERANCE) {
            return Err(ModelError::StepTooLarge {
                step: step_size,
                max,
            });
        }
        let tolerance = TIME_TOLERANCE * self.time.abs().max(1.0);
        if (current_communication_point - self.time).abs() > tolerance {
            return Err(ModelError::TimeMismatch {
                requested: current_communication_point,
                current: self.time,
            });
        }

        let mut ports = self.gather();
        self.model.advance(&mut ports, step_size);
        if ports.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Diverged {
                time: self.time + step_size,
            });
        }
        self.scatter(&ports);
        self.time = current_communication_point + step_size;
        Ok(())
    }

    fn terminate(&mut self) -> ModelResult<()> {
        self.require(
            "terminate",
            &[Phase::Initialization, Phase::Stepping, Phase::ExperimentSet],
        )?;
        self.phase = Phase::Terminated;
        debug!(instance = %self.name, t = self.time, "terminated");
        Ok(())
    }

    fn instance_name(&self) -> &str {
        &self.name
    }
}
