//! Start-to-stop batch runs of an artifact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{self, ArtifactStore, Causality, Runtime};

/// Upper bound on recorded samples per run.
pub const MAX_SAMPLES: u64 = 1_000_000;

/// Overrides for a batch run. Unset fields fall back to the artifact's
/// default experiment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchOptions {
    pub start_time: Option<f64>,
    pub stop_time: Option<f64>,
    pub step_size: Option<f64>,
    /// Outputs to record; every output variable when unset.
    pub outputs: Option<Vec<String>>,
    /// Constant input values applied before the first step.
    pub inputs: BTreeMap<String, f64>,
}

/// One recorded variable.
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub values: Vec<f64>,
}

/// Sampled trajectories of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub model_name: String,
    pub time: Vec<f64>,
    pub columns: Vec<Column>,
}

impl SimulationResult {
    /// Values recorded for `name`, if it was recorded.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Runs `name` from start to stop and records outputs at every communication point.
///
/// The first sample is taken after initialization at the start time; one
/// more sample follows each step. The final step is shortened so the last
/// sample lands on the stop time.
///
/// # Errors
///
/// Returns [`ServiceError::ArtifactNotFound`] for a missing artifact,
/// [`ServiceError::InvalidInput`] for unusable overrides, and model errors
/// raised while stepping.
pub fn simulate(
    store: &ArtifactStore,
    runtime: &dyn Runtime,
    name: &str,
    options: &BatchOptions,
) -> ServiceResult<SimulationResult> {
    if !ArtifactStore::is_valid_name(name) {
        return Err(ServiceError::InvalidInput(format!(
            "invalid artifact name \"{name}\""
        )));
    }
    if !store.contains(name) {
        return Err(ServiceError::ArtifactNotFound(name.to_string()));
    }

    let description = store.describe(name)?;
    let exp = &description.default_experiment;
    let start = options.start_time.unwrap_or(exp.start_time);
    let stop = options.stop_time.unwrap_or(exp.stop_time);
    let step = options.step_size.unwrap_or(exp.step_size);

    if !(step.is_finite() && step > 0.0) {
        return Err(ServiceError::InvalidInput("step_size must be > 0".into()));
    }
    if !(start.is_finite() && stop.is_finite() && stop > start) {
        return Err(ServiceError::InvalidInput(
            "stop_time must be > start_time".into(),
        ));
    }

    let mut clock = Clock::new(start, step, stop);
    let total = clock.total_steps();
    if total >= MAX_SAMPLES {
        return Err(ServiceError::InvalidInput(format!(
            "run would record {} samples, limit is {MAX_SAMPLES}",
            total.saturating_add(1)
        )));
    }

    let recorded: Vec<&model::ScalarVariable> = match &options.outputs {
        Some(names) => names
            .iter()
            .map(|n| {
                description
                    .variable(n)
                    .ok_or_else(|| model::ModelError::UnknownVariable(n.clone()))
            })
            .collect::<Result<_, _>>()?,
        None => description.with_causality(Causality::Output).collect(),
    };
    let refs: Vec<u32> = recorded.iter().map(|v| v.value_reference).collect();

    let inputs = options
        .inputs
        .iter()
        .map(|(n, v)| description.value_reference(n).map(|vr| (vr, *v)))
        .collect::<Result<Vec<_>, _>>()?;

    let (_extracted, mut handle) = model::open(store, runtime, name, "batch", start)?;
    if !inputs.is_empty() {
        let (input_refs, values): (Vec<u32>, Vec<f64>) = inputs.into_iter().unzip();
        handle.set_real(&input_refs, &values)?;
    }

    let capacity = usize::try_from(total + 1).unwrap_or(0);
    let mut time = Vec::with_capacity(capacity);
    let mut series: Vec<Vec<f64>> = vec![Vec::with_capacity(capacity); refs.len()];

    let mut record = |t: f64, values: Vec<f64>| {
        time.push(t);
        for (col, v) in series.iter_mut().zip(values) {
            col.push(v);
        }
    };

    record(clock.time(), handle.get_real(&refs)?);
    while let Some((point, h)) = clock.tick() {
        handle.do_step(point, h)?;
        record(clock.time(), handle.get_real(&refs)?);
    }
    handle.terminate()?;

    info!(
        artifact = name,
        samples = time.len(),
        stop = stop,
        "batch simulation complete"
    );

    let columns = recorded
        .iter()
        .zip(series)
        .map(|(v, values)| Column {
            name: v.name.clone(),
            unit: v.unit.clone(),
            values,
        })
        .collect();

    Ok(SimulationResult {
        model_name: description.model_name.clone(),
        time,
        columns,
    })
}
