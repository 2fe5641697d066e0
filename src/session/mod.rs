//! Stepped simulation sessions.
//!
//! A [`Session`] owns one initialized simulation handle and the extraction
//! directory it was built from. Dropping the session terminates the handle
//! and removes the directory, so every exit path (done, error, explicit
//! stop, shutdown) releases the same resources. Opening and dropping both
//! touch the file system, so the registry does either on the blocking pool.

mod registry;

pub use registry::SessionRegistry;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SessionProfile;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{self, ArtifactStore, CoSimulation, ExtractedArtifact, ModelResult, Runtime};
use crate::sim::clock::Clock;

/// Result of one session step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub session_id: String,
    /// Simulated time after the step.
    pub time: f64,
    /// Name of the input variable.
    pub input: String,
    /// Value applied to the input for this step.
    pub input_value: f64,
    /// Output values read after the step.
    pub outputs: BTreeMap<String, f64>,
    /// `true` once the session has reached its stop time or threshold;
    /// the session no longer exists after returning such an outcome.
    pub done: bool,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub profile: String,
    pub artifact: String,
    pub time: f64,
    pub step_size: f64,
    pub stop_time: f64,
    pub steps: u64,
    pub done: bool,
}

/// One caller's in-progress stepped run.
pub struct Session {
    id: String,
    profile: String,
    clock: Clock,
    input: (String, u32),
    outputs: Vec<(String, u32)>,
    threshold: Option<(u32, f64)>,
    // Declared before `artifact`: the instance is freed before its
    // extraction directory is removed.
    handle: Box<dyn CoSimulation>,
    artifact: ExtractedArtifact,
}

impl Session {
    /// Extracts and initializes the profile's artifact for a new session.
    ///
    /// The input, every output and the threshold variable are resolved
    /// before the session exists; a missing variable fails the start and
    /// leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ArtifactNotFound`] if the artifact is absent,
    /// or a model error if a variable is missing or initialization fails.
    pub fn open(
        id: &str,
        profile_name: &str,
        profile: &SessionProfile,
        store: &ArtifactStore,
        runtime: &dyn Runtime,
    ) -> ServiceResult<Self> {
        if !store.contains(&profile.artifact) {
            return Err(ServiceError::ArtifactNotFound(profile.artifact.clone()));
        }

        let (artifact, handle) = model::open(store, runtime, &profile.artifact, id, 0.0)?;
        let description = artifact.description();

        let input = (
            profile.input.clone(),
            description.value_reference(&profile.input)?,
        );
        let outputs = profile
            .outputs
            .iter()
            .map(|name| Ok((name.clone(), description.value_reference(name)?)))
            .collect::<ModelResult<Vec<_>>>()?;
        let threshold = match &profile.threshold {
            Some(t) => Some((description.value_reference(&t.variable)?, t.limit)),
            None => None,
        };

        info!(
            session = id,
            profile = profile_name,
            artifact = %profile.artifact,
            dir = %artifact.path().display(),
            "session started"
        );

        Ok(Self {
            id: id.to_string(),
            profile: profile_name.to_string(),
            clock: Clock::new(0.0, profile.step_size, profile.stop_time),
            input,
            outputs,
            threshold,
            handle,
            artifact,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Directory holding this session's extracted artifact.
    pub fn workdir(&self) -> &Path {
        self.artifact.path()
    }

    /// Applies `input_value`, advances one fixed step and reads the outputs.
    ///
    /// The outcome is `done` when time reaches the stop time or the
    /// threshold output exceeds its limit. The caller is responsible for
    /// dropping the session afterwards.
    ///
    /// # Errors
    ///
    /// Propagates runtime failures; the session must not be stepped again
    /// after an error.
    pub fn step(&mut self, input_value: f64) -> ModelResult<StepOutcome> {
        let (input_name, input_ref) = &self.input;
        self.handle.set_real(&[*input_ref], &[input_value])?;
        self.handle
            .do_step(self.clock.time(), self.clock.step_size())?;
        let time = self.clock.advance();

        let refs: Vec<u32> = self.outputs.iter().map(|(_, vr)| *vr).collect();
        let values = self.handle.get_real(&refs)?;
        let outputs: BTreeMap<String, f64> = self
            .outputs
            .iter()
            .map(|(name, _)| name.clone())
            .zip(values)
            .collect();

        let exceeded = match self.threshold {
            Some((vr, limit)) => self.handle.get_real(&[vr])?[0] > limit,
            None => false,
        };
        let done = self.clock.finished() || exceeded;

        debug!(session = %self.id, time, input_value, done, "step");
        Ok(StepOutcome {
            session_id: self.id.clone(),
            time,
            input: input_name.clone(),
            input_value,
            outputs,
            done,
        })
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            profile: self.profile.clone(),
            artifact: self.artifact.name().to_string(),
            time: self.clock.time(),
            step_size: self.clock.step_size(),
            stop_time: self.clock.stop_time(),
            steps: self.clock.steps(),
            done: self.clock.finished(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.handle.terminate() {
            warn!(session = %self.id, error = %e, "terminate failed during cleanup");
        }
        info!(session = %self.id, t = self.clock.time(), "session released");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Threshold;
    use crate::model::{BuiltinRuntime, ModelError};
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const FIRST_ORDER: &str = r#"
model_name = "FirstOrder"
kind = "first_order"

[[variables]]
name = "u"
value_reference = 0
causality = "input"

[[variables]]
name = "x"
value_reference = 1
causality = "output"

[[variables]]
name = "T"
value_reference = 2
causality = "parameter"
start = 0.5
"#;

    /// Store with one artifact plus an isolated work dir for extractions.
    pub(crate) fn fixture() -> (TempDir, TempDir, ArtifactStore) {
        let dir = TempDir::new().expect("artifact dir");
        let work = TempDir::new().expect("work dir");
        fs::write(dir.path().join("FirstOrder.model.toml"), FIRST_ORDER).expect("write");
        let store = ArtifactStore::new(dir.path()).with_work_dir(work.path());
        (dir, work, store)
    }

    /// Built-in runtime whose instances diverge on the step after
    /// `ok_steps` successful ones.
    pub(crate) struct FailingRuntime {
        pub ok_steps: usize,
    }

    struct FailingInstance {
        inner: Box<dyn CoSimulation>,
        remaining: usize,
    }

    impl Runtime for FailingRuntime {
        fn instantiate(
            &self,
            artifact: &ExtractedArtifact,
            instance_name: &str,
        ) -> ModelResult<Box<dyn CoSimulation>> {
            Ok(Box::new(FailingInstance {
                inner: BuiltinRuntime.instantiate(artifact, instance_name)?,
                remaining: self.ok_steps,
            }))
        }
    }

    impl CoSimulation for FailingInstance {
        fn setup_experiment(&mut self, start_time: f64, stop_time: Option<f64>) -> ModelResult<()> {
            self.inner.setup_experiment(start_time, stop_time)
        }

        fn enter_initialization_mode(&mut self) -> ModelResult<()> {
            self.inner.enter_initialization_mode()
        }

        fn exit_initialization_mode(&mut self) -> ModelResult<()> {
            self.inner.exit_initialization_mode()
        }

        fn set_real(&mut self, refs: &[u32], values: &[f64]) -> ModelResult<()> {
            self.inner.set_real(refs, values)
        }

        fn get_real(&self, refs: &[u32]) -> ModelResult<Vec<f64>> {
            self.inner.get_real(refs)
        }

        fn do_step(&mut self, point: f64, step_size: f64) -> ModelResult<()> {
            if self.remaining == 0 {
                return Err(ModelError::Diverged {
                    time: point + step_size,
                });
            }
            self.remaining -= 1;
            self.inner.do_step(point, step_size)
        }

        fn terminate(&mut self) -> ModelResult<()> {
            self.inner.terminate()
        }

        fn instance_name(&self) -> &str {
            self.inner.instance_name()
        }
    }

    pub(crate) fn lag_profile(stop_time: f64) -> SessionProfile {
        SessionProfile {
            artifact: "FirstOrder".to_string(),
            input: "u".to_string(),
            outputs: vec!["x".to_string()],
            step_size: 0.1,
            stop_time,
            threshold: None,
        }
    }

    #[test]
    fn steps_until_stop_time() {
        let (_dir, _work, store) = fixture();
        let mut s = Session::open("s1", "lag", &lag_profile(0.3), &store, &BuiltinRuntime)
            .expect("open");
        assert_eq!(s.time(), 0.0);

        let first = s.step(1.0).expect("step");
        assert!(!first.done);
        assert!((first.time - 0.1).abs() < 1e-12);
        assert!(first.outputs["x"] > 0.0);
        assert_eq!(first.input, "u");

        assert!(!s.step(1.0).expect("step").done);
        let last = s.step(1.0).expect("step");
        assert!(last.done);
        assert!((last.time - 0.3).abs() < 1e-12);
    }

    #[test]
    fn threshold_ends_session_early() {
        let (_dir, _work, store) = fixture();
        let mut profile = lag_profile(100.0);
        profile.threshold = Some(Threshold {
            variable: "x".to_string(),
            limit: 0.5,
        });
        let mut s = Session::open("s2", "lag", &profile, &store, &BuiltinRuntime).expect("open");
        let mut steps = 0;
        loop {
            steps += 1;
            let out = s.step(1.0).expect("step");
            if out.done {
                assert!(out.outputs["x"] > 0.5);
                break;
            }
            assert!(steps < 100, "threshold never triggered");
        }
        // x = 1 - exp(-t/0.5) first exceeds 0.5 after the step landing on t = 0.4
        assert_eq!(steps, 4);
    }

    #[test]
    fn missing_variable_leaves_nothing_behind() {
        let (_dir, work, store) = fixture();
        let mut profile = lag_profile(1.0);
        profile.input = "flowSetpoint".to_string();
        let err = Session::open("s3", "lag", &profile, &store, &BuiltinRuntime)
            .err()
            .expect("open should fail");
        assert!(matches!(
            err,
            ServiceError::Model(model::ModelError::UnknownVariable(ref n)) if n == "flowSetpoint"
        ));
        assert_eq!(fs::read_dir(work.path()).expect("read").count(), 0);
    }

    #[test]
    fn missing_artifact_is_reported() {
        let (_dir, _work, store) = fixture();
        let mut profile = lag_profile(1.0);
        profile.artifact = "Absent".to_string();
        assert!(matches!(
            Session::open("s4", "lag", &profile, &store, &BuiltinRuntime),
            Err(ServiceError::ArtifactNotFound(ref a)) if a == "Absent"
        ));
    }

    #[test]
    fn drop_removes_workdir() {
        let (_dir, _work, store) = fixture();
        let s = Session::open("s5", "lag", &lag_profile(1.0), &store, &BuiltinRuntime)
            .expect("open");
        let dir = s.workdir().to_path_buf();
        assert!(dir.exists());
        assert_eq!(s.status().artifact, "FirstOrder");
        drop(s);
        assert!(!dir.exists());
    }
}
