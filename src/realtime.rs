//! Wall-clock paced simulation loop.
//!
//! A single background task exclusively owns its simulation handle. The
//! live parameter arrives on a watch channel and is applied at the next
//! step boundary. Samples go into a bounded [`History`] shared with the
//! controller, and a small [`RunnerStatus`] is published on a second
//! watch channel; the full [`TraceSnapshot`] is only assembled when asked
//! for. The task exits on a stop signal, at the stop time (unless looping)
//! or on the first runtime error.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::RealtimeConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{
    self, ArtifactStore, Causality, CoSimulation, ExtractedArtifact, ModelError, ModelResult,
    Runtime,
};
use crate::sim::clock::Clock;

const INSTANCE_NAME: &str = "realtime";

/// Trace of the real-time runner as served to clients.
///
/// Each sample is taken at the end of a step: `time[i]` is the simulated
/// time the step landed on and `output[i]` the output read back there. The
/// initial state at `t = 0` is not part of the trace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceSnapshot {
    pub running: bool,
    /// Parameter value applied to the input.
    pub param_value: f64,
    /// Name of the recorded output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    /// Number of times the run has wrapped back to zero.
    pub cycle: u64,
    pub time: Vec<f64>,
    pub output: Vec<f64>,
    /// Set when the task ended because of a runtime failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lightweight state published by the runner every `publish_every` steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnerStatus {
    pub running: bool,
    /// Parameter value applied at the latest step.
    pub param_value: f64,
    pub cycle: u64,
    /// Samples currently held in the history.
    pub samples: usize,
    /// Time of the newest sample.
    pub last_time: Option<f64>,
    pub error: Option<String>,
}

/// Bounded sample buffer written by the runner and read by the controller.
#[derive(Debug, Default)]
struct History {
    output_name: Option<String>,
    cycle: u64,
    time: VecDeque<f64>,
    values: VecDeque<f64>,
}

type SharedHistory = Arc<StdMutex<History>>;

fn lock(history: &SharedHistory) -> MutexGuard<'_, History> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RunnerHandle {
    stop: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Starts, feeds and stops the background runner.
pub struct RealtimeController {
    store: Arc<ArtifactStore>,
    runtime: Arc<dyn Runtime>,
    config: RealtimeConfig,
    param: watch::Sender<f64>,
    status: Arc<watch::Sender<RunnerStatus>>,
    history: SharedHistory,
    task: Mutex<Option<RunnerHandle>>,
}

impl RealtimeController {
    pub fn new(store: Arc<ArtifactStore>, runtime: Arc<dyn Runtime>, config: RealtimeConfig) -> Self {
        let (param, _) = watch::channel(0.0);
        let (status, _) = watch::channel(RunnerStatus::default());
        Self {
            store,
            runtime,
            config,
            param,
            status: Arc::new(status),
            history: SharedHistory::default(),
            task: Mutex::new(None),
        }
    }

    /// Opens the configured artifact and spawns the runner.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Conflict`] if a runner is already active, or
    /// the error raised while opening the model.
    pub async fn start(&self) -> ServiceResult<()> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.join.is_finished()) {
            return Err(ServiceError::Conflict(
                "real-time simulation already running".into(),
            ));
        }

        if !self.store.contains(&self.config.artifact) {
            return Err(ServiceError::ArtifactNotFound(self.config.artifact.clone()));
        }
        let runner = {
            let store = Arc::clone(&self.store);
            let runtime = Arc::clone(&self.runtime);
            let config = self.config.clone();
            let param = self.param.subscribe();
            let status = Arc::clone(&self.status);
            let history = Arc::clone(&self.history);
            tokio::task::spawn_blocking(move || {
                Runner::open(store, runtime, config, param, status, history)
            })
            .await??
        };

        let (stop, stop_rx) = oneshot::channel();
        let join = tokio::spawn(runner.run(stop_rx));
        *task = Some(RunnerHandle { stop, join });
        info!(artifact = %self.config.artifact, "real-time simulation started");
        Ok(())
    }

    /// Sets the parameter applied from the next step on.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] for a non-finite value.
    pub fn update(&self, value: f64) -> ServiceResult<()> {
        if !value.is_finite() {
            return Err(ServiceError::InvalidInput(
                "parameter value must be finite".into(),
            ));
        }
        self.param.send_replace(value);
        debug!(value, "real-time parameter updated");
        Ok(())
    }

    /// Current trace, with the current parameter value.
    pub fn data(&self) -> TraceSnapshot {
        let status = self.status.borrow().clone();
        let history = lock(&self.history);
        TraceSnapshot {
            running: status.running,
            param_value: *self.param.borrow(),
            output_name: history.output_name.clone(),
            cycle: history.cycle,
            time: history.time.iter().copied().collect(),
            output: history.values.iter().copied().collect(),
            error: status.error,
        }
    }

    /// Receiver of every published status.
    pub fn subscribe(&self) -> watch::Receiver<RunnerStatus> {
        self.status.subscribe()
    }

    /// Returns `true` while the runner task is alive.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.join.is_finished())
    }

    /// Signals the runner and waits for it to release its model.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Conflict`] if no runner is active.
    pub async fn stop(&self) -> ServiceResult<TraceSnapshot> {
        let handle = self
            .task
            .lock()
            .await
            .take()
            .filter(|t| !t.join.is_finished())
            .ok_or_else(|| ServiceError::Conflict("real-time simulation is not running".into()))?;

        // the task may have finished between the check and the send
        let _ = handle.stop.send(());
        if let Err(e) = handle.join.await {
            warn!(error = %e, "real-time task did not exit cleanly");
        }
        info!("real-time simulation stopped");
        Ok(self.data())
    }

    /// Stops the runner if it is active. Used on shutdown.
    pub async fn shutdown(&self) {
        if self.is_running().await {
            let _ = self.stop().await;
        }
    }
}

/// Initialized model plus the extraction it lives in.
struct Loaded {
    handle: Box<dyn CoSimulation>,
    artifact: ExtractedArtifact,
}

impl Drop for Loaded {
    fn drop(&mut self) {
        if let Err(e) = self.handle.terminate() {
            warn!(error = %e, "terminate failed during real-time cleanup");
        }
    }
}

enum Progress {
    Stepped,
    Finished,
}

struct Runner {
    store: Arc<ArtifactStore>,
    runtime: Arc<dyn Runtime>,
    config: RealtimeConfig,
    loaded: Loaded,
    input: Option<u32>,
    output: u32,
    clock: Clock,
    cycle: u64,
    applied: f64,
    param: watch::Receiver<f64>,
    status: Arc<watch::Sender<RunnerStatus>>,
    history: SharedHistory,
}

impl Runner {
    fn load(store: &ArtifactStore, runtime: &dyn Runtime, artifact: &str) -> ModelResult<Loaded> {
        let (extracted, handle) = model::open(store, runtime, artifact, INSTANCE_NAME, 0.0)?;
        Ok(Loaded {
            handle,
            artifact: extracted,
        })
    }

    fn open(
        store: Arc<ArtifactStore>,
        runtime: Arc<dyn Runtime>,
        config: RealtimeConfig,
        param: watch::Receiver<f64>,
        status: Arc<watch::Sender<RunnerStatus>>,
        history: SharedHistory,
    ) -> ServiceResult<Self> {
        let loaded = Self::load(&store, runtime.as_ref(), &config.artifact)?;
        let description = loaded.artifact.description();

        let input = config
            .input
            .as_deref()
            .map(|name| description.value_reference(name))
            .transpose()?;
        let (output_name, output) = match config.output.as_deref() {
            Some(name) => (name.to_string(), description.value_reference(name)?),
            None => description
                .with_causality(Causality::Output)
                .next()
                .map(|v| (v.name.clone(), v.value_reference))
                .ok_or_else(|| {
                    ModelError::Invalid(format!(
                        "model \"{}\" has no output to record",
                        description.model_name
                    ))
                })?,
        };

        let clock = Clock::new(0.0, config.step_size, config.stop_time);
        let capacity = usize::try_from(clock.total_steps())
            .unwrap_or(usize::MAX)
            .min(config.history_limit);
        {
            let mut h = lock(&history);
            *h = History {
                output_name: Some(output_name),
                cycle: 0,
                time: VecDeque::with_capacity(capacity),
                values: VecDeque::with_capacity(capacity),
            };
        }
        let applied = *param.borrow();
        Ok(Self {
            store,
            runtime,
            loaded,
            input,
            output,
            clock,
            cycle: 0,
            applied,
            param,
            status,
            history,
            config,
        })
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(self.config.step_size / self.config.speedup)
            .max(Duration::from_micros(1))
    }

    fn current(&self, running: bool, error: Option<String>) -> RunnerStatus {
        let h = lock(&self.history);
        RunnerStatus {
            running,
            param_value: self.applied,
            cycle: self.cycle,
            samples: h.time.len(),
            last_time: h.time.back().copied(),
            error,
        }
    }

    fn publish(&self) {
        self.status.send_replace(self.current(true, None));
    }

    /// Releases the model, then publishes the final status.
    fn finish(self, error: Option<String>) {
        let last = self.current(false, error);
        let status = Arc::clone(&self.status);
        drop(self);
        status.send_replace(last);
    }

    /// Starts over from zero on a fresh instance.
    fn wrap(&mut self) -> ModelResult<()> {
        self.loaded = Self::load(&self.store, self.runtime.as_ref(), &self.config.artifact)?;
        self.clock.reset();
        self.cycle += 1;
        debug!(cycle = self.cycle, "real-time run wrapped");
        Ok(())
    }

    fn step(&mut self) -> ModelResult<Progress> {
        let wrapped = self.clock.finished();
        if wrapped {
            if !self.config.loop_at_stop {
                return Ok(Progress::Finished);
            }
            self.wrap()?;
        }

        let value = *self.param.borrow_and_update();
        let handle = &mut self.loaded.handle;
        if let Some(vr) = self.input {
            handle.set_real(&[vr], &[value])?;
        }
        handle.do_step(self.clock.time(), self.clock.step_size())?;
        let t = self.clock.advance();
        let y = handle.get_real(&[self.output])?[0];
        self.applied = value;

        // clearing and the first sample of a new cycle land together
        let mut h = lock(&self.history);
        if wrapped {
            h.time.clear();
            h.values.clear();
            h.cycle = self.cycle;
        }
        if h.time.len() == self.config.history_limit {
            h.time.pop_front();
            h.values.pop_front();
        }
        h.time.push_back(t);
        h.values.push_back(y);
        Ok(Progress::Stepped)
    }

    async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        let mut ticker = interval(self.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.publish();

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => match self.step() {
                    Ok(Progress::Stepped) => {
                        if self.clock.steps() % self.config.publish_every as u64 == 0 {
                            self.publish();
                        }
                    }
                    Ok(Progress::Finished) => {
                        info!(time = self.clock.time(), "real-time simulation reached stop time");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "real-time simulation failed");
                        self.finish(Some(e.to_string()));
                        return;
                    }
                },
            }
        }
        self.finish(None);
    }
}
