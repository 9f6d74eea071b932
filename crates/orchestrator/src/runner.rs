//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which manages the simulation
//! lifecycle in a background thread, including start, pause, resume, and
//! status tracking. Point-in-time snapshots are published to the control side
//! every `snapshot_interval` steps and once more when the loop exits.

use sph_kernel::{ErrorMetrics, SimulationKernel, Snapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SimulationConfig;

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively running
    Running,
    /// Simulation paused
    Paused,
    /// Simulation finished (reached stopping condition or was dropped)
    Finished,
    /// Solver reported a numerical instability
    Diverged,
    /// Simulation stopped on any other error
    Error,
}

impl RunnerState {
    /// `true` once the background loop has stopped advancing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunnerState::Finished | RunnerState::Diverged | RunnerState::Error
        )
    }
}

/// Stopping conditions and publication cadence for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerOptions {
    /// Stop after this many timesteps
    pub max_timesteps: Option<u64>,
    /// Stop after this much simulated time (seconds)
    pub max_time: Option<f64>,
    /// Publish a snapshot every N steps
    pub snapshot_interval: u64,
}

impl RunnerOptions {
    /// Options taken from a configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            max_timesteps: config.max_timesteps,
            max_time: config.max_time,
            snapshot_interval: config.snapshot_interval,
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_timesteps: None,
            max_time: None,
            snapshot_interval: 10,
        }
    }
}

/// Shared state between the runner thread and control interface
struct SharedState {
    /// Current runner state
    state: RunnerState,
    /// Current simulation time (seconds)
    sim_time: f64,
    /// Number of timesteps executed
    timestep_count: u64,
    /// Most recent error message (if state is Diverged or Error)
    error_message: Option<String>,
    /// Metrics taken with the latest snapshot
    metrics: Option<ErrorMetrics>,
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    /// Shared state (protected by mutex)
    shared: Arc<Mutex<SharedState>>,
    /// Latest published snapshot
    snapshot: Arc<Mutex<Option<Snapshot>>>,
    /// Handle to the background thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulationRunner {
    /// Create a new simulation runner with the given kernel
    ///
    /// The background thread idles until [`start`](Self::start) is called.
    pub fn new(mut kernel: Box<dyn SimulationKernel + Send>, options: RunnerOptions) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            sim_time: kernel.time(),
            timestep_count: kernel.step_count(),
            error_message: None,
            metrics: None,
        }));
        let snapshot = Arc::new(Mutex::new(Some(kernel.snapshot())));

        let shared_clone = Arc::clone(&shared);
        let snapshot_clone = Arc::clone(&snapshot);

        // Spawn background thread
        let thread_handle = thread::spawn(move || {
            run_simulation_loop(kernel.as_mut(), shared_clone, snapshot_clone, options);
        });

        Self {
            shared,
            snapshot,
            thread_handle: Some(thread_handle),
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        lock(&self.shared).state
    }

    /// Get current simulation time (seconds)
    pub fn sim_time(&self) -> f64 {
        lock(&self.shared).sim_time
    }

    /// Get current timestep count
    pub fn timestep_count(&self) -> u64 {
        lock(&self.shared).timestep_count
    }

    /// Get error message if state is Diverged or Error
    pub fn error_message(&self) -> Option<String> {
        lock(&self.shared).error_message.clone()
    }

    /// Metrics recorded with the latest snapshot
    pub fn error_metrics(&self) -> Option<ErrorMetrics> {
        lock(&self.shared).metrics
    }

    /// Most recently published snapshot
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        lock(&self.snapshot).clone()
    }

    /// Pause the simulation
    pub fn pause(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Running {
            state.state = RunnerState::Paused;
        }
    }

    /// Resume the simulation
    pub fn resume(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Paused {
            state.state = RunnerState::Running;
        }
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Created {
            state.state = RunnerState::Running;
        }
    }

    /// Ask the background loop to stop after the current step
    pub fn stop(&self) {
        let mut state = lock(&self.shared);
        if !state.state.is_terminal() {
            state.state = RunnerState::Finished;
        }
    }

    /// Wait for the simulation thread to complete and return the final state
    ///
    /// Blocks until a stopping condition is reached; call [`start`](Self::start)
    /// (or [`stop`](Self::stop)) first.
    pub fn join(mut self) -> Result<RunnerState, String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Thread panicked".to_string())?;
        }
        Ok(self.state())
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Set state to Finished to signal thread to exit
        let mut state = lock(&self.shared);
        if matches!(
            state.state,
            RunnerState::Created | RunnerState::Running | RunnerState::Paused
        ) {
            state.state = RunnerState::Finished;
        }
    }
}

/// Copy the kernel state out to the control side
fn publish(
    kernel: &dyn SimulationKernel,
    shared: &Mutex<SharedState>,
    snapshot: &Mutex<Option<Snapshot>>,
) {
    let snap = kernel.snapshot();
    let metrics = kernel.error_metrics();
    *lock(snapshot) = Some(snap);
    lock(shared).metrics = Some(metrics);
}

/// Main simulation loop executed in background thread
fn run_simulation_loop(
    kernel: &mut dyn SimulationKernel,
    shared: Arc<Mutex<SharedState>>,
    snapshot: Arc<Mutex<Option<Snapshot>>>,
    options: RunnerOptions,
) {
    // Wait for start signal
    loop {
        let state = lock(&shared).state;

        match state {
            RunnerState::Created => {
                // Wait a bit and check again
                thread::sleep(Duration::from_millis(10));
            }
            RunnerState::Running => break,
            _ => {
                kernel.terminate();
                return;
            }
        }
    }

    tracing::info!(
        particles = kernel.particle_count(),
        max_timesteps = ?options.max_timesteps,
        max_time = ?options.max_time,
        "Simulation started"
    );

    let start_wall_time = Instant::now();
    let interval = options.snapshot_interval.max(1);

    loop {
        // Check state
        let current_state = lock(&shared).state;

        match current_state {
            RunnerState::Running => {
                let report = match kernel.step() {
                    Ok(report) => report,
                    Err(e) => {
                        let next = if e.is_instability() {
                            RunnerState::Diverged
                        } else {
                            RunnerState::Error
                        };
                        tracing::error!(error = %e, "Simulation stopped");
                        publish(kernel, &shared, &snapshot);
                        let mut guard = lock(&shared);
                        guard.state = next;
                        guard.error_message = Some(e.to_string());
                        break;
                    }
                };

                // Update shared state
                {
                    let mut guard = lock(&shared);
                    guard.sim_time = report.time;
                    guard.timestep_count = report.step;
                }

                if report.step % interval == 0 {
                    publish(kernel, &shared, &snapshot);
                }

                // Check stopping conditions
                let reached_steps = options.max_timesteps.is_some_and(|max| report.step >= max);
                let reached_time = options.max_time.is_some_and(|max| report.time >= max);
                if reached_steps || reached_time {
                    tracing::info!(
                        step = report.step,
                        time = report.time,
                        "Simulation finished: reached {}",
                        if reached_steps { "max_timesteps" } else { "max_time" }
                    );
                    publish(kernel, &shared, &snapshot);
                    lock(&shared).state = RunnerState::Finished;
                    break;
                }

                // Log progress periodically
                if report.step % 100 == 0 {
                    let wall_time = start_wall_time.elapsed().as_secs_f64();
                    tracing::debug!(
                        "Step {}: sim_time={:.4}s, dt={:.6}s, max_speed={:.3}m/s, wall_time={:.2}s",
                        report.step,
                        report.time,
                        report.dt,
                        report.max_speed,
                        wall_time,
                    );
                }
            }
            RunnerState::Paused => {
                // Wait while paused
                thread::sleep(Duration::from_millis(50));
            }
            RunnerState::Created
            | RunnerState::Finished
            | RunnerState::Diverged
            | RunnerState::Error => {
                publish(kernel, &shared, &snapshot);
                break;
            }
        }
    }

    kernel.terminate();
    tracing::info!(
        "Simulation thread exiting: {} timesteps, {:.4}s simulated, {:.2}s wall time",
        kernel.step_count(),
        kernel.time(),
        start_wall_time.elapsed().as_secs_f64()
    );
}
