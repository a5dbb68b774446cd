//! The autopilot control loop.
//!
//! ## How It Works
//!
//! 1. **Collect**: every tick gathers per-thread, per-partition lag from the
//!    runtime's thread metadata (active and standby tasks), skipping
//!    excluded topics and unknown offsets.
//! 2. **Decide**: find the smallest thread count in
//!    `desired ..= desired + limit` whose average lag clears the threshold.
//! 3. **Act**: add or remove one thread through the runtime primitive, then
//!    settle into `BOOSTED` / `STAND_BY`.
//!
//! ## Locking
//!
//! A write-preferring lock protects the state. Both the scheduled tick and
//! the manual operations acquire it with a timeout; it is *released* before
//! awaiting the runtime's add/remove primitive and re-acquired to commit
//! the outcome — holding it across the primitive would deadlock with the
//! runtime's own state-change callbacks, which feed the recovery window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use streamgate_core::{AutopilotConfig, Properties, StreamRuntime, TopicPartition};

use crate::error::{AutopilotError, Result};
use crate::recovery::RecoveryWindowManager;
use crate::state::State;

/// Lag per partition, per thread.
pub type ThreadInfo = HashMap<String, HashMap<TopicPartition, i64>>;

/// Elastic thread scaling over the runtime's add/remove primitives.
pub struct Autopilot {
    runtime: Arc<dyn StreamRuntime>,
    config: AutopilotConfig,
    /// The user-configured baseline. Immutable post-construction.
    desired_thread_count: usize,
    generic_timeout: Duration,
    state: RwLock<State>,
    threads: StdRwLock<ThreadInfo>,
    target_thread_count: AtomicUsize,
    window: StdRwLock<Option<Arc<RecoveryWindowManager>>>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl Autopilot {
    /// Construct a non-automated autopilot. Manual operations work
    /// immediately; the scheduled loop starts with [`automate`].
    ///
    /// [`automate`]: Autopilot::automate
    pub fn new(
        runtime: Arc<dyn StreamRuntime>,
        config: AutopilotConfig,
        properties: &Properties,
    ) -> Self {
        let desired_thread_count = properties.desired_thread_count().max(1);
        let generic_timeout = properties.generic_timeout();

        Self {
            runtime,
            config,
            desired_thread_count,
            generic_timeout,
            state: RwLock::new(State::StandBy),
            threads: StdRwLock::new(HashMap::new()),
            target_thread_count: AtomicUsize::new(desired_thread_count),
            window: StdRwLock::new(None),
            task: StdMutex::new(None),
        }
    }

    pub async fn state(&self) -> State {
        *self.state.read().await
    }

    pub fn desired_thread_count(&self) -> usize {
        self.desired_thread_count
    }

    pub fn target_thread_count(&self) -> usize {
        self.target_thread_count.load(Ordering::SeqCst)
    }

    pub fn generic_timeout(&self) -> Duration {
        self.generic_timeout
    }

    /// One scheduled evaluation. Every failure is a logged noop: state is
    /// unchanged and the next tick re-evaluates.
    pub async fn run(&self) {
        debug!(
            threshold = self.config.lag_threshold,
            "autopilot gathering lag info from all stream threads"
        );
        match self.tick().await {
            Ok((old, new)) if old != new => {
                info!(from = %old, to = %new, "autopilot transitioned");
            }
            Ok((state, _)) => {
                debug!(state = %state, "autopilot evaluated, nothing to be done");
            }
            Err(AutopilotError::WindowOpen) => {
                debug!("autopilot NOOP, recovery window is open");
            }
            Err(e) => {
                warn!(error = %e, "autopilot NOOP");
            }
        }
    }

    async fn tick(&self) -> Result<(State, State)> {
        let snapshot = self.thread_info();

        let mut state = tokio::time::timeout(self.generic_timeout, self.state.write())
            .await
            .map_err(|_| AutopilotError::LockUnavailable)?;
        let old = *state;

        if snapshot.is_empty() {
            return Ok((old, old));
        }

        // A mutating operation is already in flight.
        if matches!(old, State::Boosting | State::Decreasing) {
            return Ok((old, old));
        }

        let window = self
            .window
            .read()
            .expect("window lock")
            .clone()
            .ok_or(AutopilotError::MissingWindowManager)?;
        if window.is_open() {
            return Err(AutopilotError::WindowOpen);
        }

        let next = self.decide_next_state(old);
        match next {
            State::StandBy | State::Boosted => {
                *state = next;
                Ok((old, next))
            }
            State::Boosting => {
                info!("autopilot is [{}] the stream thread count", State::Boosting);
                *state = State::Boosting;
                drop(state);
                self.do_add(old).await?;
                Ok((old, self.state().await))
            }
            State::Decreasing => {
                info!("autopilot is [{}] the stream thread count", State::Decreasing);
                *state = State::Decreasing;
                drop(state);
                self.do_remove(old).await?;
                Ok((old, self.state().await))
            }
        }
    }

    /// Find the smallest thread count whose average lag clears the
    /// threshold, and translate its relation to the current count into the
    /// next state.
    fn decide_next_state(&self, current: State) -> State {
        let threads = self.threads.read().expect("thread info lock");
        let thread_count = threads.len();
        if thread_count == 0 {
            return current;
        }

        let accumulated_lag: i64 = threads.values().flat_map(|lag| lag.values()).sum();
        let average = accumulated_lag / thread_count.max(1) as i64;
        debug!(average_lag = average, thread_count, "autopilot lag snapshot");

        let limit = self.desired_thread_count + self.config.thread_limit;
        if thread_count == limit {
            warn!(
                thread_count,
                limit, "autopilot NOOP, stream thread count has reached its limit"
            );
            return State::Boosted;
        }

        let mut target = self.desired_thread_count;
        for candidate in self.desired_thread_count..=limit {
            target = candidate;
            if accumulated_lag / candidate as i64 <= self.config.lag_threshold {
                break;
            }
        }
        self.target_thread_count.store(target, Ordering::SeqCst);
        info!(
            target,
            current = thread_count,
            "autopilot computed the optimal stream thread count"
        );

        if target > thread_count {
            State::Boosting
        } else if target < thread_count {
            State::Decreasing
        } else if target == self.desired_thread_count {
            State::StandBy
        } else {
            State::Boosted
        }
    }

    /// Manually add one stream thread. Gates on the transition table first,
    /// then takes the write lock with the caller's timeout.
    pub async fn add_stream_thread(&self, timeout: Duration) -> Result<String> {
        {
            let state = self.state.read().await;
            if !state.can_transition_to(State::Boosting) {
                return Err(AutopilotError::InvalidTransition {
                    from: *state,
                    to: State::Boosting,
                });
            }
        }

        let previous = {
            let mut state = tokio::time::timeout(timeout, self.state.write())
                .await
                .map_err(|_| AutopilotError::LockUnavailable)?;
            if !state.can_transition_to(State::Boosting) {
                return Err(AutopilotError::InvalidTransition {
                    from: *state,
                    to: State::Boosting,
                });
            }
            let previous = *state;
            *state = State::Boosting;
            previous
        };

        self.do_add(previous).await
    }

    /// Manually remove one stream thread. Same gating as
    /// [`add_stream_thread`](Autopilot::add_stream_thread).
    pub async fn remove_stream_thread(&self, timeout: Duration) -> Result<String> {
        {
            let state = self.state.read().await;
            if !state.can_transition_to(State::Decreasing) {
                return Err(AutopilotError::InvalidTransition {
                    from: *state,
                    to: State::Decreasing,
                });
            }
        }

        let previous = {
            let mut state = tokio::time::timeout(timeout, self.state.write())
                .await
                .map_err(|_| AutopilotError::LockUnavailable)?;
            if !state.can_transition_to(State::Decreasing) {
                return Err(AutopilotError::InvalidTransition {
                    from: *state,
                    to: State::Decreasing,
                });
            }
            let previous = *state;
            *state = State::Decreasing;
            previous
        };

        self.do_remove(previous).await
    }

    /// The caller has set the state to `BOOSTING` and released the lock.
    async fn do_add(&self, previous: State) -> Result<String> {
        let result =
            tokio::time::timeout(self.generic_timeout, self.runtime.add_stream_thread()).await;

        // Refresh so the next decision sees the new topology.
        self.thread_info();

        match result {
            Ok(Ok(Some(name))) => {
                *self.state.write().await = State::Boosted;
                info!(thread = %name, "stream thread added by autopilot");
                Ok(name)
            }
            Ok(Ok(None)) => {
                self.restore(previous).await;
                warn!("autopilot could not add a stream thread");
                Err(AutopilotError::ThreadUnavailable)
            }
            Ok(Err(e)) => {
                self.restore(previous).await;
                warn!(error = %e, "autopilot could not add a stream thread");
                Err(e.into())
            }
            Err(_) => {
                self.restore(previous).await;
                Err(AutopilotError::Timeout(self.generic_timeout))
            }
        }
    }

    /// The caller has set the state to `DECREASING` and released the lock.
    async fn do_remove(&self, previous: State) -> Result<String> {
        let result =
            tokio::time::timeout(self.generic_timeout, self.runtime.remove_stream_thread()).await;

        self.thread_info();

        match result {
            Ok(Ok(Some(name))) => {
                let mut state = self.state.write().await;
                let next = self.decide_next_state(*state);
                *state = next;
                info!(thread = %name, state = %next, "stream thread removed by autopilot");
                Ok(name)
            }
            Ok(Ok(None)) => {
                self.restore(previous).await;
                warn!("autopilot could not remove a stream thread");
                Err(AutopilotError::ThreadUnavailable)
            }
            Ok(Err(e)) => {
                self.restore(previous).await;
                warn!(error = %e, "autopilot could not remove a stream thread");
                Err(e.into())
            }
            Err(_) => {
                self.restore(previous).await;
                Err(AutopilotError::Timeout(self.generic_timeout))
            }
        }
    }

    async fn restore(&self, previous: State) {
        *self.state.write().await = previous;
    }

    /// Gather fresh lag info for every local thread, prune threads the
    /// runtime no longer reports, and return the fresh snapshot.
    pub fn thread_info(&self) -> ThreadInfo {
        let pattern = &self.config.exclusion_pattern;

        let mut threads: ThreadInfo = HashMap::new();
        for thread in self.runtime.thread_metadata() {
            let mut partition_lag = HashMap::new();
            for task in thread.active_tasks.iter().chain(thread.standby_tasks.iter()) {
                for (partition, end_offset) in &task.end_offsets {
                    if pattern.is_match(&partition.topic) {
                        continue;
                    }
                    let committed = task.committed_offsets.get(partition).copied().unwrap_or(-1);
                    // Zero-lag and unknown (-1) offsets carry no information.
                    if *end_offset <= 0 || committed <= 0 {
                        continue;
                    }
                    partition_lag.insert(partition.clone(), (end_offset - committed).max(0));
                }
            }
            threads.insert(thread.thread_name.clone(), partition_lag);
        }

        let mut info = self.threads.write().expect("thread info lock");
        info.retain(|name, _| threads.contains_key(name));
        for (name, lag) in &threads {
            info.insert(name.clone(), lag.clone());
        }
        if info.is_empty() {
            warn!("autopilot could not gather lag info, no active or standby tasks");
        }

        threads
    }

    /// Install the recovery window and start the periodic evaluation:
    /// `initial_delay` first, then every `between_runs`.
    pub fn automate(self: Arc<Self>, window: Arc<RecoveryWindowManager>) {
        *self.window.write().expect("window lock") = Some(window);

        let autopilot = Arc::clone(&self);
        let initial_delay = self.config.initial_delay;
        let between_runs = self.config.between_runs;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                autopilot.run().await;
                tokio::time::sleep(between_runs).await;
            }
        });
        *self.task.lock().expect("task lock") = Some(handle);

        info!(
            initial_delay = %format_compact(initial_delay),
            period = %format_compact(between_runs),
            "autopilot scheduled"
        );
    }

    /// Stop the scheduled evaluation immediately. Best-effort: an in-flight
    /// runtime call is not interrupted, its result is discarded.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().expect("task lock").take() {
            task.abort();
        }
    }
}

impl Drop for Autopilot {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Compact human-readable duration for scheduling logs: "2m", "1m 30s".
fn format_compact(duration: Duration) -> String {
    let millis = duration.subsec_millis();
    let total_secs = duration.as_secs();
    if total_secs == 0 {
        return format!("{}ms", millis);
    }

    let (hours, minutes, secs) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}
