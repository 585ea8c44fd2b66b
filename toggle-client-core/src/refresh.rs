//! Generic periodic-refresh primitive with single-flight concurrency control.
//!
//! A [`Refresher`] owns one cached value and one refresh task. The first poll
//! runs the task synchronously so the first caller never sees a placeholder;
//! afterwards a stale poll hands the task to a background tokio task while the
//! caller keeps reading the previous value. The task mutex doubles as the
//! single-flight gate: a failed `try_lock` means a refresh is already in
//! flight and the attempt is skipped, not queued.

use anyhow::Result;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{Duration, Instant};

/// What one refresh execution produced.
pub enum RefreshOutcome<T> {
    /// A new value to swap into the cache.
    Updated(T),
    /// The source reports no change; the cached value stays.
    Unchanged,
}

/// The operation a [`Refresher`] drives periodically.
///
/// Implementations keep their own source state (entity tags, modification
/// times) across runs; the refresher serializes all runs, hence `&mut self`.
#[async_trait]
pub trait RefreshTask: Send + 'static {
    type Output: Default + Send + Sync + 'static;

    async fn run(&mut self) -> Result<RefreshOutcome<Self::Output>>;
}

/// Scheduler state, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// No run has completed yet; the next poll blocks on a synchronous run.
    Uninitialized = 0,
    /// A cached value exists and no refresh is in flight.
    Idle = 1,
    /// A refresh is running; concurrent polls read the previous value.
    Refreshing = 2,
}

impl State {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => State::Uninitialized,
            1 => State::Idle,
            _ => State::Refreshing,
        }
    }
}

struct Shared<T> {
    cache: ArcSwapOption<T>,
    state: AtomicU8,
    last: Mutex<Instant>,
    interval: Duration,
    task: Arc<AsyncMutex<Box<dyn RefreshTask<Output = T>>>>,
    label: String,
}

/// Periodic single-flight refresher around one cached `Arc<T>`.
pub struct Refresher<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Default + Send + Sync + 'static> Refresher<T> {
    /// Start uninitialized: the first poll runs the task synchronously.
    pub fn new(
        label: impl Into<String>,
        interval: Duration,
        task: Box<dyn RefreshTask<Output = T>>,
    ) -> Self {
        Self::build(label, interval, task, None, State::Uninitialized)
    }

    /// Start idle with a pre-loaded value; the task first runs only once the
    /// interval elapses. Used for operations that must never block a caller,
    /// such as metrics reporting.
    pub fn seeded(
        label: impl Into<String>,
        interval: Duration,
        task: Box<dyn RefreshTask<Output = T>>,
        initial: T,
    ) -> Self {
        Self::build(label, interval, task, Some(Arc::new(initial)), State::Idle)
    }

    fn build(
        label: impl Into<String>,
        interval: Duration,
        task: Box<dyn RefreshTask<Output = T>>,
        initial: Option<Arc<T>>,
        state: State,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache: ArcSwapOption::new(initial),
                state: AtomicU8::new(state as u8),
                last: Mutex::new(Instant::now()),
                interval,
                task: Arc::new(AsyncMutex::new(task)),
                label: label.into(),
            }),
        }
    }

    pub fn state(&self) -> State {
        State::from_raw(self.shared.state.load(Ordering::Acquire))
    }

    /// Return the current cached value, refreshing per the schedule.
    ///
    /// Blocks only for the one-time first run; any later poll returns
    /// immediately, at most spawning a background refresh.
    pub async fn poll(&self) -> Arc<T> {
        // Gate on the cache, not the state: during the inline first run the
        // state is already REFRESHING, and callers arriving then must wait
        // for the first value rather than fall through empty-handed.
        if self.shared.cache.load().is_none() {
            let guard = self.shared.task.clone().lock_owned().await;
            // A concurrent caller may have completed the first run while we
            // waited on the gate.
            if self.shared.cache.load().is_none() {
                tracing::debug!(task = %self.shared.label, "first refresh, running synchronously");
                self.shared.execute(guard).await;
            }
        } else if self.due() {
            if let Ok(guard) = self.shared.task.clone().try_lock_owned() {
                tracing::debug!(task = %self.shared.label, "refresh due, running in background");
                // Flip the state while still on the calling path so concurrent
                // pollers observe REFRESHING before the spawned task starts.
                self.shared
                    .state
                    .store(State::Refreshing as u8, Ordering::Release);
                let shared = Arc::clone(&self.shared);
                tokio::spawn(async move { shared.execute(guard).await });
            }
        }
        self.current()
    }

    /// Run the task now, regardless of staleness, waiting for any in-flight
    /// refresh to finish first.
    pub async fn force(&self) -> Arc<T> {
        let guard = self.shared.task.clone().lock_owned().await;
        self.shared.execute(guard).await;
        self.current()
    }

    fn due(&self) -> bool {
        let last = *self
            .shared
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Instant::now() >= last + self.shared.interval
    }

    fn current(&self) -> Arc<T> {
        if let Some(value) = self.shared.cache.load_full() {
            return value;
        }
        // The first run reported Unchanged without ever producing a value;
        // degrade to the empty value.
        let empty = Arc::new(T::default());
        self.shared.cache.store(Some(Arc::clone(&empty)));
        empty
    }
}

impl<T: Default + Send + Sync + 'static> Shared<T> {
    /// Run one refresh while holding the single-flight guard.
    async fn execute(&self, mut task: OwnedMutexGuard<Box<dyn RefreshTask<Output = T>>>) {
        self.state.store(State::Refreshing as u8, Ordering::Release);
        match task.run().await {
            Ok(RefreshOutcome::Updated(value)) => {
                tracing::debug!(task = %self.label, "refresh produced a new value");
                self.cache.store(Some(Arc::new(value)));
            }
            Ok(RefreshOutcome::Unchanged) => {
                tracing::debug!(task = %self.label, "refresh reported no change");
            }
            Err(error) => {
                tracing::warn!(task = %self.label, "refresh failed, keeping previous value: {error:#}");
                if self.cache.load().is_none() {
                    self.cache.store(Some(Arc::new(T::default())));
                }
            }
        }
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.state.store(State::Idle as u8, Ordering::Release);
        // Dropping the guard releases the single-flight gate.
        drop(task);
    }
}
