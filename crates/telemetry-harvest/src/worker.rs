// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic delivery of one category's buffer.
//!
//! A [`HarvestWorker`] owns a [`ReservoirBuffer`], a one-shot timer and the
//! adaptive state for its category. Each cycle serializes and gzips the
//! buffer, posts it and reacts to the response:
//!
//! ```text
//!   2xx ──> clear, step interval down and capacity up (toward defined values)
//!   413 ──> shrink capacity, keep data
//!   429 ──> slow down, keep data
//!   408 ──> shrink capacity and slow down, keep data
//!   5xx ──> keep data
//!   other ──> clear
//!   no response ──> keep data
//! ```
//!
//! After every cycle the timer is re-armed with the current interval.

use crate::api_key::ApiKeyFactory;
use crate::buffer::ReservoirBuffer;
use crate::constants::{
    BUFFER_SIZE_DELTA, HARVEST_TIME_DELTA, MAX_HARVEST_TIME, MIN_BUFFER_SIZE, MIN_HARVEST_TIME,
};
use crate::errors::EncodeError;
use crate::sample::{Category, Sample};
use crate::serializer::CategorySerializer;
use crate::timer::HarvestTimer;
use crate::transport::{gzip, IngestRequest, Transport};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Everything a worker needs besides its serializer's category.
pub struct WorkerConfig<S> {
    pub serializer: S,
    pub url: String,
    pub api_key_factory: Arc<ApiKeyFactory>,
    pub transport: Arc<dyn Transport>,
    /// Defined harvest interval in seconds
    pub harvest_interval: u64,
    /// Defined buffer capacity
    pub buffer_size: usize,
    pub compression_level: u32,
}

/// Result of one harvest cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// Another cycle was in flight, nothing was done.
    AlreadyHarvesting,
    /// The buffer was empty, no request was sent.
    Empty,
    Accepted,
    PayloadTooLarge,
    RateLimited,
    TimedOut,
    ServerError(StatusCode),
    /// Any other status. The buffer was discarded.
    Dropped(StatusCode),
    /// No HTTP response was obtained. The buffer was kept.
    TransportFailed,
    /// The buffer could not be encoded and was discarded.
    EncodingFailed,
}

#[derive(Debug, Clone, Copy)]
struct Intervals {
    defined: u64,
    actual: u64,
}

struct Shared<S> {
    category: Category,
    url: String,
    api_key_factory: Arc<ApiKeyFactory>,
    transport: Arc<dyn Transport>,
    compression_level: u32,
    defined_capacity: usize,
    buffer: Mutex<ReservoirBuffer<Sample, S>>,
    intervals: Mutex<Intervals>,
    is_harvesting: AtomicBool,
    /// Set by `shutdown`, cleared by `start`. No timer is armed while set.
    stopped: AtomicBool,
    timer: HarvestTimer,
}

/// Handle to a category worker. Clones share the same buffer and timer.
pub struct HarvestWorker<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for HarvestWorker<S> {
    fn clone(&self) -> Self {
        HarvestWorker {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Clears the in-flight flag and schedules the next cycle, even if the cycle
/// future is dropped part way.
struct HarvestingGuard<'a, S: CategorySerializer + 'static> {
    shared: &'a Arc<Shared<S>>,
}

impl<S: CategorySerializer + 'static> Drop for HarvestingGuard<'_, S> {
    fn drop(&mut self) {
        self.shared.is_harvesting.store(false, Ordering::Release);
        self.shared.schedule();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: CategorySerializer + 'static> Shared<S> {
    /// Arms the timer for the next cycle unless the worker is stopped.
    ///
    /// The pending task only holds a weak reference: once every handle is
    /// dropped the worker is freed and its timer aborted.
    fn schedule(self: &Arc<Self>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let after = Duration::from_secs(lock(&self.intervals).actual);
        let shared: Weak<Self> = Arc::downgrade(self);
        self.timer.arm(after, async move {
            if let Some(shared) = shared.upgrade() {
                shared.harvest().await;
            }
        });
    }

    async fn harvest(self: Arc<Self>) -> HarvestOutcome {
        if self
            .is_harvesting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                "HARVEST | {} harvest triggered while a previous one is still running",
                self.category
            );
            return HarvestOutcome::AlreadyHarvesting;
        }
        let _guard = HarvestingGuard { shared: &self };
        self.deliver().await
    }

    async fn deliver(&self) -> HarvestOutcome {
        let payload = {
            let buffer = lock(&self.buffer);
            if buffer.is_empty() {
                debug!("HARVEST | No {} to harvest", self.category);
                return HarvestOutcome::Empty;
            }
            debug!(
                "HARVEST | Harvesting {} {} (capacity {})",
                buffer.len(),
                self.category,
                buffer.capacity()
            );
            buffer.serialize()
        };

        let body = match payload
            .map_err(EncodeError::from)
            .and_then(|json| gzip(&json, self.compression_level).map_err(EncodeError::from))
        {
            Ok(body) => body,
            Err(e) => {
                error!("HARVEST | Dropping {}: {}", self.category, e);
                lock(&self.buffer).clear();
                return HarvestOutcome::EncodingFailed;
            }
        };

        let Some(api_key) = self.api_key_factory.get_api_key().await else {
            error!(
                "HARVEST | API key could not be resolved, keeping {} for the next harvest",
                self.category
            );
            return HarvestOutcome::TransportFailed;
        };

        let request = IngestRequest {
            url: self.url.clone(),
            api_key: api_key.to_string(),
            body,
        };
        match self.transport.post(request).await {
            Ok(status) => self.handle_response(status),
            Err(e) => {
                error!(
                    "HARVEST | Failed to send {}: {}, keeping them for the next harvest",
                    self.category, e
                );
                HarvestOutcome::TransportFailed
            }
        }
    }

    /// Applies the adaptive rules for `status`.
    ///
    /// The buffer lock is not held while the request is in flight, so samples
    /// accepted during the POST are cleared together with the harvested ones
    /// on success.
    fn handle_response(&self, status: StatusCode) -> HarvestOutcome {
        if status.is_success() {
            debug!("HARVEST | {} accepted with {}", self.category, status);
            self.recover();
            HarvestOutcome::Accepted
        } else if status == StatusCode::PAYLOAD_TOO_LARGE {
            warn!("HARVEST | {} payload too large", self.category);
            self.shrink();
            HarvestOutcome::PayloadTooLarge
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("HARVEST | {} rate limited", self.category);
            self.slow_down();
            HarvestOutcome::RateLimited
        } else if status == StatusCode::REQUEST_TIMEOUT {
            warn!("HARVEST | {} request timed out", self.category);
            self.shrink();
            self.slow_down();
            HarvestOutcome::TimedOut
        } else if status.is_server_error() {
            warn!(
                "HARVEST | {} server error {}, retrying on next harvest",
                self.category, status
            );
            HarvestOutcome::ServerError(status)
        } else {
            error!(
                "HARVEST | Dropping {} after unexpected response {}",
                self.category, status
            );
            lock(&self.buffer).clear();
            HarvestOutcome::Dropped(status)
        }
    }

    fn recover(&self) {
        {
            let mut buffer = lock(&self.buffer);
            buffer.clear();
            let capacity = buffer.capacity();
            if capacity < self.defined_capacity {
                buffer.increment_size(BUFFER_SIZE_DELTA.min(self.defined_capacity - capacity));
            }
        }
        let mut intervals = lock(&self.intervals);
        if intervals.actual > intervals.defined {
            intervals.actual = intervals
                .actual
                .saturating_sub(HARVEST_TIME_DELTA)
                .max(intervals.defined);
        }
    }

    fn shrink(&self) {
        let mut buffer = lock(&self.buffer);
        let capacity = buffer.capacity();
        if capacity > MIN_BUFFER_SIZE {
            buffer.resample(
                capacity
                    .saturating_sub(BUFFER_SIZE_DELTA)
                    .max(MIN_BUFFER_SIZE),
            );
            debug!(
                "HARVEST | {} capacity reduced to {}",
                self.category,
                buffer.capacity()
            );
        }
    }

    fn slow_down(&self) {
        let mut intervals = lock(&self.intervals);
        if intervals.actual < MAX_HARVEST_TIME {
            intervals.actual = (intervals.actual + HARVEST_TIME_DELTA).min(MAX_HARVEST_TIME);
            debug!(
                "HARVEST | {} harvest interval increased to {}s",
                self.category, intervals.actual
            );
        }
    }
}

impl<S: CategorySerializer + 'static> HarvestWorker<S> {
    #[must_use]
    pub fn new(config: WorkerConfig<S>) -> Self {
        let category = config.serializer.category();
        HarvestWorker {
            shared: Arc::new(Shared {
                category,
                url: config.url,
                api_key_factory: config.api_key_factory,
                transport: config.transport,
                compression_level: config.compression_level,
                defined_capacity: config.buffer_size,
                buffer: Mutex::new(ReservoirBuffer::new(config.buffer_size, config.serializer)),
                intervals: Mutex::new(Intervals {
                    defined: config.harvest_interval,
                    actual: config.harvest_interval,
                }),
                is_harvesting: AtomicBool::new(false),
                stopped: AtomicBool::new(true),
                timer: HarvestTimer::new(),
            }),
        }
    }

    /// Arms the first timer. Must be called from within a tokio runtime.
    pub fn start(&self) {
        debug!(
            "HARVEST | Starting {} worker with {}s interval",
            self.shared.category,
            lock(&self.shared.intervals).actual
        );
        self.shared.stopped.store(false, Ordering::Release);
        self.shared.schedule();
    }

    /// Stops the timer. A cycle already in flight still completes but does
    /// not re-arm it.
    pub fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.timer.cancel();
    }

    /// Offers a sample to the buffer. Returns whether it is held.
    pub fn put(&self, sample: Sample) -> bool {
        lock(&self.shared.buffer).put(sample)
    }

    /// Replaces the defined and current interval and restarts the timer of a
    /// started worker. Values outside [60, 600] seconds are rejected.
    pub fn set_harvest_time(&self, seconds: u64) -> bool {
        if !(MIN_HARVEST_TIME..=MAX_HARVEST_TIME).contains(&seconds) {
            warn!(
                "HARVEST | Ignoring {} harvest time of {}s, must be between {} and {}",
                self.shared.category, seconds, MIN_HARVEST_TIME, MAX_HARVEST_TIME
            );
            return false;
        }
        self.shared.timer.cancel();
        *lock(&self.shared.intervals) = Intervals {
            defined: seconds,
            actual: seconds,
        };
        self.shared.schedule();
        true
    }

    /// Runs a cycle now unless one is already in flight.
    ///
    /// The cycle runs as its own task: dropping the returned future does not
    /// cancel the request.
    pub async fn harvest_now(&self) -> HarvestOutcome {
        if self.shared.is_harvesting.load(Ordering::Acquire) {
            debug!(
                "HARVEST | {} harvest already in progress",
                self.shared.category
            );
            return HarvestOutcome::AlreadyHarvesting;
        }
        self.shared.timer.cancel();
        match tokio::spawn(Arc::clone(&self.shared).harvest()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("HARVEST | {} harvest task failed: {}", self.shared.category, e);
                HarvestOutcome::TransportFailed
            }
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.shared.category
    }

    /// Current harvest interval.
    #[must_use]
    pub fn harvest_interval(&self) -> Duration {
        Duration::from_secs(lock(&self.shared.intervals).actual)
    }

    /// Interval the worker recovers toward.
    #[must_use]
    pub fn defined_harvest_interval(&self) -> Duration {
        Duration::from_secs(lock(&self.shared.intervals).defined)
    }

    /// Current buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        lock(&self.shared.buffer).capacity()
    }

    #[must_use]
    pub fn defined_capacity(&self) -> usize {
        self.shared.defined_capacity
    }

    /// Samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.shared.buffer).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.shared.buffer).is_empty()
    }

    #[must_use]
    pub fn is_harvesting(&self) -> bool {
        self.shared.is_harvesting.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.shared.timer.is_armed()
    }
}
