// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cancellable one-shot timer.
//!
//! A [`HarvestTimer`] holds at most one pending task. Arming it replaces (and
//! aborts) whatever was pending before.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Debug, Default)]
pub struct HarvestTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl HarvestTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to be spawned once `after` has elapsed.
    ///
    /// The task is spawned as its own tokio task when the timer fires, so
    /// cancelling or re-arming the timer afterwards does not abort it.
    /// Outside of a tokio runtime nothing is scheduled.
    pub fn arm<F>(&self, after: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            error!("HARVEST | No tokio runtime available, timer not armed");
            return;
        };
        let handle = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            tokio::spawn(task);
        });
        match self.pending.lock() {
            Ok(mut pending) => {
                if let Some(previous) = pending.replace(handle) {
                    previous.abort();
                }
            }
            Err(_) => {
                error!("HARVEST | Timer lock poisoned, cancelling new timer");
                handle.abort();
            }
        }
    }

    /// Cancels the pending timer, if any.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.take() {
                previous.abort();
            }
        }
    }

    /// Whether a timer is armed and has not fired yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for HarvestTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
