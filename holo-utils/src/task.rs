//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_new::new;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio::{task, time};
use tracing::{Instrument, error};

/// A handle to a task created by [`Task::spawn`].
///
/// Dropping this handle aborts the task.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
}

/// A handle to a one-shot timer created by [`TimeoutTask::new`].
///
/// Dropping this handle cancels the timer. A timer that has already fired
/// can't be rearmed through [`TimeoutTask::reset`]; a new one must be
/// created instead.
#[derive(Debug)]
pub struct TimeoutTask {
    inner: TimerInner,
}

/// A handle to a periodic timer created by [`IntervalTask::new`].
///
/// Dropping this handle cancels the timer.
#[derive(Debug)]
pub struct IntervalTask {
    inner: TimerInner,
}

#[derive(Debug, new)]
struct TimerInner {
    _task: Task<()>,
    control: UnboundedSender<Control>,
    deadline: Arc<Mutex<Instant>>,
}

#[derive(Debug)]
enum Control {
    Reset(Option<Duration>),
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task, returning a handle for it.
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future),
        }
    }

    /// Returns whether the task has run to completion.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Arms a timer that calls the provided async closure once `timeout`
    /// elapses without being reset.
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let deadline = Arc::new(Mutex::new(Instant::now() + timeout));
        let deadline_child = deadline.clone();

        let task = Task::spawn(
            async move {
                let mut timeout = timeout;
                let sleep = time::sleep(timeout);
                tokio::pin!(sleep);

                loop {
                    tokio::select! {
                        _ = &mut sleep => {
                            (cb)().await;
                            break;
                        }
                        control = control_rx.recv() => {
                            let Some(Control::Reset(new_timeout)) = control else {
                                // The handle was dropped.
                                break;
                            };
                            if let Some(new_timeout) = new_timeout {
                                timeout = new_timeout;
                            }
                            let next = Instant::now() + timeout;
                            sleep.as_mut().reset(next);
                            *lock(&deadline_child) = next;
                        }
                    }
                }
            }
            .in_current_span(),
        );

        TimeoutTask {
            inner: TimerInner::new(task, control_tx, deadline),
        }
    }

    /// Pushes the expiration back by a full timeout period.
    ///
    /// When `timeout` is given, it replaces the period used for this and
    /// subsequent resets.
    pub fn reset(&mut self, timeout: Option<Duration>) {
        if self.inner.control.send(Control::Reset(timeout)).is_err() {
            error!("failed to reset timeout");
        }
    }

    /// Returns the remaining time before the timer fires.
    pub fn remaining(&self) -> Duration {
        lock(&self.inner.deadline).saturating_duration_since(Instant::now())
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Starts a timer that calls the provided async closure every `interval`.
    ///
    /// When `tick_on_start` is set, the first call happens right away.
    pub fn new<F, Fut>(
        interval: Duration,
        tick_on_start: bool,
        mut cb: F,
    ) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let deadline = Arc::new(Mutex::new(Instant::now() + interval));
        let deadline_child = deadline.clone();

        let task = Task::spawn(
            async move {
                let mut interval = interval;
                let mut ticker = if tick_on_start {
                    time::interval(interval)
                } else {
                    time::interval_at(Instant::now() + interval, interval)
                };

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let next = Instant::now() + interval;
                            (cb)().await;
                            *lock(&deadline_child) = next;
                        }
                        control = control_rx.recv() => {
                            let Some(Control::Reset(new_interval)) = control else {
                                // The handle was dropped.
                                break;
                            };
                            if let Some(new_interval) = new_interval {
                                interval = new_interval;
                            }
                            // A fresh interval ticks immediately.
                            ticker = time::interval(interval);
                            *lock(&deadline_child) = Instant::now();
                        }
                    }
                }
            }
            .in_current_span(),
        );

        IntervalTask {
            inner: TimerInner::new(task, control_tx, deadline),
        }
    }

    /// Restarts the interval, triggering an immediate tick.
    ///
    /// When `interval` is given, it replaces the current period.
    pub fn reset(&mut self, interval: Option<Duration>) {
        if self.inner.control.send(Control::Reset(interval)).is_err() {
            error!("failed to reset interval");
        }
    }
}

// ===== helper functions =====

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_child = fired.clone();
        let _timeout = TimeoutTask::new(Duration::from_secs(4), move || async move {
            fired_child.fetch_add(1, Ordering::SeqCst);
        });

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reset_postpones_expiry() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_child = fired.clone();
        let mut timeout =
            TimeoutTask::new(Duration::from_secs(4), move || async move {
                fired_child.fetch_add(1, Ordering::SeqCst);
            });

        time::sleep(Duration::from_secs(3)).await;
        timeout.reset(None);
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timeout.remaining() <= Duration::from_secs(1));

        timeout.reset(Some(Duration::from_secs(20)));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timeout_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_child = fired.clone();
        let timeout = TimeoutTask::new(Duration::from_secs(1), move || async move {
            fired_child.fetch_add(1, Ordering::SeqCst);
        });
        drop(timeout);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_periodically() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_child = ticks.clone();
        let _interval =
            IntervalTask::new(Duration::from_secs(5), false, move || {
                let ticks = ticks_child.clone();
                async move {
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            });

        time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
