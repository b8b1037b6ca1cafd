// src/poller.rs

//! Keeps a freshest-known value of some backend resource.
//!
//! A [`Poller`] owns one background task. The task invokes the fetcher right
//! away, then on every `refresh_interval`, and publishes the outcome through a
//! `watch` channel so readers never wait on the network. Only the result of the
//! most recently issued fetch is ever applied. A refetch or reconfiguration
//! drops the fetch in flight, which cancels its request; an interval tick that
//! finds a fetch still running is skipped.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A unit of pollable work.
pub trait Fetcher<T>: Send + Sync + 'static {
    fn fetch(&self) -> BoxFuture<'static, Result<T, AppError>>;
}

impl<T, F, Fut> Fetcher<T> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
{
    fn fetch(&self) -> BoxFuture<'static, Result<T, AppError>> {
        Box::pin(self())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Zero means fetch once on activation and never again.
    pub refresh_interval: Duration,
    pub enabled: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { refresh_interval: Duration::from_secs(5), enabled: true }
    }
}

impl PollOptions {
    pub fn every(refresh_interval: Duration) -> Self {
        Self { refresh_interval, enabled: true }
    }

    pub fn once() -> Self {
        Self { refresh_interval: Duration::ZERO, enabled: true }
    }
}

/// How a panel should present a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    /// Nothing loaded yet.
    Loading,
    Ready,
    /// The last fetch failed; the previous value is still shown.
    Stale,
    /// Every fetch so far failed.
    Failed,
}

/// What consumers see. `data` is only replaced when a fetched value differs
/// from the stored one, so `Arc::ptr_eq` across cycles means "unchanged".
#[derive(Debug)]
pub struct PollState<T> {
    pub data: Option<Arc<T>>,
    /// True until the first fetch settles, successfully or not.
    pub loading: bool,
    pub error: Option<Arc<AppError>>,
    /// When `data` was last replaced.
    pub last_changed: Option<DateTime<Utc>>,
    /// Cycle number of the fetch that produced `data`.
    pub cycle: u64,
}

impl<T> Clone for PollState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
            last_changed: self.last_changed,
            cycle: self.cycle,
        }
    }
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self { data: None, loading: true, error: None, last_changed: None, cycle: 0 }
    }
}

impl<T> PollState<T> {
    pub fn panel_state(&self) -> PanelState {
        match (&self.data, &self.error) {
            (None, None) => PanelState::Loading,
            (Some(_), None) => PanelState::Ready,
            (Some(_), Some(_)) => PanelState::Stale,
            (None, Some(_)) => PanelState::Failed,
        }
    }
}

/// Handle to a running poll loop. Dropping it stops the loop and cancels any
/// in-flight fetch.
pub struct Poller<T> {
    name: String,
    state_rx: watch::Receiver<PollState<T>>,
    options_tx: watch::Sender<PollOptions>,
    refetch: Arc<Notify>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl<T> Poller<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Starts polling. Must be called from within a Tokio runtime.
    pub fn spawn<F>(name: impl Into<String>, fetcher: F, options: PollOptions) -> Self
    where
        F: Fetcher<T>,
    {
        let name = name.into();
        let (state_tx, state_rx) = watch::channel(PollState::default());
        let (options_tx, options_rx) = watch::channel(options);
        let refetch = Arc::new(Notify::new());
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(run_poll_loop(
            name.clone(),
            fetcher,
            options_rx,
            state_tx,
            refetch.clone(),
            shutdown.clone(),
        ));

        Self { name, state_rx, options_tx, refetch, shutdown, task: Some(task) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> PollState<T> {
        self.state_rx.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.state_rx.borrow().data.clone()
    }

    /// Receiver that is only notified when the visible state actually changes.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.state_rx.clone()
    }

    /// Out-of-band fetch. Supersedes any fetch in flight. Ignored while disabled.
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }

    pub fn options(&self) -> PollOptions {
        *self.options_tx.borrow()
    }

    /// Any change restarts the loop: cancel, then fetch immediately if enabled.
    pub fn set_options(&self, options: PollOptions) {
        self.options_tx.send_if_modified(|current| {
            if *current == options {
                return false;
            }
            *current = options;
            true
        });
    }

    pub fn set_enabled(&self, enabled: bool) {
        let options = PollOptions { enabled, ..self.options() };
        self.set_options(options);
    }

    /// Stops the loop and waits for it to finish.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[Poller:{}] Task ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct InFlight<T> {
    cycle: u64,
    fut: BoxFuture<'static, Result<T, AppError>>,
}

fn schedule(options: &PollOptions) -> Option<Interval> {
    if options.refresh_interval.is_zero() {
        return None;
    }
    let period = options.refresh_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn settle<T>(in_flight: &mut Option<InFlight<T>>) -> (u64, Result<T, AppError>) {
    match in_flight {
        Some(f) => {
            let result = (&mut f.fut).await;
            (f.cycle, result)
        }
        None => std::future::pending().await,
    }
}

fn issue<T, F: Fetcher<T>>(name: &str, fetcher: &F, issued: &mut u64, in_flight: &mut Option<InFlight<T>>) {
    *issued += 1;
    let next = InFlight { cycle: *issued, fut: fetcher.fetch() };
    if let Some(superseded) = in_flight.replace(next) {
        debug!("[Poller:{}] Cycle {} superseded by cycle {}.", name, superseded.cycle, *issued);
    }
}

/// Applies a settled fetch. Returns whether subscribers were notified.
fn apply<T: PartialEq>(
    name: &str,
    state_tx: &watch::Sender<PollState<T>>,
    cycle: u64,
    result: Result<T, AppError>,
) -> bool {
    state_tx.send_if_modified(|state| {
        let was_loading = std::mem::replace(&mut state.loading, false);
        match result {
            Ok(value) => {
                let mut modified = was_loading || state.error.take().is_some();
                let unchanged = state.data.as_deref().is_some_and(|prev| *prev == value);
                if unchanged {
                    debug!("[Poller:{}] Cycle {} returned identical data.", name, cycle);
                } else {
                    state.data = Some(Arc::new(value));
                    state.last_changed = Some(Utc::now());
                    state.cycle = cycle;
                    modified = true;
                }
                modified
            }
            Err(e) => {
                warn!("[Poller:{}] Cycle {} failed: {}. Keeping last good value.", name, cycle, e);
                state.error = Some(Arc::new(e));
                true
            }
        }
    })
}

async fn run_poll_loop<T, F>(
    name: String,
    fetcher: F,
    mut options_rx: watch::Receiver<PollOptions>,
    state_tx: watch::Sender<PollState<T>>,
    refetch: Arc<Notify>,
    shutdown: Arc<Notify>,
) where
    T: PartialEq + Send + Sync + 'static,
    F: Fetcher<T>,
{
    let mut options = *options_rx.borrow_and_update();
    let mut issued: u64 = 0;
    let mut in_flight: Option<InFlight<T>> = None;
    let mut ticker: Option<Interval> = None;

    info!("[Poller:{}] Started ({:?}, enabled={}).", name, options.refresh_interval, options.enabled);
    if options.enabled {
        ticker = schedule(&options);
        issue(&name, &fetcher, &mut issued, &mut in_flight);
    }

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                break;
            }
            changed = options_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                options = *options_rx.borrow_and_update();
                info!("[Poller:{}] Reconfigured ({:?}, enabled={}).", name, options.refresh_interval, options.enabled);
                if let Some(cancelled) = in_flight.take() {
                    debug!("[Poller:{}] Cancelled in-flight cycle {}.", name, cancelled.cycle);
                }
                ticker = None;
                if options.enabled {
                    ticker = schedule(&options);
                    issue(&name, &fetcher, &mut issued, &mut in_flight);
                }
            }
            (cycle, result) = settle(&mut in_flight) => {
                in_flight = None;
                if cycle == issued {
                    apply(&name, &state_tx, cycle, result);
                } else {
                    debug!("[Poller:{}] Discarding result of stale cycle {}.", name, cycle);
                }
            }
            _ = refetch.notified() => {
                if options.enabled {
                    issue(&name, &fetcher, &mut issued, &mut in_flight);
                }
            }
            _ = next_tick(&mut ticker) => {
                // A slow fetch is allowed to overrun the interval; only refetch
                // and reconfiguration supersede it.
                if let Some(pending) = &in_flight {
                    debug!("[Poller:{}] Tick skipped, cycle {} still in flight.", name, pending.cycle);
                } else {
                    issue(&name, &fetcher, &mut issued, &mut in_flight);
                }
            }
        }
    }
    info!("[Poller:{}] Stopped.", name);
}
