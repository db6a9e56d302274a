use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::{debug, warn};

use crate::results::{ResultQuery, ResultSink, TestResult};
use crate::scoring::{SubmitReceipt, Submission};

pub const TICK_RATE_MS: u64 = 100;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// The result store answered a submission
    Submitted {
        run_id: u64,
        outcome: Result<SubmitReceipt, String>,
    },
    /// The result store answered a fetch
    ResultsLoaded(Result<Vec<TestResult>, String>),
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
    tx: Sender<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if input_tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if input_tx.send(AppEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx, tx }
    }

    /// Handle for background workers to feed events into the loop
    pub fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn event_source(&self) -> &E {
        &self.event_source
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

/// What a periodic task does when it fires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Countdown,
    CutoffCheck,
}

/// Cancel handle returned when a task is scheduled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct PeriodicTask {
    handle: TaskHandle,
    kind: TaskKind,
    interval: Duration,
    next_due: Instant,
}

/// Cooperative periodic tasks driven by the event loop's ticks.
/// Nothing fires unless `due` is polled, and a cancelled task never fires again.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// First firing is one `interval` after `now`
    pub fn schedule(&mut self, kind: TaskKind, interval: Duration, now: Instant) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.tasks.push(PeriodicTask {
            handle,
            kind,
            interval,
            next_due: now + interval,
        });
        debug!(?kind, ?interval, "task scheduled");
        handle
    }

    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.handle != handle);
        before != self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Every firing due at `now`, oldest first. A task that fell behind fires
    /// once per missed interval.
    pub fn due(&mut self, now: Instant) -> Vec<TaskKind> {
        let mut fired = Vec::new();
        for task in &mut self.tasks {
            if task.interval.is_zero() {
                continue;
            }
            while task.next_due <= now {
                fired.push(task.kind);
                task.next_due += task.interval;
            }
        }
        fired
    }
}

enum StoreRequest {
    Submit { run_id: u64, submission: Submission },
    Fetch,
}

/// Runs the result store on its own thread so the UI never waits on it.
/// Replies come back through the event channel as [`AppEvent`]s.
pub struct StoreWorker {
    tx: Option<Sender<StoreRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl StoreWorker {
    pub fn spawn<S>(mut store: S, events: Sender<AppEvent>) -> Self
    where
        S: ResultSink + ResultQuery + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<StoreRequest>();
        let handle = thread::spawn(move || {
            for request in rx {
                let event = match request {
                    StoreRequest::Submit { run_id, submission } => {
                        let outcome = store.submit(&submission).map_err(|e| {
                            warn!(run_id, error = %e, "submission failed");
                            e.to_string()
                        });
                        AppEvent::Submitted { run_id, outcome }
                    }
                    StoreRequest::Fetch => AppEvent::ResultsLoaded(
                        store.fetch_results().map_err(|e| {
                            warn!(error = %e, "fetching results failed");
                            e.to_string()
                        }),
                    ),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn submit(&self, run_id: u64, submission: Submission) -> bool {
        self.send(StoreRequest::Submit { run_id, submission })
    }

    pub fn fetch(&self) -> bool {
        self.send(StoreRequest::Fetch)
    }

    fn send(&self, request: StoreRequest) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok())
    }
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        // closing the channel ends the worker loop
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
