//! The boundary between a control surface and the extraction worker.
//!
//! Only two things cross it: events flowing out through an unbounded channel
//! and a stop flag flowing in.
use crate::error::{Result, ScoutError};
use crate::scrapers::listings::Harvester;
use crate::scrapers::traits::DriverProvider;
use crate::scrapers::types::ScrapeRequest;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

/// Cooperative cancellation flag, cheap to clone across threads.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LimitReached,
    PaginationExhausted,
    Cancelled,
    DriverUnavailable,
    NavigationFailed,
    /// A security check appeared while waiting for it was disabled
    ChallengeBlocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub collected: usize,
    pub saved_to: Option<PathBuf>,
    pub reason: StopReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeEvent {
    Log(String),
    Progress(usize),
    Finished(RunSummary),
}

/// Outbound half of the event channel, owned by the worker.
///
/// A control surface that went away is not an error: events are dropped.
pub struct Reporter {
    tx: UnboundedSender<ScrapeEvent>,
}

impl Reporter {
    pub fn new(tx: UnboundedSender<ScrapeEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, UnboundedReceiver<ScrapeEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn log(&self, message: impl Into<String>) {
        let _ = self.tx.send(ScrapeEvent::Log(message.into()));
    }

    pub fn progress(&self, count: usize) {
        let _ = self.tx.send(ScrapeEvent::Progress(count));
    }

    /// Consumes the reporter: a run finishes exactly once.
    pub fn finished(self, summary: RunSummary) {
        let _ = self.tx.send(ScrapeEvent::Finished(summary));
    }
}

/// Starts runs on a worker thread, one at a time.
pub struct Controller<P: DriverProvider> {
    harvester: Arc<Harvester<P>>,
    active: Arc<AtomicBool>,
}

impl<P: DriverProvider + 'static> Controller<P> {
    pub fn new(harvester: Harvester<P>) -> Self {
        Self {
            harvester: Arc::new(harvester),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn a run. Fails with [`ScoutError::RunInProgress`] while another
    /// run has not yet finished.
    pub fn start(&self, request: ScrapeRequest) -> Result<RunHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScoutError::RunInProgress);
        }

        let (reporter, events) = Reporter::channel();
        let stop = StopHandle::new();
        let harvester = Arc::clone(&self.harvester);
        let active = Arc::clone(&self.active);
        let worker_stop = stop.clone();

        let spawned = thread::Builder::new()
            .name(format!("harvest-{}", request.area_code()))
            .spawn(move || {
                let guard = ActiveRun(active);
                let summary = harvester.run(&request, &reporter, &worker_stop);
                debug!("Run finished: {:?}", summary);
                // Cleared before announcing, so a surface reacting to the
                // event can start the next run right away.
                drop(guard);
                reporter.finished(summary);
            });

        match spawned {
            Ok(worker) => Ok(RunHandle {
                events,
                stop,
                worker: Some(worker),
            }),
            Err(e) => {
                error!("Failed to spawn worker thread: {}", e);
                self.active.store(false, Ordering::SeqCst);
                Err(ScoutError::Io(e))
            }
        }
    }
}

/// Marks the controller idle again when the worker exits, panics included.
struct ActiveRun(Arc<AtomicBool>);

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What a control surface holds while a run is in flight.
pub struct RunHandle {
    pub events: UnboundedReceiver<ScrapeEvent>,
    stop: StopHandle,
    worker: Option<JoinHandle<()>>,
}

impl RunHandle {
    #[cfg(test)]
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Extraction worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::{card, page, quiet_config, MemorySink, Next, ScriptedProvider};

    fn drain_until_finished(handle: &mut RunHandle) -> (Vec<ScrapeEvent>, RunSummary) {
        let mut seen = Vec::new();
        while let Some(event) = handle.events.blocking_recv() {
            if let ScrapeEvent::Finished(summary) = event {
                return (seen, summary);
            }
            seen.push(event);
        }
        panic!("event channel closed without a finished event");
    }

    #[test]
    fn stop_handle_is_shared_between_clones() {
        let stop = StopHandle::new();
        let other = stop.clone();
        assert!(!other.is_stop_requested());
        stop.request_stop();
        assert!(other.is_stop_requested());
    }

    #[test]
    fn reporter_survives_a_departed_listener() {
        let (reporter, rx) = Reporter::channel();
        drop(rx);
        reporter.log("nobody listens");
        reporter.progress(1);
    }

    #[test]
    fn runs_do_not_overlap_and_stop_is_honoured() {
        let mut provider = ScriptedProvider::new(vec![page(
            &[card("$1", "1 A St", "/1")],
            Next::Missing,
        )]);
        // Blocked until someone asks the run to stop.
        provider.challenge_reads = usize::MAX;
        let closed = Arc::clone(&provider.closed);

        let sink = MemorySink::default();
        let harvester = Harvester::new(provider, Box::new(sink.clone()), quiet_config());
        let controller = Controller::new(harvester);
        let request = ScrapeRequest::new("90210", 10).unwrap();

        let mut handle = controller.start(request.clone()).unwrap();
        assert!(matches!(
            controller.start(request.clone()),
            Err(ScoutError::RunInProgress)
        ));

        handle.request_stop();
        let (_, summary) = drain_until_finished(&mut handle);
        assert_eq!(summary.reason, StopReason::Cancelled);
        handle.join();
        assert!(closed.load(Ordering::SeqCst));

        // Idle again: a fresh run is accepted.
        let mut again = controller.start(request).unwrap();
        again.request_stop();
        drain_until_finished(&mut again);
        again.join();
    }

    #[test]
    fn completed_run_streams_progress_then_finishes() {
        let provider = ScriptedProvider::new(vec![page(
            &[card("$1", "1 A St", "/1"), card("$2", "2 B St", "/2")],
            Next::Missing,
        )]);
        let sink = MemorySink::default();
        let harvester = Harvester::new(provider, Box::new(sink.clone()), quiet_config());
        let controller = Controller::new(harvester);

        let mut handle = controller
            .start(ScrapeRequest::new("10001", 10).unwrap())
            .unwrap();
        let (events, summary) = drain_until_finished(&mut handle);
        handle.join();

        assert_eq!(summary.collected, 2);
        assert_eq!(summary.reason, StopReason::PaginationExhausted);
        assert!(events.contains(&ScrapeEvent::Progress(2)));
        assert_eq!(sink.written()[0].0.len(), 2);
    }
}
