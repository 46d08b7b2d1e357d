//! Single-in-flight fetch scheduling.
//!
//! The tile cache hands one request at a time to a [`FetchScheduler`] and
//! polls it once per frame. Started fetches are never cancelled.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use super::source::ContentSource;
use crate::error::TileError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Index of the file in the cache's file table
    pub file: usize,
    pub path: String,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub file: usize,
    pub path: String,
    pub result: Result<Vec<u8>, TileError>,
}

pub trait FetchScheduler {
    /// Start a fetch. Refused (returns false) while another is in flight.
    fn submit(&mut self, request: FetchRequest) -> bool;

    /// Take a completed fetch, if any. Never blocks.
    fn poll(&mut self) -> Option<FetchOutcome>;

    /// Number of fetches started and not yet polled.
    fn in_flight(&self) -> usize;
}

/// Message sent to the fetch thread.
enum ThreadMessage {
    Fetch(FetchRequest),
    Shutdown,
}

/// Runs fetches on a background thread, one at a time.
pub struct ThreadScheduler {
    request_tx: Sender<ThreadMessage>,
    result_rx: Receiver<FetchOutcome>,
    thread_handle: Option<JoinHandle<()>>,
    in_flight: Option<FetchRequest>,
}

impl ThreadScheduler {
    /// Spawn the fetch thread.
    pub fn spawn(source: Arc<dyn ContentSource>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (result_tx, result_rx) = mpsc::channel::<FetchOutcome>();

        let thread_handle = thread::Builder::new()
            .name("tile-fetch".to_string())
            .spawn(move || {
                log::info!("Tile fetch thread started");
                Self::thread_loop(source.as_ref(), request_rx, result_tx);
                log::info!("Tile fetch thread exiting");
            })?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            in_flight: None,
        })
    }

    fn thread_loop(
        source: &dyn ContentSource,
        request_rx: Receiver<ThreadMessage>,
        result_tx: Sender<FetchOutcome>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(ThreadMessage::Fetch(request)) => {
                    let result = source.fetch(&request.path);
                    match &result {
                        Ok(bytes) => log::debug!("Fetched {} ({} bytes)", request.path, bytes.len()),
                        Err(e) => log::debug!("Fetch failed: {}", e),
                    }
                    let outcome = FetchOutcome {
                        file: request.file,
                        path: request.path,
                        result,
                    };
                    if result_tx.send(outcome).is_err() {
                        log::warn!("Result channel closed, fetch thread exiting");
                        break;
                    }
                }
                Ok(ThreadMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    log::debug!("Request channel closed, fetch thread exiting");
                    break;
                }
            }
        }
    }
}

impl FetchScheduler for ThreadScheduler {
    fn submit(&mut self, request: FetchRequest) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let pending = request.clone();
        if self.request_tx.send(ThreadMessage::Fetch(request)).is_err() {
            log::error!("Failed to send fetch request: channel closed");
            return false;
        }
        log::debug!("Submitted fetch of {} (file {})", pending.path, pending.file);
        self.in_flight = Some(pending);
        true
    }

    fn poll(&mut self) -> Option<FetchOutcome> {
        match self.result_rx.try_recv() {
            Ok(outcome) => {
                self.in_flight = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let request = self.in_flight.take()?;
                log::warn!("Fetch thread stopped while fetching {}", request.path);
                Some(FetchOutcome {
                    file: request.file,
                    result: Err(TileError::transport(&request.path, "fetch thread stopped")),
                    path: request.path,
                })
            }
        }
    }

    fn in_flight(&self) -> usize {
        usize::from(self.in_flight.is_some())
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        log::debug!("Shutting down tile fetch thread");

        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Fetch thread panicked: {:?}", e);
            }
        }
    }
}

/// Performs the fetch during `submit` and hands it out on the next `poll`.
/// Deterministic; used by tests and tools.
pub struct InlineScheduler<S> {
    source: S,
    completed: VecDeque<FetchOutcome>,
    submitted: Vec<FetchRequest>,
}

impl<S: ContentSource> InlineScheduler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            completed: VecDeque::new(),
            submitted: Vec::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Every request accepted so far, in order.
    pub fn submitted(&self) -> &[FetchRequest] {
        &self.submitted
    }
}

impl<S: ContentSource> FetchScheduler for InlineScheduler<S> {
    fn submit(&mut self, request: FetchRequest) -> bool {
        if !self.completed.is_empty() {
            return false;
        }
        let result = self.source.fetch(&request.path);
        self.completed.push_back(FetchOutcome {
            file: request.file,
            path: request.path.clone(),
            result,
        });
        self.submitted.push(request);
        true
    }

    fn poll(&mut self) -> Option<FetchOutcome> {
        self.completed.pop_front()
    }

    fn in_flight(&self) -> usize {
        self.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::cache::MemorySource;

    fn request(file: usize, path: &str) -> FetchRequest {
        FetchRequest {
            file,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_inline_single_in_flight() {
        let source = MemorySource::new().with_file("a", vec![7]);
        let mut scheduler = InlineScheduler::new(source);
        assert!(scheduler.submit(request(0, "a")));
        assert!(!scheduler.submit(request(1, "b")));
        assert_eq!(scheduler.in_flight(), 1);
        let outcome = scheduler.poll().unwrap();
        assert_eq!(outcome.file, 0);
        assert_eq!(outcome.result.unwrap(), vec![7]);
        assert_eq!(scheduler.in_flight(), 0);
        assert!(scheduler.poll().is_none());
    }

    #[test]
    fn test_thread_scheduler_delivers_result() {
        let source: Arc<dyn ContentSource> = Arc::new(MemorySource::new().with_file("x", vec![1, 2]));
        let mut scheduler = ThreadScheduler::spawn(source).unwrap();
        assert!(scheduler.submit(request(3, "x")));
        assert!(!scheduler.submit(request(4, "y")));

        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = scheduler.poll() {
                break outcome;
            }
            assert!(Instant::now() < deadline, "fetch never completed");
            std::thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(outcome.file, 3);
        assert_eq!(outcome.result.unwrap(), vec![1, 2]);
        assert_eq!(scheduler.in_flight(), 0);
    }

    struct PanickingSource;

    impl ContentSource for PanickingSource {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, TileError> {
            panic!("source failed on {}", path);
        }
    }

    #[test]
    fn test_thread_scheduler_survives_dead_thread() {
        let mut scheduler = ThreadScheduler::spawn(Arc::new(PanickingSource)).unwrap();
        assert!(scheduler.submit(request(5, "boom")));

        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = scheduler.poll() {
                break outcome;
            }
            assert!(Instant::now() < deadline, "dead thread never reported");
            std::thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(outcome.file, 5);
        assert_eq!(outcome.path, "boom");
        assert!(matches!(outcome.result, Err(TileError::Transport { .. })));
        assert_eq!(scheduler.in_flight(), 0);
        assert!(scheduler.poll().is_none());
        assert!(!scheduler.submit(request(6, "next")));
    }

    #[test]
    fn test_thread_scheduler_reports_failure() {
        let source: Arc<dyn ContentSource> = Arc::new(MemorySource::new());
        let mut scheduler = ThreadScheduler::spawn(source).unwrap();
        assert!(scheduler.submit(request(0, "missing")));
        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(outcome) = scheduler.poll() {
                break outcome;
            }
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        };
        assert!(outcome.result.is_err());
    }
}
