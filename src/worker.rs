use crate::{telemetry, CaptureInvoker};
use futures::future::join_all;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Receiving end of the URL queue, shared by every worker of a pool.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Claiming,
    Capturing,
    Terminated,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Claiming,
            2 => WorkerState::Capturing,
            3 => WorkerState::Terminated,
            _ => WorkerState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Claiming => 1,
            WorkerState::Capturing => 2,
            WorkerState::Terminated => 3,
        }
    }
}

#[derive(Clone)]
pub struct CaptureWorker {
    id: usize,
    invoker: Arc<CaptureInvoker>,
    state: Arc<AtomicU8>,
    processed_count: Arc<AtomicUsize>,
    error_count: Arc<AtomicUsize>,
}

impl CaptureWorker {
    pub fn new(id: usize, invoker: Arc<CaptureInvoker>) -> Self {
        Self {
            id,
            invoker,
            state: Arc::new(AtomicU8::new(WorkerState::Idle.as_u8())),
            processed_count: Arc::new(AtomicUsize::new(0)),
            error_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Claim URLs from `queue` one at a time until it is closed and drained.
    pub async fn run(&self, queue: SharedQueue) {
        debug!("Starting capture worker {}", self.id);

        loop {
            self.set_state(WorkerState::Claiming);
            let url = {
                let mut receiver = queue.lock().await;
                receiver.recv().await
            };

            let Some(url) = url else { break };

            self.set_state(WorkerState::Capturing);
            // Outcome already logged by the invoker; errors stop here.
            match self.invoker.capture(&url).await {
                Ok(_) => self.processed_count.fetch_add(1, Ordering::Relaxed),
                Err(_) => self.error_count.fetch_add(1, Ordering::Relaxed),
            };
            self.set_state(WorkerState::Idle);
        }

        self.set_state(WorkerState::Terminated);
        debug!(
            "Capture worker {} stopped (saved: {}, failed: {})",
            self.id,
            self.processed_count(),
            self.error_count()
        );
    }

    fn set_state(&self, state: WorkerState) {
        debug!("Worker {} -> {:?}", self.id, state);
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn get_stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            state: self.state(),
            processed_count: self.processed_count(),
            error_count: self.error_count(),
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub id: usize,
    pub state: WorkerState,
    pub processed_count: usize,
    pub error_count: usize,
}

/// Fixed-size pool of capture workers fed from one FIFO queue
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use urlshot::{CaptureInvoker, ChromeRenderer, Config, Dispatcher};
///
/// #[tokio::main]
/// async fn main() {
///     let config = Arc::new(Config::default());
///     let renderer = Arc::new(ChromeRenderer::new(&config));
///     let invoker = Arc::new(CaptureInvoker::new(renderer, config));
///
///     let dispatcher = Dispatcher::new(4, invoker);
///     dispatcher
///         .run(vec!["https://example.com".to_string(), "https://example.org".to_string()])
///         .await;
/// }
/// ```
pub struct Dispatcher {
    workers: Vec<CaptureWorker>,
}

impl Dispatcher {
    /// Create a pool of `worker_count` workers. Zero is raised to one.
    pub fn new(worker_count: usize, invoker: Arc<CaptureInvoker>) -> Self {
        let worker_count = if worker_count == 0 {
            warn!("Worker count must be at least 1, using 1");
            1
        } else {
            worker_count
        };

        let workers = (0..worker_count)
            .map(|id| CaptureWorker::new(id, invoker.clone()))
            .collect();

        Self { workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Capture every URL and return once all workers have exited.
    ///
    /// At most `worker_count` captures are in flight at any time. Each URL
    /// is claimed by exactly one worker; completion order is unspecified.
    pub async fn run(&self, urls: Vec<String>) {
        let total = urls.len();
        info!(
            "Dispatching {} URLs across {} workers",
            total,
            self.workers.len()
        );

        let (request_sender, request_receiver) = mpsc::channel(self.workers.len());
        let shared_receiver: SharedQueue = Arc::new(Mutex::new(request_receiver));

        let handles: Vec<_> = self
            .workers
            .iter()
            .map(|worker| {
                let worker = worker.clone();
                let rx = shared_receiver.clone();
                tokio::spawn(async move { worker.run(rx).await })
            })
            .collect();
        drop(shared_receiver);
        telemetry::record_active_workers(handles.len());

        for (submitted, url) in urls.into_iter().enumerate() {
            if request_sender.send(url).await.is_err() {
                error!(
                    "All capture workers exited early, {} URLs were not dispatched",
                    total - submitted
                );
                break;
            }
        }
        // Close the queue; workers exit once it drains.
        drop(request_sender);

        for (id, result) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = result {
                error!("Capture worker {} aborted: {}", id, e);
            }
        }
        telemetry::record_active_workers(0);

        info!("All {} capture workers finished", self.workers.len());
    }

    pub fn get_worker_stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.get_stats()).collect()
    }

    pub fn total_processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed_count()).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.workers.iter().map(|w| w.error_count()).sum()
    }
}
