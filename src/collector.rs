use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::stats::{RequestResult, Stats};

/// Capacity of each run's result channel.
const RESULT_BUFFER: usize = 1_000;

/// Binds each run to its [`Stats`] and drains its result channel.
///
/// One worker task per run receives results and folds them into the
/// run's aggregate. The channel closes once the attack loop has dropped
/// every sender; the worker then drains what is left and exits.
#[derive(Debug, Default)]
pub struct Collector {
    runs: RwLock<HashMap<Uuid, Arc<Stats>>>,
    workers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stats session for the run and returns the send end of
    /// its result channel. Calling this twice for a live run id is a
    /// programming error; the second call replaces the first session.
    pub fn start_run(&self, run_id: Uuid) -> mpsc::Sender<RequestResult> {
        let stats = Arc::new(Stats::new());
        let (tx, mut rx) = mpsc::channel::<RequestResult>(RESULT_BUFFER);

        self.runs.write().unwrap().insert(run_id, Arc::clone(&stats));

        let cancel = self.cancel.clone();
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = rx.recv() => match result {
                        Some(r) => stats.record(&r),
                        None => return,
                    },
                }
            }
        });
        self.workers.lock().unwrap().insert(run_id, worker);

        tx
    }

    /// Live stats handle for a run, readable concurrently with ingestion.
    pub fn stats(&self, run_id: Uuid) -> Option<Arc<Stats>> {
        self.runs.read().unwrap().get(&run_id).cloned()
    }

    /// Waits for the run's worker to finish draining its channel, then
    /// removes the session and hands the stats back for the final
    /// snapshot. Callers must have released every sender first.
    pub async fn stop_run(&self, run_id: Uuid) -> Option<Arc<Stats>> {
        let worker = self.workers.lock().unwrap().remove(&run_id);
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        self.runs.write().unwrap().remove(&run_id)
    }

    /// Cancels every worker and waits for them to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap()
            .drain()
            .map(|(_, worker)| worker)
            .collect();
        for worker in workers {
            let _ = worker.await;
        }
    }
}
