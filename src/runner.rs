use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::attack;
use crate::collector::Collector;
use crate::error::Error;
use crate::models::{Run, RunStatus, Setup, SetupStatus};
use crate::stats::Stats;
use crate::storage::Repository;

/// Owns the registry of active runs and drives each run's lifecycle.
///
/// `Runner` is a cheaply clonable handle; every clone shares the same
/// registry. Each run gets its own cancellation token, minted here:
/// caller scopes (such as an HTTP request handler) never propagate into
/// the run, so dropping the request cannot kill the attack.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    repo: Arc<Repository>,
    collector: Arc<Collector>,
    client: reqwest::Client,
    active: RwLock<HashMap<Uuid, CancellationToken>>,
}

impl Runner {
    pub fn new(repo: Arc<Repository>, collector: Arc<Collector>, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                repo,
                collector,
                client,
                active: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates a pending run for the setup and spawns its supervisor
    /// task, returning the run immediately.
    pub fn start_run(&self, setup_id: Uuid) -> Result<Run, Error> {
        let setup = self.inner.repo.get_setup(setup_id)?;
        if setup.status != SetupStatus::Active {
            return Err(Error::SetupNotActive);
        }

        let run = Run::new(setup_id);
        self.inner.repo.create_run(run.clone())?;

        let cancel = CancellationToken::new();
        self.inner
            .active
            .write()
            .unwrap()
            .insert(run.id, cancel.clone());

        info!(
            run_id = %run.id,
            setup_id = %setup_id,
            url = %setup.url,
            rps = setup.rps,
            duration = ?setup.duration,
            "run execution starting"
        );

        let inner = Arc::clone(&self.inner);
        let spawned = run.clone();
        tokio::spawn(async move {
            inner.execute_run(spawned, setup, cancel).await;
        });

        Ok(run)
    }

    /// Requests cancellation of an active run. Repeated calls are no-ops
    /// while the run is still registered; once it has finished, the run
    /// is no longer active and an error is returned.
    pub fn cancel_run(&self, run_id: Uuid) -> Result<(), Error> {
        let cancel = self.inner.active.read().unwrap().get(&run_id).cloned();
        match cancel {
            Some(cancel) => {
                info!(run_id = %run_id, "cancelling run");
                cancel.cancel();
                Ok(())
            }
            None => Err(Error::RunNotActive(run_id)),
        }
    }

    /// Ids of runs whose supervisor has not finished yet.
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.inner.active.read().unwrap().keys().copied().collect()
    }

    /// Live stats for a run with an open collector session.
    pub fn live_stats(&self, run_id: Uuid) -> Option<Arc<Stats>> {
        self.inner.collector.stats(run_id)
    }

    /// Cancels every active run and tears the collector down.
    pub async fn shutdown(&self) {
        let tokens: Vec<_> = self.inner.active.read().unwrap().values().cloned().collect();
        for token in tokens {
            token.cancel();
        }
        self.inner.collector.shutdown().await;
    }
}

impl RunnerInner {
    async fn execute_run(&self, mut run: Run, setup: Setup, cancel: CancellationToken) {
        run.status = RunStatus::Running;
        if let Err(err) = self.repo.update_run(run.clone()) {
            error!(run_id = %run.id, error = %err, "failed to persist running status");
        }

        let started = Instant::now();
        let outcome = attack::run_attack(
            cancel.clone(),
            run.id,
            self.client.clone(),
            &self.collector,
            &setup,
        )
        .await;
        let elapsed = started.elapsed();

        run.ended_at = Some(Utc::now());
        run.status = if cancel.is_cancelled() {
            info!(run_id = %run.id, "run cancelled");
            RunStatus::Cancelled
        } else if let Err(err) = &outcome {
            run.error = Some(err.to_string());
            error!(run_id = %run.id, error = %err, "run failed");
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        // The loop has dropped its senders by now, so the worker drains
        // whatever is left before the snapshot is taken.
        match self.collector.stop_run(run.id).await {
            Some(stats) => run.stats = Some(stats.snapshot(elapsed)),
            None if run.status == RunStatus::Completed => {
                error!(run_id = %run.id, "stats session missing at finalisation");
                run.status = RunStatus::Failed;
                run.error = Some("stats session missing at finalisation".to_string());
            }
            None => {}
        }

        if let Some(stats) = &run.stats {
            info!(
                run_id = %run.id,
                status = ?run.status,
                total = stats.total,
                success = stats.success,
                failed = stats.failed,
                avg_latency_ms = stats.avg_latency,
                success_rate = stats.success_rate,
                "run finished"
            );
        }

        if let Err(err) = self.repo.update_run(run.clone()) {
            error!(run_id = %run.id, error = %err, "failed to update run");
        }

        self.active.write().unwrap().remove(&run.id);
    }
}
