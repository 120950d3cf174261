use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Run, RunStats, Setup};
use crate::runner::Runner;
use crate::storage::Repository;

/// Validation and orchestration layer consumed by the REST adapter.
pub struct Service {
    repo: Arc<Repository>,
    runner: Runner,
}

impl Service {
    pub fn new(repo: Arc<Repository>, runner: Runner) -> Self {
        Self { repo, runner }
    }

    /// Validates the setup invariants and persists a new record.
    #[allow(clippy::too_many_arguments)]
    pub fn create_setup(
        &self,
        name: String,
        description: String,
        method: String,
        url: String,
        body: Vec<u8>,
        headers: HashMap<String, String>,
        rps: u32,
        duration: Duration,
    ) -> Result<Setup, Error> {
        if url.is_empty() {
            return Err(Error::Validation("url is required".to_string()));
        }
        url::Url::parse(&url).map_err(|err| Error::Validation(format!("invalid url: {err}")))?;
        reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::Validation(format!("unknown http method: {method}")))?;
        if rps == 0 {
            return Err(Error::Validation("rps must be greater than 0".to_string()));
        }
        if duration.is_zero() {
            return Err(Error::Validation(
                "duration must be greater than 0".to_string(),
            ));
        }

        let setup = Setup::new(name, description, method, url, body, headers, rps, duration);
        self.repo.create_setup(setup.clone())?;
        Ok(setup)
    }

    pub fn get_setup(&self, id: Uuid) -> Result<Setup, Error> {
        self.repo.get_setup(id)
    }

    pub fn list_setups(&self) -> Vec<Setup> {
        self.repo.list_setups()
    }

    /// Persists a new version of an existing setup with a refreshed
    /// update timestamp.
    pub fn update_setup(&self, mut setup: Setup) -> Result<Setup, Error> {
        self.repo.get_setup(setup.id)?;
        setup.updated_at = Utc::now();
        self.repo.update_setup(setup.clone())?;
        Ok(setup)
    }

    pub fn delete_setup(&self, id: Uuid) -> Result<(), Error> {
        self.repo.delete_setup(id)
    }

    pub fn start_run(&self, setup_id: Uuid) -> Result<Run, Error> {
        self.runner.start_run(setup_id)
    }

    pub fn get_run(&self, id: Uuid) -> Result<Run, Error> {
        self.repo.get_run(id)
    }

    pub fn list_runs(&self) -> Vec<Run> {
        self.repo.list_runs()
    }

    pub fn list_runs_by_setup(&self, setup_id: Uuid) -> Vec<Run> {
        self.repo.list_runs_by_setup(setup_id)
    }

    pub fn cancel_run(&self, run_id: Uuid) -> Result<(), Error> {
        self.runner.cancel_run(run_id)
    }

    pub fn active_runs(&self) -> Vec<Uuid> {
        self.runner.active_runs()
    }

    /// Stats for a run: a live snapshot while its collector session is
    /// open, the stored terminal snapshot afterwards.
    pub fn run_stats(&self, run_id: Uuid) -> Result<Option<RunStats>, Error> {
        let run = self.repo.get_run(run_id)?;
        if let Some(stats) = self.runner.live_stats(run_id) {
            let elapsed = (Utc::now() - run.started_at).to_std().unwrap_or_default();
            return Ok(Some(stats.snapshot(elapsed)));
        }
        Ok(run.stats)
    }
}
