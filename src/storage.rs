use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::Error;
use crate::models::{Run, Setup};

/// Thread-safe in-memory store of setup and run records.
///
/// Records are stored and returned by value; callers never hold
/// references into live state.
#[derive(Debug, Default)]
pub struct Repository {
    setups: RwLock<HashMap<Uuid, Setup>>,
    runs: RwLock<HashMap<Uuid, Run>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_setup(&self, setup: Setup) -> Result<(), Error> {
        let mut setups = self.setups.write().unwrap();
        if setups.contains_key(&setup.id) {
            return Err(Error::SetupAlreadyExists(setup.id));
        }
        setups.insert(setup.id, setup);
        Ok(())
    }

    pub fn get_setup(&self, id: Uuid) -> Result<Setup, Error> {
        self.setups
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::SetupNotFound(id))
    }

    pub fn list_setups(&self) -> Vec<Setup> {
        self.setups.read().unwrap().values().cloned().collect()
    }

    pub fn update_setup(&self, setup: Setup) -> Result<(), Error> {
        let mut setups = self.setups.write().unwrap();
        if !setups.contains_key(&setup.id) {
            return Err(Error::SetupNotFound(setup.id));
        }
        setups.insert(setup.id, setup);
        Ok(())
    }

    pub fn delete_setup(&self, id: Uuid) -> Result<(), Error> {
        self.setups
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::SetupNotFound(id))
    }

    pub fn create_run(&self, run: Run) -> Result<(), Error> {
        let mut runs = self.runs.write().unwrap();
        if runs.contains_key(&run.id) {
            return Err(Error::RunAlreadyExists(run.id));
        }
        runs.insert(run.id, run);
        Ok(())
    }

    pub fn get_run(&self, id: Uuid) -> Result<Run, Error> {
        self.runs
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::RunNotFound(id))
    }

    pub fn list_runs(&self) -> Vec<Run> {
        self.runs.read().unwrap().values().cloned().collect()
    }

    pub fn list_runs_by_setup(&self, setup_id: Uuid) -> Vec<Run> {
        self.runs
            .read()
            .unwrap()
            .values()
            .filter(|run| run.setup_id == setup_id)
            .cloned()
            .collect()
    }

    pub fn update_run(&self, run: Run) -> Result<(), Error> {
        let mut runs = self.runs.write().unwrap();
        if !runs.contains_key(&run.id) {
            return Err(Error::RunNotFound(run.id));
        }
        runs.insert(run.id, run);
        Ok(())
    }
}
