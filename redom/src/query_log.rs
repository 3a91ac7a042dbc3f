//! Per-instance command timing.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::{
    errors::RepoError,
    manager::Manager,
    store::{Command, Reply},
};

/// One executed command and how long the round trip took.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub command: String,
    pub elapsed: Duration,
}

/// Ordered log of every command an entity instance issued.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    records: Vec<QueryRecord>,
    counter: usize,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes `command` through `manager`, timing and recording it.
    ///
    /// The command is recorded whether or not the store accepted it.
    pub(crate) fn run(&mut self, manager: &Manager, command: &Command) -> Result<Reply, RepoError> {
        let started = Instant::now();
        let result = manager.execute(command);
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => log::debug!(target: "redom::query", "{command} ({elapsed:?})"),
            Err(err) => log::debug!(target: "redom::query", "{command} failed after {elapsed:?}: {err}"),
        }
        self.record(command.to_string(), elapsed);
        result
    }

    pub fn record(&mut self, command: String, elapsed: Duration) {
        self.records.push(QueryRecord { command, elapsed });
        self.counter += 1;
    }

    pub fn count(&self) -> usize {
        self.counter
    }

    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn total_time(&self) -> Duration {
        self.records.iter().map(|record| record.elapsed).sum()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.command.as_str())
    }
}

/// Summary of an instance's query log.
#[derive(Debug, Clone, Serialize)]
pub struct QueryStats {
    /// Lower-cased entity type name.
    pub entity: String,
    pub count: usize,
    pub queries: Vec<QueryRecord>,
    pub total_time: Duration,
}

impl QueryStats {
    pub(crate) fn from_log(entity: &str, log: &QueryLog) -> Self {
        Self {
            entity: entity.to_string(),
            count: log.count(),
            queries: log.records().to_vec(),
            total_time: log.total_time(),
        }
    }
}
