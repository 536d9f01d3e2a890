use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Layer a per-entity failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Resolution,
    Connectivity,
    Gateway,
    Parse,
}

/// A failed (cluster, entity) pair. Siblings of the pair are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{cluster} [{entity}] {kind:?} error: {message}")]
pub struct EntityError {
    pub cluster: String,
    pub entity: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl EntityError {
    pub fn new(cluster: &str, entity: &str, kind: ErrorKind, error: impl Display) -> Self {
        Self {
            cluster: cluster.to_string(),
            entity: entity.to_string(),
            kind,
            message: error.to_string(),
        }
    }

    pub fn resolution(identifier: &str, error: impl Display) -> Self {
        Self::new(identifier, "cluster", ErrorKind::Resolution, error)
    }
}

/// Records gathered by an operation plus the failures met along the way
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome<T> {
    pub records: T,
    pub errors: Vec<EntityError>,
}

impl<T> Outcome<T> {
    pub fn new(records: T, errors: Vec<EntityError>) -> Self {
        Self { records, errors }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            records: f(self.records),
            errors: self.errors,
        }
    }
}

impl<T> Outcome<Vec<T>> {
    /// Split per-task results, keeping input order on both sides
    pub fn from_results(results: impl IntoIterator<Item = Result<T, EntityError>>) -> Self {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(error) => errors.push(error),
            }
        }
        Self { records, errors }
    }

    /// Same as [`Outcome::from_results`] for tasks yielding several records each
    pub fn flatten_results(results: impl IntoIterator<Item = Result<Vec<T>, EntityError>>) -> Self {
        Outcome::<Vec<Vec<T>>>::from_results(results).map(|nested| nested.into_iter().flatten().collect())
    }
}
