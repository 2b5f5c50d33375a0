//! Results of a fan-out dispatch.

use crate::core::{HttpError, Response};

use std::fmt;
use thiserror::Error;

/// One client's failure within a fan-out.
#[derive(Debug)]
pub struct ClientFailure {
    /// Index of the client in its set.
    pub index: usize,
    /// What went wrong.
    pub error: HttpError,
}

impl fmt::Display for ClientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {}: {}", self.index, self.error)
    }
}

/// Every per-client failure of a fan-out, ordered by client index.
#[derive(Debug, Error)]
#[error("{}", join_lines(failures))]
pub struct FanoutError {
    /// The failures.
    pub failures: Vec<ClientFailure>,
}

fn join_lines(failures: &[ClientFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl FanoutError {
    /// Indices of the failed clients.
    pub fn indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    /// Returns the failure of client `index`, if it failed.
    pub fn failure(&self, index: usize) -> Option<&HttpError> {
        self.failures
            .iter()
            .find(|f| f.index == index)
            .map(|f| &f.error)
    }

    /// Returns `true` if any client failed with a 5xx error.
    pub fn any_server_error(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_server_error())
    }
}

/// Outcome of dispatching one request to several clients.
///
/// Partial success is not a hard failure: `responses` and `error` may both
/// be populated.
#[derive(Debug, Default)]
pub struct Fanout {
    /// Successful responses tagged with their client index, in index order.
    pub responses: Vec<(usize, Response)>,
    /// Failures, if any client failed.
    pub error: Option<FanoutError>,
}

impl Fanout {
    /// Returns `true` if every dispatched client succeeded.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Iterates over the successful responses.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.responses.iter().map(|(_, response)| response)
    }

    /// Converts into a `Result`, discarding partial successes on failure.
    pub fn into_result(self) -> Result<Vec<(usize, Response)>, FanoutError> {
        match self.error {
            None => Ok(self.responses),
            Some(err) => Err(err),
        }
    }
}
