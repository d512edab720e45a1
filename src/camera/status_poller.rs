//! StatusPoller - Capture completion polling
//!
//! ## Responsibilities
//!
//! - Re-issue the status command for an in-progress capture until it
//!   resolves to a file URL
//! - Enforce the total polling budget (default 30s, 1s between polls)
//! - Tolerate "still processing" responses without treating them as errors
//!
//! The shutter is asynchronous on the camera side; this loop is what lets
//! `take_picture` behave as a single blocking call on its worker. It is
//! the only place in the crate with built-in bounded retry.

use std::time::Duration;

use serde_json::json;

use crate::camera::types::{CommandResponse, CommandState};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Default interval between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default total budget before the capture is declared lost
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(30);

/// Poller lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Not started
    Idle,
    /// Status command in flight or waiting for the next cycle
    Polling,
    /// Capture finished; holds the resulting resource URL
    Completed(String),
    /// Budget exhausted before the camera finished
    TimedOut,
    /// Camera reported an error payload
    Failed,
}

/// Polls the status endpoint until an asynchronous command resolves
pub struct StatusPoller {
    poll_interval: Duration,
    budget: Duration,
    state: PollState,
}

impl StatusPoller {
    /// Create a poller with the default interval and budget
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_BUDGET)
    }

    /// Create a poller with explicit timing
    pub fn with_budget(poll_interval: Duration, budget: Duration) -> Self {
        Self {
            poll_interval,
            budget,
            state: PollState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Drive the status command until completion, failure, or timeout.
    ///
    /// Returns the resulting resource URL on completion. Runs on the
    /// caller's task; the caller decides which worker that is.
    pub async fn run<T: Transport>(&mut self, transport: &T, command_id: &str) -> Result<String> {
        self.state = PollState::Polling;
        let started = tokio::time::Instant::now();

        loop {
            let raw = match transport.status(&json!({ "id": command_id })).await {
                Ok(raw) => raw,
                Err(e) => {
                    self.state = PollState::Failed;
                    return Err(e);
                }
            };

            let resp = match CommandResponse::parse(raw) {
                Ok(resp) => resp,
                Err(e) => {
                    self.state = PollState::Failed;
                    return Err(e);
                }
            };

            match resp.state {
                CommandState::Done => {
                    let url = match resp.result_str("fileUri") {
                        Some(url) => url.to_string(),
                        None => {
                            self.state = PollState::Failed;
                            return Err(Error::Parse(
                                "done status without fileUri".to_string(),
                            ));
                        }
                    };
                    tracing::debug!(file_url = %url, "Capture completed");
                    self.state = PollState::Completed(url.clone());
                    return Ok(url);
                }
                CommandState::Error => {
                    self.state = PollState::Failed;
                    return Err(resp.into_error());
                }
                CommandState::InProgress => {
                    let waited = started.elapsed();
                    if waited >= self.budget {
                        tracing::warn!(
                            command_id = %command_id,
                            waited_secs = waited.as_secs_f64(),
                            "Capture polling budget exhausted"
                        );
                        self.state = PollState::TimedOut;
                        return Err(Error::PollTimeout {
                            waited_secs: waited.as_secs_f64(),
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new()
    }
}
