//! Task status polling
//!
//! [`TaskPoller::poll_until_done`] waits against a monotonic deadline, not a
//! sum of sleeps. Status-request latency counts against the budget, and no
//! check starts after the deadline, so the wait overruns the budget by at
//! most one status check (bounded by `timeouts.check_ms`). With instant
//! responses the cadence is the same as a sleep-counting loop: a 60 s budget
//! at a 3 s interval gives 20 checks.
//!
//! A budget too large to represent as a deadline means no deadline; the wait
//! then ends only on a terminal state or cancellation.
//!
//! Each response is fed through [`wombo_core::state_machine`]. Only the
//! `Completed` state returns a task; `Failed` and `TimedOut` return errors.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use wombo_core::config::{Endpoints, PollingConfig, Timeouts};
use wombo_core::state_machine::{transition, TaskEvent, TaskState};
use wombo_core::{Credential, DreamConfig, DreamError, Result, Task};

use crate::headers;
use crate::retry::{with_retries, RetryPolicy};
use crate::transport::{HttpRequest, Transport};

/// Cadence and bound for [`TaskPoller::poll_until_done`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOptions {
    /// Delay before the first check
    pub interval: Duration,
    /// Wall-clock bound on the whole wait
    pub budget: Duration,
    /// Delay growth per check; 1.0 keeps the interval fixed
    pub backoff_multiplier: f64,
    /// Upper bound for a grown delay
    pub max_interval: Duration,
}

impl PollOptions {
    /// Fixed delay, no backoff
    pub fn fixed(interval: Duration, budget: Duration) -> Self {
        Self {
            interval,
            budget,
            backoff_multiplier: 1.0,
            max_interval: interval,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff_multiplier <= 1.0 {
            return current;
        }
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(self.max_interval, |grown| grown.min(self.max_interval))
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self::fixed(config.interval(), config.budget())
            .with_backoff(config.backoff_multiplier, config.max_interval())
    }
}

/// Reads task status
#[derive(Debug, Clone)]
pub struct TaskPoller<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    timeouts: Timeouts,
    retry: RetryPolicy,
    credential: Option<Credential>,
}

impl<T: Transport> TaskPoller<T> {
    pub fn new(transport: T, config: &DreamConfig) -> Self {
        Self {
            transport,
            endpoints: config.endpoints.clone(),
            timeouts: config.timeouts.clone(),
            retry: RetryPolicy::from(&config.retry),
            credential: None,
        }
    }

    /// Send this credential's bearer with status checks
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Fetch one status snapshot
    ///
    /// A non-2xx status or an unparseable body is a [`DreamError::TaskFailed`];
    /// transport failures are [`DreamError::Network`].
    pub async fn poll(&self, task_id: &str) -> Result<Task> {
        let url = self.endpoints.task_url(task_id);
        let request = HttpRequest::get(&url)
            .headers(headers::check_headers(self.credential.as_ref()))
            .timeout(self.timeouts.check());

        let response = with_retries(self.retry, "status check", || {
            self.transport.execute(request.clone())
        })
        .await?;

        if !response.is_success() {
            return Err(DreamError::TaskFailed {
                task_id: task_id.to_string(),
                reason: format!("status check returned {}: {}", response.status, response.snippet()),
            });
        }

        response.json::<Task>().map_err(|e| DreamError::TaskFailed {
            task_id: task_id.to_string(),
            reason: format!("malformed status response: {}", e),
        })
    }

    /// Poll until the task finishes, fails, or `options.budget` runs out
    pub async fn poll_until_done(&self, task_id: &str, options: PollOptions) -> Result<Task> {
        self.poll_until_done_with_cancel(task_id, options, &CancellationToken::new())
            .await
    }

    /// [`poll_until_done`](Self::poll_until_done) that also stops when `cancel` fires
    #[instrument(skip(self, options, cancel), fields(budget = ?options.budget, interval = ?options.interval))]
    pub async fn poll_until_done_with_cancel(
        &self,
        task_id: &str,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<Task> {
        if options.interval.is_zero() {
            return Err(DreamError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let deadline = Instant::now().checked_add(options.budget);
        if deadline.is_none() {
            debug!("Budget {:?} has no representable deadline, polling unbounded", options.budget);
        }
        let mut state = TaskState::Created;
        let mut delay = options.interval;
        let mut polls: u32 = 0;
        let mut frames_seen = 0usize;

        loop {
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                state = transition(state, TaskEvent::BudgetExhausted);
                debug!("Task {} -> {:?} after {} polls", task_id, state, polls);
                return Err(DreamError::Timeout {
                    task_id: task_id.to_string(),
                    budget: options.budget,
                    polls,
                });
            }

            let sleep_for = match deadline {
                Some(deadline) => delay.min(deadline - now),
                None => delay,
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(DreamError::Cancelled(format!(
                        "polling task {} stopped after {} polls",
                        task_id, polls
                    )));
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }

            polls += 1;
            let task = match self.poll(task_id).await {
                Ok(task) => task,
                Err(DreamError::TaskFailed { task_id, reason }) => {
                    state = transition(
                        state,
                        TaskEvent::Malformed {
                            reason: reason.clone(),
                        },
                    );
                    debug!("Task {} -> {:?}", task_id, state);
                    return Err(DreamError::TaskFailed { task_id, reason });
                }
                Err(e) => return Err(e),
            };

            let frames = task.photo_url_list.len();
            if frames < frames_seen {
                warn!(
                    "Task {} frame list shrank from {} to {}",
                    task_id, frames_seen, frames
                );
            }
            frames_seen = frames;

            state = transition(
                state,
                TaskEvent::StatusReceived {
                    state: task.state,
                    frames,
                },
            );

            match state {
                TaskState::Completed => {
                    info!("Task {} completed after {} polls ({} frames)", task_id, polls, frames);
                    return Ok(task);
                }
                TaskState::Failed { reason } => {
                    return Err(DreamError::TaskFailed {
                        task_id: task_id.to_string(),
                        reason,
                    });
                }
                _ => {
                    debug!(
                        "Task {} still {} (poll {}, {} frames)",
                        task_id, task.state, polls, frames
                    );
                }
            }

            delay = options.next_delay(delay);
        }
    }
}
