//! Single-flight gate for token refresh.
//!
//! The first caller to hit a 401 while the machine is idle gets a
//! [`RefreshLease`] and performs the refresh. Everyone who arrives while
//! that lease is outstanding gets a receiver that resolves, in arrival
//! order, with the lease's outcome. A caller whose token was already
//! replaced while idle is told to retry with the current one. The lock is
//! never held across an await point.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::refresh_fsm::{RefreshMachine, RefreshMachineInput, RefreshMachineState, RefreshState};
use crate::RefreshError;

/// Outcome handed to every queued caller.
pub type RefreshOutcome = Result<String, RefreshError>;

/// What a caller must do after reporting a 401.
pub enum Ticket {
    /// The token was replaced after the request was sent; retry with it.
    Current(String),
    /// Perform the refresh and settle the lease.
    Leader(RefreshLease),
    /// Wait for the in-flight refresh.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

struct CoordinatorInner {
    machine: RefreshMachine,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Tracks the refresh state and the queue of callers waiting on it.
pub struct RefreshCoordinator {
    inner: Mutex<CoordinatorInner>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CoordinatorInner {
                machine: RefreshMachine::new(),
                waiters: VecDeque::new(),
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from(self.inner.lock().machine.state())
    }

    /// Number of callers queued behind the in-flight refresh.
    pub fn queued(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Report a 401 for a request sent with `sent_with`.
    ///
    /// While a refresh is in flight the caller is always enqueued at the
    /// tail. While idle, `current` is read under the lock: a token that
    /// differs from `sent_with` is handed back for a plain retry, otherwise
    /// the caller gets the lease.
    pub fn acquire(
        self: &Arc<Self>,
        sent_with: Option<&str>,
        current: impl FnOnce() -> Option<String>,
    ) -> Ticket {
        let mut inner = self.inner.lock();
        let was_idle = *inner.machine.state() == RefreshMachineState::Idle;

        if was_idle {
            if let Some(token) = current().filter(|token| Some(token.as_str()) != sent_with) {
                debug!("Token changed since dispatch, retrying without refresh");
                return Ticket::Current(token);
            }
        }

        // Unauthorized is accepted in every state.
        let _ = inner.machine.consume(&RefreshMachineInput::Unauthorized);

        if was_idle {
            debug!("Starting token refresh");
            return Ticket::Leader(RefreshLease {
                coordinator: Arc::clone(self),
                settled: false,
            });
        }

        let (tx, rx) = oneshot::channel();
        inner.waiters.push_back(tx);
        debug!(position = inner.waiters.len(), "Queued behind in-flight refresh");
        Ticket::Follower(rx)
    }

    /// Return to idle and resolve every queued caller with `outcome`.
    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let input = if outcome.is_ok() {
            RefreshMachineInput::RefreshSucceeded
        } else {
            RefreshMachineInput::RefreshFailed
        };

        let waiters = {
            let mut inner = self.inner.lock();
            if inner.machine.consume(&input).is_err() {
                warn!("Refresh settled while no refresh was in flight");
            }
            std::mem::take(&mut inner.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            // A receiver dropped by a cancelled caller is skipped.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to perform the in-flight refresh.
///
/// Dropping an unsettled lease fails every queued caller with
/// [`RefreshError::Abandoned`] and returns the coordinator to idle.
pub struct RefreshLease {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshLease {
    /// Resolve queued callers with the new access token. Returns how many
    /// callers were released.
    pub fn succeed(mut self, access_token: &str) -> usize {
        self.settled = true;
        self.coordinator.settle(Ok(access_token.to_string()))
    }

    /// Reject queued callers with `error`. Returns how many were rejected.
    pub fn fail(mut self, error: RefreshError) -> usize {
        self.settled = true;
        self.coordinator.settle(Err(error))
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh leader dropped before settling");
            self.coordinator.settle(Err(RefreshError::Abandoned));
        }
    }
}
