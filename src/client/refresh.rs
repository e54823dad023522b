//! Single-flight coordination for token refresh.
//!
//! The first request that needs a refresh becomes the leader; every request
//! that fails while the leader is refreshing parks a oneshot sender in the
//! queue. The flag and the queue share one `std::sync::Mutex` that is never
//! held across an await.

use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    Refreshed(String),
    Failed,
    Cancelled,
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    pending: Vec<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    state: Mutex<RefreshState>,
}

pub(crate) enum Role<'a> {
    /// Credentials changed since the request was sent; retry without refreshing.
    Stale,
    Leader(LeaderGuard<'a>),
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

impl SingleFlight {
    /// Decide how a request that got a 401 proceeds.
    ///
    /// `is_stale` runs inside the critical section, so a leader that stored
    /// new tokens before settling is always observed.
    pub(crate) fn join(&self, is_stale: impl FnOnce() -> bool) -> Role<'_> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.pending.push(tx);
            return Role::Waiter(rx);
        }
        if is_stale() {
            return Role::Stale;
        }
        state.in_flight = true;
        Role::Leader(LeaderGuard {
            flight: self,
            settled: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
    }

    fn settle(&self, outcome: &RefreshOutcome) {
        let pending = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight = false;
            std::mem::take(&mut state.pending)
        };
        for waiter in pending {
            // receiver may have been dropped with its request
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Held by the refreshing request. Dropping it unsettled rejects the queue.
pub(crate) struct LeaderGuard<'a> {
    flight: &'a SingleFlight,
    settled: bool,
}

impl LeaderGuard<'_> {
    pub(crate) fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.flight.settle(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.flight.settle(&RefreshOutcome::Cancelled);
        }
    }
}

/// Wait for the leader, treating a vanished sender as a cancelled refresh.
pub(crate) async fn wait(receiver: oneshot::Receiver<RefreshOutcome>) -> RefreshOutcome {
    receiver.await.unwrap_or(RefreshOutcome::Cancelled)
}
