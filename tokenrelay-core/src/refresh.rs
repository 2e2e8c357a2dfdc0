//! Single-flight refresh state.
//!
//! [`RefreshCoordinator`] owns the "refresh in flight" flag and the FIFO
//! queue of callers waiting on it. The first caller to [`join`] an idle
//! coordinator becomes the leader and receives a [`LeaderTicket`]; everyone
//! else gets a [`Waiter`] that completes when the leader settles.
//!
//! Electing a leader and settling an episode each happen under one lock
//! with no `.await` inside, so a caller that arrives just after a settle
//! always starts a new episode instead of joining a queue nobody will drain.
//!
//! [`join`]: RefreshCoordinator::join

use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::credential::AccessCredential;

/// Uniform failure of a refresh episode, shared by every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// The identity endpoint refused or could not be reached.
    #[error("{message}")]
    Failed { message: String },

    /// The leader went away before settling; the session state is unknown.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

impl RefreshFailure {
    pub fn new(message: impl Into<String>) -> Self {
        RefreshFailure::Failed {
            message: message.into(),
        }
    }
}

/// What every participant of an episode receives.
pub type RefreshOutcome = Result<AccessCredential, RefreshFailure>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    episode: u64,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Flag plus waiter queue for credential refresh.
///
/// Construct one per coordinator; nothing here is global.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// The caller's part in a refresh episode.
pub enum Role<'a> {
    /// Perform the refresh and settle the episode.
    Leader(LeaderTicket<'a>),
    /// Wait for the leader's outcome.
    Waiter(Waiter),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the current episode, starting one if none is in flight.
    pub fn join(&self) -> Role<'_> {
        let mut state = self.state.lock();

        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(
                episode = state.episode,
                position = state.waiters.len(),
                "refresh in flight, queued waiter"
            );
            return Role::Waiter(Waiter {
                rx,
                episode: state.episode,
            });
        }

        state.refreshing = true;
        state.episode += 1;
        debug!(episode = state.episode, "starting refresh episode");

        Role::Leader(LeaderTicket {
            coordinator: self,
            episode: state.episode,
            settled: false,
        })
    }

    /// Whether a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Number of callers queued behind the current leader.
    pub fn pending_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Number of episodes started so far.
    pub fn episodes(&self) -> u64 {
        self.state.lock().episode
    }

    /// Close the episode and complete waiters in enqueue order.
    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        let count = waiters.len();
        for tx in waiters {
            // The waiting future may have been dropped; nothing to deliver then.
            let _ = tx.send(outcome.clone());
        }
        count
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("episode", &state.episode)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Held by the leader while its refresh call is in flight.
///
/// Dropping the ticket without calling [`settle`](LeaderTicket::settle)
/// (e.g. the leader's future was cancelled) fails the episode so queued
/// waiters are released.
pub struct LeaderTicket<'a> {
    coordinator: &'a RefreshCoordinator,
    episode: u64,
    settled: bool,
}

impl LeaderTicket<'_> {
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Publish the outcome to every waiter and return to idle.
    ///
    /// Returns the number of waiters that were released.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for LeaderTicket<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(episode = self.episode, "refresh leader dropped, failing episode");
            self.coordinator.settle(Err(RefreshFailure::Abandoned));
        }
    }
}

/// A caller suspended until the leader settles.
pub struct Waiter {
    rx: oneshot::Receiver<RefreshOutcome>,
    episode: u64,
}

impl Waiter {
    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub async fn wait(self) -> RefreshOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RefreshFailure::Abandoned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(role: Role<'_>) -> LeaderTicket<'_> {
        match role {
            Role::Leader(ticket) => ticket,
            Role::Waiter(_) => panic!("expected leader"),
        }
    }

    fn waiter(role: Role<'_>) -> Waiter {
        match role {
            Role::Waiter(w) => w,
            Role::Leader(_) => panic!("expected waiter"),
        }
    }

    #[tokio::test]
    async fn test_first_caller_leads() {
        let refresh = RefreshCoordinator::new();
        assert!(!refresh.is_refreshing());

        let ticket = leader(refresh.join());
        assert!(refresh.is_refreshing());
        assert_eq!(ticket.episode(), 1);

        let w = waiter(refresh.join());
        assert_eq!(w.episode(), 1);
        assert_eq!(refresh.pending_waiters(), 1);

        assert_eq!(ticket.settle(Ok(AccessCredential::new("t2"))), 1);
        assert!(!refresh.is_refreshing());
        assert_eq!(refresh.pending_waiters(), 0);
        assert_eq!(w.wait().await.unwrap(), AccessCredential::new("t2"));
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let refresh = RefreshCoordinator::new();
        let ticket = leader(refresh.join());
        let a = waiter(refresh.join());
        let b = waiter(refresh.join());

        ticket.settle(Err(RefreshFailure::new("session expired")));

        let expected = RefreshFailure::new("session expired");
        assert_eq!(a.wait().await.unwrap_err(), expected);
        assert_eq!(b.wait().await.unwrap_err(), expected);
    }

    #[tokio::test]
    async fn test_settled_episode_is_not_rejoined() {
        let refresh = RefreshCoordinator::new();
        leader(refresh.join()).settle(Ok(AccessCredential::new("t2")));

        let next = leader(refresh.join());
        assert_eq!(next.episode(), 2);
        assert_eq!(refresh.episodes(), 2);
        next.settle(Ok(AccessCredential::new("t3")));
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let refresh = RefreshCoordinator::new();
        let ticket = leader(refresh.join());
        let w = waiter(refresh.join());

        drop(ticket);

        assert!(!refresh.is_refreshing());
        assert_eq!(w.wait().await.unwrap_err(), RefreshFailure::Abandoned);
    }

    #[tokio::test]
    async fn test_all_waiters_share_one_credential() {
        let refresh = RefreshCoordinator::new();
        let ticket = leader(refresh.join());
        let waiters: Vec<Waiter> = (0..3).map(|_| waiter(refresh.join())).collect();

        ticket.settle(Ok(AccessCredential::new("t2")));

        for w in waiters {
            assert_eq!(w.wait().await.unwrap().expose(), "t2");
        }
    }
}
