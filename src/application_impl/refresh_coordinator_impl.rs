//! Single-flight credential refresh.
//!
//! At most one exchange with the credential-issuing endpoint is outstanding at
//! any time. The first caller to find no cycle in flight starts one; everyone
//! arriving while it runs is parked as a waiter. When the cycle resolves,
//! `in_progress` drops and all waiters are drained under the same lock, so no
//! waiter can straddle two cycles and every waiter of a cycle sees the same
//! outcome.
//!
//! The exchange runs on its own task. A caller that goes away just drops its
//! receiver; the cycle carries on for everyone else.

use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

type RefreshOutcome = Result<AccessToken, RefreshError>;

#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    started: u64,
    completed: u64,
}

enum Admission {
    Started(u64),
    Joined,
    Recheck,
}

struct Inner {
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn RefreshExchange>,
    observer: Arc<dyn SessionObserver>,
    timeout: Option<Duration>,
    state: Mutex<RefreshState>,
}

pub struct SingleFlightRefreshCoordinator {
    inner: Arc<Inner>,
}

impl SingleFlightRefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn RefreshExchange>,
        observer: Arc<dyn SessionObserver>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                exchange,
                observer,
                timeout,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    /// Callers currently parked on the cycle in flight, the starter included.
    pub fn pending_waiters(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.inner.state.lock().started
    }

    /// A newer, still usable credential than the one the caller holds means a
    /// cycle already finished after the caller's request went out.
    async fn already_refreshed(&self, current: Option<&AccessToken>) -> Option<AccessToken> {
        let current = current?;
        match self.inner.store.current().await {
            Ok(Some(stored))
                if &stored.access_token != current && !self.inner.store.is_stale(&stored) =>
            {
                Some(stored.access_token)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "could not read credential before refresh");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl RefreshCoordinator for SingleFlightRefreshCoordinator {
    async fn ensure_fresh_credential(
        &self,
        current: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshError> {
        let mut seen = self.inner.state.lock().completed;
        loop {
            if let Some(token) = self.already_refreshed(current).await {
                debug!("credential already refreshed by an earlier cycle");
                return Ok(token);
            }

            let (tx, rx) = oneshot::channel();
            let admission = {
                let mut state = self.inner.state.lock();
                if state.in_progress {
                    state.waiters.push(tx);
                    Admission::Joined
                } else if state.completed != seen {
                    // a cycle finished after the store was read
                    seen = state.completed;
                    Admission::Recheck
                } else {
                    state.in_progress = true;
                    state.started += 1;
                    state.waiters.push(tx);
                    Admission::Started(state.started)
                }
            };

            match admission {
                Admission::Recheck => continue,
                Admission::Started(cycle) => {
                    info!(cycle, "starting credential refresh");
                    tokio::spawn(self.inner.clone().run_cycle(cycle));
                }
                Admission::Joined => debug!("joining credential refresh in flight"),
            }

            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }
    }

    fn is_refreshing(&self) -> bool {
        self.inner.state.lock().in_progress
    }
}

impl Inner {
    async fn run_cycle(self: Arc<Self>, cycle: u64) {
        let mut guard = CycleGuard {
            inner: self.as_ref(),
            finished: false,
        };

        let outcome = self.exchange_once().await;
        match &outcome {
            Ok(_) => info!(cycle, "credential refreshed"),
            Err(e) => {
                warn!(cycle, error = %e, "credential refresh failed, ending session");
                if let Err(clear_err) = self.store.clear().await {
                    error!(cycle, error = %clear_err, "could not clear credential");
                }
                self.observer.session_ended(e);
            }
        }

        let released = self.release(&outcome);
        guard.finished = true;
        debug!(cycle, released, "refresh waiters released");
    }

    async fn exchange_once(&self) -> RefreshOutcome {
        let refresh_token = self
            .store
            .refresh_token()
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))?
            .ok_or(RefreshError::NoRefreshToken)?;

        let exchange = self.exchange.exchange(&refresh_token);
        let pair = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| RefreshError::Timeout)??,
            None => exchange.await?,
        };

        let stored = self
            .store
            .set(pair)
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))?;
        Ok(stored.access_token)
    }

    /// Close the cycle and hand `outcome` to every waiter in one step.
    fn release(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            state.in_progress = false;
            state.completed += 1;
            std::mem::take(&mut state.waiters)
        };
        let count = waiters.len();
        for waiter in waiters {
            // receiver gone means the caller stopped waiting
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Reopens the coordinator if a cycle task dies before releasing its waiters.
struct CycleGuard<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            error!("credential refresh cycle aborted");
            self.inner.release(&Err(RefreshError::Abandoned));
        }
    }
}
