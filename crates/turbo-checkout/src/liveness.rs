//! Background backend liveness polling.
//!
//! The probe only feeds [`BackendStatus`]; cart and checkout operations never
//! wait on it and make their own fallback decisions per call.

use crate::config::LivenessConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use turbo_data::FetchClient;

/// Last known reachability of the storefront backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// No probe has completed yet.
    Unknown,
    Reachable,
    Unreachable,
}

/// Shared, observable backend reachability.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    tx: Arc<watch::Sender<Reachability>>,
}

impl BackendStatus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Reachability::Unknown);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Reachability {
        *self.tx.borrow()
    }

    pub fn is_reachable(&self) -> bool {
        self.current() == Reachability::Reachable
    }

    /// Record a probe result, logging transitions.
    pub fn set(&self, reachability: Reachability) {
        let previous = self.tx.send_replace(reachability);
        if previous != reachability {
            match reachability {
                Reachability::Unreachable => warn!("Storefront backend unreachable"),
                Reachability::Reachable => info!("Storefront backend reachable"),
                Reachability::Unknown => {}
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.tx.subscribe()
    }
}

impl Default for BackendStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the backend health endpoint.
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    client: FetchClient,
    path: String,
    interval: Duration,
    timeout: Duration,
    status: BackendStatus,
}

impl LivenessProbe {
    pub fn new(client: FetchClient, config: &LivenessConfig, status: BackendStatus) -> Self {
        Self {
            client,
            path: config.path.clone(),
            interval: config.interval(),
            timeout: config.timeout(),
            status,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn status(&self) -> &BackendStatus {
        &self.status
    }

    /// Probe once. Any response other than 2xx within the timeout counts as
    /// unreachable.
    pub async fn check_once(&self) -> Reachability {
        let reachability =
            match tokio::time::timeout(self.timeout, self.client.get(&self.path).send()).await {
                Ok(Ok(response)) if response.is_success() => Reachability::Reachable,
                Ok(Ok(response)) => {
                    debug!(status = response.status, "Liveness probe got error status");
                    Reachability::Unreachable
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "Liveness probe failed");
                    Reachability::Unreachable
                }
                Err(_) => {
                    debug!(timeout_ms = self.timeout.as_millis() as u64, "Liveness probe timed out");
                    Reachability::Unreachable
                }
            };
        self.status.set(reachability);
        reachability
    }

    /// Poll on the configured interval until the handle is stopped.
    pub fn spawn(self) -> LivenessHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.check_once().await;
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("Liveness probe stopped");
        });
        LivenessHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Running liveness poller.
#[derive(Debug)]
pub struct LivenessHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LivenessHandle {
    /// Stop polling and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
