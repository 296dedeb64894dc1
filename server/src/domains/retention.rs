//! Background retention sweep for old domain settings versions.
//!
//! Spawns a tokio task that periodically deletes versions older than the
//! retention window. The newest version in the store always survives (or
//! the newest of each user, depending on [`RetentionScope`]).
//!
//! The task checks its cancellation token only between cycles: a sweep
//! that has started runs to completion before the task stops.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domains::store::{BlobStore, RetentionScope};

/// Settings for the retention task.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Versions older than this are eligible for deletion.
    pub retention: chrono::Duration,
    /// Time between sweeps. The first sweep runs immediately.
    pub interval: Duration,
    pub scope: RetentionScope,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retention: chrono::Duration::days(90),
            interval: Duration::from_secs(12 * 60 * 60),
            scope: RetentionScope::Global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Sweeping,
    Stopped,
}

/// Result of one sweep cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Deleted(usize),
    Failed(String),
}

/// Snapshot of the sweeper published after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepStatus {
    pub state: SweepState,
    /// Number of completed cycles, successful or not.
    pub cycles: u64,
    pub last_outcome: Option<SweepOutcome>,
}

/// Run a single sweep with cutoff = now - retention, and log the outcome.
pub async fn sweep_once(store: &BlobStore, config: &SweepConfig) -> SweepOutcome {
    let Some(cutoff) = Utc::now().checked_sub_signed(config.retention) else {
        tracing::error!(
            "Retention sweep error: window of {} days is out of range",
            config.retention.num_days()
        );
        return SweepOutcome::Failed("retention window out of range".to_string());
    };
    let scope = config.scope;
    let store = store.clone();

    let outcome = match tokio::task::spawn_blocking(move || store.sweep(cutoff, scope)).await {
        Ok(Ok(count)) => SweepOutcome::Deleted(count),
        Ok(Err(e)) => SweepOutcome::Failed(e.to_string()),
        Err(e) => SweepOutcome::Failed(format!("Task join error: {}", e)),
    };

    match &outcome {
        SweepOutcome::Deleted(0) => {
            tracing::debug!("Retention sweep: nothing older than {}", cutoff);
        }
        SweepOutcome::Deleted(count) => {
            tracing::info!("Retention sweep: purged {} versions older than {}", count, cutoff);
        }
        SweepOutcome::Failed(e) => {
            tracing::error!("Retention sweep error: {}", e);
        }
    }

    outcome
}

/// Handle to the running retention task.
pub struct RetentionSweeper {
    cancel: CancellationToken,
    status: watch::Receiver<SweepStatus>,
    handle: JoinHandle<()>,
}

impl RetentionSweeper {
    /// Spawn the retention loop on the current tokio runtime.
    pub fn spawn(store: BlobStore, config: SweepConfig) -> Self {
        let cancel = CancellationToken::new();
        let (status_tx, status) = watch::channel(SweepStatus {
            state: SweepState::Idle,
            cycles: 0,
            last_outcome: None,
        });

        let handle = tokio::spawn(run_sweep_loop(store, config, cancel.clone(), status_tx));

        Self {
            cancel,
            status,
            handle,
        }
    }

    /// Current status of the task.
    pub fn status(&self) -> SweepStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<SweepStatus> {
        self.status.clone()
    }

    /// Signal the task to stop and wait for it. An in-flight sweep finishes first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Retention task join error: {}", e);
        }
    }
}

async fn run_sweep_loop(
    store: BlobStore,
    config: SweepConfig,
    cancel: CancellationToken,
    status: watch::Sender<SweepStatus>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        retention_days = config.retention.num_days(),
        interval_secs = config.interval.as_secs(),
        scope = ?config.scope,
        "Retention task started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        status.send_modify(|s| s.state = SweepState::Sweeping);
        let outcome = sweep_once(&store, &config).await;
        status.send_modify(|s| {
            s.state = SweepState::Idle;
            s.cycles += 1;
            s.last_outcome = Some(outcome);
        });
    }

    status.send_modify(|s| s.state = SweepState::Stopped);
    tracing::info!("Retention task stopped");
}
