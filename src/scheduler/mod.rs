// Scheduler / Run Manager (C11, spec §4.11): a table of
// `{connector_id, schedule_expression, next_fire}` plus a worker pool.
// Runs are tracked in-memory for cooperative Stop signaling and persisted
// through the Index Store for history/status queries.

mod interval;

use crate::connectors::sync_connector;
use crate::enrichment::IdfModel;
use crate::index_store::IndexStore;
use crate::types::{Run, RunStatus, WebhookSubscription};
use crate::webhooks::{connector_run_event, WebhookSink};
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub use interval::parse_schedule_expression;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("connector {0} already has a run in flight")]
    AlreadyRunning(Uuid),
    #[error("unknown connector {0}")]
    UnknownConnector(Uuid),
}

struct ActiveRun {
    run_id: Uuid,
    stop_tx: watch::Sender<bool>,
}

/// Holds the set of in-flight runs and the webhook sink they report
/// through. Cheap to clone: everything inside is `Arc`/`DashMap`.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<IndexStore>,
    webhooks: Arc<WebhookSink>,
    subscriptions: Arc<DashMap<Uuid, WebhookSubscription>>,
    idf: Arc<IdfModel>,
    active: Arc<DashMap<Uuid, ActiveRun>>,
    next_fire: Arc<DashMap<Uuid, chrono::DateTime<chrono::Utc>>>,
}

impl Scheduler {
    /// `subscriptions` is the same map backing the `/api/webhooks` CRUD
    /// surface, shared so a run's `connector.run.*` events reach whatever
    /// is registered through the HTTP API.
    pub fn new(store: Arc<IndexStore>, idf: Arc<IdfModel>, subscriptions: Arc<DashMap<Uuid, WebhookSubscription>>) -> Self {
        Self {
            store,
            webhooks: Arc::new(WebhookSink::new()),
            subscriptions,
            idf,
            active: Arc::new(DashMap::new()),
            next_fire: Arc::new(DashMap::new()),
        }
    }

    /// Crash recovery at process start (spec §4.11): any run left `running`
    /// from a prior process is marked `failed` with reason `"crash"`.
    pub async fn recover_from_crash(&self) -> Result<()> {
        let recovered = self.store.fail_orphaned_running_runs().await?;
        if recovered > 0 {
            warn!(count = recovered, "marked orphaned runs as crashed");
        }
        Ok(())
    }

    /// `Trigger(connector_id)`: enqueue a run immediately, rejecting with
    /// `AlreadyRunning` if one is in flight.
    #[instrument(skip(self))]
    pub async fn trigger(&self, connector_id: Uuid) -> Result<Uuid, SchedulerError> {
        if self.active.contains_key(&connector_id) {
            return Err(SchedulerError::AlreadyRunning(connector_id));
        }
        let connector = self
            .store
            .get_connector(connector_id)
            .await
            .map_err(|_| SchedulerError::UnknownConnector(connector_id))?
            .ok_or(SchedulerError::UnknownConnector(connector_id))?;

        let run = Run::new(connector_id);
        let run_id = run.id;
        let (stop_tx, stop_rx) = watch::channel(false);
        self.active.insert(connector_id, ActiveRun { run_id, stop_tx });

        let this = self.clone();
        tokio::spawn(async move {
            this.execute(connector, run, stop_rx).await;
        });

        Ok(run_id)
    }

    async fn execute(&self, connector: crate::types::Connector, mut run: Run, stop_rx: watch::Receiver<bool>) {
        let _ = self.store.save_run(&run).await;
        let (event, payload) = connector_run_event("started", connector.id, run.id);
        self.notify(&event, payload).await;

        let outcome = sync_connector(&connector, &self.store, &mut run, &stop_rx, &self.idf).await;

        let status = match outcome {
            Ok(()) if *stop_rx.borrow() => RunStatus::Stopped,
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                error!(connector_id = %connector.id, error = %e, "connector run failed");
                run.error_message = Some(e.to_string());
                RunStatus::Failed
            }
        };
        run.finish(status);

        if let Err(e) = self.store.save_run(&run).await {
            error!(run_id = %run.id, error = %e, "failed to persist run result");
        }
        if let Err(e) = self.store.record_connector_run_result(connector.id, status).await {
            error!(connector_id = %connector.id, error = %e, "failed to persist connector last-run status");
        }

        let kind = match status {
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "completed",
            _ => "failed",
        };
        let (event, payload) = connector_run_event(kind, connector.id, run.id);
        self.notify(&event, payload).await;

        self.active.remove(&connector.id);
    }

    async fn notify(&self, event: &str, payload: serde_json::Value) {
        let subs: Vec<WebhookSubscription> = self.subscriptions.iter().map(|e| e.value().clone()).collect();
        if !subs.is_empty() {
            self.webhooks.deliver(&subs, event, payload).await;
        }
    }

    /// `Stop(connector_id)`: cooperative cancellation of the active run.
    pub fn stop(&self, connector_id: Uuid) -> bool {
        if let Some(active) = self.active.get(&connector_id) {
            let _ = active.stop_tx.send(true);
            true
        } else {
            false
        }
    }

    pub fn is_running(&self, connector_id: Uuid) -> bool {
        self.active.contains_key(&connector_id)
    }

    /// Periodic 1s tick (spec §4.11): fires any due schedules.
    pub async fn tick(&self) {
        let connectors = match self.store.list_connectors().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to list connectors for scheduler tick");
                return;
            }
        };
        let now = chrono::Utc::now();
        for connector in connectors {
            if !connector.is_active || self.is_running(connector.id) {
                continue;
            }
            let Some(expr) = &connector.schedule_expression else { continue };
            let Ok(interval) = parse_schedule_expression(expr) else { continue };

            let due = match self.next_fire.get(&connector.id) {
                Some(next) => *next <= now,
                None => true,
            };
            if due {
                self.next_fire.insert(connector.id, now + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::seconds(60)));
                if let Err(e) = self.trigger(connector.id).await {
                    if !matches!(e, SchedulerError::AlreadyRunning(_)) {
                        warn!(connector_id = %connector.id, error = %e, "scheduled trigger failed");
                    }
                }
            }
        }
    }

    /// Spawns the 1s tick loop; returns a handle the caller can abort at
    /// shutdown.
    pub fn spawn_tick_loop(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }

    pub async fn status(&self, connector_id: Uuid) -> Result<Option<Run>> {
        if let Some(active) = self.active.get(&connector_id) {
            return self.store.get_run(active.run_id).await;
        }
        let runs = self.store.list_runs_for_connector(connector_id, 1).await?;
        Ok(runs.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_is_a_conflict_not_a_panic() {
        let err = SchedulerError::AlreadyRunning(Uuid::nil());
        assert!(err.to_string().contains("already has a run in flight"));
    }
}
