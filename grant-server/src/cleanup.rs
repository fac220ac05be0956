use crate::client::Client;
use crate::config::ExtraSweepConfig;
use crate::grant::GrantError;
use crate::state::AppState;
use crate::store::{Filter, StoreError, SweepReport};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use sweeper::{PeriodicTask, TaskError};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Cleanup failed for: {}", .stores.join(", "))]
pub struct CleanupError {
    pub stores: Vec<String>,
}

/// Outcome of one cleanup run, one sweep report per store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub stores: Vec<(String, SweepReport)>,
    /// Stores whose sweep could not run to completion
    pub failed_stores: Vec<String>,
}

impl CleanupReport {
    pub fn store(&self, name: &str) -> Option<SweepReport> {
        self.stores
            .iter()
            .find(|(store, _)| store == name)
            .map(|(_, report)| *report)
    }

    pub fn removed(&self) -> usize {
        self.stores.iter().map(|(_, report)| report.removed).sum()
    }

    fn record(&mut self, store: &str, result: Result<SweepReport, StoreError>) {
        match result {
            Ok(report) => {
                debug!(
                    "Cleanup of {} removed {} entries ({} failed)",
                    store, report.removed, report.failed
                );
                self.stores.push((store.to_string(), report));
            }
            Err(e) => {
                error!("Failed to clean up {}: {}", store, e);
                self.failed_stores.push(store.to_string());
            }
        }
    }
}

/// Sweeps expired grants, clients, tickets and tokens across every store.
///
/// At most one sweep runs at a time; a trigger arriving while one is in flight is dropped.
#[derive(Debug)]
pub struct CleanupCoordinator {
    state: AppState,
    batch_size: usize,
    extra_sweeps: Vec<ExtraSweepConfig>,
    processing: AtomicBool,
}

/// Clears the in-flight flag when the sweep ends, panics included
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CleanupCoordinator {
    pub fn new(state: AppState) -> Self {
        let batch_size = state.settings.cleanup.batch_size;
        let extra_sweeps = state.settings.cleanup.extra_sweeps.clone();
        Self {
            state,
            batch_size,
            extra_sweeps,
            processing: AtomicBool::new(false),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Runs one sweep now, `None` if another one is still in flight
    pub async fn process(&self) -> Option<CleanupReport> {
        self.process_at(Utc::now()).await
    }

    pub async fn process_at(&self, now: DateTime<Utc>) -> Option<CleanupReport> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Cleanup already in progress, skipping");
            return None;
        }
        let _guard = ProcessingGuard(&self.processing);

        let batch = self.batch_size;
        let mut report = CleanupReport::default();
        report.record("grants", self.state.grant_service.clean_up(now, batch).await);
        report.record("clients", self.remove_clients_with_expired_secret(now).await);
        report.record("uma_rpt", self.state.uma_rpt.clean_up(now, batch).await);
        report.record(
            "uma_permission",
            self.state.uma_permissions.clean_up(now, batch).await,
        );
        report.record("uma_pct", self.state.uma_pct.clean_up(now, batch).await);
        report.record(
            "uma_resource",
            self.state.uma_resources.clean_up(now, batch).await,
        );
        for sweep in &self.extra_sweeps {
            let result = self.run_extra_sweep(sweep, now).await;
            report.record(&sweep.object_class, result);
        }

        info!(
            "Cleanup removed {} entries across {} stores",
            report.removed(),
            report.stores.len()
        );
        Some(report)
    }

    async fn remove_clients_with_expired_secret(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, StoreError> {
        self.state
            .clients
            .sweep_clients_with_expired_secret(now, self.batch_size, move |client: Client| {
                async move { self.remove_client(&client).await }
            })
            .await
    }

    async fn remove_client(&self, client: &Client) -> Result<(), GrantError> {
        let grants = self
            .state
            .grants
            .get_authorization_grants(&client.client_id)
            .await?;
        let removed = self.state.grants.remove_authorization_grants(&grants).await?;
        debug!(
            "Removing client {} with expired secret and {} token entries",
            client.client_id, removed
        );
        self.state.clients.remove(client).await?;
        Ok(())
    }

    async fn run_extra_sweep(
        &self,
        sweep: &ExtraSweepConfig,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, StoreError> {
        let cutoff = now - Duration::seconds(sweep.retention);
        self.state
            .entry_manager
            .remove_matching_class(
                &sweep.base_dn,
                &sweep.object_class,
                &Filter::less_or_equal(&sweep.date_attribute, cutoff),
                self.batch_size,
            )
            .await
    }
}

#[async_trait]
impl PeriodicTask for CleanupCoordinator {
    fn name(&self) -> &str {
        "cleanup"
    }

    async fn run(&self) -> Result<(), TaskError> {
        match self.process().await {
            Some(report) if !report.failed_stores.is_empty() => Err(Box::new(CleanupError {
                stores: report.failed_stores,
            })),
            _ => Ok(()),
        }
    }
}
