// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resource Monitor - Background task for bucket and provider health
//!
//! Periodically samples registered buckets and storage providers and raises
//! alerts when sizes, usage or per-domain growth cross configured thresholds.
//!
//! The monitor only sees what it was given: `register_buckets` and
//! `register_providers` take a snapshot, and callers re-register after the
//! topology changes. A failing check becomes a `system` alert; nothing the
//! monitor does propagates an error to its host.

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::domain::alert::{Alert, AlertId, AlertLog, AlertSeverity, AlertType};
use crate::domain::bucket::{BucketId, BucketTree};
use crate::domain::events::MemoryEvent;
use crate::domain::storage::StorageProvider;
use crate::infrastructure::event_bus::EventBus;

/// Assumed serialized size of one chunk when estimating bucket size
pub const AVERAGE_CHUNK_SIZE_BYTES: u64 = 5_000;

/// Samples kept per bucket and per provider
pub const HISTORY_SAMPLES: usize = 10;

/// Provider usage above which an alert is always critical
pub const CRITICAL_USAGE_PERCENT: f64 = 95.0;

struct RegisteredBucket {
    id: BucketId,
    name: String,
    domain: String,
}

#[derive(Default)]
struct Registry {
    tree: Option<Arc<RwLock<BucketTree>>>,
    buckets: Vec<RegisteredBucket>,
    providers: Vec<Arc<dyn StorageProvider>>,
}

#[derive(Default)]
struct MonitorState {
    /// Estimated bytes per bucket, oldest first
    bucket_history: HashMap<BucketId, VecDeque<u64>>,
    /// Usage percent per provider id, oldest first
    provider_history: HashMap<String, VecDeque<f64>>,
    alerts: AlertLog,
}

fn push_sample<T>(history: &mut VecDeque<T>, sample: T) {
    if history.len() >= HISTORY_SAMPLES {
        history.pop_front();
    }
    history.push_back(sample);
}

/// Clears the running flag when the loop task ends, including by panic
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ResourceMonitor {
    config: MonitorConfig,
    registry: RwLock<Registry>,
    state: Mutex<MonitorState>,
    event_bus: Option<EventBus>,
    shutdown_token: Mutex<CancellationToken>,
    running: AtomicBool,
}

impl ResourceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
            state: Mutex::new(MonitorState::default()),
            event_bus: None,
            shutdown_token: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Publish raised alerts as `MemoryEvent::AlertRaised`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Snapshot every bucket currently in `tree`
    ///
    /// Replaces the previous bucket registration. Chunk counts are read live
    /// from the tree on each check; buckets created later are not seen until
    /// the next registration.
    pub fn register_buckets(&self, tree: Arc<RwLock<BucketTree>>) {
        let buckets: Vec<RegisteredBucket> = tree
            .read()
            .iter()
            .map(|bucket| RegisteredBucket {
                id: bucket.id,
                name: bucket.name.clone(),
                domain: bucket.domain.clone(),
            })
            .collect();

        info!(buckets = buckets.len(), "Registered buckets for monitoring");

        let mut registry = self.registry.write();
        registry.tree = Some(tree);
        registry.buckets = buckets;
    }

    /// Replace the monitored provider set
    pub fn register_providers(&self, providers: Vec<Arc<dyn StorageProvider>>) {
        info!(providers = providers.len(), "Registered providers for monitoring");
        self.registry.write().providers = providers;
    }

    /// Alerts oldest first; acknowledged ones only when asked for
    pub fn get_alerts(&self, include_acknowledged: bool) -> Vec<Alert> {
        self.state.lock().alerts.list(include_acknowledged)
    }

    pub fn acknowledge_alert(&self, alert_id: AlertId) -> bool {
        let acknowledged = self.state.lock().alerts.acknowledge(alert_id);
        if acknowledged {
            debug!(%alert_id, "Alert acknowledged");
        }
        acknowledged
    }

    pub fn bucket_history(&self, bucket_id: BucketId) -> Vec<u64> {
        self.state
            .lock()
            .bucket_history
            .get(&bucket_id)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn provider_history(&self, provider_id: &str) -> Vec<f64> {
        self.state
            .lock()
            .provider_history
            .get(provider_id)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the periodic check loop
    ///
    /// Returns `None` when monitoring is disabled, the configuration is
    /// invalid, or a loop is already running.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            info!("Resource monitor is disabled");
            return None;
        }
        if let Err(e) = self.config.validate() {
            warn!(error = %e, "Resource monitor not started: invalid configuration");
            return None;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Resource monitor already running");
            return None;
        }

        let token = {
            let mut token = self.shutdown_token.lock();
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
            token.clone()
        };

        Some(tokio::spawn(async move {
            let _running = RunningGuard(&self.running);
            self.run(token).await;
        }))
    }

    /// Signal the loop to stop after its current cycle
    pub fn stop(&self) {
        self.shutdown_token.lock().cancel();
    }

    async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval = ?self.config.interval,
            bucket_size_threshold_bytes = self.config.bucket_size_threshold_bytes,
            provider_usage_threshold_percent = self.config.provider_usage_threshold_percent,
            "Starting resource monitor background task"
        );

        let mut tick = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running resource monitor cycle");
                    let raised = self.run_checks().await;
                    debug!(alerts = raised.len(), "Resource monitor cycle completed");
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping resource monitor");
                    break;
                }
            }
        }

        info!("Resource monitor background task stopped");
    }

    /// Run all three checks once and return the alerts they raised
    ///
    /// A bucket or provider that cannot be sampled yields a `system` alert
    /// naming it; the remaining buckets and providers are still checked.
    pub async fn run_checks(&self) -> Vec<Alert> {
        let mut raised = self.check_bucket_sizes();
        raised.extend(self.check_provider_capacity().await);
        raised.extend(self.check_domain_growth());

        for alert in &raised {
            self.record(alert.clone());
        }
        raised
    }

    fn record(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Critical => error!(alert_type = ?alert.alert_type, message = %alert.message, "Resource alert"),
            AlertSeverity::Warning => warn!(alert_type = ?alert.alert_type, message = %alert.message, "Resource alert"),
            AlertSeverity::Info => info!(alert_type = ?alert.alert_type, message = %alert.message, "Resource alert"),
        }

        self.state.lock().alerts.push(alert.clone());

        if let Some(bus) = &self.event_bus {
            bus.publish(MemoryEvent::AlertRaised { alert });
        }
    }

    /// `subject_key`/`subject` identify the bucket or provider that failed
    fn system_alert(check: &str, subject_key: &str, subject: &str, err: impl std::fmt::Display) -> Alert {
        Alert::new(
            AlertType::System,
            AlertSeverity::Warning,
            format!("Monitoring check '{}' failed for '{}': {}", check, subject, err),
            json!({
                "check": check,
                subject_key: subject,
                "error": err.to_string(),
            }),
        )
    }

    fn check_bucket_sizes(&self) -> Vec<Alert> {
        let registry = self.registry.read();
        let Some(tree) = registry.tree.as_ref() else {
            return Vec::new();
        };

        let mut alerts = Vec::new();
        let mut samples = Vec::with_capacity(registry.buckets.len());
        {
            let tree = tree.read();
            for bucket in &registry.buckets {
                match tree.get(bucket.id) {
                    Ok(node) => samples.push((bucket, node.local_chunk_count())),
                    Err(e) => alerts.push(Self::system_alert(
                        "bucket-size",
                        "bucket_id",
                        &bucket.id.to_string(),
                        e,
                    )),
                }
            }
        }

        let threshold = self.config.bucket_size_threshold_bytes;
        let mut state = self.state.lock();

        for (bucket, count) in samples {
            let estimated = count as u64 * AVERAGE_CHUNK_SIZE_BYTES;
            push_sample(state.bucket_history.entry(bucket.id).or_default(), estimated);

            let severity = if estimated > threshold.saturating_mul(2) {
                AlertSeverity::Critical
            } else if estimated > threshold {
                AlertSeverity::Warning
            } else {
                continue;
            };

            alerts.push(Alert::new(
                AlertType::BucketSize,
                severity,
                format!(
                    "Bucket '{}' is estimated at {} bytes (threshold {})",
                    bucket.name, estimated, threshold
                ),
                json!({
                    "bucket_id": bucket.id,
                    "bucket_name": bucket.name,
                    "domain": bucket.domain,
                    "chunk_count": count,
                    "estimated_bytes": estimated,
                    "threshold_bytes": threshold,
                }),
            ));
        }

        alerts
    }

    async fn check_provider_capacity(&self) -> Vec<Alert> {
        let providers = self.registry.read().providers.clone();
        let threshold = self.config.provider_usage_threshold_percent;
        let mut alerts = Vec::new();

        for provider in providers {
            if !provider.is_connected() {
                continue;
            }

            let quota = match provider.get_quota().await {
                Ok(quota) => quota,
                Err(e) => {
                    alerts.push(Self::system_alert(
                        "provider-capacity",
                        "provider_id",
                        provider.id(),
                        e,
                    ));
                    continue;
                }
            };
            let Some(usage) = quota.usage_percent() else {
                continue;
            };

            push_sample(
                self.state
                    .lock()
                    .provider_history
                    .entry(provider.id().to_string())
                    .or_default(),
                usage,
            );

            let severity = if usage > CRITICAL_USAGE_PERCENT {
                AlertSeverity::Critical
            } else if usage > threshold {
                AlertSeverity::Warning
            } else {
                continue;
            };

            alerts.push(Alert::new(
                AlertType::ProviderCapacity,
                severity,
                format!("Storage provider '{}' is {:.1}% full", provider.name(), usage),
                json!({
                    "provider_id": provider.id(),
                    "tier": provider.tier(),
                    "used_bytes": quota.used,
                    "total_bytes": quota.total,
                    "usage_percent": usage,
                    "threshold_percent": threshold,
                }),
            ));
        }

        alerts
    }

    /// Compare each domain's latest sample total with the previous one
    ///
    /// Buckets with fewer than two samples contribute to neither side.
    fn check_domain_growth(&self) -> Vec<Alert> {
        let registry = self.registry.read();
        let state = self.state.lock();

        let mut totals: Vec<(&str, u64, u64)> = Vec::new();
        for bucket in &registry.buckets {
            let Some(history) = state.bucket_history.get(&bucket.id) else {
                continue;
            };
            if history.len() < 2 {
                continue;
            }
            let current = history[history.len() - 1];
            let previous = history[history.len() - 2];

            match totals.iter_mut().find(|(domain, _, _)| *domain == bucket.domain) {
                Some(entry) => {
                    entry.1 += current;
                    entry.2 += previous;
                }
                None => totals.push((bucket.domain.as_str(), current, previous)),
            }
        }

        let threshold = self.config.domain_growth_threshold_percent;
        let mut alerts = Vec::new();

        for (domain, current, previous) in totals {
            if previous == 0 {
                continue;
            }
            let growth = (current as f64 - previous as f64) / previous as f64 * 100.0;

            let severity = if growth > threshold * 2.0 {
                AlertSeverity::Warning
            } else if growth > threshold {
                AlertSeverity::Info
            } else {
                continue;
            };

            alerts.push(Alert::new(
                AlertType::DomainGrowth,
                severity,
                format!("Domain '{}' grew {:.1}% since the previous check", domain, growth),
                json!({
                    "domain": domain,
                    "current_bytes": current,
                    "previous_bytes": previous,
                    "growth_percent": growth,
                    "threshold_percent": threshold,
                }),
            ));
        }

        alerts
    }
}
