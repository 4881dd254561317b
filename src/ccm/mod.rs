//! Continuous control monitoring automation.
//!
//! A supervisor owns one health-check loop per registered connector and one
//! evaluation loop per enabled rule. Loops are independent background tasks:
//! registration returns immediately, and every loop can be enumerated,
//! paused (rules), cancelled, or shut down as a group. A connector marked
//! `Error` causes its dependent rule loops to skip their cycle; the status is
//! re-read from the shared registry on every tick, not captured at startup.

pub mod connector;
pub mod rule;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CcmConfig;
use crate::errors::NotifyError;
use connector::{ConnectorClient, ConnectorDescriptor, ConnectorEntry, ConnectorStatus};
use rule::{aggregate, evaluate, AlertLevel, MonitorRule, RuleEvaluation};

/// Alert raised when a rule evaluation breaches its thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcmAlert {
    pub id: String,
    pub rule_id: String,
    pub control_id: String,
    pub level: AlertLevel,
    pub value: f64,
    pub anomaly_score: f64,
    pub message_en: String,
    pub message_ar: String,
    pub raised_at: DateTime<Utc>,
}

impl CcmAlert {
    fn from_evaluation(rule: &MonitorRule, eval: &RuleEvaluation) -> Self {
        let level = match eval.level {
            AlertLevel::Critical => "critical",
            AlertLevel::Warning => "warning",
            AlertLevel::Info => "info",
        };
        Self {
            id: format!("alert-{}-{}", rule.id, Uuid::new_v4()),
            rule_id: rule.id.clone(),
            control_id: rule.control_id.clone(),
            level: eval.level,
            value: eval.value,
            anomaly_score: eval.anomaly_score,
            message_en: format!("Control monitoring alert: {level} threshold exceeded"),
            message_ar: format!("تنبيه مراقبة الضوابط: تم تجاوز حد {level}"),
            raised_at: eval.evaluated_at,
        }
    }
}

/// Downstream consumer of raised alerts (notification system, incident
/// intake). Dispatch mechanics live behind this boundary.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &CcmAlert) -> Result<(), NotifyError>;
}

/// Supervisor for connector health checks and rule evaluation loops.
pub struct CcmAutomation {
    config: CcmConfig,
    connectors: Arc<DashMap<String, ConnectorEntry>>,
    clients: Arc<DashMap<String, Arc<dyn ConnectorClient>>>,
    rules: Arc<DashMap<String, MonitorRule>>,
    alert_queue: Arc<Mutex<Vec<CcmAlert>>>,
    sink: Arc<dyn AlertSink>,
    shutdown: broadcast::Sender<()>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl CcmAutomation {
    pub fn new(config: CcmConfig, sink: Arc<dyn AlertSink>) -> Self {
        let (shutdown, _) = broadcast::channel(16);
        Self {
            config,
            connectors: Arc::new(DashMap::new()),
            clients: Arc::new(DashMap::new()),
            rules: Arc::new(DashMap::new()),
            alert_queue: Arc::new(Mutex::new(Vec::new())),
            sink,
            shutdown,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connector and start its health-check loop. Returns once
    /// the loop is spawned; the first probe runs immediately in the
    /// background.
    pub async fn register_connector(
        &self,
        descriptor: ConnectorDescriptor,
        client: Arc<dyn ConnectorClient>,
    ) {
        let connector_id = descriptor.id.clone();
        let period = Duration::from_secs(descriptor.health_check_interval_secs.max(1));
        self.connectors
            .insert(connector_id.clone(), ConnectorEntry::new(descriptor));
        self.clients.insert(connector_id.clone(), client.clone());

        let connectors = Arc::clone(&self.connectors);
        let probe_timeout = self.config.probe_timeout();
        let period = self.jittered(period);
        let mut shutdown_rx = self.shutdown.subscribe();
        let id = connector_id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let healthy = match timeout(probe_timeout, client.health()).await {
                            Ok(Ok(healthy)) => healthy,
                            Ok(Err(e)) => {
                                warn!(connector_id = %id, error = %e, "health probe failed");
                                false
                            }
                            Err(_) => {
                                warn!(connector_id = %id, "health probe timed out");
                                false
                            }
                        };
                        let Some(mut entry) = connectors.get_mut(&id) else {
                            // Deregistered while probing.
                            break;
                        };
                        let next = if healthy {
                            ConnectorStatus::Active
                        } else {
                            ConnectorStatus::Error
                        };
                        if entry.status != next {
                            info!(connector_id = %id, status = ?next, "connector status changed");
                        }
                        entry.status = next;
                        entry.last_sync = Some(Utc::now());
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        self.tasks
            .lock()
            .await
            .insert(format!("connector:{connector_id}"), handle);
        info!(connector_id, "connector registered, health loop started");
    }

    /// Store a rule; if enabled, start its evaluation loop at the poll
    /// interval derived from its cadence.
    pub async fn create_rule(&self, monitor_rule: MonitorRule) {
        let rule_id = monitor_rule.id.clone();
        let enabled = monitor_rule.enabled;
        self.rules.insert(rule_id.clone(), monitor_rule);
        if enabled {
            self.spawn_rule_loop(rule_id.clone()).await;
        }
        info!(rule_id, enabled, "monitoring rule created");
    }

    /// Pause or resume a rule. Resuming a rule that never had a loop (it was
    /// created disabled) starts one.
    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) {
        let Some(mut entry) = self.rules.get_mut(rule_id) else {
            return;
        };
        entry.enabled = enabled;
        drop(entry);

        if enabled {
            let has_loop = self
                .tasks
                .lock()
                .await
                .contains_key(&format!("rule:{rule_id}"));
            if !has_loop {
                self.spawn_rule_loop(rule_id.to_string()).await;
            }
        }
        info!(rule_id, enabled, "rule toggled");
    }

    /// Remove a connector and cancel its health loop. Rule loops bound to it
    /// skip their cycles from the next tick on.
    pub async fn deregister_connector(&self, connector_id: &str) -> bool {
        let existed = self.connectors.remove(connector_id).is_some();
        self.clients.remove(connector_id);
        if let Some(handle) = self
            .tasks
            .lock()
            .await
            .remove(&format!("connector:{connector_id}"))
        {
            handle.abort();
        }
        if existed {
            info!(connector_id, "connector deregistered");
        }
        existed
    }

    /// Remove a rule and cancel its evaluation loop.
    pub async fn remove_rule(&self, rule_id: &str) -> bool {
        let existed = self.rules.remove(rule_id).is_some();
        if let Some(handle) = self.tasks.lock().await.remove(&format!("rule:{rule_id}")) {
            handle.abort();
        }
        if existed {
            info!(rule_id, "rule removed");
        }
        existed
    }

    /// Snapshot of a connector's registry entry.
    pub fn connector_snapshot(&self, connector_id: &str) -> Option<ConnectorEntry> {
        self.connectors.get(connector_id).map(|e| e.value().clone())
    }

    pub fn rule_snapshot(&self, rule_id: &str) -> Option<MonitorRule> {
        self.rules.get(rule_id).map(|r| r.value().clone())
    }

    /// Names of all live background loops, for operational visibility.
    pub async fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop every loop and wait for them to wind down.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(());
        let mut tasks = self.tasks.lock().await;
        for (name, handle) in tasks.drain() {
            debug!(task = %name, "awaiting loop shutdown");
            let _ = handle.await;
        }
        info!("ccm supervisor stopped");
    }

    async fn spawn_rule_loop(&self, rule_id: String) {
        let Some(period) = self
            .rules
            .get(&rule_id)
            .map(|r| r.alert_cadence.poll_interval())
        else {
            return;
        };

        let rules = Arc::clone(&self.rules);
        let connectors = Arc::clone(&self.connectors);
        let clients = Arc::clone(&self.clients);
        let alert_queue = Arc::clone(&self.alert_queue);
        let sink = Arc::clone(&self.sink);
        let query_timeout = self.config.query_timeout();
        let period = self.jittered(period);
        let mut shutdown_rx = self.shutdown.subscribe();
        let id = rule_id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(monitor_rule) = rules.get(&id).map(|r| r.value().clone()) else {
                            break;
                        };
                        if !monitor_rule.enabled {
                            continue;
                        }
                        // Connector state is re-read every cycle: connectors
                        // fail after rules are already running.
                        let status = connectors
                            .get(&monitor_rule.connector_id)
                            .map(|e| e.value().status);
                        if status != Some(ConnectorStatus::Active) {
                            debug!(
                                rule_id = %id,
                                connector_id = %monitor_rule.connector_id,
                                ?status,
                                "skipping cycle, connector not active"
                            );
                            continue;
                        }
                        let Some(client) = clients
                            .get(&monitor_rule.connector_id)
                            .map(|c| Arc::clone(c.value()))
                        else {
                            continue;
                        };

                        let rows = match timeout(query_timeout, client.query(&monitor_rule.query)).await {
                            Ok(Ok(rows)) => rows,
                            Ok(Err(e)) => {
                                warn!(rule_id = %id, error = %e, "rule query failed");
                                continue;
                            }
                            Err(_) => {
                                warn!(rule_id = %id, "rule query timed out");
                                continue;
                            }
                        };

                        let value = aggregate(&rows, monitor_rule.aggregation);
                        let eval = evaluate(
                            value,
                            &monitor_rule.thresholds,
                            monitor_rule.alert_cadence,
                            Utc::now(),
                        );
                        debug!(
                            rule_id = %id,
                            value,
                            level = ?eval.level,
                            should_alert = eval.should_alert,
                            "rule evaluated"
                        );

                        if eval.should_alert {
                            let alert = CcmAlert::from_evaluation(&monitor_rule, &eval);
                            alert_queue.lock().await.push(alert);
                            flush_alerts(&alert_queue, sink.as_ref()).await;
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        self.tasks
            .lock()
            .await
            .insert(format!("rule:{rule_id}"), handle);
    }

    fn jittered(&self, period: Duration) -> Duration {
        let jitter = self.config.jitter_percent;
        if jitter <= 0.0 {
            return period;
        }
        let spread = period.as_secs_f64() * jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((period.as_secs_f64() + offset).max(1.0))
    }
}

/// Drain the queue and deliver synchronously. The queue exists to allow
/// future batching; current semantics are send-then-clear. Delivery failures
/// are logged and dropped, not requeued.
async fn flush_alerts(queue: &Mutex<Vec<CcmAlert>>, sink: &dyn AlertSink) {
    let pending: Vec<CcmAlert> = {
        let mut queue = queue.lock().await;
        queue.drain(..).collect()
    };
    for alert in &pending {
        if let Err(e) = sink.deliver(alert).await {
            warn!(alert_id = %alert.id, error = %e, "alert delivery failed");
        }
    }
}
