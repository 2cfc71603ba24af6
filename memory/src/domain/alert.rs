// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Monitoring alerts
//!
//! Alerts are created by the resource monitor and only ever mutated by
//! acknowledgement. [`AlertLog`] retains at most [`MAX_RETAINED_ALERTS`];
//! once full, the oldest alert is evicted regardless of severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

pub const MAX_RETAINED_ALERTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    BucketSize,
    ProviderCapacity,
    DomainGrowth,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            id: AlertId::new(),
            alert_type,
            severity,
            message: message.into(),
            details,
            timestamp: Utc::now(),
            acknowledged: false,
        }
    }
}

/// Bounded, append-only alert history
#[derive(Debug, Clone)]
pub struct AlertLog {
    alerts: VecDeque<Alert>,
    capacity: usize,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RETAINED_ALERTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, alert: Alert) {
        while self.alerts.len() >= self.capacity {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }

    /// Alerts oldest first; acknowledged ones only when asked for
    pub fn list(&self, include_acknowledged: bool) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| include_acknowledged || !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Returns false when the id is unknown (or already evicted)
    pub fn acknowledge(&mut self, id: AlertId) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(message: &str, severity: AlertSeverity) -> Alert {
        Alert::new(AlertType::System, severity, message, Value::Null)
    }

    #[test]
    fn test_acknowledge_filters_listing() {
        let mut log = AlertLog::new();
        let first = alert("first", AlertSeverity::Warning);
        let id = first.id;
        log.push(first);
        log.push(alert("second", AlertSeverity::Info));

        assert!(log.acknowledge(id));
        assert!(!log.acknowledge(AlertId::new()));

        let open = log.list(false);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].message, "second");

        let all = log.list(true);
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|a| a.id == id && a.acknowledged));
    }

    #[test]
    fn test_oldest_evicted_first_regardless_of_severity() {
        let mut log = AlertLog::new();
        log.push(alert("critical-0", AlertSeverity::Critical));
        for i in 1..=MAX_RETAINED_ALERTS {
            log.push(alert(&format!("info-{}", i), AlertSeverity::Info));
        }

        assert_eq!(log.len(), MAX_RETAINED_ALERTS);
        let all = log.list(true);
        assert_eq!(all[0].message, "info-1");
        assert_eq!(all.last().unwrap().message, format!("info-{}", MAX_RETAINED_ALERTS));
    }

    #[test]
    fn test_alert_type_serialization() {
        assert_eq!(
            serde_json::to_string(&AlertType::ProviderCapacity).unwrap(),
            "\"provider-capacity\""
        );
        assert_eq!(serde_json::to_string(&AlertSeverity::Critical).unwrap(), "\"critical\"");
    }
}
