//! Connector registry types and the external-system client boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConnectorError;

/// Class of external system a connector reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    Siem,
    Iam,
    ConfigMgmt,
    Ticketing,
    Database,
}

/// Operating status, mutated only by the connector's own health-check loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Active,
    Inactive,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    OAuth,
    Basic,
}

/// How to reach the external system. Credentials are held elsewhere; only an
/// opaque reference travels with the descriptor so logs never carry secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDetails {
    pub endpoint: String,
    pub auth: AuthMethod,
    pub credential_ref: String,
}

/// Administrator-supplied description of a monitored system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    pub id: String,
    pub name: String,
    pub kind: ConnectorKind,
    pub connection: ConnectionDetails,
    pub health_check_interval_secs: u64,
}

/// Registry entry: descriptor plus loop-maintained health state.
#[derive(Debug, Clone)]
pub struct ConnectorEntry {
    pub descriptor: ConnectorDescriptor,
    pub status: ConnectorStatus,
    pub last_sync: Option<DateTime<Utc>>,
}

impl ConnectorEntry {
    pub fn new(descriptor: ConnectorDescriptor) -> Self {
        Self {
            descriptor,
            status: ConnectorStatus::Inactive,
            last_sync: None,
        }
    }
}

/// Time window a rule aggregates over, parsed from the `1h`/`24h`/`7d` forms
/// rules are configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow(pub Duration);

impl TimeWindow {
    pub fn hours(h: u64) -> Self {
        Self(Duration::from_secs(h * 3600))
    }

    pub fn days(d: u64) -> Self {
        Self(Duration::from_secs(d * 86400))
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 2 {
            return Err(format!("invalid time window '{s}'"));
        }
        let (num, suffix) = s.split_at(s.len() - 1);
        let num: u64 = num
            .parse()
            .map_err(|_| format!("invalid time window '{s}'"))?;
        let secs = match suffix {
            "s" => num,
            "m" => num * 60,
            "h" => num * 3600,
            "d" => num * 86400,
            _ => return Err(format!("invalid time window suffix '{suffix}'")),
        };
        Ok(Self(Duration::from_secs(secs)))
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(w: TimeWindow) -> Self {
        let secs = w.0.as_secs();
        if secs % 86400 == 0 {
            format!("{}d", secs / 86400)
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{secs}s")
        }
    }
}

/// Query shipped to a connector on each evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    pub time_window: TimeWindow,
}

/// Uniform capability every connector type must expose. The core is agnostic
/// to the wire protocol behind it.
#[async_trait]
pub trait ConnectorClient: Send + Sync {
    async fn health(&self) -> Result<bool, ConnectorError>;

    /// Rows matching the spec over its time window. Rows carry a numeric
    /// `value` field for aggregation.
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<Value>, ConnectorError>;
}
