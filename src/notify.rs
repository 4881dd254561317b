//! Notification boundary.
//!
//! The core decides *which* channels fire for an incident; how a message
//! actually reaches an inbox, chat room, or phone is the dispatcher's
//! concern behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::NotifyError;
use crate::incident::{FlagType, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Chat,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Email => "email",
            Channel::Chat => "chat",
            Channel::Sms => "sms",
        };
        f.write_str(s)
    }
}

/// Configured recipients for one (tenant, flag type, severity) combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientSet {
    pub email: Vec<String>,
    pub chat: Vec<String>,
    pub sms: Vec<String>,
}

impl RecipientSet {
    pub fn for_channel(&self, channel: Channel) -> &[String] {
        match channel {
            Channel::Email => &self.email,
            Channel::Chat => &self.chat,
            Channel::Sms => &self.sms,
        }
    }
}

/// Message handed to the dispatcher for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub incident_id: String,
    pub tenant_id: String,
    pub flag_type: FlagType,
    pub severity: Severity,
    pub summary: String,
    pub recipients: Vec<String>,
}

/// Outbound notification capability supplied by the platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Recipients configured for this tenant/flag/severity combination.
    async fn resolve_recipients(
        &self,
        tenant_id: &str,
        flag_type: &FlagType,
        severity: Severity,
    ) -> Result<RecipientSet, NotifyError>;

    async fn send(&self, channel: Channel, message: &AlertMessage) -> Result<(), NotifyError>;
}
