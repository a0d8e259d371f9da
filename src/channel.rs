//! Messaging channel capability
//!
//! A channel turns a raw inbound payload into a [`ChannelMessage`] and renders
//! outbound messages back into its own wire format. Channels register
//! themselves in the [`ChannelRegistry`] service; a channel that isn't
//! implemented simply isn't registered.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Message direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From a user to the platform
    Inbound,
    /// From the platform to a user
    Outbound,
}

/// Channel-neutral message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: Uuid,
    /// Name of the channel the message travels on
    pub channel: String,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    /// Channel-specific user identifier
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inbound message this one answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
}

impl ChannelMessage {
    /// Create an inbound message
    pub fn inbound(channel: &str, user_id: &str, text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            direction: Direction::Inbound,
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            text,
            reply_to: None,
        }
    }

    /// Create an outbound message answering this one
    pub fn reply(&self, text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: self.channel.clone(),
            direction: Direction::Outbound,
            timestamp: Utc::now(),
            user_id: self.user_id.clone(),
            text,
            reply_to: Some(self.id),
        }
    }
}

/// A messaging channel's wire format
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Parse a raw inbound payload
    fn parse_inbound(&self, payload: &[u8]) -> Result<ChannelMessage>;

    /// Render an outbound message
    fn build_outbound(&self, message: &ChannelMessage) -> Result<String>;
}

/// Channels available to the host
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!("Registered channel {}", name);
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
