use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nick of a channel participant.
pub type Identity = String;

/// Channel name, including its leading sigil (e.g. `#rddt`).
pub type ChannelRef = String;

/// One message received on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: Identity,
    pub channel: ChannelRef,
    pub text: String,
    pub is_self: bool,
}

impl InboundEvent {
    pub fn new(sender: impl Into<Identity>, channel: impl Into<ChannelRef>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            channel: channel.into(),
            text: text.into(),
            is_self: false,
        }
    }

    pub fn from_self(mut self) -> Self {
        self.is_self = true;
        self
    }
}

/// A recorded shout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub author: Identity,
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelRef,
    pub text: String,
}

impl QuoteRecord {
    /// Record `event`'s text as said right now by its sender.
    pub fn from_event(event: &InboundEvent) -> Self {
        Self {
            author: event.sender.clone(),
            timestamp: Utc::now(),
            channel: event.channel.clone(),
            text: event.text.clone(),
        }
    }
}

/// Chat connection the bot talks through.
///
/// Implementations are shared between concurrently running tasks, so every
/// method takes `&self`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, channel: &str, text: &str) -> Result<()>;

    /// Reply addressed to the event's sender, on the event's channel.
    async fn respond(&self, event: &InboundEvent, text: &str) -> Result<()>;

    async fn kick(&self, channel: &str, nick: &str) -> Result<()>;

    async fn user_exists(&self, nick: &str) -> Result<bool>;

    async fn channel_participant_count(&self, channel: &str) -> Result<usize>;

    async fn join_channel(&self, channel: &str) -> Result<()>;
}

/// Persistent record store for shouts, partitioned by channel.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn random_quote(&self, channel: &str) -> Result<Option<QuoteRecord>>;

    async fn exists_exact(&self, text: &str, channel: &str) -> Result<bool>;

    async fn insert(&self, record: &QuoteRecord) -> Result<()>;

    async fn find_exact(&self, text: &str, channel: &str) -> Result<Option<QuoteRecord>>;
}

/// One-shot page title lookup.
#[async_trait]
pub trait TitleFetcher: Send + Sync {
    /// Title of the HTML page at `url`, or a short descriptor of the
    /// resource when it is not HTML.
    async fn fetch_title_or_descriptor(&self, url: &str) -> Result<String>;
}
