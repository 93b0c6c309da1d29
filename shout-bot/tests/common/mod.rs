#![allow(dead_code)]

// Shared fakes for the shout-bot integration tests
pub use interfaces::defs::{InboundEvent, QuoteRecord, QuoteStore, TitleFetcher, Transport};
pub use shout_bot::{BotConfig, ShoutBot};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const TEST_CHANNEL: &str = "#rddt";

/// Record of everything the bot asked the transport to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outbox {
    pub messages: Vec<(String, String)>,
    pub responses: Vec<(String, String)>,
    pub kicks: Vec<(String, String)>,
    pub joins: Vec<String>,
}

pub struct MockTransport {
    users: Mutex<HashSet<String>>,
    participants: Mutex<usize>,
    outbox: Mutex<Outbox>,
    fail_sends: Mutex<bool>,
}

impl MockTransport {
    pub fn new(users: &[&str], participants: usize) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(users.iter().map(|u| u.to_string()).collect()),
            participants: Mutex::new(participants),
            outbox: Mutex::new(Outbox::default()),
            fail_sends: Mutex::new(false),
        })
    }

    pub fn set_participants(&self, participants: usize) {
        *self.participants.lock().unwrap() = participants;
    }

    /// Make every `send_message` call fail from now on.
    pub fn fail_sends(&self) {
        *self.fail_sends.lock().unwrap() = true;
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.outbox().messages.into_iter().map(|(_, text)| text).collect()
    }

    pub fn responses(&self) -> Vec<String> {
        self.outbox().responses.into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        if *self.fail_sends.lock().unwrap() {
            anyhow::bail!("connection reset");
        }
        self.outbox.lock().unwrap().messages.push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn respond(&self, event: &InboundEvent, text: &str) -> anyhow::Result<()> {
        self.outbox.lock().unwrap().responses.push((event.sender.clone(), text.to_string()));
        Ok(())
    }

    async fn kick(&self, channel: &str, nick: &str) -> anyhow::Result<()> {
        self.outbox.lock().unwrap().kicks.push((channel.to_string(), nick.to_string()));
        Ok(())
    }

    async fn user_exists(&self, nick: &str) -> anyhow::Result<bool> {
        Ok(self.users.lock().unwrap().contains(nick))
    }

    async fn channel_participant_count(&self, _channel: &str) -> anyhow::Result<usize> {
        Ok(*self.participants.lock().unwrap())
    }

    async fn join_channel(&self, channel: &str) -> anyhow::Result<()> {
        self.outbox.lock().unwrap().joins.push(channel.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQuoteStore {
    records: Mutex<Vec<QuoteRecord>>,
}

impl MemoryQuoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_records(records: Vec<QuoteRecord>) -> Arc<Self> {
        Arc::new(Self { records: Mutex::new(records) })
    }

    pub fn records(&self) -> Vec<QuoteRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn random_quote(&self, channel: &str) -> anyhow::Result<Option<QuoteRecord>> {
        let records = self.records.lock().unwrap();
        let in_channel: Vec<&QuoteRecord> = records.iter().filter(|r| r.channel == channel).collect();
        Ok(in_channel.choose(&mut rand::thread_rng()).map(|r| (*r).clone()))
    }

    async fn exists_exact(&self, text: &str, channel: &str) -> anyhow::Result<bool> {
        Ok(self.find_exact(text, channel).await?.is_some())
    }

    async fn insert(&self, record: &QuoteRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn find_exact(&self, text: &str, channel: &str) -> anyhow::Result<Option<QuoteRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|r| r.text == text && r.channel == channel).cloned())
    }
}

/// Answers with a fixed title, or fails for URLs containing "broken".
pub struct MockTitleFetcher;

#[async_trait]
impl TitleFetcher for MockTitleFetcher {
    async fn fetch_title_or_descriptor(&self, url: &str) -> anyhow::Result<String> {
        if url.contains("broken") {
            anyhow::bail!("connection refused");
        }
        Ok(format!("Title of {}", url))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn message(sender: &str, text: &str) -> InboundEvent {
    InboundEvent::new(sender, TEST_CHANNEL, text)
}

pub fn quote(author: &str, text: &str) -> QuoteRecord {
    QuoteRecord {
        author: author.to_string(),
        timestamp: chrono::Utc::now() - chrono::Duration::seconds(90),
        channel: TEST_CHANNEL.to_string(),
        text: text.to_string(),
    }
}

pub fn test_config() -> BotConfig {
    BotConfig {
        owner: Some("Boss".to_string()),
        vote_window_seconds: 30,
        ..BotConfig::default()
    }
}

pub fn vote_window() -> Duration {
    Duration::from_secs(30)
}

/// Wait for every task an event started.
pub async fn join_all(handles: Vec<JoinHandle<()>>) -> anyhow::Result<()> {
    for handle in handles {
        handle.await?;
    }
    Ok(())
}
