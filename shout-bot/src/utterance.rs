use crate::types::Result;
use crate::utils::{text::excerpt, time::readable_age};
use chrono::Utc;
use interfaces::defs::{InboundEvent, QuoteRecord, QuoteStore};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// `!who last` looks up the most recently recalled shout instead of literal text
pub const LAST_QUERY: &str = "last";

/// Quotes up to this many characters are shown whole in `!who last` replies
const SHORT_QUOTE_LEN: usize = 10;
const EXCERPT_PERCENT: usize = 60;

/// Recorded shouts plus the most recently recalled one.
pub struct UtteranceCache {
    store: Arc<dyn QuoteStore>,
    /// Empty until the first shout has been recalled
    last: RwLock<String>,
    /// Serialises the exists-then-insert sequence
    record_lock: Mutex<()>,
}

impl UtteranceCache {
    pub fn new(store: Arc<dyn QuoteStore>) -> Self {
        Self {
            store,
            last: RwLock::new(String::new()),
            record_lock: Mutex::new(()),
        }
    }

    pub async fn last_utterance(&self) -> Option<String> {
        let last = self.last.read().await;
        if last.is_empty() {
            None
        } else {
            Some(last.clone())
        }
    }

    /// Pick a random earlier shout from `channel` and remember it as the last one.
    pub async fn recall(&self, channel: &str) -> Result<Option<String>> {
        let record = match self.store.random_quote(channel).await? {
            Some(record) => record,
            None => {
                debug!("No quotes recorded for {} yet", channel);
                return Ok(None);
            }
        };

        *self.last.write().await = record.text.clone();
        Ok(Some(record.text))
    }

    /// Store the event's text as a new shout unless the channel already has it.
    /// Returns whether a record was written.
    pub async fn record(&self, event: &InboundEvent) -> Result<bool> {
        let _guard = self.record_lock.lock().await;

        if self.store.exists_exact(&event.text, &event.channel).await? {
            debug!("Shout already recorded in {}", event.channel);
            return Ok(false);
        }

        self.store.insert(&QuoteRecord::from_event(event)).await?;
        info!("Recorded new shout by {} in {}", event.sender, event.channel);
        Ok(true)
    }

    /// Answer `!who <query>` from `asker`.
    pub async fn query_info(&self, query: &str, asker: &str, channel: &str) -> Result<String> {
        let (text, contextual) = if query == LAST_QUERY {
            match self.last_utterance().await {
                Some(last) => (last, true),
                None => return Ok("No previous quote.".to_string()),
            }
        } else {
            (query.to_string(), false)
        };

        let record = match self.store.find_exact(&text, channel).await? {
            Some(record) => record,
            None => return Ok("Quote not found.".to_string()),
        };

        if record.author == asker {
            return Ok("don't you remember? YOU submitted this!".to_string());
        }

        let age = readable_age(record.timestamp, Utc::now());
        if contextual {
            Ok(format!(
                "{} shouted \"{}\" {}.",
                record.author,
                excerpt(&text, SHORT_QUOTE_LEN, EXCERPT_PERCENT),
                age
            ))
        } else {
            Ok(format!("{} shouted this {}.", record.author, age))
        }
    }
}
