use crate::fortune;
use crate::types::{Intent, Result};
use crate::utterance::UtteranceCache;
use crate::vote::VoteCoordinator;
use interfaces::defs::{InboundEvent, TitleFetcher, Transport};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Work done for each kind of intent. Shared by every launched task.
pub struct Handlers {
    transport: Arc<dyn Transport>,
    votes: VoteCoordinator,
    utterances: UtteranceCache,
    titles: Arc<dyn TitleFetcher>,
}

impl Handlers {
    pub fn new(
        transport: Arc<dyn Transport>,
        votes: VoteCoordinator,
        utterances: UtteranceCache,
        titles: Arc<dyn TitleFetcher>,
    ) -> Self {
        Self {
            transport,
            votes,
            utterances,
            titles,
        }
    }

    pub fn votes(&self) -> &VoteCoordinator {
        &self.votes
    }

    pub fn utterances(&self) -> &UtteranceCache {
        &self.utterances
    }

    pub async fn handle(&self, event: &InboundEvent, intent: Intent) -> Result<()> {
        match intent {
            Intent::Shout => self.shout(event).await,
            Intent::WhoQuery(query) => self.who(event, &query).await,
            Intent::Decide(options) => self.decide(event, &options).await,
            Intent::Votekick(target) => self.votekick(event, &target).await,
            Intent::UrlCandidate(url) => self.url(event, &url).await,
        }
    }

    /// Best-effort notice to the sender that their request failed.
    pub async fn report_failure(&self, event: &InboundEvent) -> Result<()> {
        self.transport
            .respond(event, "Sorry, something went wrong while handling that.")
            .await?;
        Ok(())
    }

    /// Echo an old shout back, then remember this one.
    async fn shout(&self, event: &InboundEvent) -> Result<()> {
        let echoed = match self.utterances.recall(&event.channel).await? {
            Some(quote) => self.transport.send_message(&event.channel, &quote).await,
            None => Ok(()),
        };

        self.utterances.record(event).await?;
        echoed?;
        Ok(())
    }

    async fn who(&self, event: &InboundEvent, query: &str) -> Result<()> {
        let reply = self
            .utterances
            .query_info(query, &event.sender, &event.channel)
            .await?;
        self.transport.respond(event, &reply).await?;
        Ok(())
    }

    async fn decide(&self, event: &InboundEvent, options: &str) -> Result<()> {
        let answer = fortune::decide(options, &mut rand::thread_rng());
        self.transport.respond(event, &answer).await?;
        Ok(())
    }

    async fn votekick(&self, event: &InboundEvent, target: &str) -> Result<()> {
        let outcome = self.votes.votekick(event, target).await?;
        debug!("Votekick by {} against {}: {:?}", event.sender, target, outcome);
        Ok(())
    }

    /// Fetch failures are reported in-channel here rather than by the launcher.
    async fn url(&self, event: &InboundEvent, url: &Url) -> Result<()> {
        let text = match self.titles.fetch_title_or_descriptor(url.as_str()).await {
            Ok(title) => format!("[URL by '{}'] {}", event.sender, title),
            Err(e) => {
                warn!("Failed to fetch title for {}: {}", url, e);
                format!(
                    "[URL by '{}'] An error occurred while retrieving this URL. ({})",
                    event.sender, e
                )
            }
        };

        self.transport.send_message(&event.channel, &text).await?;
        Ok(())
    }
}
