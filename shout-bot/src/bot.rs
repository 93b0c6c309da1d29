use crate::classifier::{classify, qualifies_as_shout};
use crate::config::BotConfig;
use crate::handlers::Handlers;
use crate::launcher::TaskLauncher;
use crate::types::{ChatEvent, Result};
use crate::utterance::UtteranceCache;
use crate::vote::VoteCoordinator;
use interfaces::defs::{InboundEvent, QuoteStore, TitleFetcher, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct ShoutBot {
    transport: Arc<dyn Transport>,
    handlers: Arc<Handlers>,
    launcher: TaskLauncher,
    owner: Option<String>,
    private_message_reply: String,
}

impl ShoutBot {
    pub fn new(
        config: &BotConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn QuoteStore>,
        titles: Arc<dyn TitleFetcher>,
    ) -> Self {
        let votes = VoteCoordinator::new(transport.clone(), config.vote_window());
        let utterances = UtteranceCache::new(store);
        let handlers = Arc::new(Handlers::new(transport.clone(), votes, utterances, titles));
        let launcher = TaskLauncher::new(handlers.clone(), config.max_concurrent_tasks);

        Self {
            transport,
            handlers,
            launcher,
            owner: config.owner.clone(),
            private_message_reply: config.private_message_reply.clone(),
        }
    }

    pub fn votes(&self) -> &VoteCoordinator {
        self.handlers.votes()
    }

    pub fn utterances(&self) -> &UtteranceCache {
        self.handlers.utterances()
    }

    /// React to one transport event. Channel messages return the handles of
    /// the tasks they started; callers are free to drop them.
    pub async fn handle(&self, event: ChatEvent) -> Result<Vec<JoinHandle<()>>> {
        match event {
            ChatEvent::Message(event) => Ok(self.on_message(&event)),
            ChatEvent::PrivateMessage { sender, .. } => {
                self.on_private_message(&sender).await?;
                Ok(Vec::new())
            }
            ChatEvent::Invite { channel, by } => {
                self.on_invite(&channel, &by).await?;
                Ok(Vec::new())
            }
            ChatEvent::Kicked { channel, by, kicked_self } => {
                if kicked_self {
                    self.on_kicked(&channel, &by).await?;
                }
                Ok(Vec::new())
            }
        }
    }

    pub fn on_message(&self, event: &InboundEvent) -> Vec<JoinHandle<()>> {
        let intents = classify(&event.text, qualifies_as_shout(event));
        if intents.is_empty() {
            return Vec::new();
        }

        debug!(
            "Dispatching {} intent(s) from {} in {}",
            intents.len(),
            event.sender,
            event.channel
        );
        self.launcher.dispatch(event, intents)
    }

    pub async fn on_private_message(&self, sender: &str) -> Result<()> {
        debug!("Private message from {}", sender);
        self.transport.send_message(sender, &self.private_message_reply).await?;
        Ok(())
    }

    pub async fn on_invite(&self, channel: &str, by: &str) -> Result<()> {
        info!("Invited to {} by {}", channel, by);
        self.transport.join_channel(channel).await?;
        Ok(())
    }

    /// Rejoin after being kicked, unless the owner did it.
    pub async fn on_kicked(&self, channel: &str, by: &str) -> Result<()> {
        if self.owner.as_deref().is_some_and(|owner| owner.eq_ignore_ascii_case(by)) {
            info!("Kicked from {} by owner {}, staying out", channel, by);
            return Ok(());
        }

        info!("Kicked from {} by {}, rejoining", channel, by);
        self.transport.join_channel(channel).await?;
        Ok(())
    }
}
