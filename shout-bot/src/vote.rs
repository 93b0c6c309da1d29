use crate::types::{Result, VoteSnapshot};
use interfaces::defs::{InboundEvent, Transport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Required ballots for a channel of `channel_size` participants: floor(n * 0.4).
pub fn quorum_for(channel_size: usize) -> i64 {
    (channel_size * 2 / 5) as i64
}

/// Result of one call into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Started { target: String, required_votes: i64 },
    Counted { target: String, required_votes: i64 },
    Passed { target: String, channel: String },
    Failed { target: String, channel: String, required_votes: i64 },
    UnknownTarget { target: String },
    AlreadyVoted,
    InProgress { target: String },
    NoVote,
}

/// The single vote of the engine. Not scoped per channel: while one channel
/// votes, every other channel is told a vote is already running.
struct VoteState {
    target: Option<String>,
    channel: Option<String>,
    quorum: i64,
    required_votes: i64,
    voters: HashSet<String>,
    session: Option<Uuid>,
}

impl VoteState {
    fn idle() -> Self {
        Self {
            target: None,
            channel: None,
            quorum: -1,
            required_votes: -1,
            voters: HashSet::new(),
            session: None,
        }
    }

    fn is_idle(&self) -> bool {
        self.target.is_none()
    }

    fn reset(&mut self) {
        *self = Self::idle();
    }

    fn snapshot(&self) -> VoteSnapshot {
        let mut voters: Vec<String> = self.voters.iter().cloned().collect();
        voters.sort();
        VoteSnapshot {
            target: self.target.clone(),
            quorum: self.quorum,
            required_votes: self.required_votes,
            voters,
        }
    }
}

pub struct VoteCoordinator {
    state: Arc<Mutex<VoteState>>,
    transport: Arc<dyn Transport>,
    window: Duration,
}

impl VoteCoordinator {
    pub fn new(transport: Arc<dyn Transport>, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(VoteState::idle())),
            transport,
            window,
        }
    }

    /// Handle `!votekick <target>`: nominate when idle, otherwise cast a ballot.
    pub async fn votekick(&self, event: &InboundEvent, target: &str) -> Result<VoteOutcome> {
        let channel_size = self.transport.channel_participant_count(&event.channel).await?;
        self.start(event, target, channel_size).await
    }

    /// Nominate `target` on behalf of the event's sender. Joins the running
    /// vote instead when it is already against `target`.
    pub async fn start(&self, event: &InboundEvent, target: &str, channel_size: usize) -> Result<VoteOutcome> {
        let target_exists = self.transport.user_exists(target).await?;

        let outcome = {
            let mut state = self.state.lock().await;
            self.start_locked(&mut state, event, target, target_exists, channel_size)
        };

        self.announce(event, &outcome).await?;
        Ok(outcome)
    }

    /// Cast the event sender's ballot against `target`.
    pub async fn cast(&self, event: &InboundEvent, target: &str) -> Result<VoteOutcome> {
        let outcome = {
            let mut state = self.state.lock().await;
            Self::cast_locked(&mut state, &event.sender, target)
        };

        self.announce(event, &outcome).await?;
        Ok(outcome)
    }

    pub async fn snapshot(&self) -> VoteSnapshot {
        self.state.lock().await.snapshot()
    }

    fn start_locked(
        &self,
        state: &mut VoteState,
        event: &InboundEvent,
        target: &str,
        target_exists: bool,
        channel_size: usize,
    ) -> VoteOutcome {
        if let Some(running) = &state.target {
            if running == target {
                return Self::cast_locked(state, &event.sender, target);
            }
            return VoteOutcome::InProgress { target: running.clone() };
        }

        if !target_exists {
            debug!("Votekick target {} does not exist", target);
            return VoteOutcome::UnknownTarget { target: target.to_string() };
        }

        let quorum = quorum_for(channel_size);
        if quorum == 1 {
            // The nominator's own ballot already meets the quorum
            info!("Vote to kick {} passed on nomination ({} in {})", target, channel_size, event.channel);
            return VoteOutcome::Passed {
                target: target.to_string(),
                channel: event.channel.clone(),
            };
        }

        let session = Uuid::new_v4();
        state.target = Some(target.to_string());
        state.channel = Some(event.channel.clone());
        state.quorum = quorum;
        // A zero quorum can never be met; such a vote only runs out its window
        state.required_votes = (quorum - 1).max(0);
        state.voters = HashSet::from([event.sender.clone()]);
        state.session = Some(session);

        self.schedule_expiry(session);

        info!(
            "{} started a vote to kick {} in {} (quorum {}, session {})",
            event.sender, target, event.channel, quorum, session
        );

        VoteOutcome::Started {
            target: target.to_string(),
            required_votes: state.required_votes,
        }
    }

    fn cast_locked(state: &mut VoteState, voter: &str, target: &str) -> VoteOutcome {
        let running = match &state.target {
            Some(running) => running.clone(),
            None => return VoteOutcome::NoVote,
        };

        if running != target {
            return VoteOutcome::InProgress { target: running };
        }

        if state.voters.contains(voter) {
            return VoteOutcome::AlreadyVoted;
        }

        state.voters.insert(voter.to_string());
        if state.quorum == 0 {
            debug!("{} voted to kick {} in a channel too small to pass", voter, running);
            return VoteOutcome::Counted {
                target: running,
                required_votes: state.required_votes,
            };
        }

        state.required_votes -= 1;
        debug!("{} voted to kick {} ({} needed)", voter, running, state.required_votes);

        if state.required_votes > 0 {
            return VoteOutcome::Counted {
                target: running,
                required_votes: state.required_votes,
            };
        }

        let channel = state.channel.clone().unwrap_or_default();
        state.reset();
        info!("Vote to kick {} passed in {}", running, channel);

        VoteOutcome::Passed { target: running, channel }
    }

    fn schedule_expiry(&self, session: Uuid) {
        let state = self.state.clone();
        let transport = self.transport.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(e) = expire(&state, transport.as_ref(), session).await {
                warn!("Failed to announce expiry of vote session {}: {}", session, e);
            }
        });
    }

    async fn announce(&self, event: &InboundEvent, outcome: &VoteOutcome) -> Result<()> {
        match outcome {
            VoteOutcome::Started { target, required_votes } => {
                let text = format!(
                    "{} has voted to kick {}! Type !votekick {} to cast a vote. ({} needed)",
                    event.sender, target, target, required_votes
                );
                self.transport.send_message(&event.channel, &text).await?;
            }
            VoteOutcome::Counted { target, required_votes } => {
                let text = format!("{} has voted to kick {}! ({} needed)", event.sender, target, required_votes);
                self.transport.send_message(&event.channel, &text).await?;
            }
            VoteOutcome::Passed { target, channel } => {
                let text = format!("Vote succeeded - kicking {}!", target);
                // Kick even when the announcement fails
                let announced = self.transport.send_message(channel, &text).await;
                self.transport.kick(channel, target).await?;
                announced?;
            }
            VoteOutcome::UnknownTarget { .. } => {
                self.transport
                    .respond(event, "Cannot votekick user - user doesn't exist!")
                    .await?;
            }
            VoteOutcome::AlreadyVoted => {
                self.transport.respond(event, "You cannot vote more than once!").await?;
            }
            VoteOutcome::InProgress { target } => {
                let text = format!(
                    "You cannot vote to kick another user while a vote to kick {} is in progress.",
                    target
                );
                self.transport.respond(event, &text).await?;
            }
            VoteOutcome::NoVote => {
                self.transport.respond(event, "There is no vote in progress.").await?;
            }
            VoteOutcome::Failed { .. } => {}
        }
        Ok(())
    }
}

/// Fail the vote started as `session` if it is still the running one.
async fn expire(state: &Mutex<VoteState>, transport: &dyn Transport, session: Uuid) -> Result<Option<VoteOutcome>> {
    let outcome = {
        let mut state = state.lock().await;
        if state.session != Some(session) {
            debug!("Vote session {} already resolved", session);
            return Ok(None);
        }

        let outcome = VoteOutcome::Failed {
            target: state.target.clone().unwrap_or_default(),
            channel: state.channel.clone().unwrap_or_default(),
            required_votes: state.required_votes,
        };
        state.reset();
        outcome
    };

    if let VoteOutcome::Failed { target, channel, required_votes } = &outcome {
        info!("Vote to kick {} in {} timed out ({} more needed)", target, channel, required_votes);
        let text = format!("The vote to kick {} has failed! ({} more needed)", target, required_votes);
        transport.send_message(channel, &text).await?;
    }

    Ok(Some(outcome))
}
