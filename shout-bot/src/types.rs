use interfaces::defs::InboundEvent;
use serde::{Deserialize, Serialize};
use url::Url;

/// A command extracted from one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Shout,
    WhoQuery(String),
    Decide(String),
    Votekick(String),
    UrlCandidate(Url),
}

impl Intent {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Shout => "shout",
            Intent::WhoQuery(_) => "who",
            Intent::Decide(_) => "decide",
            Intent::Votekick(_) => "votekick",
            Intent::UrlCandidate(_) => "url",
        }
    }
}

/// Something the transport saw happen that the bot may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(InboundEvent),
    PrivateMessage { sender: String, text: String },
    Invite { channel: String, by: String },
    Kicked { channel: String, by: String, kicked_self: bool },
}

/// Read-only view of the vote state, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSnapshot {
    pub target: Option<String>,
    pub quorum: i64,
    pub required_votes: i64,
    pub voters: Vec<String>,
}

impl VoteSnapshot {
    pub fn is_idle(&self) -> bool {
        self.target.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] anyhow::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
