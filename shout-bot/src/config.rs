use crate::types::{BotError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_redirects: usize,
    /// Only this many bytes of an HTML page are searched for its title
    pub max_title_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            // Some sites refuse requests without a browser-like user agent
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string(),
            timeout_seconds: 10,
            max_redirects: 5,
            max_title_bytes: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub server: String,
    pub port: u16,
    pub nick: String,
    pub channels: Vec<String>,
    /// Kicks by this nick are respected; anyone else kicking the bot gets it rejoining
    pub owner: Option<String>,
    pub database_url: String,
    pub vote_window_seconds: u64,
    /// Upper bound on tasks running at once across all events; `None` means unbounded
    pub max_concurrent_tasks: Option<usize>,
    pub private_message_reply: String,
    pub fetch: FetchConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 6667,
            nick: "shoutbot".to_string(),
            channels: vec!["#rddt".to_string()],
            owner: None,
            database_url: "sqlite://shouts.db".to_string(),
            vote_window_seconds: 30,
            max_concurrent_tasks: None,
            private_message_reply: "Hi! I'm just a bot and can't respond to your questions or comments. :(".to_string(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Command line options. Anything given here wins over the config file and environment.
#[derive(Debug, Default, Parser)]
#[command(name = "shout-bot", about = "Channel bot that remembers shouts, runs votekicks and titles links")]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Nick to register with
    #[arg(short, long)]
    pub nick: Option<String>,

    #[arg(short, long)]
    pub server: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Channel to join (repeatable)
    #[arg(long = "channel")]
    pub channels: Vec<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub database_url: Option<String>,
}

impl BotConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Config file (if any), then `DATABASE_URL`, then command line overrides.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.database_url = database_url;
        }

        config.apply_args(args);
        config.validate()?;

        info!("Configured for {}:{} as {}", config.server, config.port, config.nick);
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(nick) = &args.nick {
            self.nick = nick.clone();
        }
        if let Some(server) = &args.server {
            self.server = server.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if !args.channels.is_empty() {
            self.channels = args.channels.clone();
        }
        if let Some(owner) = &args.owner {
            self.owner = Some(owner.clone());
        }
        if let Some(database_url) = &args.database_url {
            self.database_url = database_url.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.nick.trim().is_empty() || self.nick.contains(' ') {
            return Err(BotError::Config(format!("Invalid nick: '{}'", self.nick)));
        }
        if let Some(bad) = self.channels.iter().find(|c| !c.starts_with('#') && !c.starts_with('&')) {
            return Err(BotError::Config(format!("Channel names must start with '#' or '&': '{}'", bad)));
        }
        if self.max_concurrent_tasks == Some(0) {
            return Err(BotError::Config("max_concurrent_tasks must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn vote_window(&self) -> Duration {
        Duration::from_secs(self.vote_window_seconds)
    }
}
