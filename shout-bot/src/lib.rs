pub mod types;
pub mod config;
pub mod utils;
pub mod classifier;
pub mod vote;
pub mod utterance;
pub mod fortune;
pub mod fetcher;
pub mod handlers;
pub mod launcher;
pub mod bot;
pub mod irc;

pub use types::*;
pub use config::{BotConfig, CliArgs, FetchConfig};
pub use classifier::classify;
pub use vote::{VoteCoordinator, VoteOutcome};
pub use utterance::UtteranceCache;
pub use fetcher::HttpTitleFetcher;
pub use launcher::TaskLauncher;
pub use bot::ShoutBot;
pub use irc::IrcClient;
