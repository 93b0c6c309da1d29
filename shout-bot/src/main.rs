use clap::Parser;
use quote_store::QuoteDatabase;
use shout_bot::{BotConfig, CliArgs, HttpTitleFetcher, IrcClient, ShoutBot};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse();
    let config = BotConfig::load(&args)?;

    info!("Starting shout bot as {} on {}:{}", config.nick, config.server, config.port);

    let database = QuoteDatabase::new(&config.database_url).await.map_err(|e| {
        error!("Failed to open quote database {}: {}", config.database_url, e);
        e
    })?;
    database.setup_schema().await?;
    info!("Quote database ready");

    let titles = HttpTitleFetcher::new(config.fetch.clone())?;
    let (client, lines) = IrcClient::connect(&config).await?;

    let bot = ShoutBot::new(&config, client.clone(), Arc::new(database), Arc::new(titles));

    if let Err(e) = client.run(lines, &bot).await {
        error!("Connection ended: {}", e);
        return Err(e.into());
    }

    Ok(())
}
