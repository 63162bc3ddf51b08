mod commands;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardledger::config::{Command, Config};
use cardledger::{Bank, EncryptionKey, init_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();

    if let Command::GenerateKey = config.command {
        commands::generate_key();
        return Ok(());
    }

    // A missing or malformed key is fatal before any database work
    let key = config
        .card_encryption_key
        .as_deref()
        .context("CARD_ENCRYPTION_KEY is not set")?;
    let key = EncryptionKey::from_hex(key).context("invalid CARD_ENCRYPTION_KEY")?;

    let pool = init_pool(&config.pool_settings()).await?;
    let bank = Bank::new(pool.clone(), &key)?;

    tracing::debug!(database = %config.database_url, "ledger ready");

    let result = commands::run(&bank, config.command).await;
    pool.close().await;
    result
}
