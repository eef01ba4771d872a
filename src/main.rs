//! Binary entry point for the gramfetch bot.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::Bot;
use tracing::{info, warn};

use gramfetch::client::{ContentClient, GraphClient};
use gramfetch::config::Args;
use gramfetch::deliver::TelegramSink;
use gramfetch::pipeline::{Credentials, Pipeline};
use gramfetch::{bot, fetch};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first, then flags/env (flags win inside clap itself).
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.validate()?;
    info!(
        download_dir = %config.download_dir.display(),
        image_timeout = fetch::IMAGE_TIMEOUT_SECS,
        video_timeout = fetch::VIDEO_TIMEOUT_SECS,
        "gramfetch starting"
    );

    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| {
            format!(
                "could not create download directory {}",
                config.download_dir.display()
            )
        })?;

    // Restore the saved session, or log in fresh when it is missing or
    // no longer accepted by the platform.
    let client: Arc<dyn ContentClient> = Arc::new(GraphClient::new());
    let restored = match client.load_session(&config.session_file).await {
        Ok(()) => match client.user_id_from_handle(&config.instagram_username).await {
            Ok(_) => {
                info!("loaded existing session");
                true
            }
            Err(e) => {
                warn!(error = %e, "existing session invalid");
                false
            }
        },
        Err(e) => {
            info!(error = %e, "no usable session file");
            false
        }
    };
    if !restored {
        client
            .login(&config.instagram_username, &config.instagram_password)
            .await
            .context("could not authenticate with the content platform")?;
        client
            .save_session(&config.session_file)
            .await
            .context("could not persist the new session")?;
        info!("created new session");
    }

    let dispatcher_bot = Bot::new(config.telegram_bot_token.clone());
    let sink = Arc::new(TelegramSink::new(&config.telegram_bot_token));
    let pipeline = Arc::new(Pipeline::new(
        client,
        sink,
        Credentials {
            username: config.instagram_username.clone(),
            password: config.instagram_password.clone(),
        },
        config.download_dir.clone(),
        config.session_file.clone(),
    ));

    bot::run(dispatcher_bot, pipeline).await
}
