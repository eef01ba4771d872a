//! Bot configuration from CLI flags and environment variables.
//!
//! Every setting can be passed as a flag or through the environment;
//! `.env` files are loaded by the binary before parsing. Validation
//! reports *all* missing required settings at once so a fresh deployment
//! fails with one actionable message.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

/// Default root directory for staged downloads.
pub const DEFAULT_DOWNLOAD_DIR: &str = "instagram_downloads";

/// Default session file path.
pub const DEFAULT_SESSION_FILE: &str = "instagram_session.json";

/// Telegram bot that fetches Instagram posts, reels, and stories.
#[derive(Parser, Debug)]
#[command(name = "gramfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Instagram account username used for the API session
    #[arg(long, env = "INSTAGRAM_USERNAME")]
    pub instagram_username: Option<String>,

    /// Instagram account password used for the API session
    #[arg(long, env = "INSTAGRAM_PASSWORD", hide_env_values = true)]
    pub instagram_password: Option<String>,

    /// Root directory for staged downloads
    #[arg(long, env = "DOWNLOAD_DIR", default_value = DEFAULT_DOWNLOAD_DIR)]
    pub download_dir: PathBuf,

    /// Path of the persisted API session
    #[arg(long, env = "SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
    pub session_file: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required settings are absent.
    #[error(
        "missing required configuration: {}\nProvide them as flags or environment variables \
         (TELEGRAM_BOT_TOKEN, INSTAGRAM_USERNAME, INSTAGRAM_PASSWORD), e.g. in a .env file.",
        .missing.join(", ")
    )]
    Missing {
        /// Names of the missing settings.
        missing: Vec<&'static str>,
    },
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub instagram_username: String,
    pub instagram_password: String,
    pub download_dir: PathBuf,
    pub session_file: PathBuf,
}

impl Args {
    /// Validates the parsed arguments into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent required
    /// setting, not just the first.
    pub fn validate(self) -> Result<Config, ConfigError> {
        let mut missing = Vec::new();
        if self.telegram_bot_token.is_none() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.instagram_username.is_none() {
            missing.push("INSTAGRAM_USERNAME");
        }
        if self.instagram_password.is_none() {
            missing.push("INSTAGRAM_PASSWORD");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing { missing });
        }

        // Guarded by the checks above.
        #[allow(clippy::unwrap_used)]
        Ok(Config {
            telegram_bot_token: self.telegram_bot_token.unwrap(),
            instagram_username: self.instagram_username.unwrap(),
            instagram_password: self.instagram_password.unwrap(),
            download_dir: self.download_dir,
            session_file: self.session_file,
        })
    }
}
