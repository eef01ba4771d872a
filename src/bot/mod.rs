//! Telegram command/callback surface and the long-poll dispatcher.
//!
//! Commands and menu callbacks are handled here directly; free-text
//! messages are routed into the [`Pipeline`]. The dispatcher runs each
//! update on its own task, so independent user requests proceed
//! concurrently while one request stays strictly sequential inside the
//! pipeline.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

use crate::pipeline::Pipeline;

const WELCOME_TEXT: &str = "👋 Welcome to the Instagram download bot!\n\n\
    Send me the URL of an Instagram post or reel and I will fetch it for you.\n\n\
    Example: https://www.instagram.com/p/XXXX/";

const HELP_TEXT: &str = "📖 *How to use this bot:*\n\n\
    1. Copy an Instagram URL\n\
    2. Send the URL to this bot\n\
    3. Wait while it fetches and delivers the files\n\n\
    _Note: stories only exist for 24 hours and may require following the account._\n\n\
    If you run into any problem, please try again later.";

const GUIDE_TEXT: &str = "📥 *Download guide:*\n\n\
    1. Copy an Instagram link\n\
    2. Paste it directly into this chat\n\
    3. Wait while the bot fetches and delivers the files\n\n\
    _Supported content:_\n\
    • Posts\n\
    • Reels\n\
    • Stories";

const FORMATS_TEXT: &str = "🔗 *Supported formats:*\n\n\
    • Posts\n\
    • Reels\n\
    • Stories\n\n\
    _Both full and shortened links work._";

const ABOUT_TEXT: &str = "ℹ️ *About this bot*\n\n\
    • Name: Gramfetch\n\
    • Purpose: fetch videos and photos from Instagram\n\
    • Supports: posts, reels, stories\n\
    • Version: 0.1\n\n\
    _Run for personal, non-commercial use._";

const MENU_PROMPT: &str = "🔍 Pick a feature:";

/// Bot commands registered in the Telegram menu.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show the usage guide")]
    Help,
    #[command(description = "show the feature menu")]
    Menu,
}

/// Runs the long-poll dispatcher until shutdown.
///
/// # Errors
///
/// Returns an error when command registration fails at startup.
pub async fn run(bot: Bot, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    info!("starting bot dispatcher");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_text))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![pipeline])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("📥 Download guide", "guide"),
            InlineKeyboardButton::callback("ℹ️ About", "about"),
        ],
        vec![
            InlineKeyboardButton::callback("🔗 Supported formats", "formats"),
            InlineKeyboardButton::callback("❓ Help", "help"),
        ],
    ])
}

fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "↩️ Back to menu",
        "back_to_menu",
    )]])
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, WELCOME_TEXT).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, HELP_TEXT)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::callback("📋 Main menu", "back_to_menu"),
                ]]))
                .await?;
        }
        Command::Menu => {
            bot.send_message(msg.chat.id, MENU_PROMPT)
                .reply_markup(menu_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn handle_text(msg: Message, pipeline: Arc<Pipeline>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        debug!(chat = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };
    info!(chat = msg.chat.id.0, "processing incoming message");
    pipeline.process_message(msg.chat.id.0, text).await;
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery) -> ResponseResult<()> {
    // Acknowledge the press first so the client stops its spinner.
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let text = match q.data.as_deref() {
        Some("guide") => GUIDE_TEXT,
        Some("formats") => FORMATS_TEXT,
        Some("about") => ABOUT_TEXT,
        Some("help") => HELP_TEXT,
        Some("back_to_menu") => {
            bot.edit_message_text(chat_id, message_id, MENU_PROMPT)
                .reply_markup(menu_keyboard())
                .await?;
            return Ok(());
        }
        other => {
            error!(data = ?other, "unknown callback data");
            return Ok(());
        }
    };

    bot.edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(back_keyboard())
        .await?;
    Ok(())
}
