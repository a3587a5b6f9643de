use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::constants::{ERROR_REPLY, MANAGE_MESSAGES, MAX_DISCORD_MSG_LEN};
use crate::error::AppError;
use crate::gateway::{Interaction, MessageEvent};
use crate::helpers::{split_message, strip_mentions};
use crate::memory::{memory_clear_reply, memory_show_reply, memory_stats_reply, Role};
use crate::state::{BotUser, State};

/// Global application-command payloads, deployed with `--deploy-commands`.
pub(crate) fn command_definitions() -> Value {
    json!([
        {
            "name": "ask",
            "description": "Ask the assistant anything",
            "type": 1,
            "options": [
                {
                    "name": "prompt",
                    "description": "The content of your request",
                    "type": 3,
                    "required": true
                },
                {
                    "name": "model",
                    "description": "LLM model to use",
                    "type": 3,
                    "required": false,
                    "choices": [
                        { "name": "copilot", "value": "copilot" },
                        { "name": "blackbox", "value": "blackbox" }
                    ]
                }
            ]
        },
        { "name": "ping", "description": "Replies with Pong!", "type": 1 },
        { "name": "server", "description": "Provides information about the server.", "type": 1 },
        { "name": "user", "description": "Provides information about the user.", "type": 1 },
        {
            "name": "memory",
            "description": "Manage bot memory",
            "type": 1,
            "default_member_permissions": MANAGE_MESSAGES.to_string(),
            "options": [
                { "name": "stats", "description": "Show memory statistics for this channel", "type": 1 },
                { "name": "show", "description": "Show recent memory for this channel", "type": 1 },
                { "name": "clear", "description": "Clear memory for this channel", "type": 1 }
            ]
        }
    ])
}

pub(crate) async fn deploy_commands(state: &State) {
    match state.discord.register_commands(&command_definitions()).await {
        Ok(count) => info!(count, "Application commands registered"),
        Err(e) => error!("Command deployment failed: {e}"),
    }
}

pub(crate) async fn handle_interaction(state: &Arc<State>, interaction: Interaction) {
    match interaction.command.as_str() {
        "ping" => reply(state, &interaction, "Pong!", false).await,
        "server" => cmd_server(state, &interaction).await,
        "user" => cmd_user(state, &interaction).await,
        "memory" => cmd_memory(state, &interaction).await,
        "ask" => cmd_ask(state, &interaction).await,
        other => error!(command = %other, "No matching command handler"),
    }
}

async fn reply(state: &State, interaction: &Interaction, content: &str, ephemeral: bool) {
    if let Err(e) = state
        .discord
        .create_response(&interaction.id, &interaction.token, content, ephemeral)
        .await
    {
        error!(command = %interaction.command, "Failed to respond to interaction: {e}");
    }
}

async fn cmd_server(state: &Arc<State>, interaction: &Interaction) {
    let content = match &interaction.guild_id {
        Some(guild_id) => match state.discord.get_guild(guild_id).await {
            Ok((name, members)) => {
                format!("This server is {name} and has {members} members.")
            }
            Err(e) => {
                error!(guild = %guild_id, "Guild lookup failed: {e}");
                "Could not fetch server information.".to_string()
            }
        },
        None => "This command only works in a server.".to_string(),
    };
    reply(state, interaction, &content, false).await;
}

async fn cmd_user(state: &Arc<State>, interaction: &Interaction) {
    let name = &interaction.user_name;
    let content = match interaction
        .member_joined_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    {
        Some(joined) => format!(
            "This command was run by {name}, who joined on {}.",
            joined.format("%Y-%m-%d")
        ),
        None => format!("This command was run by {name}."),
    };
    reply(state, interaction, &content, false).await;
}

async fn cmd_memory(state: &Arc<State>, interaction: &Interaction) {
    if interaction.member_permissions & MANAGE_MESSAGES == 0 {
        reply(
            state,
            interaction,
            "You need the Manage Messages permission to use this command.",
            true,
        )
        .await;
        return;
    }

    let content = match interaction.subcommand.as_deref() {
        Some("stats") => memory_stats_reply(&state.memory, &interaction.channel_id),
        Some("show") => memory_show_reply(&state.memory, &interaction.channel_id),
        Some("clear") => {
            let content = memory_clear_reply(&state.memory, &interaction.channel_id);
            info!(
                user = %interaction.user_name,
                channel = %interaction.channel_id,
                "Memory cleared by command"
            );
            content
        }
        _ => "Unknown subcommand.".to_string(),
    };
    reply(state, interaction, &content, true).await;
}

async fn cmd_ask(state: &Arc<State>, interaction: &Interaction) {
    let prompt = interaction
        .options
        .get("prompt")
        .map(String::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    if prompt.is_empty() {
        reply(state, interaction, "Nothing to ask.", true).await;
        return;
    }
    let model = interaction
        .options
        .get("model")
        .cloned()
        .unwrap_or_else(|| state.config.default_model.clone());

    // The LLM round-trip outlives the 3-second interaction window.
    if let Err(e) = state
        .discord
        .defer_response(&interaction.id, &interaction.token)
        .await
    {
        error!("Failed to defer interaction: {e}");
        return;
    }
    state.metrics.message_count.fetch_add(1, Ordering::Relaxed);
    info!(user = %interaction.user_name, model = %model, "Ask command");

    match run_prompt(
        state,
        &interaction.channel_id,
        &interaction.user_id,
        &interaction.user_name,
        &prompt,
        &prompt,
        &model,
        Utc::now(),
    )
    .await
    {
        Ok(response) => {
            let mut parts = split_message(&response, MAX_DISCORD_MSG_LEN).into_iter();
            if let Some(first) = parts.next() {
                if let Err(e) = state.discord.edit_response(&interaction.token, &first).await {
                    error!("Failed to edit deferred reply: {e}");
                    return;
                }
            }
            for part in parts {
                tokio::time::sleep(Duration::from_millis(200)).await;
                if let Err(e) = state
                    .discord
                    .send_message(&interaction.channel_id, &part, None)
                    .await
                {
                    error!("Failed to send follow-up chunk: {e}");
                    return;
                }
            }
        }
        Err(e) => {
            state.metrics.llm_error_count.fetch_add(1, Ordering::Relaxed);
            error!(channel = %interaction.channel_id, "Ask command failed: {e}");
            let _ = state.discord.edit_response(&interaction.token, ERROR_REPLY).await;
        }
    }
}

/// Record the user message, attach the channel's context block, query the
/// LLM, and record the bot's reply stamped 1 ms after the user entry so it
/// sorts behind the message it answers.
#[allow(clippy::too_many_arguments)]
async fn run_prompt(
    state: &Arc<State>,
    channel_id: &str,
    author_id: &str,
    author_name: &str,
    record_text: &str,
    llm_text: &str,
    model: &str,
    timestamp: DateTime<Utc>,
) -> Result<String, AppError> {
    state
        .memory
        .record(channel_id, author_id, author_name, record_text, Role::User, timestamp);

    let context = state
        .memory
        .format_context(channel_id, state.config.max_context_chars);
    let full_prompt = if context.is_empty() {
        llm_text.to_string()
    } else {
        format!("{context}{llm_text}")
    };

    let response = state.llm.complete(&full_prompt, model).await?;

    let bot = state.bot_user().unwrap_or_else(|| BotUser {
        id: "parley".to_string(),
        name: "parley".to_string(),
    });
    state.memory.record(
        channel_id,
        &bot.id,
        &bot.name,
        &response,
        Role::Assistant,
        timestamp + chrono::Duration::milliseconds(1),
    );
    Ok(response)
}

/// Inline-mention path: respond when the bot is mentioned in a regular
/// channel message.
pub(crate) async fn handle_message(state: &Arc<State>, event: MessageEvent) {
    if event.author_is_bot {
        return;
    }
    let Some(bot) = state.bot_user() else {
        return; // not logged in yet
    };
    if !event.mentions.iter().any(|id| *id == bot.id) {
        return;
    }
    let prompt = strip_mentions(&event.content);
    if prompt.is_empty() {
        return;
    }

    state.metrics.message_count.fetch_add(1, Ordering::Relaxed);
    info!(user = %event.author_name, channel = %event.channel_id, "Mention received");

    // A reply to an earlier message carries that message as quoted context.
    let llm_text = match &event.referenced_message_id {
        Some(message_id) => {
            match state.discord.get_message(&event.channel_id, message_id).await {
                Ok((author, original)) => format!(
                    "[Replying to a message from {author}]\nOriginal message: \"{original}\"\n\nUser's reply: \"{prompt}\""
                ),
                Err(e) => {
                    warn!("Could not fetch referenced message: {e}");
                    prompt.clone()
                }
            }
        }
        None => prompt.clone(),
    };

    let _ = state.discord.trigger_typing(&event.channel_id).await;

    match run_prompt(
        state,
        &event.channel_id,
        &event.author_id,
        &event.author_name,
        &prompt,
        &llm_text,
        &state.config.default_model,
        event.timestamp,
    )
    .await
    {
        Ok(response) => {
            if let Err(e) = state
                .send_long_message(&event.channel_id, &response, Some(&event.message_id))
                .await
            {
                error!(channel = %event.channel_id, "Failed to deliver response: {e}");
            }
        }
        Err(e) => {
            state.metrics.llm_error_count.fetch_add(1, Ordering::Relaxed);
            error!(channel = %event.channel_id, "Mention handling failed: {e}");
            let _ = state
                .discord
                .send_message(&event.channel_id, ERROR_REPLY, Some(&event.message_id))
                .await;
        }
    }
}
