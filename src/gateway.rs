use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::state::State;

/// A MESSAGE_CREATE dispatch, reduced to what the handlers need.
pub(crate) struct MessageEvent {
    pub(crate) message_id: String,
    pub(crate) channel_id: String,
    pub(crate) author_id: String,
    pub(crate) author_name: String,
    pub(crate) author_is_bot: bool,
    pub(crate) content: String,
    pub(crate) mentions: Vec<String>,
    pub(crate) referenced_message_id: Option<String>,
    pub(crate) timestamp: DateTime<Utc>,
}

/// Parse a MESSAGE_CREATE payload into structured fields.
/// Returns None if the event should be skipped (missing ids, empty content).
pub(crate) fn parse_message_event(payload: &Value) -> Option<MessageEvent> {
    let data = &payload["d"];

    let message_id = data["id"].as_str()?.to_string();
    let channel_id = match data["channel_id"].as_str() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return None,
    };
    let author_id = match data["author"]["id"].as_str() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return None,
    };

    let content = data["content"].as_str().unwrap_or_default().to_string();
    if content.is_empty() {
        return None; // receipts, embeds-only updates, missing content intent
    }

    let mentions = data["mentions"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|user| user["id"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let timestamp = data["timestamp"]
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(MessageEvent {
        message_id,
        channel_id,
        author_id,
        author_name: data["author"]["username"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        author_is_bot: data["author"]["bot"].as_bool().unwrap_or(false),
        content,
        mentions,
        referenced_message_id: data["message_reference"]["message_id"]
            .as_str()
            .map(|s| s.to_string()),
        timestamp,
    })
}

/// An INTERACTION_CREATE dispatch for an application command.
pub(crate) struct Interaction {
    pub(crate) id: String,
    pub(crate) token: String,
    pub(crate) channel_id: String,
    pub(crate) command: String,
    pub(crate) subcommand: Option<String>,
    pub(crate) options: HashMap<String, String>,
    pub(crate) user_id: String,
    pub(crate) user_name: String,
    pub(crate) guild_id: Option<String>,
    pub(crate) member_joined_at: Option<String>,
    pub(crate) member_permissions: u64,
}

/// Parse an INTERACTION_CREATE payload. Returns None for anything that is not
/// a chat-input command or is missing its routing fields.
pub(crate) fn parse_interaction(payload: &Value) -> Option<Interaction> {
    let data = &payload["d"];

    // type 2 = APPLICATION_COMMAND
    if data["type"].as_u64() != Some(2) {
        return None;
    }

    let id = data["id"].as_str()?.to_string();
    let token = data["token"].as_str()?.to_string();
    let channel_id = data["channel_id"].as_str()?.to_string();
    let command = data["data"]["name"].as_str()?.to_string();

    let raw_options = data["data"]["options"].as_array();
    let (subcommand, option_values) = match raw_options.and_then(|opts| opts.first()) {
        // type 1 = SUB_COMMAND: the real options nest one level down
        Some(first) if first["type"].as_u64() == Some(1) => (
            first["name"].as_str().map(|s| s.to_string()),
            first["options"].as_array(),
        ),
        _ => (None, raw_options),
    };
    let options = option_values
        .map(|opts| {
            opts.iter()
                .filter_map(|opt| {
                    let name = opt["name"].as_str()?.to_string();
                    let value = match &opt["value"] {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default();

    // Guild invocations carry a member; DMs carry a bare user.
    let user = if data["member"]["user"].is_object() {
        &data["member"]["user"]
    } else {
        &data["user"]
    };
    let user_id = user["id"].as_str().unwrap_or_default().to_string();
    let user_name = user["username"].as_str().unwrap_or("unknown").to_string();

    Some(Interaction {
        id,
        token,
        channel_id,
        command,
        subcommand,
        options,
        user_id,
        user_name,
        guild_id: data["guild_id"].as_str().map(|s| s.to_string()),
        member_joined_at: data["member"]["joined_at"].as_str().map(|s| s.to_string()),
        member_permissions: data["member"]["permissions"]
            .as_str()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0),
    })
}

async fn fetch_gateway_url(http: &Client, api_url: &str, token: &str) -> Result<String, AppError> {
    let resp = http
        .get(format!("{api_url}/gateway/bot"))
        .header("Authorization", format!("Bot {token}"))
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(AppError::Discord(format!(
            "Gateway discovery failed: {}",
            resp.status()
        )));
    }
    let body: Value = resp.json().await?;
    let url = body["url"]
        .as_str()
        .ok_or_else(|| AppError::Discord("missing 'url' in gateway response".to_string()))?;
    Ok(format!("{url}/?v=10&encoding=json"))
}

/// One gateway session: handshake, heartbeat, then dispatch until the socket
/// closes. The caller owns reconnection and backoff.
pub(crate) async fn connect_and_listen(state: &Arc<State>, http: &Client) -> Result<(), AppError> {
    let gateway_url = fetch_gateway_url(http, &state.config.api_url, &state.config.token).await?;
    info!("Connecting to {gateway_url}");

    let (ws, _) = tokio_tungstenite::connect_async(&gateway_url).await?;
    info!("Gateway connected");
    let (mut write, mut read) = ws.split();

    // HELLO (op 10) carries the heartbeat interval
    let heartbeat_interval = match read.next().await {
        Some(Ok(msg)) => {
            let payload: Value =
                serde_json::from_str(msg.to_text().unwrap_or("{}")).unwrap_or_default();
            if payload["op"].as_u64() == Some(10) {
                payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41_250)
            } else {
                warn!("Expected HELLO, got: {payload}");
                41_250
            }
        }
        _ => return Err(AppError::Discord("no HELLO from gateway".to_string())),
    };
    debug!(interval_ms = heartbeat_interval, "Heartbeat interval");

    // IDENTIFY (op 2)
    let identify = serde_json::json!({
        "op": 2,
        "d": {
            "token": state.config.token,
            "intents": crate::constants::GATEWAY_INTENTS,
            "properties": { "os": "linux", "browser": "parley", "device": "parley" }
        }
    });
    write
        .send(WsMessage::Text(identify.to_string().into()))
        .await?;

    let write = Arc::new(Mutex::new(write));
    let hb_write = Arc::clone(&write);
    let heartbeat = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(heartbeat_interval));
        loop {
            interval.tick().await;
            let frame = serde_json::json!({ "op": 1, "d": null });
            let mut writer = hb_write.lock().await;
            if let Err(e) = writer.send(WsMessage::Text(frame.to_string().into())).await {
                warn!("Heartbeat failed: {e}");
                break;
            }
        }
    });

    let result = async {
        while let Some(msg) = read.next().await {
            let msg = msg?;
            let Ok(text) = msg.to_text() else { continue };
            let payload: Value = match serde_json::from_str(text) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to parse gateway payload: {e}");
                    continue;
                }
            };
            dispatch_event(state, &payload);
        }
        Ok(())
    }
    .await;

    heartbeat.abort();
    result
}

fn dispatch_event(state: &Arc<State>, payload: &Value) {
    match payload["t"].as_str() {
        Some("READY") => {
            let user = &payload["d"]["user"];
            if let Some(id) = user["id"].as_str() {
                let name = user["username"].as_str().unwrap_or("parley").to_string();
                info!(user = %name, "Logged in");
                state.set_bot_user(id.to_string(), name);
            }
        }
        Some("MESSAGE_CREATE") => {
            if let Some(event) = parse_message_event(payload) {
                let state = Arc::clone(state);
                tokio::spawn(async move {
                    crate::commands::handle_message(&state, event).await;
                });
            }
        }
        Some("INTERACTION_CREATE") => {
            if let Some(interaction) = parse_interaction(payload) {
                let state = Arc::clone(state);
                tokio::spawn(async move {
                    crate::commands::handle_interaction(&state, interaction).await;
                });
            }
        }
        _ => {}
    }
}
