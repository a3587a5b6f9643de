use super::store::MemoryStore;
use crate::constants::{MEMORY_SHOW_CLAMP, MEMORY_SHOW_COUNT, MEMORY_SHOW_PREVIEW_CHARS};
use crate::helpers::truncate;

pub(crate) fn memory_stats_reply(store: &MemoryStore, channel_id: &str) -> String {
    let stats = store.stats();
    let mut out = format!(
        "**Memory Statistics**\nMemory limit: {} messages per channel\nTotal active channels: {}\n\n",
        stats.memory_limit, stats.total_channels
    );
    match stats.channels.get(channel_id) {
        Some(channel) => {
            out.push_str(&format!(
                "**This channel:**\nMessages stored: {}\nOldest message: {}\nNewest message: {}",
                channel.count,
                channel
                    .oldest_timestamp
                    .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "None".to_string()),
                channel
                    .newest_timestamp
                    .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "None".to_string()),
            ));
        }
        None => out.push_str("**This channel:** no messages stored"),
    }
    out
}

pub(crate) fn memory_show_reply(store: &MemoryStore, channel_id: &str) -> String {
    let history = store.get_history(channel_id);
    if history.is_empty() {
        return "No messages stored in memory for this channel.".to_string();
    }

    let mut out = format!("**Recent memory ({} messages):**\n```\n", history.len());
    let start = history.len().saturating_sub(MEMORY_SHOW_COUNT);
    for entry in &history[start..] {
        out.push_str(&format!(
            "[{}] {} ({}): {}\n",
            entry.timestamp.format("%H:%M:%S"),
            entry.author_name,
            entry.role,
            truncate(&entry.content, MEMORY_SHOW_PREVIEW_CHARS),
        ));
    }
    out.push_str("```");

    if out.chars().count() > MEMORY_SHOW_CLAMP {
        let clipped: String = out.chars().take(MEMORY_SHOW_CLAMP - 6).collect();
        out = format!("{clipped}...```");
    }
    out
}

pub(crate) fn memory_clear_reply(store: &MemoryStore, channel_id: &str) -> String {
    store.clear(channel_id);
    "Memory cleared for this channel.".to_string()
}
