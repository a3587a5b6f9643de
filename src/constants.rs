//! Tunables and fixed protocol limits.

/// Per-entry content cap applied at record time (truncation, not rejection).
pub(crate) const MAX_ENTRY_CONTENT_CHARS: usize = 1000;

pub(crate) const DEFAULT_MEMORY_LIMIT: usize = 20;
pub(crate) const MAX_MEMORY_LIMIT: usize = 100;

pub(crate) const DEFAULT_IDLE_EXPIRY_HOURS: u64 = 1;
pub(crate) const MAX_IDLE_EXPIRY_HOURS: u64 = 168;

/// Default character budget for a rendered context block.
pub(crate) const DEFAULT_CONTEXT_CHARS: usize = 2000;

pub(crate) const CONTEXT_HEADER: &str = "[Recent conversation history]";
pub(crate) const CONTEXT_FOOTER: &str = "[End of conversation history]";

/// Discord rejects message bodies over 2000 characters.
pub(crate) const MAX_DISCORD_MSG_LEN: usize = 2000;

/// Entries shown by `/memory show` and their per-entry preview length.
pub(crate) const MEMORY_SHOW_COUNT: usize = 10;
pub(crate) const MEMORY_SHOW_PREVIEW_CHARS: usize = 100;
/// Clamp for the whole `/memory show` reply, leaving headroom under the
/// message limit for the closing code fence.
pub(crate) const MEMORY_SHOW_CLAMP: usize = 1900;

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
pub(crate) const GATEWAY_INTENTS: u64 = 1 | 512 | 4096 | 32768;

/// MANAGE_MESSAGES permission bit, required for the memory subcommands.
pub(crate) const MANAGE_MESSAGES: u64 = 1 << 13;

pub(crate) const LLM_SYSTEM_PROMPT: &str = "You are parley, a helpful assistant.";

pub(crate) const ERROR_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again later.";
