use std::sync::atomic::AtomicU64;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::helpers::split_message;
use crate::memory::MemoryStore;
use crate::traits::{DiscordApi, LlmClient};

/// Immutable configuration set at startup from CLI args.
pub(crate) struct Config {
    pub(crate) token: String,
    pub(crate) api_url: String,
    pub(crate) default_model: String,
    pub(crate) max_context_chars: usize,
}

/// Runtime metrics (atomic counters).
pub(crate) struct Metrics {
    pub(crate) start_time: Instant,
    pub(crate) message_count: AtomicU64,
    pub(crate) llm_error_count: AtomicU64,
}

/// Identity of the logged-in bot, learned from the gateway READY event.
#[derive(Clone, Default)]
pub(crate) struct BotUser {
    pub(crate) id: String,
    pub(crate) name: String,
}

pub(crate) struct State {
    pub(crate) config: Config,
    pub(crate) metrics: Metrics,
    pub(crate) memory: MemoryStore,
    pub(crate) bot_user: RwLock<Option<BotUser>>,
    pub(crate) discord: Box<dyn DiscordApi>,
    pub(crate) llm: Box<dyn LlmClient>,
}

impl State {
    pub(crate) fn set_bot_user(&self, id: String, name: String) {
        if let Ok(mut guard) = self.bot_user.write() {
            *guard = Some(BotUser { id, name });
        }
    }

    pub(crate) fn bot_user(&self) -> Option<BotUser> {
        self.bot_user.read().ok().and_then(|g| g.clone())
    }

    pub(crate) async fn send_long_message(
        &self,
        channel_id: &str,
        message: &str,
        reply_to: Option<&str>,
    ) -> Result<(), AppError> {
        let parts = split_message(message, crate::constants::MAX_DISCORD_MSG_LEN);
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            // Only the first chunk is threaded as a reply.
            let reference = if i == 0 { reply_to } else { None };
            self.discord.send_message(channel_id, part, reference).await?;
        }
        Ok(())
    }
}
