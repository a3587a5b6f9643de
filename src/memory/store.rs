use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::config::MemoryConfig;
use crate::constants::MAX_ENTRY_CONTENT_CHARS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    User,
    Assistant,
    #[allow(dead_code)] // constructed in tests; reserved for injected context entries
    System,
}

impl Role {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded message. `timestamp` is caller-supplied and may disagree with
/// insertion order; insertion order stays authoritative for eviction and
/// rendering.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) author_id: String,
    pub(crate) author_name: String,
    pub(crate) content: String,
    pub(crate) role: Role,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChannelStats {
    pub(crate) count: usize,
    pub(crate) oldest_timestamp: Option<DateTime<Utc>>,
    pub(crate) newest_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MemoryStats {
    pub(crate) total_channels: usize,
    pub(crate) memory_limit: usize,
    pub(crate) channels: HashMap<String, ChannelStats>,
}

struct StoreInner {
    config: MemoryConfig,
    channels: DashMap<String, VecDeque<Entry>>,
    expiry_timers: DashMap<String, AbortHandle>,
}

/// Per-channel rolling conversation history, bounded and idle-expiring.
///
/// A cheap handle over shared state; clones refer to the same store. All
/// state is in-process and nothing survives a restart. Mutation goes through
/// the map's entry guards, so two concurrent `record` calls on one channel
/// serialize and readers never see a partially-evicted history.
#[derive(Clone)]
pub(crate) struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub(crate) fn new(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                channels: DashMap::new(),
                expiry_timers: DashMap::new(),
            }),
        }
    }

    pub(crate) fn config(&self) -> &MemoryConfig {
        &self.inner.config
    }

    /// Append a message to a channel's history, creating the history if
    /// absent, evicting oldest entries past the limit, and re-arming the
    /// channel's idle-expiry timer. Invalid identifiers make this a warned
    /// no-op; a memory failure must never fail the caller's request.
    pub(crate) fn record(
        &self,
        channel_id: &str,
        author_id: &str,
        author_name: &str,
        content: &str,
        role: Role,
        timestamp: DateTime<Utc>,
    ) {
        if channel_id.is_empty() || author_id.is_empty() || author_name.is_empty() {
            warn!(
                channel = %channel_id,
                author = %author_id,
                "Dropping memory entry with missing identifiers"
            );
            return;
        }

        let entry = Entry {
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            content: content.chars().take(MAX_ENTRY_CONTENT_CHARS).collect(),
            role,
            timestamp,
        };

        {
            let mut history = self.inner.channels.entry(channel_id.to_string()).or_default();
            history.push_back(entry);
            while history.len() > self.inner.config.memory_limit {
                if let Some(evicted) = history.pop_front() {
                    debug!(
                        channel = %channel_id,
                        author = %evicted.author_name,
                        "Evicted oldest memory entry"
                    );
                }
            }
            debug!(channel = %channel_id, size = history.len(), "Recorded memory entry");
        }

        self.arm_expiry(channel_id);
    }

    /// Copy of the channel's history in insertion order; empty when unknown.
    pub(crate) fn get_history(&self, channel_id: &str) -> Vec<Entry> {
        self.inner
            .channels
            .get(channel_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a channel's history and cancel its timer. Safe to call on a
    /// channel that has nothing stored.
    pub(crate) fn clear(&self, channel_id: &str) {
        if let Some((_, handle)) = self.inner.expiry_timers.remove(channel_id) {
            handle.abort();
        }
        if let Some((_, history)) = self.inner.channels.remove(channel_id) {
            info!(channel = %channel_id, entries = history.len(), "Cleared channel memory");
        }
    }

    pub(crate) fn stats(&self) -> MemoryStats {
        let channels = self
            .inner
            .channels
            .iter()
            .map(|entry| {
                let history = entry.value();
                (
                    entry.key().clone(),
                    ChannelStats {
                        count: history.len(),
                        oldest_timestamp: history.front().map(|e| e.timestamp),
                        newest_timestamp: history.back().map(|e| e.timestamp),
                    },
                )
            })
            .collect();
        MemoryStats {
            total_channels: self.inner.channels.len(),
            memory_limit: self.inner.config.memory_limit,
            channels,
        }
    }

    /// Remove channels whose newest entry is older than the idle threshold,
    /// and any left empty. Safety net for lost timers; returns the number of
    /// channels removed.
    pub(crate) fn sweep(&self) -> usize {
        let Ok(threshold) = chrono::Duration::from_std(self.inner.config.idle_expiry) else {
            return 0;
        };
        let cutoff = Utc::now() - threshold;
        let stale: Vec<String> = self
            .inner
            .channels
            .iter()
            .filter(|entry| match entry.value().back() {
                Some(newest) => newest.timestamp < cutoff,
                None => true,
            })
            .map(|entry| entry.key().clone())
            .collect();
        for channel in &stale {
            if let Some((_, handle)) = self.inner.expiry_timers.remove(channel) {
                handle.abort();
            }
            self.inner.channels.remove(channel);
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "Swept inactive channels");
        }
        stale.len()
    }

    /// Sliding expiration: any prior timer for the channel is cancelled
    /// before the replacement is scheduled.
    fn arm_expiry(&self, channel_id: &str) {
        let store = self.clone();
        let channel = channel_id.to_string();
        let delay = self.inner.config.idle_expiry;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.expire(&channel);
        })
        .abort_handle();
        if let Some(old) = self.inner.expiry_timers.insert(channel_id.to_string(), handle) {
            old.abort();
        }
    }

    fn expire(&self, channel_id: &str) {
        self.inner.expiry_timers.remove(channel_id);
        match self.inner.channels.remove(channel_id) {
            Some((_, history)) => {
                info!(channel = %channel_id, entries = history.len(), "Idle channel memory expired");
            }
            None => {
                debug!(channel = %channel_id, "Expiry fired for already-cleared channel");
            }
        }
    }
}
