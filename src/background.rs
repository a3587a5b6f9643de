use tracing::info;

use crate::memory::MemoryStore;

/// Periodic safety-net sweep over all channels, catching histories whose
/// per-channel timer was lost. Runs at the idle-expiry cadence; precision is
/// not required.
pub(crate) fn spawn_memory_sweeper(store: &MemoryStore) {
    let store = store.clone();
    tokio::spawn(async move {
        let interval = store.config().idle_expiry;
        loop {
            tokio::time::sleep(interval).await;
            store.sweep();
        }
    });
}

pub(crate) fn spawn_shutdown_handler() {
    // SIGINT / Ctrl-C. Memory is volatile by design, so there is nothing to
    // flush; exit once the signal arrives.
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        info!("Shutdown signal received, exiting");
        std::process::exit(0);
    });

    // SIGTERM (Unix only)
    #[cfg(unix)]
    tokio::spawn(async move {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        sig.recv().await;
        info!("SIGTERM received, exiting");
        std::process::exit(0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConfig, Role};
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sweeper_removes_stale_channel() {
        let store = MemoryStore::new(MemoryConfig {
            memory_limit: 10,
            idle_expiry: Duration::from_millis(30),
        });
        // Backdated entry so the sweep sees it as stale; the per-channel
        // timer also fires at 30ms, but the sweeper alone must suffice.
        let stale_ts = Utc::now() - chrono::Duration::hours(1);
        store.record("c1", "u1", "alice", "old", Role::User, stale_ts);
        spawn_memory_sweeper(&store);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get_history("c1").is_empty());
    }
}
