use crate::state::State;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub(crate) fn build_health_json(state: &State) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "uptime_secs": state.metrics.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn build_stats_json(state: &State) -> serde_json::Value {
    let uptime = state.metrics.start_time.elapsed();
    let memory = serde_json::to_value(state.memory.stats()).unwrap_or_default();
    serde_json::json!({
        "uptime_secs": uptime.as_secs(),
        "messages": state.metrics.message_count.load(Ordering::Relaxed),
        "llm_errors": state.metrics.llm_error_count.load(Ordering::Relaxed),
        "model": state.config.default_model,
        "memory": memory,
        "version": env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) async fn run_stats_server(listener: TcpListener, state: Arc<State>) {
    info!(addr = %listener.local_addr().unwrap(), "Stats server listening");
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Stats accept error: {e}");
                continue;
            }
        };
        debug!(peer = %addr, "Stats connection");
        let state = state.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await;
            let request = String::from_utf8_lossy(&buf);
            let path = request.split_whitespace().nth(1).unwrap_or("/");
            let body = if path == "/healthz" {
                build_health_json(&state).to_string()
            } else {
                build_stats_json(&state).to_string()
            };
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
    }
}
