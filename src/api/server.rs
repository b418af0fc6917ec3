//! Server lifecycle: bind → spawn background task → return a handle
//! with a shutdown channel, so the engine embeds cleanly in a host
//! process.

use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::api::router::api_router_with_ctx;
use crate::api::types::ApiContext;

/// Handle to a running wardsim server.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ServerHandle {
    /// Shut down the server gracefully. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Server shutdown signal sent");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bind the API server and spawn it in a background task.
///
/// Pass port 0 to bind an ephemeral port; the handle reports the
/// resolved address.
pub async fn start_server(ctx: ApiContext, bind_addr: SocketAddr) -> Result<ServerHandle, String> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {bind_addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router_with_ctx(ctx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Server received shutdown signal");
        };

        tracing::info!(%addr, "Server started");
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Server error: {e}");
        }
        tracing::info!("Server stopped");
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::assistant::stub::StubAssistant;
    use crate::assistant::AssistantGateway;
    use crate::config::AssistantConfig;
    use crate::db::Db;
    use crate::rooms::{RoomCoordinator, RoomRegistry};

    async fn test_ctx() -> (ApiContext, StubAssistant) {
        let stub = StubAssistant::spawn().await;
        let gateway = AssistantGateway::new(AssistantConfig {
            base_url: stub.base_url.clone(),
            api_key: "test-key".into(),
            emergency_persona: "persona_emergency".into(),
            clinical_persona: "persona_clinical".into(),
            poll_interval: Duration::from_millis(10),
            turn_timeout: Duration::from_millis(2_000),
        });
        let coordinator = RoomCoordinator::new(
            Db::in_memory().unwrap(),
            Arc::new(RoomRegistry::new()),
            Arc::new(gateway),
        );
        (ApiContext::new(coordinator), stub)
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let (ctx, _stub) = test_ctx().await;
        let mut server = start_server(ctx, "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        // Unauthenticated requests are rejected, not dropped
        let url = format!("http://{}/api/rooms/join", server.addr);
        let client = reqwest::Client::new();
        let resp = client
            .post(&url)
            .json(&serde_json::json!({"code": "ABC123"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (ctx, _stub) = test_ctx().await;
        let mut server = start_server(ctx, "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");
        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn authenticated_flow_over_real_server() {
        let (ctx, _stub) = test_ctx().await;
        let token = ctx.issue_session(uuid::Uuid::new_v4(), "lea");
        let server = start_server(ctx, "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://{}/api/rooms", server.addr))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "scenario_id": "scenario-sepsis",
                "max_participants": 2,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["code"].as_str().unwrap().len(), 6);
    }
}
