//! API server lifecycle: binds and runs the axum HTTP server that serves
//! the fallback extraction endpoint until a shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve_until<F>(ctx: ApiContext, addr: SocketAddr, shutdown: F) -> Result<(), String>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;
    serve_on(ctx, listener, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Binding port 0 up front lets the caller learn the chosen port before
/// serving starts.
pub async fn serve_on<F>(ctx: ApiContext, listener: TcpListener, shutdown: F) -> Result<(), String>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;
    tracing::info!(%addr, "API server listening");

    axum::serve(listener, api_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use uuid::Uuid;

    use crate::config::ServerConfig;
    use crate::logging::{LogControl, LogLevel};

    fn test_ctx(auth_token: Option<String>) -> ApiContext {
        ApiContext::new(
            ServerConfig {
                auth_token,
                ..ServerConfig::default()
            },
            Arc::new(LogControl::detached(LogLevel::Info)),
        )
    }

    struct RunningServer {
        port: u16,
        shutdown_tx: oneshot::Sender<()>,
        handle: JoinHandle<Result<(), String>>,
    }

    impl RunningServer {
        async fn stop(self) -> Result<(), String> {
            let _ = self.shutdown_tx.send(());
            self.handle.await.expect("server task panicked")
        }
    }

    async fn spawn_server(ctx: ApiContext) -> RunningServer {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_on(ctx, listener, async move {
            let _ = shutdown_rx.await;
        }));
        RunningServer {
            port,
            shutdown_tx,
            handle,
        }
    }

    #[tokio::test]
    async fn serves_until_shutdown_signal() {
        let server = spawn_server(test_ctx(None)).await;
        assert!(server.port > 0);

        let url = format!("http://127.0.0.1:{}/api/health", server.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success(), "Expected 2xx, got {}", resp.status());

        assert!(server.stop().await.is_ok());
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_token_over_http() {
        let server = spawn_server(test_ctx(Some("secret-token-123".into()))).await;

        let url = format!("http://127.0.0.1:{}/api/log-level", server.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn proxy_client_talks_to_running_server() {
        use crate::pipeline::extraction::pdf::tests::make_test_pdf;
        use crate::pipeline::extraction::{ProxyOptions, ServerProxyClient};

        let server = spawn_server(test_ctx(Some("secret-token-123".into()))).await;
        let endpoint = format!("http://127.0.0.1:{}/api/extract-pdf", server.port);

        let body = "A proxy round trip returns the words written into this page. ".repeat(6);
        let pdf = make_test_pdf(&[body.as_str()]);

        let client = ServerProxyClient::new(endpoint, Some("secret-token-123".into())).unwrap();
        let result = client
            .extract(
                &pdf,
                ProxyOptions {
                    timeout: Some(10_000),
                    max_pages: Some(5),
                },
                &Uuid::new_v4(),
            )
            .await
            .unwrap();
        assert!(result.text.contains("A proxy round trip"));
        assert_eq!(result.pages, Some(1));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let server = spawn_server(test_ctx(None)).await;
        let taken = SocketAddr::from(([127, 0, 0, 1], server.port));

        let err = serve_until(test_ctx(None), taken, async {})
            .await
            .unwrap_err();
        assert!(err.contains("Failed to bind"));

        server.stop().await.unwrap();
    }
}
