use beng_observability::MetricsCollector;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Serves the Prometheus text-exposition endpoint on the tokio control
/// plane (§6: the observability surface is not part of the client HTTP
/// framing the monoio workers implement, so it gets its own tiny listener
/// rather than routing through the data plane).
pub async fn serve(addr: std::net::SocketAddr, path: String, collector: Arc<MetricsCollector>) {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(error = %e, %addr, "failed to bind metrics listener");
            return;
        }
    };
    debug!(%addr, %path, "metrics endpoint listening");

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "metrics accept error");
                continue;
            }
        };
        let path = path.clone();
        let collector = Arc::clone(&collector);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };
            let request_line = String::from_utf8_lossy(&buf[..n]);
            let requested_path = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or("/");

            let response = if requested_path == path {
                let body = collector.gather_text();
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
            } else {
                "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string()
            };
            let _ = stream.write_all(response.as_bytes()).await;
        });
    }
}
