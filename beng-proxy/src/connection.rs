use crate::orchestrator::{handle_request, WorkerState};
use beng_core::http::{HttpRequest, Method};
use beng_net::{
    expects_100_continue, parse_request_head, resolve_body_length, serialize_response_head,
    BodyLength,
};
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::TcpStream;
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

const RESP_400: &[u8] = b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// Handle a single client connection (HTTP/1.1 with keepalive).
///
/// Shares `WorkerState` with all other connections on this thread via
/// `Rc<RefCell<_>>` — zero atomic overhead (§5 concurrency model).
pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    state: Rc<RefCell<WorkerState>>,
) -> anyhow::Result<()> {
    let local_addr = client
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();
    let remote_addr = peer_addr.to_string();

    let mut buf: Vec<u8> = Vec::with_capacity(8192);

    'connection: loop {
        // ── Read until a complete request head is buffered ──
        let head = loop {
            if let Some(head) = parse_request_head(&buf)? {
                break head;
            }
            let chunk = vec![0u8; 8192];
            let (res, chunk) = client.read(chunk).await;
            let n = match res {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) => return Err(e.into()),
            };
            buf.extend_from_slice(&chunk[..n]);
        };

        let body_length = match resolve_body_length(&head.headers, true, Some(head.method), None) {
            Ok(bl) => bl,
            Err(_) => {
                let (res, _) = client.write_all(RESP_400.to_vec()).await;
                res?;
                return Ok(());
            }
        };

        // ── Read the request body, if any (chunked bodies are not
        // supported on the client-facing side yet; treated as an error) ──
        let body = match body_length {
            BodyLength::None => Vec::new(),
            BodyLength::Fixed(total) => {
                let total = total as usize;
                if total > 0 && expects_100_continue(&head.headers, head.version_minor) {
                    let (res, _) = client.write_all(b"HTTP/1.1 100 Continue\r\n\r\n".to_vec()).await;
                    res?;
                }
                let mut body = buf[head.consumed..].to_vec();
                while body.len() < total {
                    let chunk = vec![0u8; (total - body.len()).min(65536)];
                    let (res, chunk) = client.read(chunk).await;
                    let n = match res {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) => return Err(e.into()),
                    };
                    body.extend_from_slice(&chunk[..n]);
                }
                body.truncate(total);
                body
            }
            BodyLength::Chunked | BodyLength::UntilClose => {
                let (res, _) = client.write_all(RESP_400.to_vec()).await;
                res?;
                return Ok(());
            }
        };

        let keep_alive = head.version_minor >= 1 && !head.headers.has_token("connection", "close");

        let request = HttpRequest {
            method: head.method,
            target: head.target,
            version_minor: head.version_minor,
            headers: head.headers,
            body: Some(body),
            local_addr: local_addr.clone(),
            remote_addr: remote_addr.clone(),
        };

        // Drain the consumed request out of the read buffer before any
        // further awaits touch it.
        let consumed_total = head.consumed
            + match body_length {
                BodyLength::Fixed(n) => n as usize,
                _ => 0,
            };
        if consumed_total <= buf.len() {
            buf.drain(..consumed_total);
        } else {
            buf.clear();
        }

        // ── Run the request through the per-worker orchestrator ──
        let method = request.method;
        let response = {
            let mut worker = state.borrow_mut();
            match handle_request(&mut worker, &request, 0, None).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(error = %err, "request handling failed");
                    let mut resp = beng_core::http::HttpResponse::new(err.status_code());
                    resp.body = Some(err.synthesize_body());
                    resp
                }
            }
        };

        let mut response = response;
        let body_bytes = if response.is_empty_bodied(method) {
            Vec::new()
        } else {
            response.body.take().unwrap_or_default()
        };
        if !response.headers.contains("content-length") && method != Method::Head {
            response
                .headers
                .insert("content-length", body_bytes.len().to_string());
        }
        if !keep_alive {
            response.headers.insert("connection", "close");
        }

        let head_bytes = serialize_response_head(response.status, &response.headers);
        let (res, _) = client.write_all(head_bytes).await;
        res?;
        if !body_bytes.is_empty() {
            let (res, _) = client.write_all(body_bytes).await;
            res?;
        }

        if !keep_alive {
            break 'connection;
        }
    }
    Ok(())
}
