use beng_core::error::{BengError, TranslationKind};
use beng_core::translation::TranslationResponse;
use beng_translation::{decode_response, TranslateRequest};
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::UnixStream;

/// Monoio-flavored twin of `beng_translation::TranslationClient`, used on
/// the per-request hot path where a worker thread only runs a monoio
/// event loop and cannot `.await` a tokio future. The wire codec
/// (`beng_translation::protocol`/`request`/`response`) is shared; only the
/// socket I/O driver differs. The tokio-based client still serves
/// control-plane callers (cache refresh, health checks) that run on a
/// separate thread.
pub async fn translate(
    socket_path: &str,
    request: &TranslateRequest,
) -> Result<TranslationResponse, BengError> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(TranslationKind::Io)?;

    let wire = request.encode();
    let (res, _) = stream.write_all(wire).await;
    res.map_err(TranslationKind::Io)?;

    let mut buf: Vec<u8> = Vec::with_capacity(512);
    loop {
        if let Some((resp, _)) = decode_response(&buf)? {
            return Ok(resp);
        }
        let chunk = vec![0u8; 4096];
        let (res, chunk) = stream.read(chunk).await;
        let n = res.map_err(TranslationKind::Io)?;
        if n == 0 {
            return Err(TranslationKind::Protocol("connection closed mid-reply".into()).into());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
