use crate::request::TranslateRequest;
use crate::response::decode_response;
use beng_core::error::{BengError, TranslationKind};
use beng_core::translation::TranslationResponse;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// A translation-server connection over a UNIX domain socket (§3, §6).
/// One connection handles one `BEGIN ... END` round-trip at a time; the
/// caller is responsible for re-entry (`CHECK`/`PREVIOUS`) by issuing a
/// follow-up [`TranslationClient::translate`] call with the echoed token.
pub struct TranslationClient {
    socket_path: String,
}

impl TranslationClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub async fn translate(&self, request: &TranslateRequest) -> Result<TranslationResponse, BengError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| TranslationKind::Io(e))?;

        stream
            .write_all(&request.encode())
            .await
            .map_err(|e| TranslationKind::Io(e))?;

        let mut buf = Vec::with_capacity(512);
        let mut chunk = [0u8; 4096];
        loop {
            if let Some((resp, _)) = decode_response(&buf)? {
                return Ok(resp);
            }
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| TranslationKind::Io(e))?;
            if n == 0 {
                return Err(TranslationKind::Protocol("connection closed mid-reply".into()).into());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Re-enters translation with a `CHECK`/`PREVIOUS` token the first
    /// reply asked for (§4.7 step 5).
    pub async fn reenter(
        &self,
        original: &TranslateRequest,
        check_token: Vec<u8>,
    ) -> Result<TranslationResponse, BengError> {
        let mut req = original.clone();
        req.check = Some(check_token);
        self.translate(&req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_failure_surfaces_as_a_translation_io_error() {
        let client = TranslationClient::new("/nonexistent/beng-translation.sock");
        let err = client.translate(&TranslateRequest::new("/x")).await.unwrap_err();
        assert!(matches!(err, BengError::Translation(_)));
    }
}
