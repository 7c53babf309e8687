use thiserror::Error;

/// Sub-kinds for [`BengError::Framing`], mirroring the symmetric HTTP/1.1
/// state machine's error taxonomy (client and server framing share it).
#[derive(Error, Debug)]
pub enum FramingKind {
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("malformed status line")]
    MalformedStatusLine,
    #[error("unsupported method")]
    UnsupportedMethod,
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("headers exceed the 64 KiB budget")]
    HeadersTooLarge,
    #[error("peer closed before the body was complete")]
    PrematureEof,
    #[error("bytes received after the response was already framed")]
    ExcessAfterResponse,
    #[error("Upgrade handshake error")]
    Upgrade,
}

#[derive(Error, Debug)]
pub enum SocketKind {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out")]
    Timeout,
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("input buffer overflow")]
    BufferOverflow,
}

#[derive(Error, Debug)]
pub enum UpstreamKind {
    #[error("connection refused")]
    ConnectRefused,
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("response timed out")]
    ResponseTimeout,
    #[error("TLS handshake failed")]
    TlsHandshake,
}

#[derive(Error, Debug)]
pub enum TranslationKind {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("translation server reported an error")]
    ServerError,
}

#[derive(Error, Debug)]
pub enum CacheKind {
    #[error("object too large to cache")]
    TooLarge,
    #[error("cache arena exhausted")]
    OutOfMemory,
}

#[derive(Error, Debug)]
pub enum WidgetKind {
    #[error("widget class not found")]
    NotFound,
    #[error("embedding forbidden by the parent's group policy")]
    Forbidden,
    #[error("parent widget is not a container")]
    NotAContainer,
    #[error("widget class resolver failed: {0}")]
    ResolverFailed(String),
}

/// Unified error type for the request-lifecycle engine.
///
/// Errors are typed by kind, never by string (apart from the
/// [`BengError::Unclassified`] last resort). Every suspension point in the
/// orchestrator returns this type via `Result`.
#[derive(Error, Debug)]
pub enum BengError {
    #[error("framing: {0}")]
    Framing(#[from] FramingKind),

    #[error("socket: {0}")]
    Socket(#[from] SocketKind),

    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamKind),

    #[error("translation: {0}")]
    Translation(#[from] TranslationKind),

    #[error("cache: {0}")]
    Cache(#[from] CacheKind),

    #[error("widget: {0}")]
    Widget(#[from] WidgetKind),

    /// Never surfaced to the peer; unwinds the request silently.
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Unclassified(String),
}

impl BengError {
    /// Maps to the HTTP status synthesized when this error occurs before
    /// response headers have been written (§7 propagation rule).
    pub fn status_code(&self) -> u16 {
        match self {
            BengError::Upstream(UpstreamKind::ConnectTimeout | UpstreamKind::ResponseTimeout) => {
                504
            }
            BengError::Upstream(_) => 502,
            BengError::Socket(SocketKind::Timeout) => 504,
            BengError::Widget(WidgetKind::Forbidden) => 403,
            BengError::Widget(WidgetKind::NotFound) => 404,
            _ => 500,
        }
    }

    /// Whether this error should blacklist the upstream address in the
    /// failure table (the "server-failure bit" in §7).
    pub fn is_server_failure(&self) -> bool {
        matches!(self, BengError::Upstream(_))
    }

    /// A minimal plain-text body for the synthesized error response.
    pub fn synthesize_body(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }

    /// Whether this error must never reach the peer (it unwinds silently).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BengError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_are_502() {
        let err = BengError::Upstream(UpstreamKind::ConnectRefused);
        assert_eq!(err.status_code(), 502);
        assert!(err.is_server_failure());
    }

    #[test]
    fn connect_timeout_is_504_and_server_failure() {
        let err = BengError::Upstream(UpstreamKind::ConnectTimeout);
        assert_eq!(err.status_code(), 504);
        assert!(err.is_server_failure());
    }

    #[test]
    fn socket_timeout_is_504() {
        let err = BengError::Socket(SocketKind::Timeout);
        assert_eq!(err.status_code(), 504);
        assert!(!err.is_server_failure());
    }

    #[test]
    fn widget_forbidden_is_403() {
        assert_eq!(BengError::Widget(WidgetKind::Forbidden).status_code(), 403);
    }

    #[test]
    fn widget_not_found_is_404() {
        assert_eq!(BengError::Widget(WidgetKind::NotFound).status_code(), 404);
    }

    #[test]
    fn unclassified_defaults_to_500() {
        assert_eq!(
            BengError::Unclassified("boom".into()).status_code(),
            500
        );
    }

    #[test]
    fn cancelled_is_never_surfaced() {
        assert!(BengError::Cancelled.is_cancelled());
    }

    #[test]
    fn framing_from_conversion() {
        let err: BengError = FramingKind::HeadersTooLarge.into();
        assert_eq!(err.status_code(), 500);
        assert!(matches!(err, BengError::Framing(FramingKind::HeadersTooLarge)));
    }
}
