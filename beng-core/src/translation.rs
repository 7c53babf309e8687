use crate::address::ResourceAddress;
use crate::transformation::TransformationChain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Groups a forwarded header is classified into (§4.7 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderGroup {
    /// Transfer-framing headers forwarded unconditionally
    /// (`content-length`, `content-type`, `date`, ...).
    BasicAlways,
    Cookie,
    Cors,
    Capabilities,
    /// `X-Forwarded-For`, `Via` — client-identity headers, usually mangled.
    Identity,
    Link,
    Auth,
    Ssl,
    Secure,
    Transformation,
    Other,
}

impl HeaderGroup {
    /// Wire encoding for the `HEADER_FORWARD` translation packet.
    pub fn code(self) -> u8 {
        match self {
            HeaderGroup::BasicAlways => 0,
            HeaderGroup::Cookie => 1,
            HeaderGroup::Cors => 2,
            HeaderGroup::Capabilities => 3,
            HeaderGroup::Identity => 4,
            HeaderGroup::Link => 5,
            HeaderGroup::Auth => 6,
            HeaderGroup::Ssl => 7,
            HeaderGroup::Secure => 8,
            HeaderGroup::Transformation => 9,
            HeaderGroup::Other => 10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => HeaderGroup::BasicAlways,
            1 => HeaderGroup::Cookie,
            2 => HeaderGroup::Cors,
            3 => HeaderGroup::Capabilities,
            4 => HeaderGroup::Identity,
            5 => HeaderGroup::Link,
            6 => HeaderGroup::Auth,
            7 => HeaderGroup::Ssl,
            8 => HeaderGroup::Secure,
            9 => HeaderGroup::Transformation,
            10 => HeaderGroup::Other,
            _ => return None,
        })
    }
}

/// How a header group is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardMode {
    No,
    Yes,
    Both,
    /// Forward, rewriting the value (append to `Via`/`X-Forwarded-For`,
    /// etc.) rather than passing it through verbatim.
    Mangle,
}

impl ForwardMode {
    /// Wire encoding for the `HEADER_FORWARD` translation packet.
    pub fn code(self) -> u8 {
        match self {
            ForwardMode::No => 0,
            ForwardMode::Yes => 1,
            ForwardMode::Both => 2,
            ForwardMode::Mangle => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ForwardMode::No,
            1 => ForwardMode::Yes,
            2 => ForwardMode::Both,
            3 => ForwardMode::Mangle,
            _ => return None,
        })
    }
}

/// Per-group forwarding policy, as set by the translation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderForwardingPolicy {
    modes: HashMap<HeaderGroup, ForwardMode>,
}

impl Default for HeaderForwardingPolicy {
    fn default() -> Self {
        use ForwardMode::*;
        use HeaderGroup::*;
        let mut modes = HashMap::new();
        modes.insert(BasicAlways, Yes);
        modes.insert(Cookie, Yes);
        modes.insert(Cors, No);
        modes.insert(Capabilities, Yes);
        modes.insert(Identity, Mangle);
        modes.insert(Link, Yes);
        modes.insert(Auth, No);
        modes.insert(Ssl, No);
        modes.insert(Secure, Yes);
        modes.insert(Transformation, No);
        modes.insert(Other, No);
        Self { modes }
    }
}

impl HeaderForwardingPolicy {
    pub fn mode_for(&self, group: HeaderGroup) -> ForwardMode {
        *self.modes.get(&group).unwrap_or(&ForwardMode::No)
    }

    pub fn set(&mut self, group: HeaderGroup, mode: ForwardMode) {
        self.modes.insert(group, mode);
    }

    /// Classify a (lowercased) header name into its forwarding group.
    pub fn classify(name: &str) -> HeaderGroup {
        match name {
            "content-length" | "content-type" | "date" | "connection" | "transfer-encoding"
            | "te" | "trailer" | "upgrade" | "keep-alive" | "host" => HeaderGroup::BasicAlways,
            "cookie" | "cookie2" | "set-cookie" | "set-cookie2" => HeaderGroup::Cookie,
            "user-agent" | "accept" | "accept-charset" | "accept-encoding"
            | "accept-language" => HeaderGroup::Capabilities,
            "x-forwarded-for" | "x-forwarded-proto" | "x-forwarded-host" | "via" => {
                HeaderGroup::Identity
            }
            "location" | "content-location" => HeaderGroup::Link,
            "authorization" | "www-authenticate" | "proxy-authenticate"
            | "proxy-authorization" => HeaderGroup::Auth,
            "strict-transport-security" => HeaderGroup::Secure,
            _ if name.starts_with("access-control-") || name == "origin" => HeaderGroup::Cors,
            _ if name.starts_with("x-cm4all-ssl") => HeaderGroup::Ssl,
            _ if name.starts_with("x-cm4all-view") || name.starts_with("x-cm4all-widget") => {
                HeaderGroup::Transformation
            }
            _ => HeaderGroup::Other,
        }
    }
}

/// The parsed result of a translation round-trip (§3 "Translation
/// response"). Fields not meaningful for the selected variant stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub address: Option<ResourceAddress>,
    pub transformations: TransformationChain,

    pub status: Option<u16>,
    pub redirect: Option<String>,
    pub bounce: Option<String>,

    pub session: Option<Vec<u8>>,
    pub realm: Option<String>,

    pub max_age: Option<u32>,
    pub vary: Vec<String>,
    pub invalidate: Vec<String>,

    /// Opaque token to echo back on a `CHECK` re-entry round-trip.
    pub check: Option<Vec<u8>>,
    /// Reuse the previous response's resource address (`PREVIOUS`).
    pub previous: bool,

    pub view: Option<String>,
    pub secure_view: Option<String>,

    #[serde(default)]
    pub header_forwarding: HeaderForwardingPolicy,
}

impl TranslationResponse {
    /// Whether this response short-circuits the orchestrator (§4.7 step 4).
    pub fn is_short_circuit(&self) -> bool {
        self.redirect.is_some() || self.bounce.is_some() || self.status.is_some()
    }

    /// Whether the proxy must re-enter translation with the echoed token
    /// before dispatching (§4.7 step 5).
    pub fn needs_reentry(&self) -> bool {
        self.check.is_some() || self.previous
    }
}
