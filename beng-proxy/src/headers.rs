use beng_core::http::HeaderMap;
use beng_core::translation::{ForwardMode, HeaderForwardingPolicy};

/// Applies the translation response's per-group forwarding policy to an
/// incoming header map, producing the set of headers to send onward
/// (§4.7 step 6). `mangle` rewrites an `Identity`-group header instead of
/// passing its value through verbatim (e.g. appending to `Via`/
/// `X-Forwarded-For`).
pub fn forward_headers(
    source: &HeaderMap,
    policy: &HeaderForwardingPolicy,
    mangle: impl Fn(&str, &str) -> String,
) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in source.iter() {
        let group = HeaderForwardingPolicy::classify(name);
        match policy.mode_for(group) {
            ForwardMode::No => {}
            ForwardMode::Yes | ForwardMode::Both => out.insert(name, value),
            ForwardMode::Mangle => out.insert(name, mangle(name, value)),
        }
    }
    out
}

/// Appends this hop to a `Via`/`X-Forwarded-For`-style header, the
/// default `Mangle` behavior for the `Identity` group (§4.7 step 6).
pub fn append_hop(name: &str, existing: &str, hop: &str) -> String {
    let _ = name;
    if existing.is_empty() {
        hop.to_string()
    } else {
        format!("{existing}, {hop}")
    }
}

/// Strips any `Set-Cookie` header whose cookie name matches the proxy's
/// own session cookie (§4.7 step 9) before forwarding response headers
/// to the client.
pub fn strip_own_session_cookie(headers: &mut HeaderMap, session_cookie_name: &str) {
    let prefix = format!("{session_cookie_name}=");
    let kept: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, value)| !(*name == "set-cookie" && value.starts_with(&prefix)))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    let mut rebuilt = HeaderMap::new();
    for (name, value) in kept {
        rebuilt.insert(&name, value);
    }
    *headers = rebuilt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_headers_are_mangled_with_the_current_hop() {
        let mut source = HeaderMap::new();
        source.insert("x-forwarded-for", "1.2.3.4");
        let policy = HeaderForwardingPolicy::default();
        let out = forward_headers(&source, &policy, |_, existing| append_hop("", existing, "5.6.7.8"));
        assert_eq!(out.get("x-forwarded-for"), Some("1.2.3.4, 5.6.7.8"));
    }

    #[test]
    fn cors_headers_are_dropped_by_default() {
        let mut source = HeaderMap::new();
        source.insert("origin", "https://example.com");
        let policy = HeaderForwardingPolicy::default();
        let out = forward_headers(&source, &policy, |_, v| v.to_string());
        assert!(out.get("origin").is_none());
    }

    #[test]
    fn own_session_cookie_is_stripped_others_survive() {
        let mut headers = HeaderMap::new();
        headers.insert("set-cookie", "beng_sid=abc123; Path=/");
        headers.insert("set-cookie", "other=keep");
        strip_own_session_cookie(&mut headers, "beng_sid");
        let remaining: Vec<&str> = headers.get_all("set-cookie").collect();
        assert_eq!(remaining, vec!["other=keep"]);
    }
}
