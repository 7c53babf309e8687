use crate::coalesce::{decode_triple, encode_triple, PendingBody};
use crate::headers::{append_hop, forward_headers, strip_own_session_cookie};
use crate::translation_io::translate;
use crate::upstream::dispatch_http;
use beng_cache::{classify, conditional_headers, merge_not_modified_headers, CacheStore, RevalidationOutcome, RubberStore, SingleFlight};
use beng_core::address::{AddressKind, ResourceAddress};
use beng_core::cache_item::{is_admissible, CacheItem, CacheKey};
use beng_core::error::BengError;
use beng_core::http::{HeaderMap, HttpRequest, HttpResponse, Method};
use beng_core::transformation::{ProcessOptions, Transformation, TransformationChain};
use beng_core::translation::TranslationResponse;
use beng_stream::{ByteStream, CollectHandler, TeeBranch};
use beng_translation::{TranslateRequest, TranslationCache, TranslationCacheKey};
use beng_widget::{
    check_approval, resolve_state, rewrite_links, scan_widgets, splice, ClassRegistry, InMemoryStateStore,
    WidgetClass, WidgetTag,
};
use monoio::net::TcpStream;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Depth guard against a widget class that embeds itself without
/// `SELF_CONTAINER` ever reaching approval, or any other runaway nesting
/// (§5 resource policy: bounded work per request).
const MAX_WIDGET_DEPTH: u32 = 8;

const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 60;

/// Everything one worker owns across requests: the translation socket, the
/// per-worker response cache, the upstream connection pool, and the
/// widget-class/session-state caches the composer needs (§4.7, §4.8).
/// One instance lives per monoio worker thread, matching the thread-
/// per-core model the rest of the data plane uses.
pub struct WorkerState {
    pub translation_socket: String,
    pub translation_cache: TranslationCache,
    pub response_cache: RubberStore,
    pub idle_pool: IdlePool,
    pub failures: beng_pool::FailureTable,
    pub balancer: beng_pool::Balancer,
    pub class_registry: ClassRegistry,
    pub widget_state: InMemoryStateStore,
    pub session_cookie_name: String,
    pub hop_identity: String,
    pub cache_max_body_bytes: usize,
    pub single_flight: SingleFlight,
}

pub type IdlePool = beng_pool::IdlePool<TcpStream>;

/// Runs the full per-request pipeline (§4.7 steps 2-10; step 1, framing
/// off the client socket, happens in the caller). Boxed because widget
/// sub-requests (§4.8 step 4) recurse back into this same function.
///
/// `own_class` is `Some` when this call itself renders a widget's
/// sub-request (set by [`render_widget`]); widgets found in *this*
/// response's own body are then checked against `own_class`'s group
/// policy. The top-level page call passes `None`: a page is not itself a
/// widget, so embedding at that level is unrestricted (§4.8 step 2).
pub fn handle_request<'a>(
    state: &'a mut WorkerState,
    request: &'a HttpRequest<Vec<u8>>,
    depth: u32,
    own_class: Option<WidgetClass>,
) -> Pin<Box<dyn Future<Output = Result<HttpResponse<Vec<u8>>, BengError>> + 'a>> {
    Box::pin(async move {
        // Step 2: dissect URI into path and query.
        let (path, query) = split_uri(&request.target);

        // Step 3: translate, consulting the per-worker translation cache
        // first (§4.5/§4.7 step 2 caching note).
        let mut translate_req = TranslateRequest::new(path);
        translate_req.host = request.headers.get("host").map(str::to_string);
        translate_req.remote_host = Some(request.remote_addr.clone());
        translate_req.user_agent = request.headers.get("user-agent").map(str::to_string);
        translate_req.query_string = query.clone();

        let cache_key = TranslationCacheKey {
            uri: path.to_string(),
            vary: translation_vary_pair(&translate_req),
        };
        let mut translation = match state.translation_cache.get(path, &cache_key.vary) {
            Some(cached) => cached,
            None => {
                let resp = translate(&state.translation_socket, &translate_req).await?;
                cache_translation_if_eligible(&state.translation_cache, cache_key.clone(), &resp);
                resp
            }
        };

        // Step 4: session/realm updates, short-circuit on REDIRECT/BOUNCE/STATUS.
        if let Some(target) = translation.redirect.clone().or_else(|| translation.bounce.clone()) {
            return Ok(redirect_response(&target));
        }
        if let Some(status) = translation.status {
            return Ok(HttpResponse::new(status));
        }

        // Step 5: CHECK/PREVIOUS re-entry.
        if translation.needs_reentry() {
            let mut reentry = translate_req.clone();
            reentry.check = translation.check.clone();
            reentry.session = translation.session.clone();
            translation = translate(&state.translation_socket, &reentry).await?;
            if let Some(target) = translation.redirect.clone().or_else(|| translation.bounce.clone()) {
                return Ok(redirect_response(&target));
            }
            if let Some(status) = translation.status {
                return Ok(HttpResponse::new(status));
            }
        }

        let address = translation
            .address
            .clone()
            .unwrap_or_else(ResourceAddress::none);

        // Step 6: classify + forward request headers.
        let hop = state.hop_identity.clone();
        let forwarded = forward_headers(&request.headers, &translation.header_forwarding, |name, existing| {
            if name == "via" || name == "x-forwarded-for" {
                append_hop(name, existing, &hop)
            } else {
                existing.to_string()
            }
        });

        let vary_names: Vec<String> = translation.vary.clone();
        let cache_key = CacheKey::new(request.method, request.target.clone())
            .with_vary(vary_header_values(&request.headers, &vary_names));

        // Step 7: cache lookup, else dispatch via the resource loader.
        let (status, mut response_headers, mut body) = match fetch(
            state,
            &cache_key,
            request.method,
            &address,
            &request.target,
            &forwarded,
            sticky_key(&translation.session, &request.remote_addr),
        )
        .await
        {
            Ok(triple) => triple,
            Err(e) => return Err(e),
        };

        if request.method.is_cacheable() {
            maybe_cache(state, &cache_key, status, &response_headers, &body, translation.max_age);
        }

        // Step 8: transformation chain (template processing + widgets).
        if translation.transformations.has_processor() {
            let my_options = process_options_of(&translation.transformations);
            body = apply_widgets(state, &body, depth, own_class.as_ref(), &my_options).await?;
        }

        // Step 9: forward response headers, strip the proxy's own session cookie.
        let mut out_headers =
            forward_headers(&response_headers, &translation.header_forwarding, |_, v| v.to_string());
        strip_own_session_cookie(&mut out_headers, &state.session_cookie_name);
        response_headers = out_headers;

        // Step 10: assemble the response the caller writes to the client socket.
        let mut response = HttpResponse::new(status);
        response.headers = response_headers;
        response.body = if response.is_empty_bodied(request.method) {
            None
        } else {
            Some(body)
        };
        Ok(response)
    })
}

/// How long a [`SingleFlight`] joiner waits, in 10ms steps, for the
/// in-flight leader before giving up and dispatching its own request
/// (§4.6, §8 scenario E). The push-based `ByteStream` model this coalescing
/// is built on has no waker, so joiners poll.
const SINGLE_FLIGHT_POLL_ATTEMPTS: u32 = 100;
const SINGLE_FLIGHT_POLL_INTERVAL: Duration = Duration::from_millis(10);

async fn fetch(
    state: &mut WorkerState,
    cache_key: &CacheKey,
    method: Method,
    address: &ResourceAddress,
    target: &str,
    forwarded: &HeaderMap,
    sticky: Option<String>,
) -> Result<(u16, HeaderMap, Vec<u8>), BengError> {
    let cacheable = method.is_cacheable();

    if cacheable {
        if let Some(item) = state.response_cache.get(cache_key) {
            let body = state.response_cache.read_body(&item.payload).unwrap_or_default();
            return Ok((item.status, headers_from_pairs(&item.headers), body));
        }

        // A fetch for this exact key is already in flight: tee off its
        // result instead of dispatching a second upstream request.
        if let Some(branch) = state.single_flight.join(cache_key) {
            if let Some(triple) = join_single_flight(branch).await {
                return Ok(triple);
            }
            // The leader didn't finish in time; fall through and dispatch
            // independently rather than wedge this request on it.
        }
    }

    // An expired-but-present entry can be revalidated with a conditional
    // request instead of being treated as a plain miss (§4.6 Revalidation).
    let stale = if cacheable {
        state.response_cache.peek_stale(cache_key).cloned()
    } else {
        None
    };

    let pending = cacheable.then(PendingBody::new);
    if let Some(pending) = &pending {
        state.single_flight.start(cache_key.clone(), Box::new(pending.clone()));
    }

    let mut request_headers = forwarded.clone();
    if let Some(stale) = &stale {
        for (name, value) in conditional_headers(
            header_value(&stale.headers, "etag"),
            header_value(&stale.headers, "last-modified"),
        ) {
            request_headers.insert(&name, value);
        }
    }

    let dispatched = dispatch_http(
        address,
        method,
        target,
        &request_headers,
        sticky.as_deref(),
        &mut state.idle_pool,
        &mut state.failures,
        &mut state.balancer,
    )
    .await;

    if pending.is_some() {
        state.single_flight.finish(cache_key);
    }

    let response = dispatched?;

    // Only a response that declared itself reusable goes back to the idle
    // pool; otherwise the caller is the one who must drop it (§4.4).
    if response.keep_alive {
        if let AddressKind::Http { .. } = &address.kind {
            state.idle_pool.put(response.address.clone(), response.connection);
        }
    }

    let (status, headers, body) = match stale {
        Some(stale) if classify(response.status) == RevalidationOutcome::NotModified => {
            let mut merged = stale.headers;
            merge_not_modified_headers(&mut merged, &response.headers);
            let body = state.response_cache.read_body(&stale.payload).unwrap_or_default();
            (stale.status, headers_from_pairs(&merged), body)
        }
        _ => (response.status, response.headers, response.body),
    };

    if let Some(pending) = pending {
        pending.fulfill(encode_triple(status, &headers, &body));
    }

    Ok((status, headers, body))
}

/// Polls a `SingleFlight` joiner's branch for the leader's eventual
/// result. Returns `None` on timeout or if the leader's fetch itself
/// errored, letting the caller dispatch its own request instead.
async fn join_single_flight(mut branch: TeeBranch) -> Option<(u16, HeaderMap, Vec<u8>)> {
    let mut handler = CollectHandler::default();
    for _ in 0..SINGLE_FLIGHT_POLL_ATTEMPTS {
        branch.read(&mut handler);
        if handler.eof {
            branch.close();
            return decode_triple(&handler.data);
        }
        if handler.error.is_some() {
            branch.close();
            return None;
        }
        monoio::time::sleep(SINGLE_FLIGHT_POLL_INTERVAL).await;
    }
    branch.close();
    None
}

fn headers_from_pairs(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in pairs {
        headers.insert(k, v.clone());
    }
    headers
}

fn header_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn maybe_cache(
    state: &mut WorkerState,
    cache_key: &CacheKey,
    status: u16,
    headers: &HeaderMap,
    body: &[u8],
    max_age: Option<u32>,
) {
    let cache_control = headers.get("cache-control").unwrap_or("");
    let vary = headers.get("vary").unwrap_or("");
    if !is_admissible(
        cache_key.method,
        status,
        cache_control,
        vary,
        body.len(),
        state.cache_max_body_bytes,
    ) {
        return;
    }
    let Ok(handle) = state.response_cache.rubber_mut().add(body.len().max(1)) else {
        return;
    };
    state.response_cache.rubber_mut().write(&handle, 0, body);
    let ttl = max_age
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_CACHE_MAX_AGE_SECS));
    state.response_cache.put(CacheItem {
        key: cache_key.clone(),
        status,
        headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        payload: handle,
        size: body.len(),
        inserted_at: Instant::now(),
        expires_at: Instant::now() + ttl,
    });
}

/// Picks the container policy out of the first template-processor node
/// (`ProcessXml`/`ProcessCss`) in the chain, the options a widget's own
/// `PROCESS` translation response attaches (§4.8 step 2).
fn process_options_of(chain: &TransformationChain) -> ProcessOptions {
    chain
        .iter()
        .find_map(|t| match t {
            Transformation::ProcessXml(opts) | Transformation::ProcessCss(opts) => Some(opts.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Scans `body` for `<c:widget>` elements and, for each one whose class
/// resolves to an HTTP-backed address, dispatches its sub-request and
/// splices the rendered result in place (§4.8).
async fn apply_widgets(
    state: &mut WorkerState,
    body: &[u8],
    depth: u32,
    parent_class: Option<&WidgetClass>,
    parent_options: &ProcessOptions,
) -> Result<Vec<u8>, BengError> {
    let Ok(document) = std::str::from_utf8(body) else {
        return Ok(body.to_vec());
    };
    let tags = scan_widgets(document)?;
    if tags.is_empty() {
        return Ok(body.to_vec());
    }
    if depth >= MAX_WIDGET_DEPTH {
        return Ok(body.to_vec());
    }

    let mut replacements = Vec::with_capacity(tags.len());
    for tag in &tags {
        replacements.push(render_widget(state, tag, depth, parent_class, parent_options).await);
    }
    Ok(splice(document, &tags, &replacements).into_bytes())
}

async fn render_widget(
    state: &mut WorkerState,
    tag: &WidgetTag,
    depth: u32,
    parent_class: Option<&WidgetClass>,
    parent_options: &ProcessOptions,
) -> String {
    let class_name = tag.class_name.clone();
    if state.class_registry.get(&class_name).is_none() {
        match resolve_widget_class(&state.translation_socket, &state.translation_cache, &class_name).await {
            Ok(class) => state.class_registry.insert(class),
            Err(_) => return String::new(),
        }
    }
    let class = match state.class_registry.get(&class_name) {
        Some(class) => class.clone(),
        None => return String::new(),
    };

    // §4.8 step 2: a root-level page isn't itself a widget, so embedding
    // there is unrestricted; nested embedding (a widget's own body) is
    // subject to its class's declared approval policy.
    if let Some(parent_class) = parent_class {
        if check_approval(parent_class, parent_options, &class).is_err() {
            return String::new();
        }
    }

    let widget_state = resolve_state(&mut state.widget_state, &tag.id, None);
    let target = match &class.address.kind {
        AddressKind::Http { path, .. } => {
            let mut target = path.clone();
            if let Some(path_info) = &widget_state.path_info {
                target = format!("{}{}", target.trim_end_matches('/'), path_info);
            }
            if let Some(qs) = &widget_state.query_string {
                target = format!("{target}?{qs}");
            }
            target
        }
        _ => return String::new(),
    };

    let sub_request = HttpRequest {
        method: Method::Get,
        target,
        version_minor: 1,
        headers: HeaderMap::new(),
        body: None,
        local_addr: String::new(),
        remote_addr: String::new(),
    };

    match handle_request(state, &sub_request, depth + 1, Some(class.clone())).await {
        Ok(response) => {
            let body = response
                .body
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default();
            rewrite_links(&body, &tag.id, tag.mode)
        }
        Err(_) => String::new(),
    }
}

/// Resolves a widget class by name via a `WIDGET_TYPE` translation
/// round-trip (§4.8 step 1). Group membership and untrusted-host scoping
/// aren't carried by the wire protocol this builds on, so every resolved
/// class starts ungrouped/trusted; only the dispatch address comes back
/// from the translation server.
async fn resolve_widget_class(
    socket_path: &str,
    cache: &TranslationCache,
    name: &str,
) -> Result<WidgetClass, BengError> {
    let cache_key = TranslationCacheKey {
        uri: widget_type_cache_uri(name),
        vary: Vec::new(),
    };
    let response = match cache.get(&cache_key.uri, &cache_key.vary) {
        Some(cached) => cached,
        None => {
            let request = TranslateRequest::for_widget_type(name);
            let resp = translate(socket_path, &request).await?;
            cache_translation_if_eligible(cache, cache_key, &resp);
            resp
        }
    };
    Ok(WidgetClass {
        name: name.to_string(),
        address: response.address.unwrap_or_else(ResourceAddress::none),
        groups: Vec::new(),
        untrusted_host: None,
    })
}

/// Widget-type lookups share the translation cache's URI keyspace; prefix
/// with a NUL byte (never valid in an HTTP request target) so a widget
/// class name can't collide with a real path.
fn widget_type_cache_uri(name: &str) -> String {
    format!("\0widget-type\0{name}")
}

/// Translation-cache vary keying is deliberately narrower than the wire
/// protocol's `VARY` field: only `host` and `query_string` are tracked, so
/// only responses that vary on a subset of those two are cached at all
/// (§4.5 scope simplification).
fn translation_vary_pair(req: &TranslateRequest) -> Vec<(String, String)> {
    vec![
        ("host".to_string(), req.host.clone().unwrap_or_default()),
        ("query_string".to_string(), req.query_string.clone().unwrap_or_default()),
    ]
}

fn is_translation_cacheable(resp: &TranslationResponse) -> bool {
    resp.max_age.is_some()
        && resp.vary.iter().all(|name| {
            let name = name.to_ascii_lowercase();
            name == "host" || name == "query_string" || name == "query-string"
        })
}

fn cache_translation_if_eligible(cache: &TranslationCache, key: TranslationCacheKey, resp: &TranslationResponse) {
    if !is_translation_cacheable(resp) {
        return;
    }
    let ttl = resp.max_age.map(|secs| Duration::from_secs(secs as u64));
    cache.insert(key, resp.clone(), ttl);
}

fn split_uri(target: &str) -> (&str, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (target, None),
    }
}

fn vary_header_values(headers: &HeaderMap, names: &[String]) -> Vec<(String, String)> {
    names
        .iter()
        .map(|name| (name.clone(), headers.get(name).unwrap_or("").to_string()))
        .collect()
}

fn sticky_key(session: &Option<Vec<u8>>, remote_addr: &str) -> Option<String> {
    match session {
        Some(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        None => Some(remote_addr.to_string()),
    }
}

fn redirect_response(target: &str) -> HttpResponse<Vec<u8>> {
    let mut response = HttpResponse::new(302);
    response.headers.insert("location", target.to_string());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uri_separates_path_and_query() {
        assert_eq!(split_uri("/a/b?x=1"), ("/a/b", Some("x=1".to_string())));
        assert_eq!(split_uri("/a/b"), ("/a/b", None));
    }

    #[test]
    fn vary_header_values_pulls_named_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("accept-encoding", "gzip");
        let values = vary_header_values(&headers, &["accept-encoding".to_string(), "cookie".to_string()]);
        assert_eq!(
            values,
            vec![
                ("accept-encoding".to_string(), "gzip".to_string()),
                ("cookie".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn redirect_response_carries_the_location_header() {
        let resp = redirect_response("https://example.com/");
        assert_eq!(resp.status, 302);
        assert_eq!(resp.headers.get("location"), Some("https://example.com/"));
    }

    #[test]
    fn response_without_max_age_is_not_cacheable() {
        let resp = TranslationResponse::default();
        assert!(!is_translation_cacheable(&resp));
    }

    #[test]
    fn response_varying_on_host_and_query_string_is_cacheable() {
        let mut resp = TranslationResponse::default();
        resp.max_age = Some(30);
        resp.vary = vec!["host".to_string(), "QUERY_STRING".to_string()];
        assert!(is_translation_cacheable(&resp));
    }

    #[test]
    fn response_varying_on_a_wider_field_is_not_cacheable() {
        let mut resp = TranslationResponse::default();
        resp.max_age = Some(30);
        resp.vary = vec!["user-agent".to_string()];
        assert!(!is_translation_cacheable(&resp));
    }

    #[test]
    fn widget_type_cache_uri_is_nul_prefixed_and_name_specific() {
        assert_ne!(widget_type_cache_uri("a"), widget_type_cache_uri("b"));
        assert!(widget_type_cache_uri("foo").starts_with('\0'));
    }

    #[test]
    fn cache_translation_if_eligible_skips_uncacheable_responses() {
        let cache = TranslationCache::new(8);
        let key = TranslationCacheKey {
            uri: "/x".to_string(),
            vary: Vec::new(),
        };
        cache_translation_if_eligible(&cache, key, &TranslationResponse::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_translation_if_eligible_stores_cacheable_responses() {
        let cache = TranslationCache::new(8);
        let key = TranslationCacheKey {
            uri: "/x".to_string(),
            vary: Vec::new(),
        };
        let mut resp = TranslationResponse::default();
        resp.max_age = Some(30);
        cache_translation_if_eligible(&cache, key, &resp);
        assert!(cache.get("/x", &[]).is_some());
    }
}
