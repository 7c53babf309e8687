/// URI rewriting mode for one rewritten attribute inside a processed
/// template (§4.8 "URI rewriting in the body").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Link to the target resource directly, bypassing the widget frame.
    Direct,
    /// Encode the widget path into the query so a click re-targets this
    /// widget specifically.
    Focus,
    /// Like `Focus`, but also retains the outer page frame.
    Partial,
    /// Link back to the current response (e.g. a same-widget form post).
    Response,
}

impl RewriteMode {
    /// Parses a `<c:widget mode="...">` attribute value, case-insensitive.
    /// Unrecognized or absent values fall back to `Partial`, the mode that
    /// keeps the widget embedded in its page frame.
    pub fn from_attr(s: Option<&str>) -> Self {
        match s.map(str::to_ascii_lowercase).as_deref() {
            Some("direct") => RewriteMode::Direct,
            Some("focus") => RewriteMode::Focus,
            Some("response") => RewriteMode::Response,
            _ => RewriteMode::Partial,
        }
    }
}

const FOCUS_PARAM: &str = "focus";
const FRAME_PARAM: &str = "frame";

/// Rewrites `href`/`src`/... attribute `target` according to `mode`,
/// given the widget path it belongs to (§4.8).
pub fn rewrite_uri(target: &str, widget_path: &str, mode: RewriteMode) -> String {
    match mode {
        RewriteMode::Direct => target.to_string(),
        RewriteMode::Focus => append_query_param(target, FOCUS_PARAM, widget_path),
        RewriteMode::Partial => {
            let with_focus = append_query_param(target, FOCUS_PARAM, widget_path);
            append_query_param(&with_focus, FRAME_PARAM, widget_path)
        }
        RewriteMode::Response => append_query_param(target, FOCUS_PARAM, widget_path),
    }
}

fn append_query_param(uri: &str, key: &str, value: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{key}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_mode_leaves_the_target_unchanged() {
        assert_eq!(rewrite_uri("/other-page", "page.nav", RewriteMode::Direct), "/other-page");
    }

    #[test]
    fn focus_mode_appends_the_widget_path_as_a_query_param() {
        assert_eq!(
            rewrite_uri("/page", "page.comments", RewriteMode::Focus),
            "/page?focus=page.comments"
        );
    }

    #[test]
    fn focus_mode_appends_to_an_existing_query_string() {
        assert_eq!(
            rewrite_uri("/page?tab=1", "page.comments", RewriteMode::Focus),
            "/page?tab=1&focus=page.comments"
        );
    }

    #[test]
    fn partial_mode_retains_both_focus_and_frame_params() {
        let rewritten = rewrite_uri("/page", "page.comments", RewriteMode::Partial);
        assert!(rewritten.contains("focus=page.comments"));
        assert!(rewritten.contains("frame=page.comments"));
    }

    #[test]
    fn mode_attr_parsing_defaults_to_partial() {
        assert_eq!(RewriteMode::from_attr(Some("direct")), RewriteMode::Direct);
        assert_eq!(RewriteMode::from_attr(Some("FOCUS")), RewriteMode::Focus);
        assert_eq!(RewriteMode::from_attr(Some("response")), RewriteMode::Response);
        assert_eq!(RewriteMode::from_attr(Some("bogus")), RewriteMode::Partial);
        assert_eq!(RewriteMode::from_attr(None), RewriteMode::Partial);
    }
}
