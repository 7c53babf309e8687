use crate::rewrite::{rewrite_uri, RewriteMode};
use beng_core::error::{BengError, WidgetKind};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::sync::OnceLock;

/// One `<c:widget .../>` occurrence found while scanning a template body
/// (§4.8). Byte offsets are into the original document, so the caller can
/// splice the rendered sub-request response in at exactly this span once
/// it has recursed through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetTag {
    pub id: String,
    pub class_name: String,
    pub span: (usize, usize),
    /// The `mode` attribute, governing how links inside this widget's own
    /// rendered body get rewritten (§4.8 "URI rewriting in the body").
    pub mode: RewriteMode,
}

const WIDGET_ELEMENT: &[u8] = b"c:widget";

/// Scans an HTML/XML template for `<c:widget id="..." type="..."/>`
/// elements (§4.8). Only the well-formed, self-closing form is
/// supported; anything else is a scan error rather than a silent skip,
/// since a mis-scanned widget would otherwise render as literal markup.
pub fn scan_widgets(document: &str) -> Result<Vec<WidgetTag>, BengError> {
    let mut reader = Reader::from_str(document);

    let mut tags = Vec::new();
    let mut start = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Empty(tag)) if tag.name().as_ref() == WIDGET_ELEMENT => {
                let after = reader.buffer_position() as usize;
                let id = attr(&tag, b"id").ok_or_else(|| {
                    WidgetKind::ResolverFailed("<c:widget> missing id attribute".into())
                })?;
                let class_name = attr(&tag, b"type").ok_or_else(|| {
                    WidgetKind::ResolverFailed("<c:widget> missing type attribute".into())
                })?;
                let mode = RewriteMode::from_attr(attr(&tag, b"mode").as_deref());
                tags.push(WidgetTag {
                    id,
                    class_name,
                    span: (before, after),
                    mode,
                });
                start = after;
            }
            Ok(_) => {}
            Err(e) => return Err(WidgetKind::ResolverFailed(e.to_string()).into()),
        }
    }
    let _ = start;
    Ok(tags)
}

fn attr(tag: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.attributes().flatten().find(|a| a.key.as_ref() == name).map(|a| {
        String::from_utf8_lossy(a.value.as_ref()).into_owned()
    })
}

/// Replaces each `tags[i]`'s byte span in `document` with the
/// corresponding rendered body in `replacements`, splicing outside-in so
/// earlier spans' offsets stay valid (§4.8 step 4, "spliced into the
/// outer stream at the element's position").
pub fn splice(document: &str, tags: &[WidgetTag], replacements: &[String]) -> String {
    assert_eq!(tags.len(), replacements.len());
    let mut out = String::with_capacity(document.len());
    let mut cursor = 0usize;
    for (tag, body) in tags.iter().zip(replacements) {
        out.push_str(&document[cursor..tag.span.0]);
        out.push_str(body);
        cursor = tag.span.1;
    }
    out.push_str(&document[cursor..]);
    out
}

fn link_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\b(href|src|action)="([^"]*)""#).expect("valid regex"))
}

/// Rewrites every `href`/`src`/`action` attribute in a rendered widget's
/// own body, so links and form posts inside it route back through this
/// widget rather than bypassing the proxy (§4.8 "URI rewriting in the
/// body"). Applied to one widget's rendered output before it's spliced
/// into the parent document, never to the parent document itself.
pub fn rewrite_links(body: &str, widget_path: &str, mode: RewriteMode) -> String {
    link_attr_regex()
        .replace_all(body, |caps: &regex::Captures| {
            format!("{}=\"{}\"", &caps[1], rewrite_uri(&caps[2], widget_path, mode))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_single_widget_tag_with_its_attributes() {
        let doc = r#"<html><body><c:widget id="comments" type="blog-comments"/></body></html>"#;
        let tags = scan_widgets(doc).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, "comments");
        assert_eq!(tags[0].class_name, "blog-comments");
    }

    #[test]
    fn finds_multiple_widget_tags_in_document_order() {
        let doc = r#"<c:widget id="a" type="x"/><p>text</p><c:widget id="b" type="y"/>"#;
        let tags = scan_widgets(doc).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].id, "a");
        assert_eq!(tags[1].id, "b");
    }

    #[test]
    fn missing_required_attribute_is_a_scan_error() {
        let doc = r#"<c:widget id="a"/>"#;
        assert!(scan_widgets(doc).is_err());
    }

    #[test]
    fn widget_tag_defaults_to_partial_mode_when_unset() {
        let doc = r#"<c:widget id="a" type="x"/>"#;
        let tags = scan_widgets(doc).unwrap();
        assert_eq!(tags[0].mode, RewriteMode::Partial);
    }

    #[test]
    fn widget_tag_picks_up_an_explicit_mode_attribute() {
        let doc = r#"<c:widget id="a" type="x" mode="direct"/>"#;
        let tags = scan_widgets(doc).unwrap();
        assert_eq!(tags[0].mode, RewriteMode::Direct);
    }

    #[test]
    fn rewrite_links_rewrites_href_src_and_action_attributes() {
        let body = r#"<a href="/a">x</a><img src="/b"><form action="/c"></form>"#;
        let rewritten = rewrite_links(body, "page.comments", RewriteMode::Focus);
        assert!(rewritten.contains(r#"href="/a?focus=page.comments""#));
        assert!(rewritten.contains(r#"src="/b?focus=page.comments""#));
        assert!(rewritten.contains(r#"action="/c?focus=page.comments""#));
    }

    #[test]
    fn rewrite_links_leaves_bodies_without_links_unchanged() {
        let body = "<p>no links here</p>";
        assert_eq!(rewrite_links(body, "page.x", RewriteMode::Focus), body);
    }

    #[test]
    fn splice_replaces_each_span_with_its_rendered_body() {
        let doc = r#"<p><c:widget id="a" type="x"/></p>"#;
        let tags = scan_widgets(doc).unwrap();
        let spliced = splice(doc, &tags, &["<div>rendered</div>".to_string()]);
        assert_eq!(spliced, "<p><div>rendered</div></p>");
    }

    #[test]
    fn document_without_any_widget_tags_round_trips_unchanged() {
        let doc = "<p>just text</p>";
        let tags = scan_widgets(doc).unwrap();
        assert!(tags.is_empty());
        assert_eq!(splice(doc, &tags, &[]), doc);
    }
}
