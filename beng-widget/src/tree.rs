use std::collections::HashMap;

/// One inline component instance (§3 "Widget tree"). Holds enough to
/// resolve its own sub-request and to find its ancestors for the
/// approval check (§4.8 step 2) without walking back through the
/// composer.
#[derive(Debug, Clone)]
pub struct WidgetNode {
    pub id: String,
    pub class_name: String,
    pub parent: Option<String>,
    pub children: HashMap<String, WidgetNode>,
    /// Path-info and query-string persisted in the session, keyed by the
    /// widget-id path so sibling instances of the same class don't clash.
    pub state: WidgetState,
    /// This node, not the whole page, is the response target (the
    /// request was a direct widget focus, §4.8 URI rewriting `Focus` mode).
    pub is_frame: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetState {
    pub path_info: Option<String>,
    pub query_string: Option<String>,
}

impl WidgetNode {
    pub fn root(id: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class_name: class_name.into(),
            parent: None,
            children: HashMap::new(),
            state: WidgetState::default(),
            is_frame: false,
        }
    }

    /// The dot-separated widget-id path from the tree root to this node,
    /// used both as the session state key and as the `Focus`-mode query
    /// parameter (§4.8).
    pub fn path(&self, ancestors: &[&str]) -> String {
        let mut parts: Vec<&str> = ancestors.to_vec();
        parts.push(&self.id);
        parts.join(".")
    }

    pub fn add_child(&mut self, child: WidgetNode) {
        self.children.insert(child.id.clone(), child);
    }

    pub fn child(&self, id: &str) -> Option<&WidgetNode> {
        self.children.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_joins_ancestor_ids_with_the_node_id() {
        let node = WidgetNode::root("comments", "blog-comments");
        assert_eq!(node.path(&["page", "sidebar"]), "page.sidebar.comments");
    }

    #[test]
    fn add_and_look_up_a_child() {
        let mut root = WidgetNode::root("page", "layout");
        root.add_child(WidgetNode::root("sidebar", "sidebar-widget"));
        assert!(root.child("sidebar").is_some());
        assert!(root.child("missing").is_none());
    }
}
