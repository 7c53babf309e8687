use crate::tree::WidgetState;
use std::collections::HashMap;

/// Opaque session-backed store of widget state, keyed by the dot-joined
/// widget-id path (§4.8 step 3). The real session store is out of scope
/// (§1 Non-goals); this is the narrow slice the composer needs from it.
pub trait SessionStateStore {
    fn load(&self, widget_path: &str) -> Option<WidgetState>;
    fn save(&mut self, widget_path: &str, state: WidgetState);
}

/// In-memory store used in tests and as the default for a session
/// backend that hasn't been wired in yet.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: HashMap<String, WidgetState>,
}

impl SessionStateStore for InMemoryStateStore {
    fn load(&self, widget_path: &str) -> Option<WidgetState> {
        self.entries.get(widget_path).cloned()
    }

    fn save(&mut self, widget_path: &str, state: WidgetState) {
        self.entries.insert(widget_path.to_string(), state);
    }
}

/// Resolves a node's state: a new request for this widget's path takes
/// precedence and is persisted back to the session; absent that, the
/// previously saved state for the path is used; absent both, state is
/// empty.
pub fn resolve_state(
    store: &mut dyn SessionStateStore,
    widget_path: &str,
    request_override: Option<WidgetState>,
) -> WidgetState {
    if let Some(state) = request_override {
        store.save(widget_path, state.clone());
        return state;
    }
    store.load(widget_path).unwrap_or_default()
}
