pub mod class;
pub mod composer;
pub mod rewrite;
pub mod state;
pub mod tree;

pub use class::{check_approval, ClassRegistry, WidgetClass};
pub use composer::{rewrite_links, scan_widgets, splice, WidgetTag};
pub use rewrite::{rewrite_uri, RewriteMode};
pub use state::{resolve_state, InMemoryStateStore, SessionStateStore};
pub use tree::{WidgetNode, WidgetState};
