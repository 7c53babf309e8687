use beng_core::address::ResourceAddress;
use beng_core::error::{BengError, WidgetKind};
use beng_core::transformation::ProcessOptions;
use std::collections::HashMap;

/// A widget class as resolved by the translation server's `WIDGET_TYPE`
/// packet (§4.8 step 1): where its sub-request dispatches to, and which
/// groups it belongs to / may embed.
#[derive(Debug, Clone)]
pub struct WidgetClass {
    pub name: String,
    pub address: ResourceAddress,
    /// Groups this class declares itself a member of, checked against a
    /// parent's [`ProcessOptions::container_groups`].
    pub groups: Vec<String>,
    pub untrusted_host: Option<String>,
}

/// In-process cache of resolved widget classes, keyed by name, filled on
/// demand via a resolver callback (the translation client in production).
pub struct ClassRegistry {
    cache: HashMap<String, WidgetClass>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&WidgetClass> {
        self.cache.get(name)
    }

    pub fn insert(&mut self, class: WidgetClass) {
        self.cache.insert(class.name.clone(), class);
    }

    /// Resolves `name` via the cache, calling `resolver` to fetch and
    /// cache it on a miss. `resolver` models the translation-server
    /// round-trip for `WIDGET_TYPE`.
    pub fn resolve(
        &mut self,
        name: &str,
        resolver: impl FnOnce(&str) -> Result<WidgetClass, BengError>,
    ) -> Result<&WidgetClass, BengError> {
        if !self.cache.contains_key(name) {
            let class = resolver(name)?;
            self.insert(class);
        }
        Ok(self.cache.get(name).expect("just inserted"))
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks whether `parent` may embed `child` (§4.8 step 2). Self-
/// containment (same class) requires `parent_options.self_container`;
/// otherwise `child` must belong to at least one of `parent_options`'s
/// declared container groups, and an untrusted child host may never
/// embed a trusted one.
pub fn check_approval(
    parent: &WidgetClass,
    parent_options: &ProcessOptions,
    child: &WidgetClass,
) -> Result<(), BengError> {
    if parent.name == child.name {
        if parent_options.self_container {
            return Ok(());
        }
        return Err(WidgetKind::Forbidden.into());
    }

    if child.untrusted_host.is_some() && parent.untrusted_host.is_none() {
        return Err(WidgetKind::Forbidden.into());
    }

    let allowed = parent_options.container_groups.is_empty()
        || child
            .groups
            .iter()
            .any(|g| parent_options.container_groups.contains(g));

    if allowed {
        Ok(())
    } else {
        Err(WidgetKind::Forbidden.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, groups: &[&str], untrusted_host: Option<&str>) -> WidgetClass {
        WidgetClass {
            name: name.to_string(),
            address: ResourceAddress::none(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
            untrusted_host: untrusted_host.map(|s| s.to_string()),
        }
    }

    #[test]
    fn self_containment_requires_the_explicit_flag() {
        let parent = class("blog", &[], None);
        let child = class("blog", &[], None);
        let mut options = ProcessOptions::default();
        assert!(check_approval(&parent, &options, &child).is_err());
        options.self_container = true;
        assert!(check_approval(&parent, &options, &child).is_ok());
    }

    #[test]
    fn untrusted_child_cannot_embed_into_a_trusted_parent() {
        let parent = class("layout", &[], None);
        let child = class("ads", &[], Some("ads.example.com"));
        let options = ProcessOptions::default();
        assert!(check_approval(&parent, &options, &child).is_err());
    }

    #[test]
    fn group_membership_permits_embedding() {
        let parent = class("layout", &[], None);
        let child = class("comments", &["content"], None);
        let options = ProcessOptions {
            self_container: false,
            container_groups: vec!["content".to_string()],
        };
        assert!(check_approval(&parent, &options, &child).is_ok());
    }

    #[test]
    fn missing_group_membership_is_forbidden() {
        let parent = class("layout", &[], None);
        let child = class("comments", &["content"], None);
        let options = ProcessOptions {
            self_container: false,
            container_groups: vec!["nav".to_string()],
        };
        assert!(check_approval(&parent, &options, &child).is_err());
    }

    #[test]
    fn no_declared_groups_means_unrestricted_embedding() {
        let parent = class("layout", &[], None);
        let child = class("comments", &["content"], None);
        let options = ProcessOptions::default();
        assert!(check_approval(&parent, &options, &child).is_ok());
    }
}
