use crate::address::ResourceAddress;
use serde::{Deserialize, Serialize};

/// Options attached to `ProcessXml`/`ProcessCss` nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessOptions {
    /// Allow a widget to embed a child of its own class
    /// (translation's `SELF_CONTAINER`).
    pub self_container: bool,
    /// Group names this view is allowed to embed (translation's approval
    /// group set, §4.8 step 2).
    pub container_groups: Vec<String>,
}

/// One node of a response's transformation chain (§3 "Transformation").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Transformation {
    ProcessXml(ProcessOptions),
    ProcessCss(ProcessOptions),
    ProcessText,
    Filter {
        address: ResourceAddress,
        reveal_user: bool,
    },
}

/// An ordered sequence of transformations applied to a response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransformationChain(Vec<Transformation>);

impl TransformationChain {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, t: Transformation) {
        self.0.push(t);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transformation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether any node in the chain is a template processor, i.e. the
    /// response body may contain widget elements.
    pub fn has_processor(&self) -> bool {
        self.0
            .iter()
            .any(|t| matches!(t, Transformation::ProcessXml(_) | Transformation::ProcessCss(_)))
    }
}

impl FromIterator<Transformation> for TransformationChain {
    fn from_iter<I: IntoIterator<Item = Transformation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_has_no_processor() {
        let chain = TransformationChain::new();
        assert!(chain.is_empty());
        assert!(!chain.has_processor());
    }

    #[test]
    fn chain_with_process_xml_reports_processor() {
        let mut chain = TransformationChain::new();
        chain.push(Transformation::ProcessXml(ProcessOptions::default()));
        assert_eq!(chain.len(), 1);
        assert!(chain.has_processor());
    }

    #[test]
    fn filter_node_does_not_count_as_processor() {
        let mut chain = TransformationChain::new();
        chain.push(Transformation::Filter {
            address: ResourceAddress::none(),
            reveal_user: false,
        });
        assert!(!chain.has_processor());
    }
}
