use serde::{Deserialize, Serialize};

/// The concrete backend a request is dispatched to, once the translation
/// server has resolved it. Concrete protocols other than HTTP/1.1 are
/// out of scope for this core and are carried only as an opaque tag plus
/// whatever options the translation server attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AddressKind {
    None,
    Local {
        path: String,
        content_type: Option<String>,
    },
    Http {
        ssl: bool,
        host_port: String,
        path: String,
        addresses: Vec<String>,
        certificate: Option<String>,
    },
    Lhttp {
        executable: String,
        uri: String,
        options: Vec<String>,
    },
    Pipe {
        cmd: String,
        args: Vec<String>,
        options: Vec<String>,
    },
    Cgi {
        executable: String,
        path_info: Option<String>,
        options: Vec<String>,
    },
    FastCgi {
        executable: String,
        addresses: Vec<String>,
        options: Vec<String>,
    },
    Was {
        executable: String,
        options: Vec<String>,
    },
    Nfs {
        server: String,
        export: String,
        path: String,
        content_type: Option<String>,
    },
}

/// A dispatchable resource address. `base`/`expand_path`/`expand_path_info`
/// let the translation server describe a whole class of addresses (e.g. one
/// per widget instance) with regex back-references resolved at dispatch
/// time, rather than the proxy hard-coding path arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceAddress {
    pub kind: AddressKind,
    pub base: Option<String>,
    pub expand_path: Option<String>,
    pub expand_path_info: Option<String>,
}

impl ResourceAddress {
    pub fn none() -> Self {
        Self {
            kind: AddressKind::None,
            base: None,
            expand_path: None,
            expand_path_info: None,
        }
    }

    pub fn new(kind: AddressKind) -> Self {
        Self {
            kind,
            base: None,
            expand_path: None,
            expand_path_info: None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.kind, AddressKind::None)
    }

    /// Whether this address accepts relative extension by a URI suffix.
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Apply the regex back-references carried in `expand_path`/
    /// `expand_path_info` against `captures`, returning a concrete address
    /// with the templated fields substituted. Addresses without expansion
    /// templates are returned unchanged.
    pub fn expand(&self, captures: &regex::Captures) -> ResourceAddress {
        let mut out = self.clone();
        let expanded_path = self.expand_path.as_ref().map(|tmpl| expand_template(tmpl, captures));
        let expanded_path_info = self
            .expand_path_info
            .as_ref()
            .map(|tmpl| expand_template(tmpl, captures));

        match (&mut out.kind, expanded_path) {
            (AddressKind::Local { path, .. }, Some(p)) => *path = p,
            (AddressKind::Http { path, .. }, Some(p)) => *path = p,
            (AddressKind::Nfs { path, .. }, Some(p)) => *path = p,
            _ => {}
        }
        if let (AddressKind::Cgi { path_info, .. }, Some(pi)) = (&mut out.kind, expanded_path_info)
        {
            *path_info = Some(pi);
        }
        out.expand_path = None;
        out.expand_path_info = None;
        out
    }

    /// Extend a `base`-bearing address with a relative URI suffix, the way
    /// a widget class address is extended by the widget's saved path-info.
    pub fn with_suffix(&self, suffix: &str) -> ResourceAddress {
        let mut out = self.clone();
        match &mut out.kind {
            AddressKind::Local { path, .. }
            | AddressKind::Http { path, .. }
            | AddressKind::Nfs { path, .. } => {
                if !path.ends_with('/') && !suffix.starts_with('/') {
                    path.push('/');
                }
                path.push_str(suffix);
            }
            _ => {}
        }
        out
    }
}

/// `$1`-style back-reference substitution (`regex::Captures::expand`
/// semantics), used by translation responses that describe a templated
/// resource address.
fn expand_template(template: &str, captures: &regex::Captures) -> String {
    let mut out = String::with_capacity(template.len());
    captures.expand(template, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn none_is_none() {
        assert!(ResourceAddress::none().is_none());
    }

    #[test]
    fn with_suffix_appends_to_local_path() {
        let addr = ResourceAddress::new(AddressKind::Local {
            path: "/var/www/app".into(),
            content_type: None,
        });
        let extended = addr.with_suffix("index.html");
        match extended.kind {
            AddressKind::Local { path, .. } => assert_eq!(path, "/var/www/app/index.html"),
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn expand_substitutes_back_references_into_path() {
        let re = Regex::new(r"^/user/(\d+)$").unwrap();
        let caps = re.captures("/user/42").unwrap();
        let addr = ResourceAddress {
            kind: AddressKind::Local {
                path: String::new(),
                content_type: None,
            },
            base: None,
            expand_path: Some("/data/users/$1.json".into()),
            expand_path_info: None,
        };
        let expanded = addr.expand(&caps);
        match expanded.kind {
            AddressKind::Local { path, .. } => assert_eq!(path, "/data/users/42.json"),
            _ => panic!("wrong kind"),
        }
        assert!(expanded.expand_path.is_none());
    }
}
