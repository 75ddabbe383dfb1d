use std::fmt;

use serde::{Deserialize, Serialize};

/// An external symbol a compiled class depends on. Class names are dotted
/// binary names (`com.acme.Outer$Inner`); parameter types are readable type
/// names (`int`, `java.lang.String[]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SymbolReference {
    Class {
        name: String,
    },
    Field {
        owner: String,
        name: String,
    },
    Constructor {
        owner: String,
        parameters: Vec<String>,
    },
    Method {
        owner: String,
        name: String,
        parameters: Vec<String>,
    },
}

impl SymbolReference {
    pub fn class(name: impl Into<String>) -> Self {
        SymbolReference::Class { name: name.into() }
    }

    /// The class this symbol belongs to.
    pub fn class_name(&self) -> &str {
        match self {
            SymbolReference::Class { name } => name,
            SymbolReference::Field { owner, .. }
            | SymbolReference::Constructor { owner, .. }
            | SymbolReference::Method { owner, .. } => owner,
        }
    }

    /// Top-level class of the owning family, e.g. `com.acme.Outer` for
    /// `com.acme.Outer$Inner`.
    pub fn root_class_name(&self) -> &str {
        root_class_name(self.class_name())
    }
}

/// Binary name up to the first nested-class separator.
pub fn root_class_name(name: &str) -> &str {
    match name.find('$') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// True when `name` is `root` or one of its nested classes.
pub fn is_in_root_family(name: &str, root: &str) -> bool {
    match name.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('$'),
        None => false,
    }
}

/// Platform classes that never map to workspace sources.
pub fn is_system_class(name: &str) -> bool {
    name.starts_with("java.") || name.starts_with("javax.")
}

impl fmt::Display for SymbolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolReference::Class { name } => f.write_str(name),
            SymbolReference::Field { owner, name } => write!(f, "{owner}.{name}"),
            SymbolReference::Constructor { owner, parameters } => {
                write!(f, "{owner}({})", parameters.join(","))
            }
            SymbolReference::Method {
                owner,
                name,
                parameters,
            } => write!(f, "{owner}.{name}({})", parameters.join(",")),
        }
    }
}
