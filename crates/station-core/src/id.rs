use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

new_key_type! {
    /// Arena key of a node inside the address space. Never leaves the crate.
    pub(crate) struct NodeKey;
}

/// Index into the namespace table of an address space.
pub type NamespaceIndex = u16;

// ---------------------------------------------------------------------------
// Node identifiers
// ---------------------------------------------------------------------------

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={v}"),
            Identifier::String(s) => write!(f, "s={s}"),
        }
    }
}

/// Identifies a node in the address space: a namespace index plus a numeric
/// or string identifier. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: NamespaceIndex,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn numeric(namespace: NamespaceIndex, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: NamespaceIndex, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    /// The numeric identifier, if this id is numeric.
    pub fn as_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(v) => Some(v),
            Identifier::String(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id: {0}")]
pub struct ParseNodeIdError(pub String);

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    /// Parses `ns=<n>;i=<u32>`, `ns=<n>;s=<text>`, or the same without the
    /// `ns=` prefix (namespace 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseNodeIdError(s.to_string());
        let s_trim = s.trim();

        let (namespace, rest) = match s_trim.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail.split_once(';').ok_or_else(invalid)?;
                let ns: NamespaceIndex = ns.parse().map_err(|_| invalid())?;
                (ns, rest)
            }
            None => (0, s_trim),
        };

        if let Some(num) = rest.strip_prefix("i=") {
            let value: u32 = num.parse().map_err(|_| invalid())?;
            Ok(NodeId::numeric(namespace, value))
        } else if let Some(text) = rest.strip_prefix("s=") {
            if text.is_empty() {
                return Err(invalid());
            }
            Ok(NodeId::string(namespace, text))
        } else {
            Err(invalid())
        }
    }
}

/// Well-known ids of the standard namespace (index 0).
pub mod well_known {
    use super::{Identifier, NodeId};

    /// Root of every browsable instance.
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace: 0,
        identifier: Identifier::Numeric(85),
    };

    /// Type definition of folder objects.
    pub const FOLDER_TYPE: NodeId = NodeId {
        namespace: 0,
        identifier: Identifier::Numeric(61),
    };

    pub const BASE_OBJECT_TYPE: NodeId = NodeId {
        namespace: 0,
        identifier: Identifier::Numeric(58),
    };
}

// ---------------------------------------------------------------------------
// Expanded ids and qualified names
// ---------------------------------------------------------------------------

/// A node id whose namespace is given by URI instead of by table index.
///
/// Used for keys that must stay valid regardless of the order in which an
/// address space assigns namespace indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    pub namespace_uri: String,
    pub identifier: Identifier,
}

impl ExpandedNodeId {
    pub fn numeric(namespace_uri: impl Into<String>, value: u32) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            identifier: Identifier::Numeric(value),
        }
    }
}

/// A browse name: a namespace-qualified symbolic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: NamespaceIndex,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: NamespaceIndex, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Parse the `<ns>:<name>` text form. A missing prefix means namespace 0.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((ns, name)) => match ns.parse::<NamespaceIndex>() {
                Ok(ns) => Self::new(ns, name),
                Err(_) => Self::new(0, text),
            },
            None => Self::new(0, text),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

// ---------------------------------------------------------------------------
// Identifier allocation
// ---------------------------------------------------------------------------

/// Monotonic source of numeric identifiers, scoped to one address space.
///
/// Lock-free; concurrent callers never receive the same value. Returns
/// `None` once the counter is exhausted instead of wrapping.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator whose next value is `last + 1`.
    pub fn starting_after(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    /// Take the next identifier.
    pub fn next(&self) -> Option<u32> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .ok()
            .map(|previous| previous + 1)
    }

    /// Make sure no identifier `<= id` is handed out from now on.
    pub fn reserve_through(&self, id: u32) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }

    /// The most recently issued (or reserved) identifier.
    pub fn last(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }
}
