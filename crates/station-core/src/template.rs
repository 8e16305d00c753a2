//! Template source interface.
//!
//! A template describes a namespace URI list and a batch of predefined node
//! definitions (types and default instances). The file format belongs to the
//! implementor; the address space only consumes the parsed [`Template`].
//!
//! Node ids inside a template use template-local namespace indices: index 0
//! is the standard namespace, index `k > 0` is `namespace_uris[k - 1]`.

use crate::id::{NodeId, ParseNodeIdError, QualifiedName};
use crate::node::ReferenceType;
use crate::value::{DataType, Variant};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while reading or parsing a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("parse error in {origin}: {detail}")]
    Parse { origin: String, detail: String },
    #[error(transparent)]
    InvalidNodeId(#[from] ParseNodeIdError),
}

// ---------------------------------------------------------------------------
// Parsed template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Template {
    pub namespace_uris: Vec<String>,
    pub types: Vec<TypeDefinition>,
    pub nodes: Vec<NodeDefinition>,
}

/// An object type declared by the template.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: String,
}

/// A hierarchical reference as written in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    pub reference_type: ReferenceType,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeDefinitionKind {
    Object,
    Variable {
        data_type: DataType,
        value: Option<Variant>,
    },
    Method,
}

/// One predefined node instance.
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: Option<String>,
    pub kind: NodeDefinitionKind,
    pub type_definition: Option<NodeId>,
    /// Inverse hierarchical reference (`ParentNodeId` or `IsForward="false"`).
    pub parent: Option<TemplateReference>,
    /// Forward hierarchical references to children.
    pub children: Vec<TemplateReference>,
}

impl NodeDefinition {
    pub fn new(id: NodeId, browse_name: QualifiedName, kind: NodeDefinitionKind) -> Self {
        Self {
            id,
            browse_name,
            display_name: None,
            kind,
            type_definition: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// The template collaborator consumed by
/// [`AddressSpace::import_templates`](crate::address_space::AddressSpace::import_templates).
pub trait TemplateSource {
    /// Human-readable origin used in log lines and errors (usually a path).
    fn origin(&self) -> String;

    fn parse(&self) -> Result<Template, TemplateError>;
}

/// A template that is already in memory.
impl TemplateSource for Template {
    fn origin(&self) -> String {
        "<memory>".to_string()
    }

    fn parse(&self) -> Result<Template, TemplateError> {
        Ok(self.clone())
    }
}
