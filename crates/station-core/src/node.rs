//! Nodes of the address space.
//!
//! A [`Node`] carries its identity and descriptive attributes plus a
//! [`NodeBody`] that says what kind of node it is. Bodies are plain enums:
//! specialization during import swaps the body, it never relies on runtime
//! type inspection.

use crate::id::{NodeId, QualifiedName};
use crate::value::{DataType, DataValue, Variant};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reference and class tags
// ---------------------------------------------------------------------------

/// Hierarchical reference linking a parent to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceType {
    Organizes,
    HasComponent,
    HasProperty,
}

impl ReferenceType {
    /// Parse a standard reference type name. Non-hierarchical references
    /// (such as `HasTypeDefinition`) return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Organizes" | "i=35" => Some(ReferenceType::Organizes),
            "HasComponent" | "i=47" => Some(ReferenceType::HasComponent),
            "HasProperty" | "i=46" => Some(ReferenceType::HasProperty),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReferenceType::Organizes => "Organizes",
            ReferenceType::HasComponent => "HasComponent",
            ReferenceType::HasProperty => "HasProperty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Folder,
    Object,
    Variable,
    Method,
}

/// Specialized object variants. `Generic` is what import produces for a type
/// nobody registered behavior for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Generic,
    /// The station instance: owner of the production clock and the anchor
    /// from which projection bindings are resolved.
    Station,
}

/// Remote operations a method node can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Execute,
    Reset,
    OpenPressureReleaseValve,
    GenerateAas,
}

impl CommandKind {
    /// Browse name of the method node this command is attached to.
    pub fn browse_name(self) -> &'static str {
        match self {
            CommandKind::Execute => "Execute",
            CommandKind::Reset => "Reset",
            CommandKind::OpenPressureReleaseValve => "OpenPressureReleaseValve",
            CommandKind::GenerateAas => "GenerateAAS",
        }
    }

    pub fn input_arguments(self) -> Vec<Argument> {
        match self {
            CommandKind::Execute => vec![Argument::new("SerialNumber", DataType::UInt64)],
            CommandKind::Reset | CommandKind::OpenPressureReleaseValve | CommandKind::GenerateAas => {
                Vec::new()
            }
        }
    }
}

/// Declared input argument of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub data_type: DataType,
}

impl Argument {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Node bodies
// ---------------------------------------------------------------------------

/// Storage of a variable node. The value cell has its own lock so value
/// updates never touch the address-space structure lock.
#[derive(Debug)]
pub struct VariableBody {
    pub data_type: DataType,
    value: Mutex<DataValue>,
}

impl VariableBody {
    pub fn new(value: Variant) -> Self {
        Self {
            data_type: value.data_type(),
            value: Mutex::new(DataValue::new(value)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    /// Command invoked when the method is called. `None` until behavior is
    /// attached.
    pub binding: Option<CommandKind>,
    pub input_arguments: Vec<Argument>,
}

#[derive(Debug)]
pub enum NodeBody {
    Folder,
    Object(ObjectKind),
    Variable(VariableBody),
    Method(MethodBody),
}

/// Why a value write was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("node {0} is not a variable")]
    NotAVariable(NodeId),
    #[error("type mismatch on {node}: expected {expected}, got {actual}")]
    TypeMismatch {
        node: NodeId,
        expected: DataType,
        actual: DataType,
    },
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: String,
    pub type_definition: Option<NodeId>,
    pub body: NodeBody,
}

impl Node {
    pub fn new(id: NodeId, browse_name: QualifiedName, body: NodeBody) -> Self {
        let display_name = browse_name.name.clone();
        Self {
            id,
            browse_name,
            display_name,
            type_definition: None,
            body,
        }
    }

    pub fn folder(id: NodeId, browse_name: QualifiedName) -> Self {
        Self::new(id, browse_name, NodeBody::Folder)
            .with_type_definition(crate::id::well_known::FOLDER_TYPE)
    }

    pub fn object(id: NodeId, browse_name: QualifiedName) -> Self {
        Self::new(id, browse_name, NodeBody::Object(ObjectKind::Generic))
    }

    pub fn variable(id: NodeId, browse_name: QualifiedName, value: Variant) -> Self {
        Self::new(id, browse_name, NodeBody::Variable(VariableBody::new(value)))
    }

    pub fn method(id: NodeId, browse_name: QualifiedName, binding: Option<CommandKind>) -> Self {
        let input_arguments = binding.map(CommandKind::input_arguments).unwrap_or_default();
        Self::new(
            id,
            browse_name,
            NodeBody::Method(MethodBody {
                binding,
                input_arguments,
            }),
        )
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_type_definition(mut self, type_definition: NodeId) -> Self {
        self.type_definition = Some(type_definition);
        self
    }

    pub fn class(&self) -> NodeClass {
        match self.body {
            NodeBody::Folder => NodeClass::Folder,
            NodeBody::Object(_) => NodeClass::Object,
            NodeBody::Variable(_) => NodeClass::Variable,
            NodeBody::Method(_) => NodeClass::Method,
        }
    }

    pub fn object_kind(&self) -> Option<ObjectKind> {
        match self.body {
            NodeBody::Object(kind) => Some(kind),
            _ => None,
        }
    }

    /// The command this method node is bound to, if any.
    pub fn binding(&self) -> Option<CommandKind> {
        match &self.body {
            NodeBody::Method(method) => method.binding,
            _ => None,
        }
    }

    /// Snapshot of the current value. `None` for non-variables.
    pub fn value(&self) -> Option<DataValue> {
        match &self.body {
            NodeBody::Variable(var) => Some(var.value.lock().clone()),
            _ => None,
        }
    }

    /// Store `value`. The source timestamp moves to `now` only when the value
    /// differs from the stored one. Returns whether the value changed.
    pub fn write_value(&self, value: Variant, now: DateTime<Utc>) -> Result<bool, ValueError> {
        let NodeBody::Variable(var) = &self.body else {
            return Err(ValueError::NotAVariable(self.id.clone()));
        };
        if value.data_type() != var.data_type {
            return Err(ValueError::TypeMismatch {
                node: self.id.clone(),
                expected: var.data_type,
                actual: value.data_type(),
            });
        }

        let mut current = var.value.lock();
        if current.value == value {
            return Ok(false);
        }
        current.value = value;
        current.source_timestamp = Some(now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressure() -> Node {
        Node::variable(
            NodeId::numeric(1, 6007),
            QualifiedName::new(1, "Pressure"),
            Variant::Double(1000.0),
        )
    }

    #[test]
    fn write_value_sets_timestamp_on_change() {
        let node = pressure();
        let now = Utc::now();
        assert_eq!(node.value().unwrap().source_timestamp, None);

        assert_eq!(node.write_value(Variant::Double(1200.0), now), Ok(true));
        let value = node.value().unwrap();
        assert_eq!(value.value, Variant::Double(1200.0));
        assert_eq!(value.source_timestamp, Some(now));
    }

    #[test]
    fn write_same_value_keeps_timestamp() {
        let node = pressure();
        let first = Utc::now();
        node.write_value(Variant::Double(5.0), first).unwrap();

        let later = first + chrono::Duration::seconds(10);
        assert_eq!(node.write_value(Variant::Double(5.0), later), Ok(false));
        assert_eq!(node.value().unwrap().source_timestamp, Some(first));
    }

    #[test]
    fn write_rejects_wrong_type() {
        let node = pressure();
        let err = node.write_value(Variant::UInt64(3), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ValueError::TypeMismatch {
                expected: DataType::Double,
                actual: DataType::UInt64,
                ..
            }
        ));
    }

    #[test]
    fn write_to_folder_fails() {
        let folder = Node::folder(NodeId::string(1, "Root"), QualifiedName::new(1, "Root"));
        assert_eq!(folder.class(), NodeClass::Folder);
        assert!(folder.value().is_none());
        assert!(matches!(
            folder.write_value(Variant::Int32(1), Utc::now()),
            Err(ValueError::NotAVariable(_))
        ));
    }

    #[test]
    fn method_node_carries_binding_arguments() {
        let method = Node::method(
            NodeId::numeric(1, 7001),
            QualifiedName::new(1, "Execute"),
            Some(CommandKind::Execute),
        );
        assert_eq!(method.binding(), Some(CommandKind::Execute));
        let NodeBody::Method(body) = &method.body else {
            panic!("expected method body");
        };
        assert_eq!(body.input_arguments, vec![Argument::new("SerialNumber", DataType::UInt64)]);
    }
}
