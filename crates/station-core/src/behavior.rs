//! Behavior attachment for imported nodes.
//!
//! A [`BehaviorTable`] maps object type ids to constructors that build a
//! specialized body for instances of that type, and method browse names to
//! the command they are bound to. The address space consults it for every
//! node it materializes, before the node becomes visible.

use crate::id::ExpandedNodeId;
use crate::node::{CommandKind, Node, NodeBody, ObjectKind};
use crate::station::{STATION_NAMESPACE_URI, STATION_TYPE_ID};
use std::collections::HashMap;

/// Builds the specialized body that replaces a generic object body.
pub type ObjectConstructor = fn(&Node) -> NodeBody;

#[derive(Debug, Clone, Default)]
pub struct BehaviorTable {
    objects: HashMap<ExpandedNodeId, ObjectConstructor>,
    methods: HashMap<String, CommandKind>,
}

impl BehaviorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The behaviors of the station model: the station object type and its
    /// three commands.
    pub fn station() -> Self {
        let mut table = Self::new();
        table.register_object(
            ExpandedNodeId::numeric(STATION_NAMESPACE_URI, STATION_TYPE_ID),
            station_object,
        );
        for command in [
            CommandKind::Execute,
            CommandKind::Reset,
            CommandKind::OpenPressureReleaseValve,
        ] {
            table.register_method(command.browse_name(), command);
        }
        table
    }

    pub fn register_object(&mut self, type_id: ExpandedNodeId, constructor: ObjectConstructor) {
        self.objects.insert(type_id, constructor);
    }

    pub fn register_method(&mut self, browse_name: &str, command: CommandKind) {
        self.methods.insert(browse_name.to_string(), command);
    }

    pub fn object_type_count(&self) -> usize {
        self.objects.len()
    }

    /// Attach behavior to a freshly materialized node. `type_id` is the
    /// node's type definition expressed with a namespace URI.
    ///
    /// Returns `true` if the node was specialized or bound. Nodes of unknown
    /// type are left as they are.
    pub fn attach(&self, node: &mut Node, type_id: Option<&ExpandedNodeId>) -> bool {
        if let NodeBody::Method(method) = &mut node.body {
            let Some(&command) = self.methods.get(&node.browse_name.name) else {
                return false;
            };
            method.binding = Some(command);
            if method.input_arguments.is_empty() {
                method.input_arguments = command.input_arguments();
            }
            return true;
        }

        if !matches!(node.body, NodeBody::Object(ObjectKind::Generic)) {
            return false;
        }
        let Some(constructor) = type_id.and_then(|id| self.objects.get(id)) else {
            return false;
        };
        node.body = constructor(node);
        true
    }
}

fn station_object(_generic: &Node) -> NodeBody {
    NodeBody::Object(ObjectKind::Station)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{NodeId, QualifiedName};
    use crate::node::NodeClass;

    fn station_type() -> ExpandedNodeId {
        ExpandedNodeId::numeric(STATION_NAMESPACE_URI, STATION_TYPE_ID)
    }

    #[test]
    fn station_object_is_specialized() {
        let table = BehaviorTable::station();
        let mut node = Node::object(NodeId::numeric(1, 5001), QualifiedName::new(1, "StationInstance"));
        assert!(table.attach(&mut node, Some(&station_type())));
        assert_eq!(node.object_kind(), Some(ObjectKind::Station));
        assert_eq!(node.class(), NodeClass::Object);
    }

    #[test]
    fn unknown_object_type_stays_generic() {
        let table = BehaviorTable::station();
        let mut node = Node::object(NodeId::numeric(1, 5002), QualifiedName::new(1, "Other"));
        let other = ExpandedNodeId::numeric(STATION_NAMESPACE_URI, 9999);
        assert!(!table.attach(&mut node, Some(&other)));
        assert!(!table.attach(&mut node, None));
        assert_eq!(node.object_kind(), Some(ObjectKind::Generic));
    }

    #[test]
    fn methods_bind_by_browse_name() {
        let table = BehaviorTable::station();
        let mut execute = Node::method(NodeId::numeric(1, 7001), QualifiedName::new(1, "Execute"), None);
        assert!(table.attach(&mut execute, None));
        assert_eq!(execute.binding(), Some(CommandKind::Execute));

        let mut unknown = Node::method(NodeId::numeric(1, 7009), QualifiedName::new(1, "Calibrate"), None);
        assert!(!table.attach(&mut unknown, None));
        assert_eq!(unknown.binding(), None);
    }

    #[test]
    fn variables_are_never_specialized() {
        let table = BehaviorTable::station();
        let mut var = Node::variable(
            NodeId::numeric(1, 6001),
            QualifiedName::new(1, "Execute"),
            crate::value::Variant::Int32(0),
        );
        assert!(!table.attach(&mut var, Some(&station_type())));
        assert_eq!(var.class(), NodeClass::Variable);
    }
}
