//! The node registry: a hierarchical graph of addressable nodes.
//!
//! Nodes live in a slot-map arena; a hash index maps every [`NodeId`] to its
//! arena key for O(1) lookup and a secondary map holds parent/child links.
//! Structural changes (import, create, link) take the write side of a single
//! `RwLock`. Lookups take the read side, and value updates only lock the
//! value cell of the node they touch.
//!
//! Invariants maintained by every mutation:
//! - every node except the ObjectsFolder root has exactly one parent;
//! - the graph is acyclic (a parent always exists before its child);
//! - an id is never reused while the address space is alive.

use crate::behavior::BehaviorTable;
use crate::id::{
    ExpandedNodeId, IdAllocator, NamespaceIndex, NodeId, NodeKey, QualifiedName, well_known,
};
use crate::namespace::NamespaceTable;
use crate::node::{CommandKind, Node, NodeBody, ObjectKind, ReferenceType, VariableBody};
use crate::template::{NodeDefinitionKind, TemplateError, TemplateReference, TemplateSource};
use parking_lot::RwLock;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AddressSpaceError {
    #[error("node identifier allocator exhausted in namespace {0}")]
    AllocatorOverflow(NamespaceIndex),
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(NodeId),
    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),
    #[error("cycle detected at node {0}")]
    Cycle(NodeId),
    #[error("template {origin} references unknown namespace index {index}")]
    UnknownNamespaceIndex { origin: String, index: NamespaceIndex },
    #[error("namespace table is full")]
    NamespaceTableFull,
    #[error("import of {origin} failed: {source}")]
    Import {
        origin: String,
        #[source]
        source: TemplateError,
    },
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Adjacency {
    parent: Option<(ReferenceType, NodeKey)>,
    children: Vec<(ReferenceType, NodeKey)>,
}

#[derive(Debug)]
struct Topology {
    namespaces: NamespaceTable,
    nodes: SlotMap<NodeKey, Arc<Node>>,
    index: HashMap<NodeId, NodeKey>,
    adjacency: SecondaryMap<NodeKey, Adjacency>,
}

impl Topology {
    fn key(&self, id: &NodeId) -> Option<NodeKey> {
        self.index.get(id).copied()
    }

    /// Insert a validated node and link it under `parent`.
    fn insert(&mut self, node: Node, parent: Option<(ReferenceType, NodeKey)>) -> Arc<Node> {
        let id = node.id.clone();
        let node = Arc::new(node);
        let key = self.nodes.insert(Arc::clone(&node));
        self.index.insert(id, key);
        self.adjacency.insert(
            key,
            Adjacency {
                parent,
                children: Vec::new(),
            },
        );
        if let Some((reference, parent_key)) = parent {
            if let Some(adj) = self.adjacency.get_mut(parent_key) {
                adj.children.push((reference, key));
            }
        }
        node
    }

    fn id_of(&self, key: NodeKey) -> Option<NodeId> {
        self.nodes.get(key).map(|n| n.id.clone())
    }
}

// ---------------------------------------------------------------------------
// AddressSpace
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AddressSpace {
    namespace_index: NamespaceIndex,
    allocator: IdAllocator,
    topology: RwLock<Topology>,
}

impl AddressSpace {
    /// Create an address space owning `namespace_uri`, holding only the
    /// ObjectsFolder root.
    pub fn new(namespace_uri: &str) -> Self {
        let mut namespaces = NamespaceTable::new();
        // A fresh table has room for a second entry.
        let namespace_index = namespaces.get_or_append(namespace_uri).unwrap_or(1);

        let mut topology = Topology {
            namespaces,
            nodes: SlotMap::with_key(),
            index: HashMap::new(),
            adjacency: SecondaryMap::new(),
        };
        let root = Node::folder(well_known::OBJECTS_FOLDER, QualifiedName::new(0, "Objects"));
        topology.insert(root, None);

        Self {
            namespace_index,
            allocator: IdAllocator::new(),
            topology: RwLock::new(topology),
        }
    }

    /// Index of this address space's own namespace.
    pub fn namespace_index(&self) -> NamespaceIndex {
        self.namespace_index
    }

    pub fn namespace_uris(&self) -> Vec<String> {
        self.topology.read().namespaces.uris().to_vec()
    }

    pub fn namespace_index_of(&self, uri: &str) -> Option<NamespaceIndex> {
        self.topology.read().namespaces.index_of(uri)
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.topology.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Identity --

    /// A fresh numeric id in the own namespace.
    ///
    /// Exhausting the counter is a defect, reported as
    /// [`AddressSpaceError::AllocatorOverflow`].
    pub fn allocate(&self) -> Result<NodeId, AddressSpaceError> {
        match self.allocator.next() {
            Some(value) => Ok(NodeId::numeric(self.namespace_index, value)),
            None => {
                tracing::error!(namespace = self.namespace_index, "node id allocator exhausted");
                Err(AddressSpaceError::AllocatorOverflow(self.namespace_index))
            }
        }
    }

    fn reserve(&self, id: &NodeId) {
        if id.namespace == self.namespace_index {
            if let Some(value) = id.as_numeric() {
                self.allocator.reserve_through(value);
            }
        }
    }

    // -- Lookup --

    /// Look a node up by id. `None` means "not created (yet)".
    pub fn find(&self, id: &NodeId) -> Option<Arc<Node>> {
        let topology = self.topology.read();
        let key = topology.key(id)?;
        topology.nodes.get(key).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.topology.read().index.contains_key(id)
    }

    /// The owning parent of `id` and the reference that links them.
    pub fn parent(&self, id: &NodeId) -> Option<(ReferenceType, NodeId)> {
        let topology = self.topology.read();
        let key = topology.key(id)?;
        let (reference, parent) = topology.adjacency.get(key)?.parent?;
        Some((reference, topology.id_of(parent)?))
    }

    /// Children of `id` in insertion order.
    pub fn children(&self, id: &NodeId) -> Vec<(ReferenceType, NodeId)> {
        let topology = self.topology.read();
        let Some(adj) = topology.key(id).and_then(|key| topology.adjacency.get(key)) else {
            return Vec::new();
        };
        adj.children
            .iter()
            .filter_map(|&(reference, child)| Some((reference, topology.id_of(child)?)))
            .collect()
    }

    /// The child of `parent` whose browse name is `name`.
    pub fn find_child(&self, parent: &NodeId, name: &str) -> Option<Arc<Node>> {
        let topology = self.topology.read();
        let adj = topology.adjacency.get(topology.key(parent)?)?;
        adj.children
            .iter()
            .filter_map(|&(_, child)| topology.nodes.get(child))
            .find(|node| node.browse_name.name == name)
            .cloned()
    }

    /// Follow browse names from `start`.
    pub fn browse_path(&self, start: &NodeId, path: &[&str]) -> Option<Arc<Node>> {
        let mut current = self.find(start)?;
        for name in path {
            current = self.find_child(&current.id, name)?;
        }
        Some(current)
    }

    /// All nodes whose body is the given object variant.
    pub fn objects_of_kind(&self, kind: ObjectKind) -> Vec<Arc<Node>> {
        self.topology
            .read()
            .nodes
            .values()
            .filter(|node| node.object_kind() == Some(kind))
            .cloned()
            .collect()
    }

    // -- Programmatic creation --

    /// Insert `node` under `parent`. Without a parent the node is organized
    /// under the ObjectsFolder root.
    pub fn add_node(
        &self,
        node: Node,
        parent: Option<(&NodeId, ReferenceType)>,
    ) -> Result<Arc<Node>, AddressSpaceError> {
        let mut topology = self.topology.write();
        if topology.index.contains_key(&node.id) {
            return Err(AddressSpaceError::DuplicateNodeId(node.id));
        }
        let (parent_id, reference) =
            parent.unwrap_or((&well_known::OBJECTS_FOLDER, ReferenceType::Organizes));
        let parent_key = topology
            .key(parent_id)
            .ok_or_else(|| AddressSpaceError::ParentNotFound(parent_id.clone()))?;

        self.reserve(&node.id);
        tracing::debug!(node = %node.id, parent = %parent_id, "node added");
        Ok(topology.insert(node, Some((reference, parent_key))))
    }

    /// Create a string-identified folder. `path` becomes the identifier and
    /// browse name, `name` the display name.
    pub fn create_folder(
        &self,
        parent: Option<&NodeId>,
        path: &str,
        name: &str,
    ) -> Result<NodeId, AddressSpaceError> {
        let ns = self.namespace_index;
        let folder =
            Node::folder(NodeId::string(ns, path), QualifiedName::new(ns, path)).with_display_name(name);
        let node = self.add_node(folder, parent.map(|p| (p, ReferenceType::Organizes)))?;
        Ok(node.id.clone())
    }

    /// Create a string-identified method bound to `binding`, attached to
    /// `parent` as a component.
    pub fn create_method(
        &self,
        parent: Option<&NodeId>,
        path: &str,
        name: &str,
        binding: Option<CommandKind>,
    ) -> Result<NodeId, AddressSpaceError> {
        let ns = self.namespace_index;
        let method = Node::method(NodeId::string(ns, path), QualifiedName::new(ns, path), binding)
            .with_display_name(name);
        let node = self.add_node(method, parent.map(|p| (p, ReferenceType::HasComponent)))?;
        Ok(node.id.clone())
    }

    // -- Template import --

    /// Parse `source` and materialize its nodes.
    ///
    /// The batch is validated and specialized before any node becomes
    /// visible; on error nothing is inserted and the namespace table is left
    /// untouched.
    pub fn import_templates(
        &self,
        source: &dyn TemplateSource,
        behaviors: &BehaviorTable,
    ) -> Result<Vec<Arc<Node>>, AddressSpaceError> {
        let origin = source.origin();
        let template = source.parse().map_err(|source| AddressSpaceError::Import {
            origin: origin.clone(),
            source,
        })?;

        let mut topology = self.topology.write();

        // Phase 1: namespaces. Staged so a failed import leaves no trace.
        let mut namespaces = topology.namespaces.clone();
        let mut ns_map = Vec::with_capacity(template.namespace_uris.len());
        for uri in &template.namespace_uris {
            ns_map.push(
                namespaces
                    .get_or_append(uri)
                    .ok_or(AddressSpaceError::NamespaceTableFull)?,
            );
        }
        let remap_ns = |local: NamespaceIndex| -> Result<NamespaceIndex, AddressSpaceError> {
            if local == 0 {
                return Ok(0);
            }
            ns_map
                .get(local as usize - 1)
                .copied()
                .ok_or_else(|| AddressSpaceError::UnknownNamespaceIndex {
                    origin: origin.clone(),
                    index: local,
                })
        };
        let remap = |id: &NodeId| -> Result<NodeId, AddressSpaceError> {
            Ok(NodeId {
                namespace: remap_ns(id.namespace)?,
                identifier: id.identifier.clone(),
            })
        };

        // Phase 2: materialize generic nodes and collect parent links.
        let mut staged: Vec<Node> = Vec::with_capacity(template.nodes.len());
        let mut parents: HashMap<NodeId, (ReferenceType, NodeId)> = HashMap::new();
        let mut forward: Vec<(NodeId, TemplateReference)> = Vec::new();
        let mut batch_ids = HashSet::new();

        for def in &template.nodes {
            let id = remap(&def.id)?;
            if topology.index.contains_key(&id) || !batch_ids.insert(id.clone()) {
                return Err(AddressSpaceError::DuplicateNodeId(id));
            }
            let browse_name =
                QualifiedName::new(remap_ns(def.browse_name.namespace)?, def.browse_name.name.clone());
            let type_definition = def.type_definition.as_ref().map(&remap).transpose()?;

            let body = match &def.kind {
                NodeDefinitionKind::Object if type_definition == Some(well_known::FOLDER_TYPE) => {
                    NodeBody::Folder
                }
                NodeDefinitionKind::Object => NodeBody::Object(ObjectKind::Generic),
                NodeDefinitionKind::Variable { data_type, value } => NodeBody::Variable(
                    VariableBody::new(value.clone().unwrap_or_else(|| data_type.default_value())),
                ),
                NodeDefinitionKind::Method => NodeBody::Method(Default::default()),
            };

            let mut node = Node::new(id.clone(), browse_name, body);
            if let Some(display_name) = &def.display_name {
                node.display_name = display_name.clone();
            }
            node.type_definition = type_definition;

            if let Some(parent) = &def.parent {
                parents.insert(id.clone(), (parent.reference_type, remap(&parent.target)?));
            }
            for child in &def.children {
                forward.push((id.clone(), child.clone()));
            }
            staged.push(node);
        }

        // Forward references fill in parents the children did not declare.
        for (parent_id, child) in forward {
            let child_id = remap(&child.target)?;
            parents
                .entry(child_id)
                .or_insert((child.reference_type, parent_id));
        }

        // Phase 3: attach behavior before anything is visible.
        let mut specialized = 0usize;
        for node in &mut staged {
            let type_id = node.type_definition.as_ref().and_then(|t| {
                Some(ExpandedNodeId {
                    namespace_uri: namespaces.uri(t.namespace)?.to_string(),
                    identifier: t.identifier.clone(),
                })
            });
            if behaviors.attach(node, type_id.as_ref()) {
                specialized += 1;
            }
        }

        // Phase 4: order so every parent precedes its children.
        let mut pending: Vec<(Node, (ReferenceType, NodeId))> = staged
            .into_iter()
            .map(|node| {
                let link = parents
                    .remove(&node.id)
                    .unwrap_or((ReferenceType::Organizes, well_known::OBJECTS_FOLDER));
                (node, link)
            })
            .collect();
        for (node, (_, parent)) in &pending {
            if !topology.index.contains_key(parent) && !batch_ids.contains(parent) {
                tracing::warn!(node = %node.id, parent = %parent, "template parent missing");
                return Err(AddressSpaceError::ParentNotFound(parent.clone()));
            }
        }

        let mut ordered = Vec::with_capacity(pending.len());
        let mut placed: HashSet<NodeId> = HashSet::new();
        while !pending.is_empty() {
            let before = pending.len();
            let mut rest = Vec::with_capacity(before);
            for (node, (reference, parent)) in pending {
                if topology.index.contains_key(&parent) || placed.contains(&parent) {
                    placed.insert(node.id.clone());
                    ordered.push((node, reference, parent));
                } else {
                    rest.push((node, (reference, parent)));
                }
            }
            if rest.len() == before {
                return Err(AddressSpaceError::Cycle(rest[0].0.id.clone()));
            }
            pending = rest;
        }

        // Phase 5: commit.
        topology.namespaces = namespaces;
        let mut imported = Vec::with_capacity(ordered.len());
        for (node, reference, parent) in ordered {
            let Some(parent_key) = topology.key(&parent) else {
                // Unreachable: ordering guarantees the parent is inserted.
                return Err(AddressSpaceError::ParentNotFound(parent));
            };
            self.reserve(&node.id);
            imported.push(topology.insert(node, Some((reference, parent_key))));
        }

        tracing::info!(
            origin = %origin,
            nodes = imported.len(),
            specialized,
            "template imported"
        );
        Ok(imported)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{STATION_NAMESPACE_URI, STATION_TYPE_ID};
    use crate::template::{NodeDefinition, Template, TypeDefinition};
    use crate::test_utils::*;
    use crate::value::{DataType, Variant};

    fn space() -> AddressSpace {
        AddressSpace::new(STATION_NAMESPACE_URI)
    }

    // -----------------------------------------------------------------------
    // Allocation and lookup
    // -----------------------------------------------------------------------

    #[test]
    fn new_space_has_objects_root() {
        let space = space();
        assert_eq!(space.len(), 1);
        assert_eq!(space.namespace_index(), 1);
        let root = space.find(&well_known::OBJECTS_FOLDER).unwrap();
        assert_eq!(root.browse_name.name, "Objects");
        assert!(space.parent(&well_known::OBJECTS_FOLDER).is_none());
    }

    #[test]
    fn find_after_allocate_and_create() {
        let space = space();
        let id = space.allocate().unwrap();
        assert_eq!(id.namespace, space.namespace_index());
        assert!(space.find(&id).is_none());

        let node = Node::object(id.clone(), QualifiedName::new(1, "Line"));
        let created = space.add_node(node, None).unwrap();

        let found = space.find(&id).unwrap();
        assert!(Arc::ptr_eq(&created, &found));
        assert_eq!(
            space.parent(&id),
            Some((ReferenceType::Organizes, well_known::OBJECTS_FOLDER))
        );
    }

    #[test]
    fn exhausted_allocator_is_reported() {
        let space = space();
        let ns = space.namespace_index();
        let last = Node::object(NodeId::numeric(ns, u32::MAX), QualifiedName::new(ns, "Last"));
        space.add_node(last, None).unwrap();

        for _ in 0..2 {
            assert!(matches!(
                space.allocate(),
                Err(AddressSpaceError::AllocatorOverflow(index)) if index == ns
            ));
        }
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn ids_in_foreign_namespaces_do_not_reserve() {
        let space = space();
        let foreign = Node::object(NodeId::numeric(0, u32::MAX), QualifiedName::new(0, "Foreign"));
        space.add_node(foreign, None).unwrap();
        assert_eq!(space.allocate().unwrap(), NodeId::numeric(space.namespace_index(), 1));
    }

    #[test]
    fn find_unallocated_is_none() {
        let space = space();
        assert!(space.find(&NodeId::numeric(1, 424242)).is_none());
        assert!(space.find(&NodeId::string(7, "nowhere")).is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let space = space();
        let id = space.allocate().unwrap();
        space
            .add_node(Node::object(id.clone(), QualifiedName::new(1, "A")), None)
            .unwrap();
        let err = space
            .add_node(Node::object(id.clone(), QualifiedName::new(1, "B")), None)
            .unwrap_err();
        assert!(matches!(err, AddressSpaceError::DuplicateNodeId(dup) if dup == id));
    }

    #[test]
    fn missing_parent_rejected() {
        let space = space();
        let id = space.allocate().unwrap();
        let ghost = NodeId::numeric(1, 999_999);
        let err = space
            .add_node(
                Node::object(id, QualifiedName::new(1, "A")),
                Some((&ghost, ReferenceType::HasComponent)),
            )
            .unwrap_err();
        assert!(matches!(err, AddressSpaceError::ParentNotFound(p) if p == ghost));
        assert_eq!(space.len(), 1);
    }

    #[test]
    fn create_folder_and_method_link_under_objects() {
        let space = space();
        let folder = space.create_folder(None, "AssetAdminShell", "AssetAdminShell").unwrap();
        let method = space
            .create_method(Some(&folder), "GenerateAAS", "GenerateAAS", Some(CommandKind::GenerateAas))
            .unwrap();

        assert_eq!(folder, NodeId::string(1, "AssetAdminShell"));
        assert!(
            space
                .children(&well_known::OBJECTS_FOLDER)
                .contains(&(ReferenceType::Organizes, folder.clone()))
        );
        assert_eq!(
            space.children(&folder),
            vec![(ReferenceType::HasComponent, method.clone())]
        );
        let node = space.find(&method).unwrap();
        assert_eq!(node.binding(), Some(CommandKind::GenerateAas));
        assert_eq!(node.display_name, "GenerateAAS");
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    #[test]
    fn import_station_template() {
        let space = space();
        let imported = space
            .import_templates(&station_template(), &BehaviorTable::station())
            .unwrap();
        assert_eq!(imported.len(), station_template().nodes.len());

        let stations = space.objects_of_kind(ObjectKind::Station);
        assert_eq!(stations.len(), 1);
        let station = &stations[0];
        assert_eq!(
            space.parent(&station.id),
            Some((ReferenceType::Organizes, well_known::OBJECTS_FOLDER))
        );

        let execute = space
            .browse_path(&station.id, &["StationCommands", "Execute"])
            .unwrap();
        assert_eq!(execute.binding(), Some(CommandKind::Execute));

        let pressure = space
            .browse_path(&station.id, &["StationTelemetry", "Pressure"])
            .unwrap();
        assert_eq!(pressure.value().unwrap().value, Variant::Double(1000.0));
    }

    #[test]
    fn import_remaps_namespace_indices() {
        let space = space();
        let extra = "urn:example:extra";
        // Occupy index 2 so the template's namespaces land elsewhere.
        let mut template = Template::default();
        template.namespace_uris = vec![extra.to_string(), STATION_NAMESPACE_URI.to_string()];
        template.nodes.push(NodeDefinition::new(
            NodeId::numeric(2, 10),
            QualifiedName::new(2, "Thing"),
            NodeDefinitionKind::Object,
        ));
        space.import_templates(&template, &BehaviorTable::new()).unwrap();

        // Template index 2 is the station namespace, which is index 1 here.
        assert!(space.find(&NodeId::numeric(1, 10)).is_some());
        assert_eq!(space.namespace_index_of(extra), Some(2));
    }

    #[test]
    fn import_reserves_imported_ids() {
        let space = space();
        space
            .import_templates(&station_template(), &BehaviorTable::station())
            .unwrap();
        let max_imported = station_template()
            .nodes
            .iter()
            .filter_map(|n| n.id.as_numeric())
            .max()
            .unwrap();
        let fresh = space.allocate().unwrap();
        assert!(fresh.as_numeric().unwrap() > max_imported);
        assert!(space.find(&fresh).is_none());
    }

    #[test]
    fn import_accepts_children_before_parents() {
        let space = space();
        let mut template = Template {
            namespace_uris: vec![STATION_NAMESPACE_URI.to_string()],
            ..Default::default()
        };
        let mut child = NodeDefinition::new(
            NodeId::numeric(1, 2),
            QualifiedName::new(1, "Child"),
            NodeDefinitionKind::Variable {
                data_type: DataType::UInt64,
                value: None,
            },
        );
        child.parent = Some(TemplateReference {
            reference_type: ReferenceType::HasComponent,
            target: NodeId::numeric(1, 1),
        });
        template.nodes.push(child);
        template.nodes.push(NodeDefinition::new(
            NodeId::numeric(1, 1),
            QualifiedName::new(1, "Parent"),
            NodeDefinitionKind::Object,
        ));

        space.import_templates(&template, &BehaviorTable::new()).unwrap();
        let child = space.browse_path(&NodeId::numeric(1, 1), &["Child"]).unwrap();
        assert_eq!(child.value().unwrap().value, Variant::UInt64(0));
    }

    #[test]
    fn import_uses_forward_references() {
        let space = space();
        let mut template = Template {
            namespace_uris: vec![STATION_NAMESPACE_URI.to_string()],
            ..Default::default()
        };
        let mut parent = NodeDefinition::new(
            NodeId::numeric(1, 1),
            QualifiedName::new(1, "Parent"),
            NodeDefinitionKind::Object,
        );
        parent.children.push(TemplateReference {
            reference_type: ReferenceType::HasProperty,
            target: NodeId::numeric(1, 2),
        });
        template.nodes.push(parent);
        template.nodes.push(NodeDefinition::new(
            NodeId::numeric(1, 2),
            QualifiedName::new(1, "Child"),
            NodeDefinitionKind::Method,
        ));

        space.import_templates(&template, &BehaviorTable::new()).unwrap();
        assert_eq!(
            space.parent(&NodeId::numeric(1, 2)),
            Some((ReferenceType::HasProperty, NodeId::numeric(1, 1)))
        );
    }

    #[test]
    fn failed_import_leaves_space_untouched() {
        let space = space();
        let mut template = station_template();
        template.namespace_uris.push("urn:never-committed".to_string());
        let mut orphan = NodeDefinition::new(
            NodeId::numeric(1, 9000),
            QualifiedName::new(1, "Orphan"),
            NodeDefinitionKind::Object,
        );
        orphan.parent = Some(TemplateReference {
            reference_type: ReferenceType::HasComponent,
            target: NodeId::numeric(1, 424242),
        });
        template.nodes.push(orphan);

        let err = space
            .import_templates(&template, &BehaviorTable::station())
            .unwrap_err();
        assert!(matches!(err, AddressSpaceError::ParentNotFound(_)));
        assert_eq!(space.len(), 1);
        assert_eq!(space.namespace_index_of("urn:never-committed"), None);
    }

    #[test]
    fn import_rejects_duplicates_and_cycles() {
        let space = space();
        let mut template = station_template();
        let first = template.nodes[0].clone();
        template.nodes.push(first);
        assert!(matches!(
            space.import_templates(&template, &BehaviorTable::station()),
            Err(AddressSpaceError::DuplicateNodeId(_))
        ));

        let mut template = Template {
            namespace_uris: vec![STATION_NAMESPACE_URI.to_string()],
            ..Default::default()
        };
        for (id, parent) in [(1, 2), (2, 1)] {
            let mut def = NodeDefinition::new(
                NodeId::numeric(1, id),
                QualifiedName::new(1, format!("N{id}")),
                NodeDefinitionKind::Object,
            );
            def.parent = Some(TemplateReference {
                reference_type: ReferenceType::HasComponent,
                target: NodeId::numeric(1, parent),
            });
            template.nodes.push(def);
        }
        assert!(matches!(
            space.import_templates(&template, &BehaviorTable::new()),
            Err(AddressSpaceError::Cycle(_))
        ));
        assert_eq!(space.len(), 1);
    }

    #[test]
    fn import_rejects_unknown_namespace_index() {
        let space = space();
        let mut template = Template::default();
        template.nodes.push(NodeDefinition::new(
            NodeId::numeric(3, 1),
            QualifiedName::new(0, "Lost"),
            NodeDefinitionKind::Object,
        ));
        assert!(matches!(
            space.import_templates(&template, &BehaviorTable::new()),
            Err(AddressSpaceError::UnknownNamespaceIndex { index: 3, .. })
        ));
    }

    #[test]
    fn folder_type_objects_become_folders() {
        let space = space();
        let mut template = Template {
            namespace_uris: vec![STATION_NAMESPACE_URI.to_string()],
            types: vec![TypeDefinition {
                id: NodeId::numeric(1, STATION_TYPE_ID),
                browse_name: QualifiedName::new(1, "StationType"),
                display_name: "StationType".to_string(),
            }],
            ..Default::default()
        };
        let mut def = NodeDefinition::new(
            NodeId::numeric(1, 50),
            QualifiedName::new(1, "Plant"),
            NodeDefinitionKind::Object,
        );
        def.type_definition = Some(well_known::FOLDER_TYPE);
        template.nodes.push(def);

        space.import_templates(&template, &BehaviorTable::station()).unwrap();
        let plant = space.find(&NodeId::numeric(1, 50)).unwrap();
        assert_eq!(plant.class(), crate::node::NodeClass::Folder);
    }

    #[test]
    fn concurrent_lookups_during_allocation() {
        let space = Arc::new(space());
        space
            .import_templates(&station_template(), &BehaviorTable::station())
            .unwrap();
        let station = space.objects_of_kind(ObjectKind::Station)[0].id.clone();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let space = Arc::clone(&space);
                let station = station.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let id = space.allocate().unwrap();
                        let node = Node::object(id, QualifiedName::new(1, format!("T{i}-{j}")));
                        space.add_node(node, Some((&station, ReferenceType::HasComponent))).unwrap();
                        assert!(space.find(&station).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(space.len(), 1 + station_template().nodes.len() + 200);
    }
}
