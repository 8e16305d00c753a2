//! UANodeSet XML template reader.
//!
//! Reads the subset of the NodeSet2 schema the station model uses:
//! `NamespaceUris`, `Aliases`, `UAObjectType`, `UAObject`, `UAVariable`,
//! `UAMethod`, their `References` and scalar `Value`s. Everything else is
//! skipped. Node ids keep the document's local namespace indices; the
//! address space remaps them on import.
//!
//! Nodes that hang below an object type (instance declarations) describe the
//! type, not an instance, and are not materialized. Variables of data types
//! the station model has no scalar for (method `InputArguments`, structures)
//! are skipped together with anything below them. Array values are not
//! modeled: such variables keep their data type's default value.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::LocalName;
use station_core::id::{NodeId, QualifiedName, well_known};
use station_core::node::ReferenceType;
use station_core::template::{
    NodeDefinition, NodeDefinitionKind, Template, TemplateError, TemplateReference, TemplateSource,
    TypeDefinition,
};
use station_core::value::DataType;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// A NodeSet2 document on disk.
#[derive(Debug, Clone)]
pub struct NodeSetFile {
    path: PathBuf,
}

impl NodeSetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateSource for NodeSetFile {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn parse(&self) -> Result<Template, TemplateError> {
        let xml = std::fs::read_to_string(&self.path)?;
        parse_nodeset(&xml, &self.origin())
    }
}

// ===========================================================================
// Raw document
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    ObjectType,
    Object,
    Variable,
    Method,
}

impl ElementKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "UAObjectType" => Some(ElementKind::ObjectType),
            "UAObject" => Some(ElementKind::Object),
            "UAVariable" => Some(ElementKind::Variable),
            "UAMethod" => Some(ElementKind::Method),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct RawReference {
    reference_type: String,
    is_forward: bool,
    target: String,
}

#[derive(Debug)]
struct RawNode {
    kind: ElementKind,
    node_id: String,
    browse_name: String,
    parent_node_id: Option<String>,
    data_type: Option<String>,
    value_rank: Option<i32>,
    display_name: Option<String>,
    references: Vec<RawReference>,
    value: Option<String>,
    array_value: bool,
}

impl RawNode {
    fn open(kind: ElementKind, e: &BytesStart<'_>, origin: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            kind,
            node_id: required_attr(e, "NodeId", origin)?,
            browse_name: required_attr(e, "BrowseName", origin)?,
            parent_node_id: optional_attr(e, "ParentNodeId", origin)?,
            data_type: optional_attr(e, "DataType", origin)?,
            value_rank: optional_attr(e, "ValueRank", origin)?.and_then(|v| v.trim().parse().ok()),
            display_name: None,
            references: Vec::new(),
            value: None,
            array_value: false,
        })
    }

    /// `ValueRank` 0 and above declare one or more dimensions.
    fn is_array(&self) -> bool {
        self.array_value || self.value_rank.is_some_and(|rank| rank >= 0)
    }
}

/// Where the next text event goes.
enum TextSlot {
    Uri,
    Alias(String),
    DisplayName,
    Reference {
        reference_type: String,
        is_forward: bool,
    },
    Value,
}

#[derive(Debug, Default)]
struct RawDocument {
    namespace_uris: Vec<String>,
    aliases: HashMap<String, String>,
    nodes: Vec<RawNode>,
}

fn parse_error(origin: &str, detail: impl Display) -> TemplateError {
    TemplateError::Parse {
        origin: origin.to_string(),
        detail: detail.to_string(),
    }
}

fn tag(name: LocalName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

fn optional_attr(
    e: &BytesStart<'_>,
    name: &str,
    origin: &str,
) -> Result<Option<String>, TemplateError> {
    let Some(attr) = e
        .try_get_attribute(name)
        .map_err(|err| parse_error(origin, err))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|err| parse_error(origin, err))?;
    Ok(Some(value.into_owned()))
}

fn required_attr(e: &BytesStart<'_>, name: &str, origin: &str) -> Result<String, TemplateError> {
    optional_attr(e, name, origin)?.ok_or_else(|| {
        parse_error(
            origin,
            format!("<{}> is missing attribute {name}", tag(e.local_name())),
        )
    })
}

// ===========================================================================
// Parsing
// ===========================================================================

/// Parse a NodeSet2 document. `origin` names the document in errors.
pub fn parse_nodeset(xml: &str, origin: &str) -> Result<Template, TemplateError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = RawDocument::default();
    let mut current: Option<RawNode> = None;
    let mut slot: Option<TextSlot> = None;
    let mut in_value = false;

    loop {
        let event = reader.read_event().map_err(|err| {
            parse_error(
                origin,
                format!("{err} at byte {}", reader.buffer_position()),
            )
        })?;
        match event {
            Event::Start(e) => {
                let name = tag(e.local_name());
                if let Some(kind) = ElementKind::from_tag(&name) {
                    current = Some(RawNode::open(kind, &e, origin)?);
                    slot = None;
                    continue;
                }
                let in_node = current.is_some();
                if in_value && name.starts_with("ListOf") {
                    if let Some(node) = current.as_mut() {
                        node.array_value = true;
                    }
                }
                slot = match name.as_str() {
                    "Uri" => Some(TextSlot::Uri),
                    "Alias" => Some(TextSlot::Alias(required_attr(&e, "Alias", origin)?)),
                    "DisplayName" if in_node => Some(TextSlot::DisplayName),
                    "Reference" if in_node => Some(TextSlot::Reference {
                        reference_type: required_attr(&e, "ReferenceType", origin)?,
                        is_forward: optional_attr(&e, "IsForward", origin)?
                            .is_none_or(|v| !v.eq_ignore_ascii_case("false")),
                    }),
                    "Value" if in_node => {
                        in_value = true;
                        None
                    }
                    _ if in_value => Some(TextSlot::Value),
                    _ => None,
                };
            }
            Event::Empty(e) => {
                let name = tag(e.local_name());
                if let Some(kind) = ElementKind::from_tag(&name) {
                    doc.nodes.push(RawNode::open(kind, &e, origin)?);
                } else if in_value && name.starts_with("ListOf") {
                    if let Some(node) = current.as_mut() {
                        node.array_value = true;
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|err| parse_error(origin, err))?;
                let text = text.trim().to_string();
                match (slot.take(), current.as_mut()) {
                    (Some(TextSlot::Uri), _) => doc.namespace_uris.push(text),
                    (Some(TextSlot::Alias(alias)), _) => {
                        doc.aliases.insert(alias, text);
                    }
                    (Some(TextSlot::DisplayName), Some(node)) => node.display_name = Some(text),
                    (
                        Some(TextSlot::Reference {
                            reference_type,
                            is_forward,
                        }),
                        Some(node),
                    ) => node.references.push(RawReference {
                        reference_type,
                        is_forward,
                        target: text,
                    }),
                    (Some(TextSlot::Value), Some(node)) => node.value = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = tag(e.local_name());
                if ElementKind::from_tag(&name).is_some() {
                    if let Some(node) = current.take() {
                        doc.nodes.push(node);
                    }
                    in_value = false;
                } else if name == "Value" {
                    in_value = false;
                }
                slot = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    doc.into_template(origin)
}

impl RawDocument {
    fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    fn node_id(&self, text: &str) -> Result<NodeId, TemplateError> {
        Ok(self.resolve_alias(text.trim()).parse()?)
    }

    /// `None` when the data type has no scalar counterpart.
    fn data_type(&self, raw: &RawNode) -> Option<DataType> {
        let name = raw.data_type.as_deref().unwrap_or("BaseDataType");
        DataType::from_name(name).or_else(|| {
            let id: NodeId = self.resolve_alias(name).parse().ok()?;
            DataType::from_node_id(&id)
        })
    }

    fn is_type_definition(&self, reference_type: &str) -> bool {
        matches!(reference_type, "HasTypeDefinition" | "i=40")
            || self.resolve_alias(reference_type) == "i=40"
    }

    fn hierarchical(&self, reference_type: &str) -> Option<ReferenceType> {
        ReferenceType::from_name(reference_type)
            .or_else(|| ReferenceType::from_name(self.resolve_alias(reference_type)))
    }

    fn into_template(self, origin: &str) -> Result<Template, TemplateError> {
        let mut types = Vec::new();
        let mut nodes = Vec::new();
        let mut skipped = HashSet::new();

        for raw in &self.nodes {
            let id = self.node_id(&raw.node_id)?;
            let browse_name = QualifiedName::parse(&raw.browse_name);

            let kind = match raw.kind {
                ElementKind::ObjectType => {
                    types.push(TypeDefinition {
                        id,
                        display_name: raw
                            .display_name
                            .clone()
                            .unwrap_or_else(|| browse_name.name.clone()),
                        browse_name,
                    });
                    continue;
                }
                ElementKind::Object => NodeDefinitionKind::Object,
                ElementKind::Method => NodeDefinitionKind::Method,
                ElementKind::Variable => {
                    let Some(data_type) = self.data_type(raw) else {
                        tracing::debug!(
                            origin,
                            node = %id,
                            data_type = raw.data_type.as_deref().unwrap_or("BaseDataType"),
                            "variable of unsupported data type skipped"
                        );
                        skipped.insert(id);
                        continue;
                    };
                    let text = if raw.is_array() {
                        if raw.value.is_some() {
                            tracing::debug!(origin, node = %id, "array value ignored");
                        }
                        None
                    } else {
                        raw.value.as_deref()
                    };
                    let value = match text {
                        Some(text) => Some(data_type.parse_value(text).ok_or_else(|| {
                            parse_error(
                                origin,
                                format!("invalid {data_type} value {text:?} on {id}"),
                            )
                        })?),
                        None => None,
                    };
                    NodeDefinitionKind::Variable { data_type, value }
                }
            };

            let mut def = NodeDefinition::new(id, browse_name, kind);
            def.display_name = raw.display_name.clone();

            for reference in &raw.references {
                let target = self.node_id(&reference.target)?;
                if self.is_type_definition(&reference.reference_type) {
                    def.type_definition = Some(target);
                    continue;
                }
                let Some(reference_type) = self.hierarchical(&reference.reference_type) else {
                    continue;
                };
                let link = TemplateReference {
                    reference_type,
                    target,
                };
                if reference.is_forward {
                    def.children.push(link);
                } else if def.parent.is_none() {
                    def.parent = Some(link);
                }
            }

            if def.parent.is_none() {
                if let Some(parent) = &raw.parent_node_id {
                    let target = self.node_id(parent)?;
                    let reference_type = if target == well_known::OBJECTS_FOLDER {
                        ReferenceType::Organizes
                    } else {
                        ReferenceType::HasComponent
                    };
                    def.parent = Some(TemplateReference {
                        reference_type,
                        target,
                    });
                }
            }
            nodes.push(def);
        }

        let mut roots: HashSet<NodeId> = types.iter().map(|t| t.id.clone()).collect();
        roots.extend(skipped);
        let nodes = drop_descendants(roots, nodes);
        tracing::debug!(
            origin,
            types = types.len(),
            nodes = nodes.len(),
            "nodeset parsed"
        );
        Ok(Template {
            namespace_uris: self.namespace_uris,
            types,
            nodes,
        })
    }
}

/// Remove nodes below any of `roots`, directly or transitively.
fn drop_descendants(roots: HashSet<NodeId>, nodes: Vec<NodeDefinition>) -> Vec<NodeDefinition> {
    let mut dropped = roots;
    let root_count = dropped.len();

    // Parent links from both inverse and forward references.
    let mut parent_of: HashMap<&NodeId, &NodeId> = HashMap::new();
    for node in &nodes {
        if let Some(parent) = &node.parent {
            parent_of.insert(&node.id, &parent.target);
        }
        for child in &node.children {
            parent_of.entry(&child.target).or_insert(&node.id);
        }
    }

    loop {
        let below: Vec<NodeId> = nodes
            .iter()
            .filter(|n| !dropped.contains(&n.id))
            .filter(|n| parent_of.get(&n.id).is_some_and(|p| dropped.contains(*p)))
            .map(|n| n.id.clone())
            .collect();
        if below.is_empty() {
            break;
        }
        dropped.extend(below);
    }

    if dropped.len() == root_count {
        return nodes;
    }
    nodes
        .into_iter()
        .filter(|n| !dropped.contains(&n.id))
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
