//! Package assembly.
//!
//! Parts are written in the order they were added, followed by the
//! relationship documents and the content-type map.

use crate::part::{
    CONTENT_TYPES_ENTRY, CONTENT_TYPES_NAMESPACE, PackageError, PartName, RELATIONSHIPS_CONTENT_TYPE,
    RELATIONSHIPS_NAMESPACE, ROOT_RELATIONSHIPS_ENTRY, Relationship,
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::collections::BTreeMap;
use std::io::{Cursor, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug)]
struct Part {
    name: PartName,
    content_type: String,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct PackageBuilder {
    parts: Vec<Part>,
    root_relationships: Vec<Relationship>,
    part_relationships: BTreeMap<PartName, Vec<Relationship>>,
    next_relationship: u32,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(
        &mut self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<PartName, PackageError> {
        let name = PartName::new(name)?;
        if self.contains(&name) {
            return Err(PackageError::DuplicatePart(name));
        }
        self.parts.push(Part {
            name: name.clone(),
            content_type: content_type.to_string(),
            data,
        });
        Ok(name)
    }

    pub fn contains(&self, name: &PartName) -> bool {
        self.parts.iter().any(|p| &p.name == name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &PartName> {
        self.parts.iter().map(|p| &p.name)
    }

    /// Relate the package root to `target`.
    pub fn relate_from_root(
        &mut self,
        relationship_type: &str,
        target: &PartName,
    ) -> Result<String, PackageError> {
        let relationship = self.relationship(relationship_type, target)?;
        let id = relationship.id.clone();
        self.root_relationships.push(relationship);
        Ok(id)
    }

    /// Relate part `source` to `target`.
    pub fn relate(
        &mut self,
        source: &PartName,
        relationship_type: &str,
        target: &PartName,
    ) -> Result<String, PackageError> {
        if !self.contains(source) {
            return Err(PackageError::MissingPart(source.clone()));
        }
        let relationship = self.relationship(relationship_type, target)?;
        let id = relationship.id.clone();
        self.part_relationships
            .entry(source.clone())
            .or_default()
            .push(relationship);
        Ok(id)
    }

    fn relationship(
        &mut self,
        relationship_type: &str,
        target: &PartName,
    ) -> Result<Relationship, PackageError> {
        if !self.contains(target) {
            return Err(PackageError::MissingPart(target.clone()));
        }
        self.next_relationship += 1;
        Ok(Relationship {
            id: format!("R{}", self.next_relationship),
            relationship_type: relationship_type.to_string(),
            target: target.clone(),
        })
    }

    /// Write the complete container to `sink` and hand it back.
    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<W, PackageError> {
        let mut zip = ZipWriter::new(sink);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            zip.start_file(part.name.entry(), options)?;
            zip.write_all(&part.data)?;
        }

        zip.start_file(ROOT_RELATIONSHIPS_ENTRY, options)?;
        zip.write_all(&relationships_document(&self.root_relationships)?)?;
        for (source, relationships) in &self.part_relationships {
            zip.start_file(source.relationships_entry(), options)?;
            zip.write_all(&relationships_document(relationships)?)?;
        }

        zip.start_file(CONTENT_TYPES_ENTRY, options)?;
        zip.write_all(&self.content_types_document()?)?;

        let sink = zip.finish()?;
        tracing::debug!(
            parts = self.parts.len(),
            relationships = self.next_relationship,
            "package written"
        );
        Ok(sink)
    }

    fn content_types_document(&self) -> Result<Vec<u8>, PackageError> {
        let mut writer = xml_writer()?;
        let mut types = BytesStart::new("Types");
        types.push_attribute(("xmlns", CONTENT_TYPES_NAMESPACE));
        writer.write_event(Event::Start(types))?;

        let mut rels = BytesStart::new("Default");
        rels.push_attribute(("Extension", "rels"));
        rels.push_attribute(("ContentType", RELATIONSHIPS_CONTENT_TYPE));
        writer.write_event(Event::Empty(rels))?;

        for part in &self.parts {
            let mut entry = BytesStart::new("Override");
            entry.push_attribute(("PartName", part.name.as_str()));
            entry.push_attribute(("ContentType", part.content_type.as_str()));
            writer.write_event(Event::Empty(entry))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Types")))?;
        Ok(writer.into_inner().into_inner())
    }
}

fn xml_writer() -> Result<Writer<Cursor<Vec<u8>>>, PackageError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    Ok(writer)
}

fn relationships_document(relationships: &[Relationship]) -> Result<Vec<u8>, PackageError> {
    let mut writer = xml_writer()?;
    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", RELATIONSHIPS_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    for relationship in relationships {
        let mut element = BytesStart::new("Relationship");
        element.push_attribute(("Type", relationship.relationship_type.as_str()));
        element.push_attribute(("Target", relationship.target.as_str()));
        element.push_attribute(("Id", relationship.id.as_str()));
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_parts_rejected() {
        let mut builder = PackageBuilder::new();
        builder.add_part("/a/b.txt", "text/plain", b"1".to_vec()).unwrap();
        assert!(matches!(
            builder.add_part("/a/b.txt", "text/plain", b"2".to_vec()),
            Err(PackageError::DuplicatePart(_))
        ));
    }

    #[test]
    fn relationships_need_existing_parts() {
        let mut builder = PackageBuilder::new();
        let a = builder.add_part("/a", "text/plain", Vec::new()).unwrap();
        let ghost = PartName::new("/ghost").unwrap();
        assert!(matches!(
            builder.relate_from_root("urn:t", &ghost),
            Err(PackageError::MissingPart(_))
        ));
        assert!(matches!(
            builder.relate(&ghost, "urn:t", &a),
            Err(PackageError::MissingPart(_))
        ));
        assert_eq!(builder.relate_from_root("urn:t", &a).unwrap(), "R1");
        assert_eq!(builder.relate(&a, "urn:t", &a).unwrap(), "R2");
    }

    #[test]
    fn content_types_list_every_part() {
        let mut builder = PackageBuilder::new();
        builder.add_part("/x/one", "text/plain", Vec::new()).unwrap();
        builder.add_part("/x/two.xml", "text/xml", Vec::new()).unwrap();
        let doc = String::from_utf8(builder.content_types_document().unwrap()).unwrap();
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(doc.contains(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#));
        assert!(doc.contains(r#"<Override PartName="/x/one" ContentType="text/plain"/>"#));
        assert!(doc.contains(r#"<Override PartName="/x/two.xml" ContentType="text/xml"/>"#));
    }

    #[test]
    fn writes_readable_zip() {
        let mut builder = PackageBuilder::new();
        let part = builder.add_part("/data/payload", "text/plain", b"hello".to_vec()).unwrap();
        builder.relate_from_root("urn:payload", &part).unwrap();
        let bytes = builder.write_to(Cursor::new(Vec::new())).unwrap().into_inner();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"data/payload".to_string()));
        assert!(names.contains(&ROOT_RELATIONSHIPS_ENTRY.to_string()));
        assert!(names.contains(&CONTENT_TYPES_ENTRY.to_string()));

        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("data/payload").unwrap(), &mut content)
            .unwrap();
        assert_eq!(content, "hello");
    }
}
