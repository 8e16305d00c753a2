//! Reopening packages.

use crate::part::{
    CONTENT_TYPES_ENTRY, PackageError, PartName, ROOT_RELATIONSHIPS_ENTRY, Relationship,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

/// A part listed in the package together with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    pub name: PartName,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn lookup(&self, part: &PartName) -> Option<String> {
        self.overrides
            .get(part.as_str())
            .or_else(|| {
                part.extension()
                    .and_then(|ext| self.defaults.get(&ext.to_ascii_lowercase()))
            })
            .cloned()
    }
}

#[derive(Debug)]
pub struct PackageReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    content_types: ContentTypes,
}

impl PackageReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> PackageReader<R> {
    pub fn new(source: R) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(source)?;
        let document = read_entry(&mut archive, CONTENT_TYPES_ENTRY)?
            .ok_or_else(|| PackageError::Malformed(format!("{CONTENT_TYPES_ENTRY} missing")))?;
        let content_types = parse_content_types(&document)?;
        Ok(Self {
            archive,
            content_types,
        })
    }

    /// Every content part (relationship documents and the content-type map
    /// excluded), in archive order.
    pub fn parts(&self) -> Vec<PartInfo> {
        self.archive
            .file_names()
            .filter(|entry| *entry != CONTENT_TYPES_ENTRY && !is_relationships_entry(entry))
            .filter_map(|entry| PartName::new(&format!("/{entry}")).ok())
            .map(|name| PartInfo {
                content_type: self.content_types.lookup(&name),
                name,
            })
            .collect()
    }

    pub fn content_type(&self, part: &PartName) -> Option<String> {
        self.content_types.lookup(part)
    }

    pub fn read_part(&mut self, part: &PartName) -> Result<Vec<u8>, PackageError> {
        read_entry(&mut self.archive, part.entry())?
            .ok_or_else(|| PackageError::MissingPart(part.clone()))
    }

    /// Relationships owned by `source`, or by the package root when `None`.
    /// A part without a relationship document has none.
    pub fn relationships(
        &mut self,
        source: Option<&PartName>,
    ) -> Result<Vec<Relationship>, PackageError> {
        let entry = source.map_or_else(
            || ROOT_RELATIONSHIPS_ENTRY.to_string(),
            PartName::relationships_entry,
        );
        match read_entry(&mut self.archive, &entry)? {
            Some(document) => parse_relationships(&document, source),
            None => Ok(Vec::new()),
        }
    }

    /// Relationships of `source` having `relationship_type`.
    pub fn related(
        &mut self,
        source: Option<&PartName>,
        relationship_type: &str,
    ) -> Result<Vec<PartName>, PackageError> {
        Ok(self
            .relationships(source)?
            .into_iter()
            .filter(|r| r.relationship_type == relationship_type)
            .map(|r| r.target)
            .collect())
    }

    /// Read the part a relationship points at.
    pub fn resolve(&mut self, relationship: &Relationship) -> Result<Vec<u8>, PackageError> {
        self.read_part(&relationship.target)
    }
}

fn is_relationships_entry(entry: &str) -> bool {
    entry.ends_with(".rels") && (entry.starts_with("_rels/") || entry.contains("/_rels/"))
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, PackageError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(Some(data))
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, PackageError> {
    let Some(attr) = e
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)?
    else {
        return Ok(None);
    };
    Ok(Some(attr.unescape_value()?.into_owned()))
}

fn required(e: &BytesStart<'_>, name: &str) -> Result<String, PackageError> {
    attribute(e, name)?.ok_or_else(|| {
        PackageError::Malformed(format!(
            "<{}> without {name}",
            String::from_utf8_lossy(e.local_name().as_ref())
        ))
    })
}

/// Visit every start or empty element of `document`.
fn for_each_element(
    document: &[u8],
    mut visit: impl FnMut(&BytesStart<'_>) -> Result<(), PackageError>,
) -> Result<(), PackageError> {
    let text = std::str::from_utf8(document)
        .map_err(|e| PackageError::Malformed(format!("document is not UTF-8: {e}")))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => visit(&e)?,
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn parse_content_types(document: &[u8]) -> Result<ContentTypes, PackageError> {
    let mut types = ContentTypes::default();
    for_each_element(document, |e| {
        match e.local_name().as_ref() {
            b"Default" => {
                types.defaults.insert(
                    required(e, "Extension")?.to_ascii_lowercase(),
                    required(e, "ContentType")?,
                );
            }
            b"Override" => {
                types
                    .overrides
                    .insert(required(e, "PartName")?, required(e, "ContentType")?);
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(types)
}

fn parse_relationships(
    document: &[u8],
    source: Option<&PartName>,
) -> Result<Vec<Relationship>, PackageError> {
    let mut relationships = Vec::new();
    for_each_element(document, |e| {
        if e.local_name().as_ref() == b"Relationship" {
            if attribute(e, "TargetMode")?.as_deref() == Some("External") {
                return Ok(());
            }
            relationships.push(Relationship {
                id: required(e, "Id")?,
                relationship_type: required(e, "Type")?,
                target: PartName::resolve(source, &required(e, "Target")?)?,
            });
        }
        Ok(())
    })?;
    Ok(relationships)
}
