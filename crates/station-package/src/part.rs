//! Part names, relationships and the package error type.

use std::fmt;

/// Content type of relationship parts.
pub const RELATIONSHIPS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-package.relationships+xml";

pub const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";

pub const RELATIONSHIPS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Zip entry holding the content-type map.
pub const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";

/// Zip entry holding the package-root relationships.
pub const ROOT_RELATIONSHIPS_ENTRY: &str = "_rels/.rels";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("invalid part name: {0:?}")]
    InvalidPartName(String),
    #[error("duplicate part: {0}")]
    DuplicatePart(PartName),
    #[error("part not found: {0}")]
    MissingPart(PartName),
    #[error("malformed package: {0}")]
    Malformed(String),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Part names
// ---------------------------------------------------------------------------

/// An absolute part name such as `/aasx/aasx-origin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartName(String);

impl PartName {
    pub fn new(name: &str) -> Result<Self, PackageError> {
        let invalid = || PackageError::InvalidPartName(name.to_string());
        let rest = name.strip_prefix('/').ok_or_else(invalid)?;
        if rest.is_empty() || rest.ends_with('/') {
            return Err(invalid());
        }
        if rest
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }
        if rest == CONTENT_TYPES_ENTRY {
            return Err(invalid());
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The zip entry name (no leading slash).
    pub fn entry(&self) -> &str {
        &self.0[1..]
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Directory part of the name, with trailing slash (`/aasx/`).
    pub fn directory(&self) -> &str {
        let end = self.0.rfind('/').map_or(0, |i| i + 1);
        &self.0[..end]
    }

    pub fn extension(&self) -> Option<&str> {
        let file = self.file_name();
        file.rfind('.').map(|i| &file[i + 1..])
    }

    /// Zip entry of this part's relationship document,
    /// `<dir>/_rels/<file>.rels`.
    pub fn relationships_entry(&self) -> String {
        format!(
            "{}_rels/{}.rels",
            &self.directory()[1..],
            self.file_name()
        )
    }

    /// Resolve a relationship target written in a document owned by
    /// `self` (or by the package root when `source` is `None`).
    pub fn resolve(source: Option<&PartName>, target: &str) -> Result<PartName, PackageError> {
        if target.starts_with('/') {
            return PartName::new(target);
        }
        let base = source.map_or("/", PartName::directory);
        let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
        for segment in target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PackageError::InvalidPartName(target.to_string()));
                    }
                }
                other => segments.push(other),
            }
        }
        PartName::new(&format!("/{}", segments.join("/")))
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// A typed link from the package root or a part to a target part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub relationship_type: String,
    pub target: PartName,
}
