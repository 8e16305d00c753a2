use crate::id::NamespaceIndex;

/// URI of the standard namespace. Always index 0.
pub const STANDARD_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// Ordered table of namespace URIs. An URI keeps the index it was first
/// assigned for the lifetime of the table.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    uris: Vec<String>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTable {
    /// A table holding only the standard namespace.
    pub fn new() -> Self {
        Self {
            uris: vec![STANDARD_NAMESPACE_URI.to_string()],
        }
    }

    /// Index of `uri`, appending it when it has not been seen yet.
    ///
    /// Returns `None` if the table is full.
    pub fn get_or_append(&mut self, uri: &str) -> Option<NamespaceIndex> {
        if let Some(index) = self.index_of(uri) {
            return Some(index);
        }
        let index = NamespaceIndex::try_from(self.uris.len()).ok()?;
        self.uris.push(uri.to_string());
        Some(index)
    }

    pub fn index_of(&self, uri: &str) -> Option<NamespaceIndex> {
        self.uris
            .iter()
            .position(|u| u == uri)
            .and_then(|i| NamespaceIndex::try_from(i).ok())
    }

    pub fn uri(&self, index: NamespaceIndex) -> Option<&str> {
        self.uris.get(index as usize).map(String::as_str)
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}
