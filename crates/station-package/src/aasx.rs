//! Asset Administration Shell package export.
//!
//! The package holds three parts, chained by relationships:
//!
//! ```text
//! package root --aasx-origin--> /aasx/aasx-origin
//!   --aas-spec--> /aasx/aasenv-with-no-id/aasenv-with-no-id.aas.xml
//!     --aas-suppl--> /aasx/<template file>
//! ```

use crate::part::{PackageError, PartName};
use crate::writer::PackageBuilder;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const ORIGIN_PART: &str = "/aasx/aasx-origin";
pub const SPEC_PART: &str = "/aasx/aasenv-with-no-id/aasenv-with-no-id.aas.xml";
pub const SUPPLEMENTARY_DIR: &str = "/aasx/";

pub const ORIGIN_CONTENT: &[u8] = b"Intentionally empty.";

pub const REL_AASX_ORIGIN: &str = "http://www.admin-shell.io/aasx/relationships/aasx-origin";
pub const REL_AAS_SPEC: &str = "http://www.admin-shell.io/aasx/relationships/aas-spec";
pub const REL_AAS_SUPPL: &str = "http://www.admin-shell.io/aasx/relationships/aas-suppl";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to export package to {path}: {source}")]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: PackageError,
    },
}

#[derive(Debug, Clone)]
pub struct AasxExporter {
    aas_environment: PathBuf,
    template: PathBuf,
}

impl AasxExporter {
    /// `aas_environment` is the model-description document; `template` is
    /// the raw template file shipped as supplementary material.
    pub fn new(aas_environment: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            aas_environment: aas_environment.into(),
            template: template.into(),
        }
    }

    /// Part name the template is stored under.
    pub fn supplementary_part(&self) -> Result<PartName, PackageError> {
        let file_name = self
            .template
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PackageError::InvalidPartName(self.template.display().to_string()))?;
        PartName::new(&format!("{SUPPLEMENTARY_DIR}{file_name}"))
    }

    /// Assemble the package in memory.
    pub fn build(&self) -> Result<PackageBuilder, PackageError> {
        let mut builder = PackageBuilder::new();

        let origin = builder.add_part(ORIGIN_PART, "text/plain", ORIGIN_CONTENT.to_vec())?;
        builder.relate_from_root(REL_AASX_ORIGIN, &origin)?;

        let environment = std::fs::read(&self.aas_environment)?;
        let spec = builder.add_part(SPEC_PART, "text/xml", environment)?;
        builder.relate(&origin, REL_AAS_SPEC, &spec)?;

        let supplementary = self.supplementary_part()?;
        let template = std::fs::read(&self.template)?;
        let supplementary = builder.add_part(supplementary.as_str(), "text/xml", template)?;
        builder.relate(&spec, REL_AAS_SUPPL, &supplementary)?;

        Ok(builder)
    }

    /// Write the package to `target`.
    ///
    /// The container is assembled in a temporary file beside `target` and
    /// renamed into place on success, so a failed export never leaves a
    /// file at `target`.
    pub fn export(&self, target: &Path) -> Result<(), ExportError> {
        match self.write(target) {
            Ok(()) => {
                tracing::info!(path = %target.display(), "package exported");
                Ok(())
            }
            Err(source) => {
                tracing::error!(path = %target.display(), error = %source, "package export failed");
                Err(ExportError::ExportFailed {
                    path: target.to_path_buf(),
                    source,
                })
            }
        }
    }

    fn write(&self, target: &Path) -> Result<(), PackageError> {
        let builder = self.build()?;
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut staging = NamedTempFile::new_in(dir)?;
        builder.write_to(staging.as_file_mut())?;
        staging.as_file().sync_all()?;
        staging.persist(target).map_err(|e| e.error)?;
        Ok(())
    }
}
