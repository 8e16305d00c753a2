//! Station Server -- composition of one simulated station behind a method
//! call and value read surface.
//!
//! [`StationServer::build`] imports the configured template, binds the
//! station object, synthesizes the `AssetAdminShell` folder with its
//! `GenerateAAS` method and wires the package exporter. A transport host
//! drives it through [`StationServer::call_method`],
//! [`StationServer::read_value`] and [`StationServer::browse`].

pub mod logging;

use station_core::address_space::{AddressSpace, AddressSpaceError};
use station_core::behavior::BehaviorTable;
use station_core::command::{CallError, CommandDispatcher, validate_arguments};
use station_core::id::{NodeId, QualifiedName};
use station_core::node::{CommandKind, NodeClass, ObjectKind, ReferenceType};
use station_core::station::Station;
use station_core::value::{DataValue, Variant};
use station_data::{ConfigError, NodeSetFile, StationConfig};
use station_package::{AasxExporter, ExportError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const ASSET_ADMIN_SHELL_FOLDER: &str = "AssetAdminShell";
pub const GENERATE_AAS_METHOD: &str = "GenerateAAS";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    AddressSpace(#[from] AddressSpaceError),
    #[error("no station object found in {origin}")]
    NoStationObject { origin: String },
}

/// Failures of a remote method call.
#[derive(Debug, thiserror::Error)]
pub enum MethodError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

// ---------------------------------------------------------------------------
// Browse results
// ---------------------------------------------------------------------------

/// One reference returned by [`StationServer::browse`].
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseEntry {
    pub reference: ReferenceType,
    pub node_id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: String,
    pub class: NodeClass,
}

// ---------------------------------------------------------------------------
// StationServer
// ---------------------------------------------------------------------------

pub struct StationServer {
    config: StationConfig,
    dispatcher: CommandDispatcher,
    exporter: AasxExporter,
    generate_aas: NodeId,
}

impl StationServer {
    /// Build the address space and station described by `config`.
    ///
    /// Import failure aborts startup; nothing is left half-built.
    pub fn build(config: StationConfig) -> Result<Self, ServerError> {
        let space = Arc::new(AddressSpace::new(&config.namespace_uri));
        let source = NodeSetFile::new(&config.nodeset);
        let imported = space.import_templates(&source, &BehaviorTable::station())?;
        tracing::info!(
            nodeset = %config.nodeset.display(),
            nodes = imported.len(),
            "template imported"
        );

        let stations = space.objects_of_kind(ObjectKind::Station);
        let Some(node) = stations.first().map(|n| n.id.clone()) else {
            return Err(ServerError::NoStationObject {
                origin: config.nodeset.display().to_string(),
            });
        };
        if stations.len() > 1 {
            tracing::warn!(count = stations.len(), station = %node, "several station objects, serving the first");
        }

        let folder = space.create_folder(None, ASSET_ADMIN_SHELL_FOLDER, ASSET_ADMIN_SHELL_FOLDER)?;
        let generate_aas = space.create_method(
            Some(&folder),
            GENERATE_AAS_METHOD,
            GENERATE_AAS_METHOD,
            Some(CommandKind::GenerateAas),
        )?;

        let station = Station::new(space, node, config.initial_state());
        let exporter = AasxExporter::new(&config.aas_environment, &config.nodeset);
        tracing::info!(station = %station.node(), "station server built");

        Ok(Self {
            config,
            dispatcher: CommandDispatcher::new(station),
            exporter,
            generate_aas,
        })
    }

    /// Load the configuration file at `path` and build from it.
    pub fn from_config_file(path: &Path) -> Result<Self, ServerError> {
        Self::build(station_data::load_config(path)?)
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn station(&self) -> &Arc<Station> {
        self.dispatcher.station()
    }

    pub fn space(&self) -> &Arc<AddressSpace> {
        self.station().space()
    }

    /// Node id of the `GenerateAAS` method.
    pub fn generate_aas_method(&self) -> &NodeId {
        &self.generate_aas
    }

    /// Spawn the production clock and, when configured, arm it at the ideal
    /// cycle time. Must be called from within a tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let handle = self.station().spawn_clock();
        if self.config.start_clock {
            self.station()
                .arm_clock(Duration::from_millis(self.config.ideal_cycle_time_ms));
        }
        handle
    }

    /// Invoke the method node `method` with `args`.
    pub fn call_method(&self, method: &NodeId, args: &[Variant]) -> Result<Vec<Variant>, MethodError> {
        let command = self.dispatcher.resolve(method)?;
        tracing::debug!(method = %method, ?command, "method called");
        match command {
            CommandKind::GenerateAas => {
                validate_arguments(&command.input_arguments(), args)?;
                self.generate_aas()?;
                Ok(Vec::new())
            }
            _ => Ok(self.dispatcher.call(command, args)?),
        }
    }

    /// Write the AASX package to the configured output path.
    pub fn generate_aas(&self) -> Result<(), ExportError> {
        self.exporter.export(&self.config.package_output)
    }

    /// Current value of a variable node. `None` for unknown nodes and
    /// non-variables.
    pub fn read_value(&self, node: &NodeId) -> Option<DataValue> {
        self.space().find(node)?.value()
    }

    /// Forward references of `node`. Unknown nodes have none.
    pub fn browse(&self, node: &NodeId) -> Vec<BrowseEntry> {
        let space = self.space();
        space
            .children(node)
            .into_iter()
            .filter_map(|(reference, id)| {
                let child = space.find(&id)?;
                Some(BrowseEntry {
                    reference,
                    node_id: id,
                    browse_name: child.browse_name.clone(),
                    display_name: child.display_name.clone(),
                    class: child.class(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_core::id::well_known;
    use station_core::state::StationStatus;
    use station_core::station::STATION_NAMESPACE_URI;
    use station_package::PackageReader;
    use std::path::PathBuf;

    fn asset(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets")
            .join(name)
    }

    fn test_config(dir: &Path) -> StationConfig {
        StationConfig {
            nodeset: asset("Station.NodeSet2.xml"),
            aas_environment: asset("aasenv-with-no-id.aas.xml"),
            package_output: dir.join("station.aasx"),
            start_clock: false,
            ..StationConfig::default()
        }
    }

    fn station_node(server: &StationServer, id: u32) -> NodeId {
        let ns = server
            .space()
            .namespace_index_of(STATION_NAMESPACE_URI)
            .unwrap();
        NodeId::numeric(ns, id)
    }

    #[test]
    fn builds_from_bundled_assets() {
        let dir = tempfile::tempdir().unwrap();
        let server = StationServer::build(test_config(dir.path())).unwrap();

        assert_eq!(server.station().node(), &station_node(&server, 5001));
        let roots = server.browse(&well_known::OBJECTS_FOLDER);
        let names: Vec<&str> = roots.iter().map(|e| e.browse_name.name.as_str()).collect();
        assert!(names.contains(&"StationInstance"));
        assert!(names.contains(&ASSET_ADMIN_SHELL_FOLDER));

        let folder = roots
            .iter()
            .find(|e| e.browse_name.name == ASSET_ADMIN_SHELL_FOLDER)
            .unwrap();
        assert_eq!(folder.class, NodeClass::Folder);
        assert_eq!(folder.reference, ReferenceType::Organizes);
        let methods = server.browse(&folder.node_id);
        assert_eq!(methods.len(), 1);
        assert_eq!(&methods[0].node_id, server.generate_aas_method());
        assert_eq!(methods[0].reference, ReferenceType::HasComponent);
        assert_eq!(methods[0].class, NodeClass::Method);
    }

    #[test]
    fn missing_nodeset_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = StationConfig {
            nodeset: dir.path().join("missing.xml"),
            ..test_config(dir.path())
        };
        assert!(matches!(
            StationServer::build(config),
            Err(ServerError::AddressSpace(AddressSpaceError::Import { .. }))
        ));
    }

    #[test]
    fn builds_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("station.toml");
        std::fs::write(
            &file,
            format!(
                "nodeset = {:?}\naas_environment = {:?}\npackage_output = \"out.aasx\"\nstart_clock = false\n",
                asset("Station.NodeSet2.xml"),
                asset("aasenv-with-no-id.aas.xml"),
            ),
        )
        .unwrap();
        let server = StationServer::from_config_file(&file).unwrap();
        assert_eq!(server.config().package_output, dir.path().join("out.aasx"));
        assert!(!server.config().start_clock);
    }

    #[test]
    fn invalid_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("station.toml");
        std::fs::write(&file, "ideal_cycle_time_ms = 0\n").unwrap();
        assert!(matches!(
            StationServer::from_config_file(&file),
            Err(ServerError::Config(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn template_without_station_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nodeset = dir.path().join("Empty.NodeSet2.xml");
        std::fs::write(
            &nodeset,
            r#"<?xml version="1.0" encoding="utf-8"?>
<UANodeSet xmlns="http://opcfoundation.org/UA/2011/03/UANodeSet.xsd">
  <NamespaceUris><Uri>http://example.com/Empty/</Uri></NamespaceUris>
  <UAObject NodeId="ns=1;i=1" BrowseName="1:Lonely">
    <References>
      <Reference ReferenceType="Organizes" IsForward="false">i=85</Reference>
    </References>
  </UAObject>
</UANodeSet>"#,
        )
        .unwrap();
        let config = StationConfig {
            nodeset,
            ..test_config(dir.path())
        };
        assert!(matches!(
            StationServer::build(config),
            Err(ServerError::NoStationObject { .. })
        ));
    }

    #[test]
    fn initial_state_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = StationConfig {
            ideal_cycle_time_ms: 250,
            pressure: 900.0,
            ..test_config(dir.path())
        };
        let server = StationServer::build(config).unwrap();
        let ideal = server.read_value(&station_node(&server, 6005)).unwrap();
        assert_eq!(ideal.value, Variant::UInt64(250));
        let pressure = server.read_value(&station_node(&server, 6008)).unwrap();
        assert_eq!(pressure.value, Variant::Double(900.0));
    }

    #[test]
    fn station_commands_route_through_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let server = StationServer::build(test_config(dir.path())).unwrap();
        let execute = station_node(&server, 7001);

        server.call_method(&execute, &[Variant::UInt64(77)]).unwrap();
        assert_eq!(
            server.read_value(&station_node(&server, 6001)).unwrap().value,
            Variant::UInt64(77)
        );
        assert_eq!(
            server.read_value(&station_node(&server, 6004)).unwrap().value,
            Variant::Int32(StationStatus::WorkInProgress.code())
        );

        let err = server.call_method(&execute, &[]).unwrap_err();
        assert!(matches!(
            err,
            MethodError::Call(CallError::ArgumentCount { expected: 1, actual: 0 })
        ));
    }

    #[test]
    fn generate_aas_writes_package() {
        let dir = tempfile::tempdir().unwrap();
        let server = StationServer::build(test_config(dir.path())).unwrap();

        let outputs = server
            .call_method(server.generate_aas_method(), &[])
            .unwrap();
        assert!(outputs.is_empty());

        let target = &server.config().package_output;
        let reader = PackageReader::open(target).unwrap();
        let names: Vec<String> = reader
            .parts()
            .into_iter()
            .map(|p| p.name.as_str().to_string())
            .collect();
        assert!(names.contains(&"/aasx/Station.NodeSet2.xml".to_string()));
    }

    #[test]
    fn generate_aas_rejects_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let server = StationServer::build(test_config(dir.path())).unwrap();
        let err = server
            .call_method(server.generate_aas_method(), &[Variant::Boolean(true)])
            .unwrap_err();
        assert!(matches!(err, MethodError::Call(CallError::ArgumentCount { .. })));
        assert!(!server.config().package_output.exists());
    }

    #[test]
    fn generate_aas_failure_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let config = StationConfig {
            aas_environment: dir.path().join("missing.aas.xml"),
            ..test_config(dir.path())
        };
        let server = StationServer::build(config).unwrap();
        let err = server
            .call_method(server.generate_aas_method(), &[])
            .unwrap_err();
        assert!(matches!(err, MethodError::Export(ExportError::ExportFailed { .. })));
        assert!(!server.config().package_output.exists());
    }

    #[test]
    fn lookups_are_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let server = StationServer::build(test_config(dir.path())).unwrap();
        let ghost = NodeId::numeric(server.space().namespace_index(), 999_999);
        assert!(server.read_value(&ghost).is_none());
        assert!(server.browse(&ghost).is_empty());
        // Objects have no value.
        assert!(server.read_value(server.station().node()).is_none());
        assert!(matches!(
            server.call_method(&ghost, &[]),
            Err(MethodError::Call(CallError::MethodNotFound(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_arms_clock_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = StationConfig {
            start_clock: true,
            ideal_cycle_time_ms: 100,
            ..test_config(dir.path())
        };
        let server = StationServer::build(config).unwrap();
        let _clock = server.start();
        assert_eq!(
            server.station().clock().period(),
            Some(Duration::from_millis(100))
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(server.station().snapshot().manufactured, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_leaves_clock_idle_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let server = StationServer::build(test_config(dir.path())).unwrap();
        let _clock = server.start();
        assert_eq!(server.station().clock().period(), None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(server.station().snapshot().manufactured, 0);
    }
}
