//! `GenerateAAS` through the server, then reopen the container.

use std::fs;
use std::path::{Path, PathBuf};

use station_data::StationConfig;
use station_package::aasx::{
    ORIGIN_CONTENT, ORIGIN_PART, REL_AAS_SPEC, REL_AAS_SUPPL, REL_AASX_ORIGIN, SPEC_PART,
};
use station_package::{PackageReader, PartName};
use station_server::{MethodError, StationServer};

fn asset(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../assets")
        .join(name)
}

fn server(output: PathBuf) -> StationServer {
    StationServer::build(StationConfig {
        nodeset: asset("Station.NodeSet2.xml"),
        aas_environment: asset("aasenv-with-no-id.aas.xml"),
        package_output: output,
        start_clock: false,
        ..StationConfig::default()
    })
    .unwrap()
}

#[test]
fn generated_package_links_all_parts() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("station.aasx");
    let server = server(target.clone());

    server
        .call_method(server.generate_aas_method(), &[])
        .unwrap();

    let mut reader = PackageReader::open(&target).unwrap();
    let origin = PartName::new(ORIGIN_PART).unwrap();
    let spec = PartName::new(SPEC_PART).unwrap();
    let suppl = PartName::new("/aasx/Station.NodeSet2.xml").unwrap();

    let parts = reader.parts();
    assert_eq!(parts.len(), 3);
    assert_eq!(reader.content_type(&origin).as_deref(), Some("text/plain"));
    assert_eq!(reader.content_type(&spec).as_deref(), Some("text/xml"));
    assert_eq!(reader.content_type(&suppl).as_deref(), Some("text/xml"));

    let root = reader.relationships(None).unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].relationship_type, REL_AASX_ORIGIN);
    assert_eq!(reader.resolve(&root[0]).unwrap(), ORIGIN_CONTENT);

    let spec_rels = reader.relationships(Some(&origin)).unwrap();
    assert_eq!(spec_rels.len(), 1);
    assert_eq!(spec_rels[0].relationship_type, REL_AAS_SPEC);
    assert_eq!(
        reader.resolve(&spec_rels[0]).unwrap(),
        fs::read(asset("aasenv-with-no-id.aas.xml")).unwrap()
    );

    let suppl_rels = reader.relationships(Some(&spec)).unwrap();
    assert_eq!(suppl_rels.len(), 1);
    assert_eq!(suppl_rels[0].relationship_type, REL_AAS_SUPPL);
    assert_eq!(suppl_rels[0].target, suppl);
    assert_eq!(
        reader.resolve(&suppl_rels[0]).unwrap(),
        fs::read(asset("Station.NodeSet2.xml")).unwrap()
    );
}

#[test]
fn repeated_generation_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("station.aasx");
    let server = server(target.clone());

    server.generate_aas().unwrap();
    server.generate_aas().unwrap();
    assert_eq!(PackageReader::open(&target).unwrap().parts().len(), 3);
    // Staging files are renamed into place, never left behind.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn unwritable_target_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("missing-dir").join("station.aasx");
    let server = server(target.clone());

    let err = server
        .call_method(server.generate_aas_method(), &[])
        .unwrap_err();
    assert!(matches!(err, MethodError::Export(_)));
    assert!(!target.exists());
}
