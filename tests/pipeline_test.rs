use regionjoin::pipeline::{self, Phase, PhaseEvent};
use regionjoin::{Config, IndexBackend, IndexConfig, JoinOptions, LoadError, PointColumns, RegionJoinError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const NEIGHBORHOODS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "LISTNAME": "Old City", "OBJECTID": 1 },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "LISTNAME": "Fishtown, Lower", "OBJECTID": 2 },
      "geometry": {
        "type": "MultiPolygon",
        "coordinates": [
          [[[20, 0], [30, 0], [30, 10], [20, 10], [20, 0]]],
          [[[40, 0], [50, 0], [50, 10], [40, 10], [40, 0]]]
        ]
      }
    }
  ]
}"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn config_for(dir: &TempDir, points: &str) -> Config {
    Config::default()
        .with_regions_path(write(dir, "regions.json", NEIGHBORHOODS))
        .with_points_path(write(dir, "points.csv", points))
        .with_output_path(dir.path().join("output.csv"))
        .with_columns(PointColumns::new(0, 1, 2))
}

fn read_output(config: &Config) -> String {
    fs::read_to_string(&config.output.path).unwrap()
}

#[test]
fn test_end_to_end_join() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        &dir,
        "ticket,x,y\nT1,5,5\nT2,25,5\nT3,35,5\nT4,45,5\nT5,-1,-1\n",
    );

    let summary = pipeline::run(&config, |_| {}).unwrap();

    assert_eq!(summary.regions, 2);
    assert_eq!(summary.records, 5);
    assert_eq!(summary.join.matched, 3);
    assert_eq!(summary.join.unmatched, 2);
    assert_eq!(summary.written, 3);
    assert_eq!(
        read_output(&config),
        "external_key,region_name\r\nT1,Old City\r\nT2,\"Fishtown, Lower\"\r\nT4,\"Fishtown, Lower\"\r\n"
    );
}

#[test]
fn test_phases_reported_in_order() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, "ticket,x,y\nT1,5,5\n");

    let mut events = Vec::new();
    let summary = pipeline::run(&config, |event| events.push(event)).unwrap();

    let order = [
        Phase::LoadRegions,
        Phase::BuildIndex,
        Phase::LoadPoints,
        Phase::Join,
        Phase::Write,
    ];
    assert_eq!(events.len(), order.len() * 2);
    for (i, phase) in order.iter().enumerate() {
        assert_eq!(events[i * 2], PhaseEvent::Started(*phase));
        assert!(matches!(events[i * 2 + 1], PhaseEvent::Finished(p, _) if p == *phase));
    }
    let recorded: Vec<Phase> = summary.phases.iter().map(|(p, _)| *p).collect();
    assert_eq!(recorded, order);
    assert_eq!(Phase::LoadRegions.to_string(), "Loading regions");
}

#[test]
fn test_header_only_points_file_writes_header() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, "ticket,x,y\n");

    let summary = pipeline::run(&config, |_| {}).unwrap();
    assert_eq!(summary.records, 0);
    assert_eq!(summary.written, 0);
    assert_eq!(read_output(&config), "external_key,region_name\r\n");
}

#[test]
fn test_backends_produce_identical_output() {
    init_logging();
    let points: String = std::iter::once("ticket,x,y\n".to_string())
        .chain((0..500).map(|i| format!("T{},{},{}\n", i, (i * 7) % 55, (i * 3) % 12)))
        .collect();

    let mut outputs = Vec::new();
    for backend in [IndexBackend::Packed, IndexBackend::RStar] {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir, &points)
            .with_index(IndexConfig::default().with_backend(backend).with_max_fanout(2))
            .with_join(JoinOptions::default().with_workers(4).with_chunk_size(7));
        pipeline::run(&config, |_| {}).unwrap();
        outputs.push(read_output(&config));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_custom_header_and_name_property() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&dir, "ticket,x,y\nT1,5,5\n");
    config.output.header = "anon_ticket_number,neighborhood".to_string();
    config.regions.name_property = "OBJECTID".to_string();

    pipeline::run(&config, |_| {}).unwrap();
    assert_eq!(
        read_output(&config),
        "anon_ticket_number,neighborhood\r\nT1,1\r\n"
    );
}

#[test]
fn test_missing_name_property_aborts_before_output() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&dir, "ticket,x,y\nT1,5,5\n");
    config.regions.name_property = "NAME".to_string();

    let err = pipeline::run(&config, |_| {}).unwrap_err();
    assert!(matches!(
        err,
        RegionJoinError::Load(LoadError::MissingProperty { feature: 0, .. })
    ));
    assert!(!config.output.path.exists());
}

#[test]
fn test_missing_region_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, "ticket,x,y\n").with_regions_path(dir.path().join("nope.json"));

    let mut events = Vec::new();
    let err = pipeline::run(&config, |event| events.push(event)).unwrap_err();
    assert!(matches!(err, RegionJoinError::Load(LoadError::Io { .. })));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], PhaseEvent::Started(Phase::LoadRegions));
    assert!(matches!(events[1], PhaseEvent::Failed(Phase::LoadRegions, _)));
}

#[test]
fn test_malformed_row_aborts() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, "ticket,x,y\nT1,5,5\nT2,6\n");

    let mut events = Vec::new();
    let err = pipeline::run(&config, |event| events.push(event)).unwrap_err();
    assert!(matches!(
        err,
        RegionJoinError::Load(LoadError::MalformedRow { line: 3, .. })
    ));
    assert!(matches!(events.last(), Some(PhaseEvent::Failed(Phase::LoadPoints, _))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PhaseEvent::Finished(Phase::LoadPoints, _))));
    assert!(!config.output.path.exists());
}

#[test]
fn test_unwritable_output_is_fatal() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config =
        config_for(&dir, "ticket,x,y\nT1,5,5\n").with_output_path(dir.path().join("missing/out.csv"));

    let err = pipeline::run(&config, |_| {}).unwrap_err();
    assert!(matches!(err, RegionJoinError::Write(_)));
}

#[test]
fn test_invalid_config_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let config =
        config_for(&dir, "ticket,x,y\n").with_join(JoinOptions::default().with_workers(0));

    let mut started = false;
    let err = pipeline::run(&config, |_| started = true).unwrap_err();
    assert!(matches!(err, RegionJoinError::Config(_)));
    assert!(!started);
}

#[test]
fn test_config_file_drives_run() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let regions = write(&dir, "regions.json", NEIGHBORHOODS);
    let points = write(&dir, "points.tsv", "T1\t5\t5\nT2\t100\t100\n");
    let output = dir.path().join("out.csv");
    let json = serde_json::json!({
        "regions": { "path": regions },
        "points": {
            "path": points,
            "key_column": 0,
            "x_column": 1,
            "y_column": 2,
            "delimiter": "\t",
            "has_header": false
        },
        "output": { "path": output },
        "join": { "workers": 2 }
    });
    let config_path = write(&dir, "join.json", &json.to_string());

    let config = Config::load_path(&config_path).unwrap();
    let summary = pipeline::run(&config, |_| {}).unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(
        fs::read_to_string(Path::new(&output)).unwrap(),
        "external_key,region_name\r\nT1,Old City\r\n"
    );
}
