use resmon::{Backend, MonitorConfig};
use tempfile::TempDir;

#[test]
fn test_save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("resmon").join("config.json");

    let config = MonitorConfig {
        poll_interval_ms: 500,
        history_capacity: 60,
        process_scan_interval_secs: 10,
        network_interface: Some("enp3s0".to_string()),
        backend: Backend::Linux,
    };
    config.save_to(&path).unwrap();

    let loaded = MonitorConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"backend\": \"linux\""));
}

#[test]
fn test_missing_and_empty_files_give_defaults() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.json");
    assert_eq!(
        MonitorConfig::load_from(&missing).unwrap(),
        MonitorConfig::default()
    );

    let empty = temp.path().join("empty.json");
    std::fs::write(&empty, "  \n").unwrap();
    assert_eq!(
        MonitorConfig::load_from(&empty).unwrap(),
        MonitorConfig::default()
    );
}

#[test]
fn test_config_path_is_under_resmon_dir() {
    if let Ok(path) = MonitorConfig::config_path() {
        assert!(path.ends_with("resmon/config.json") || path.ends_with("resmon\\config.json"));
    }
}
