use focuskit_communication::{ExhaustPolarity, TelemetryLayout};
use focuskit_settings::{Config, SettingsError};
use tempfile::TempDir;

fn customized() -> Config {
    let mut config = Config::default();
    config.telemetry.layout = TelemetryLayout::Rev2;
    config.telemetry.exhaust_polarity = ExhaustPolarity::ActiveHigh;
    config.link.address = "127.0.0.1:5555".to_string();
    config.vision.detection.threshold = 0.45;
    config.vision.detection.rotation = -1.5;
    config.automation.enabled = true;
    config.automation.power_min = 0.1;
    config.automation.power_max = 0.9;
    config
}

#[test]
fn test_toml_save_and_load() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("config.toml");

    let config = customized();
    config.save_to_file(&path).expect("save");
    let loaded = Config::load_from_file(&path).expect("load");
    assert_eq!(loaded, config);

    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.contains("layout = \"rev2\""));
    assert!(text.contains("exhaust_polarity = \"active_high\""));
}

#[test]
fn test_json_save_and_load() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");

    let config = customized();
    config.save_to_file(&path).expect("save");
    assert_eq!(Config::load_from_file(&path).expect("load"), config);
}

#[test]
fn test_load_or_default_missing_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.toml");
    assert_eq!(Config::load_or_default(&path).expect("defaults"), Config::default());
}

#[test]
fn test_invalid_file_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[automation]\npower_min = 0.9\npower_max = 0.1\n").expect("write");

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { .. })
    ));
}

#[test]
fn test_invalid_config_not_saved() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.vision.hold_ms = 0;
    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}
