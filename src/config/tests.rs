use super::load_config;
use super::settings::{PartialSettings, Settings};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.app.port, 3000);
    assert_eq!(settings.app.version, "v1");
    assert_eq!(settings.broker.retries, 5);
    assert_eq!(settings.broker.delay, 3000);
    assert!(settings.broker.timeout.is_none());
    assert_eq!(settings.realtime.path, "/socket");
}

#[test]
fn test_merge_empty_partial_yields_defaults() {
    let merged = Settings::merge(PartialSettings::default());
    let default = Settings::default();
    assert_eq!(merged.app.name, default.app.name);
    assert_eq!(merged.cache.uri, default.cache.uri);
    assert_eq!(merged.store.path, default.store.path);
    assert_eq!(merged.log.file, default.log.file);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [app]
        name = "orders"
        port = 9000

        [broker]
        uri = "memory://local"
        retries = 2
        delay = 50
        timeout = 1000

        [static]
        root = "assets"
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");

    assert_eq!(cfg.app.name, "orders");
    assert_eq!(cfg.app.port, 9000);
    assert_eq!(cfg.app.version, "v1");
    assert_eq!(cfg.broker.uri, "memory://local");
    assert_eq!(cfg.broker.retries, 2);
    assert_eq!(cfg.broker.delay, 50);
    assert_eq!(cfg.broker.timeout, Some(1000));
    assert_eq!(cfg.static_files.root, "assets");
}

#[test]
#[serial]
fn load_config_reads_environment() {
    temp_env::with_vars(
        [
            ("APP_NAME", Some("billing")),
            ("APP_VERSION", Some("v2")),
            ("APP_PORT", Some("4100")),
            ("BROKER_RETRIES", Some("7")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.app.name, "billing");
            assert_eq!(cfg.app.version, "v2");
            assert_eq!(cfg.app.port, 4100);
            assert_eq!(cfg.broker.retries, 7);
        },
    );
}
