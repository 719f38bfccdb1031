use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_confmgr_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("CONFMGR__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_settings_should_initialize_with_hardcoded_values() {
    let settings = Settings::default();

    assert_eq!(settings.watch.poll_interval_ms, 1000);
    assert!(settings.watch.enable_metrics);
    assert_eq!(settings.store.root_key, "osdconfig");
    assert_eq!(settings.store.backend, StoreBackend::Memory);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_confmgr_env_vars();
    with_vars(
        vec![
            ("CONFMGR__WATCH__POLL_INTERVAL_MS", Some("250")),
            ("CONFMGR__STORE__ROOT_KEY", Some("pxconfig")),
            ("CONFMGR__STORE__BACKEND", Some("sled")),
        ],
        || {
            let settings = Settings::new().unwrap();

            assert_eq!(settings.watch.poll_interval_ms, 250);
            assert_eq!(settings.store.root_key, "pxconfig");
            assert_eq!(settings.store.backend, StoreBackend::Sled);
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_from_config_path() {
    cleanup_all_confmgr_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        r#"
        [watch]
        poll_interval_ms = 50
        "#,
    )
    .unwrap();

    with_vars(
        vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))],
        || {
            let settings = Settings::new().unwrap();
            assert_eq!(settings.watch.poll_interval_ms, 50);
            assert_eq!(settings.store.root_key, "osdconfig");
        },
    );
}

#[test]
#[serial]
fn environment_should_win_over_config_file() {
    cleanup_all_confmgr_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        r#"
        [store]
        root_key = "from_file"
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("CONFMGR__STORE__ROOT_KEY", Some("from_env")),
        ],
        || {
            let settings = Settings::new().unwrap();
            assert_eq!(settings.store.root_key, "from_env");
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_confmgr_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dynamic_config.toml");

    std::fs::write(
        &config_path,
        r#"
        [store]
        backend = "sled"
        db_root_dir = "/tmp/xx/db"

        [watch]
        enable_metrics = false
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base = Settings::new().expect("success");
        let settings = base
            .with_override_config(config_path.to_str().unwrap())
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(settings.store.backend, StoreBackend::Sled);
        assert_eq!(settings.store.db_root_dir.to_str(), Some("/tmp/xx/db"));
        assert!(!settings.watch.enable_metrics);
        assert_eq!(settings.watch.poll_interval_ms, 1000);
    });
}

#[test]
fn validation_should_reject_zero_poll_interval() {
    let mut settings = Settings::default();
    settings.watch.poll_interval_ms = 0;

    let result = settings.validate();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_bad_root_keys() {
    for root in ["", "/", "/osdconfig", "osdconfig/"] {
        let mut settings = Settings::default();
        settings.store.root_key = root.to_string();
        assert!(
            matches!(settings.validate(), Err(Error::Config(_))),
            "root_key {:?} should be rejected",
            root
        );
    }
}

#[test]
fn validation_should_require_db_dir_for_sled() {
    let mut settings = Settings::default();
    settings.store.backend = StoreBackend::Sled;
    settings.store.db_root_dir = std::path::PathBuf::new();

    assert!(matches!(settings.validate(), Err(Error::Config(_))));
}

#[test]
fn default_settings_should_validate() {
    assert!(Settings::default().validate().is_ok());
}
