use purpleair_recorder::{ApiGeneration, Config, ConfigError};
use std::time::Duration;

const KEYS: [&str; 4] = [
    "PURPLEAIR_SENSOR_ID",
    "PURPLEAIR_API",
    "PURPLEAIR_READ_KEY",
    "PURPLEAIR_SECONDARY_BACKOFF_SECS",
];

fn clear() {
    for key in KEYS {
        unsafe {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial_test::serial]
fn config_reads_process_environment() {
    clear();
    unsafe {
        std::env::set_var("PURPLEAIR_SENSOR_ID", "59873");
        std::env::set_var("PURPLEAIR_API", "v1");
        std::env::set_var("PURPLEAIR_READ_KEY", "   ");
    }
    assert_eq!(
        Config::from_env().unwrap_err(),
        ConfigError::Missing("PURPLEAIR_READ_KEY")
    );

    unsafe {
        std::env::set_var("PURPLEAIR_READ_KEY", "READKEY");
        std::env::set_var("PURPLEAIR_SECONDARY_BACKOFF_SECS", "2");
    }
    let cfg = Config::from_env().unwrap();
    clear();

    assert_eq!(cfg.generation, ApiGeneration::ApiV1);
    assert_eq!(cfg.read_key.as_deref(), Some("READKEY"));
    assert_eq!(cfg.secondary_backoff, Duration::from_secs(2));
}

#[test]
#[serial_test::serial]
fn missing_sensor_id_is_rejected() {
    clear();
    assert_eq!(
        Config::from_env().unwrap_err(),
        ConfigError::Missing("PURPLEAIR_SENSOR_ID")
    );
}
