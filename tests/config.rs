use anyhow::Result;
use export_everything::config::{AppConfig, ConfigError, TargetConfig, get_config_from_alias};
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"{
    "log_level": "debug",
    "targets": [
        {"alias": "archive", "default_folder": "/exports/__today__", "compress": "t",
         "root": "/srv/archive", "port": 22},
        {"alias": "share", "is_default": "yes", "compress": "0", "bucket": "exports"}
    ]
}"#;

#[test]
fn load_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(CONFIG.as_bytes())?;
    let cfg = AppConfig::from_path(file.path())?;

    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.targets.len(), 2);
    let archive = &cfg.targets[0];
    assert_eq!(archive.default_folder(), Some("/exports/__today__"));
    assert_eq!(archive.compress, Some(true));
    assert!(!archive.is_default);
    assert_eq!(archive.setting("root").as_deref(), Some("/srv/archive"));
    assert_eq!(archive.setting("port").as_deref(), Some("22"));
    assert_eq!(archive.setting("missing"), None);
    Ok(())
}

#[test]
fn target_by_alias_or_default() -> Result<()> {
    let cfg = AppConfig::from_json_str(CONFIG)?;
    assert_eq!(get_config_from_alias(&cfg, Some("archive"))?.alias, "archive");

    let default = get_config_from_alias(&cfg, None)?;
    assert_eq!(default.alias, "share");
    assert_eq!(default.compress, Some(false));
    assert_eq!(get_config_from_alias(&cfg, Some("  "))?.alias, "share");
    Ok(())
}

#[test]
fn lookup_failures_are_typed() -> Result<()> {
    let cfg = AppConfig::from_json_str(CONFIG)?;
    assert!(matches!(
        get_config_from_alias(&cfg, Some("nope")),
        Err(ConfigError::UnknownAlias(a)) if a == "nope"
    ));

    let no_default = AppConfig::from_json_str(r#"{"targets": [{"alias": "a"}]}"#)?;
    assert!(matches!(
        no_default.target(None),
        Err(ConfigError::NoDefaultTarget)
    ));
    Ok(())
}

#[test]
fn load_errors_are_typed() {
    assert!(matches!(
        AppConfig::from_path("/definitely/not/here.json"),
        Err(ConfigError::Io { .. })
    ));
    assert!(matches!(
        AppConfig::from_json_str("{not json"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        AppConfig::from_json_str(r#"{"targets": [{"default_folder": "/x"}]}"#),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn target_round_trips_through_json() -> Result<()> {
    let target = TargetConfig::new("x")
        .with_default_folder("/out")
        .with_setting("root", "/srv");
    let json = serde_json::to_string(&target)?;
    let back: TargetConfig = serde_json::from_str(&json)?;
    assert_eq!(back, target);
    assert_eq!(back.setting_bool("root"), Some(false));
    Ok(())
}
