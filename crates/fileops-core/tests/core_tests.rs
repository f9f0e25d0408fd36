use fileops_core::{
    ConfigError, EngineSettings, HashAlgorithm, OperationConfig, OperationKind, OperationResult,
    OperationStatus, ProgressInfo,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use strum::IntoEnumIterator;

#[test]
fn test_every_hash_algorithm_name_validates() {
    for algorithm in HashAlgorithm::iter() {
        let config = OperationConfig {
            hash_algorithm: Some(algorithm.to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok(), "{algorithm} should be accepted");
    }
}

#[test]
fn test_config_json_defaults() {
    let config: OperationConfig = serde_json::from_str(r#"{"paths": ["/srv"], "dry_run": true}"#).unwrap();

    assert_eq!(config.paths, vec![PathBuf::from("/srv")]);
    assert!(config.dry_run);
    assert!(config.recursive);
    assert_eq!(config.similarity_threshold, 0.85);
    assert_eq!(config.effective_parallelism(), 4);
}

#[test]
fn test_config_new_from_paths() {
    let config = OperationConfig::new(["/a", "/b"]);
    assert_eq!(config.paths.len(), 2);
    assert!(config.validate().is_ok());
}

#[test]
fn test_threshold_bounds_are_inclusive() {
    for value in [0.0, 1.0] {
        let config = OperationConfig {
            similarity_threshold: value,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    let config = OperationConfig {
        similarity_threshold: -0.1,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::SimilarityThreshold { .. })
    ));
}

#[test]
fn test_engine_settings_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_concurrent = 8").unwrap();
    writeln!(file, "report_interval_ms = 250").unwrap();

    let settings = EngineSettings::load(file.path()).unwrap();
    assert_eq!(settings.max_concurrent, 8);
    assert_eq!(settings.report_interval(), Duration::from_millis(250));

    let missing = EngineSettings::load("/definitely/not/here.toml");
    assert!(matches!(missing, Err(ConfigError::Io { .. })));
}

#[test]
fn test_result_detail_strings() {
    let snapshot = ProgressInfo::pending("cleanup-1", OperationKind::Cleanup, 4);
    let mut details = snapshot.details.clone();
    details.insert(
        "removed_directories".to_string(),
        serde_json::json!(["/a", "/b"]),
    );

    let result = OperationResult {
        id: snapshot.id.clone(),
        kind: OperationKind::Cleanup,
        status: OperationStatus::Completed,
        start_time: snapshot.start_time,
        end_time: snapshot.start_time,
        duration: Duration::ZERO,
        items_processed: 0,
        bytes_processed: 0,
        files_affected: Vec::new(),
        summary: String::new(),
        details,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    assert!(result.is_success());
    assert!(!result.has_errors());
    assert_eq!(result.detail_strings("removed_directories"), vec!["/a", "/b"]);
    assert!(result.detail_strings("missing").is_empty());
}
