//! flowsentry.toml 통합 설정 테스트
//!
//! - flowsentry.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use flowsentry_core::config::FlowsentryConfig;
use flowsentry_core::error::ConfigError;

// =============================================================================
// flowsentry.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../flowsentry.toml.example");
    let config = FlowsentryConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.general.data_dir, "/var/lib/flowsentry");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../flowsentry.toml.example");
    let config = FlowsentryConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../flowsentry.toml.example");
    let from_file = FlowsentryConfig::parse(content).expect("should parse");
    let from_code = FlowsentryConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);
    assert_eq!(from_file.general.data_dir, from_code.general.data_dir);

    assert_eq!(from_file.engine.mode, from_code.engine.mode);
    assert_eq!(from_file.engine.policies, from_code.engine.policies);
    assert_eq!(from_file.engine.concurrency, from_code.engine.concurrency);
    assert_eq!(from_file.engine.monitor, from_code.engine.monitor);
    assert_eq!(
        from_file.engine.monitor_interval_secs,
        from_code.engine.monitor_interval_secs
    );

    assert_eq!(from_file.tailer.watch_paths, from_code.tailer.watch_paths);
    assert_eq!(
        from_file.tailer.poll_interval_ms,
        from_code.tailer.poll_interval_ms
    );

    assert_eq!(from_file.metrics.enabled, from_code.metrics.enabled);
    assert_eq!(from_file.metrics.listen_addr, from_code.metrics.listen_addr);
    assert_eq!(from_file.metrics.port, from_code.metrics.port);
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"
"#;
    let config = FlowsentryConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    // 나머지 섹션은 기본값
    assert_eq!(config.engine.mode, "alert");
    assert!(!config.metrics.enabled);
}

#[test]
fn partial_config_engine_only() {
    let toml = r#"
[engine]
mode = "enrich"
policies = "/opt/policies"
concurrency = 16
monitor = "local"
monitor_interval_secs = 5
"#;
    let config = FlowsentryConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.engine.mode, "enrich");
    assert_eq!(config.engine.concurrency, 16);
    // general은 기본값
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_two_sections() {
    let toml = r#"
[general]
log_level = "warn"

[tailer]
watch_paths = ["/var/log/records.jsonl"]
poll_interval_ms = 100
"#;
    let config = FlowsentryConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "warn");
    assert_eq!(config.tailer.watch_paths, vec!["/var/log/records.jsonl"]);
    // 생략된 섹션은 기본값
    assert_eq!(config.engine.concurrency, 4);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("FLOWSENTRY_GENERAL_LOG_LEVEL").ok();
    std::env::set_var("FLOWSENTRY_GENERAL_LOG_LEVEL", "error");

    let mut config = FlowsentryConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    match original {
        Some(val) => std::env::set_var("FLOWSENTRY_GENERAL_LOG_LEVEL", val),
        None => std::env::remove_var("FLOWSENTRY_GENERAL_LOG_LEVEL"),
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_csv_for_watch_paths() {
    let original = std::env::var("FLOWSENTRY_TAILER_WATCH_PATHS").ok();
    std::env::set_var(
        "FLOWSENTRY_TAILER_WATCH_PATHS",
        "/var/log/a.jsonl, /var/log/b.jsonl",
    );

    let mut config = FlowsentryConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.tailer.watch_paths.clone();

    match original {
        Some(val) => std::env::set_var("FLOWSENTRY_TAILER_WATCH_PATHS", val),
        None => std::env::remove_var("FLOWSENTRY_TAILER_WATCH_PATHS"),
    }

    assert_eq!(result, vec!["/var/log/a.jsonl", "/var/log/b.jsonl"]);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let original = std::env::var("FLOWSENTRY_ENGINE_CONCURRENCY").ok();
    std::env::set_var("FLOWSENTRY_ENGINE_CONCURRENCY", "32");

    let mut config = FlowsentryConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.engine.concurrency;

    match original {
        Some(val) => std::env::set_var("FLOWSENTRY_ENGINE_CONCURRENCY", val),
        None => std::env::remove_var("FLOWSENTRY_ENGINE_CONCURRENCY"),
    }

    assert_eq!(result, 32);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_numeric_is_ignored() {
    let original = std::env::var("FLOWSENTRY_ENGINE_CONCURRENCY").ok();
    std::env::set_var("FLOWSENTRY_ENGINE_CONCURRENCY", "not-a-number");

    let mut config = FlowsentryConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.engine.concurrency;

    match original {
        Some(val) => std::env::set_var("FLOWSENTRY_ENGINE_CONCURRENCY", val),
        None => std::env::remove_var("FLOWSENTRY_ENGINE_CONCURRENCY"),
    }

    assert_eq!(result, 4);
}

#[test]
#[serial_test::serial]
fn env_override_missing_var_keeps_toml_value() {
    let toml = r#"
[general]
log_level = "warn"
"#;

    std::env::remove_var("FLOWSENTRY_GENERAL_LOG_LEVEL");

    let mut config = FlowsentryConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();

    assert_eq!(config.general.log_level, "warn");
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = FlowsentryConfig::parse("").expect("empty string should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.engine.mode, "alert");
}

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# 이것은 주석입니다
# 모든 줄이 주석입니다
"#;
    let config = FlowsentryConfig::parse(toml).expect("comments-only should parse");
    config.validate().expect("should validate");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = FlowsentryConfig::parse("[invalid toml");
    assert!(matches!(
        result.unwrap_err(),
        ConfigError::ParseFailed { .. }
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[engine]
concurrency = "four"
"#;
    let result = FlowsentryConfig::parse(toml);
    assert!(matches!(
        result.unwrap_err(),
        ConfigError::ParseFailed { .. }
    ));
}

#[tokio::test]
async fn load_nonexistent_returns_file_not_found() {
    let result = FlowsentryConfig::load("/tmp/flowsentry_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        ConfigError::FileNotFound { .. }
    ));
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn serialize_and_reparse_roundtrip() {
    let original = FlowsentryConfig::default();
    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let parsed = FlowsentryConfig::parse(&toml_str).expect("should reparse");
    parsed.validate().expect("reparsed should validate");

    assert_eq!(original.general.log_level, parsed.general.log_level);
    assert_eq!(original.engine.mode, parsed.engine.mode);
    assert_eq!(original.engine.concurrency, parsed.engine.concurrency);
    assert_eq!(original.metrics.port, parsed.metrics.port);
}
