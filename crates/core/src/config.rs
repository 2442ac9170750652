//! 설정 관리 — flowsentry.toml 파싱 및 런타임 설정

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Flowsentry 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowsentryConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 정책 엔진 설정
    #[serde(default)]
    pub engine: EngineSettings,
    /// 로그 테일러 설정
    #[serde(default)]
    pub tailer: TailerSettings,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/flowsentry".to_owned(),
        }
    }
}

/// 정책 엔진 설정
///
/// 엔진 크레이트는 이 값을 자체 `EngineConfig`로 변환하여 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 실행 모드 (alert, enrich)
    pub mode: String,
    /// 정책 디렉토리 (`.yaml` 파일이 컴파일 대상)
    pub policies: String,
    /// 워커 풀 크기
    pub concurrency: usize,
    /// 핫 리로드 모니터 (none, local)
    pub monitor: String,
    /// 모니터 폴링 주기 (초)
    pub monitor_interval_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mode: "alert".to_owned(),
            policies: "/etc/flowsentry/policies".to_owned(),
            concurrency: 4,
            monitor: "none".to_owned(),
            monitor_interval_secs: 30,
        }
    }
}

/// 로그 테일러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailerSettings {
    /// 감시할 파일 경로 목록
    pub watch_paths: Vec<String>,
    /// 테일러 wake 주기 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for TailerSettings {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            poll_interval_ms: 250,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9480,
        }
    }
}

impl FlowsentryConfig {
    /// TOML 문자열에서 설정을 파싱합니다. 생략된 섹션은 기본값입니다.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// `flowsentry.toml` 파일에서 설정을 로드합니다.
    ///
    /// 환경변수 오버라이드(`FLOWSENTRY_*`)가 적용된 뒤 검증됩니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::ParseFailed {
                    reason: format!("failed to read {}: {e}", path.display()),
                }
            }
        })?;

        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `FLOWSENTRY_*` 환경변수를 설정 위에 덮어씁니다.
    ///
    /// 파싱할 수 없는 값은 경고를 남기고 기존 값이 유지됩니다.
    pub fn apply_env_overrides(&mut self) {
        fn env(key: &str) -> Option<String> {
            std::env::var(key).ok()
        }

        fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            let raw = std::env::var(key).ok()?;
            match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
                    None
                }
            }
        }

        if let Some(v) = env("FLOWSENTRY_GENERAL_LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = env("FLOWSENTRY_GENERAL_LOG_FORMAT") {
            self.general.log_format = v;
        }
        if let Some(v) = env("FLOWSENTRY_ENGINE_MODE") {
            self.engine.mode = v;
        }
        if let Some(v) = env("FLOWSENTRY_ENGINE_POLICIES") {
            self.engine.policies = v;
        }
        if let Some(v) = env_parsed("FLOWSENTRY_ENGINE_CONCURRENCY") {
            self.engine.concurrency = v;
        }
        if let Some(v) = env("FLOWSENTRY_ENGINE_MONITOR") {
            self.engine.monitor = v;
        }
        if let Some(v) = env_parsed("FLOWSENTRY_ENGINE_MONITOR_INTERVAL_SECS") {
            self.engine.monitor_interval_secs = v;
        }
        if let Some(v) = env("FLOWSENTRY_TAILER_WATCH_PATHS") {
            self.tailer.watch_paths = v
                .split(',')
                .map(|p| p.trim().to_owned())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(v) = env_parsed("FLOWSENTRY_TAILER_POLL_INTERVAL_MS") {
            self.tailer.poll_interval_ms = v;
        }
        if let Some(v) = env_parsed("FLOWSENTRY_METRICS_ENABLED") {
            self.metrics.enabled = v;
        }
        if let Some(v) = env_parsed("FLOWSENTRY_METRICS_PORT") {
            self.metrics.port = v;
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_CONCURRENCY: usize = 1024;

        match self.engine.mode.as_str() {
            "alert" | "enrich" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "engine.mode".to_owned(),
                    reason: format!("unknown mode '{other}', expected 'alert' or 'enrich'"),
                });
            }
        }

        if self.engine.concurrency == 0 || self.engine.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                field: "engine.concurrency".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENCY}"),
            });
        }

        match self.engine.monitor.as_str() {
            "none" | "local" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "engine.monitor".to_owned(),
                    reason: format!("unknown monitor '{other}', expected 'none' or 'local'"),
                });
            }
        }

        if self.engine.monitor.as_str() == "local" && self.engine.monitor_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.monitor_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.tailer.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tailer.poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FlowsentryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.engine.mode, "alert");
        assert_eq!(config.engine.concurrency, 4);
    }

    #[test]
    fn validate_rejects_unknown_mode() {
        let mut config = FlowsentryConfig::default();
        config.engine.mode = "observe".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = FlowsentryConfig::default();
        config.engine.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_monitor_interval_when_enabled() {
        let mut config = FlowsentryConfig::default();
        config.engine.monitor = "local".to_owned();
        config.engine.monitor_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let toml_str = r#"
[engine]
mode = "enrich"
policies = "/opt/policies"
concurrency = 8
monitor = "local"
monitor_interval_secs = 10
"#;
        let config: FlowsentryConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.engine.mode, "enrich");
        assert_eq!(config.engine.concurrency, 8);
        // 일반 설정은 기본값
        assert_eq!(config.general.log_format, "json");
    }

    #[tokio::test]
    async fn load_missing_file_reports_not_found() {
        let err = FlowsentryConfig::load("/nonexistent/flowsentry.toml")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowsentry.toml");
        tokio::fs::write(
            &path,
            r#"
[general]
log_level = "debug"
log_format = "pretty"
data_dir = "/tmp/fs"

[engine]
mode = "alert"
policies = "/tmp/policies"
concurrency = 2
monitor = "none"
monitor_interval_secs = 30

[tailer]
watch_paths = ["/var/log/audit.log"]
poll_interval_ms = 100
"#,
        )
        .await
        .unwrap();

        let config = FlowsentryConfig::load(&path).await.unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.tailer.watch_paths.len(), 1);
    }
}
