//! 정책 엔진 설정
//!
//! [`EngineConfig`]는 core의 [`EngineSettings`](flowsentry_core::config::EngineSettings)
//! 또는 플러그인 스타일의 문자열 맵에서 생성됩니다.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use flowsentry_core::config::EngineSettings;
use flowsentry_core::error::ConfigError;

/// 인터프리터 실행 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// 규칙이 하나 이상 매칭된 레코드만 내보냅니다.
    #[default]
    Alert,
    /// 필터를 통과한 모든 레코드를 내보내고, 매칭 시 주석만 답니다.
    Enrich,
}

impl Mode {
    /// 문자열에서 모드를 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "alert" => Some(Self::Alert),
            "enrich" => Some(Self::Enrich),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Enrich => write!(f, "enrich"),
        }
    }
}

/// 핫 리로드 모니터 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonitorKind {
    /// 모니터 없음 — 시작 시 한 번만 컴파일
    #[default]
    None,
    /// 로컬 디렉토리 폴링
    Local,
}

impl MonitorKind {
    /// 문자열에서 모니터 종류를 파싱합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// 정책 인터프리터 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 실행 모드
    pub mode: Mode,
    /// 정책 디렉토리 (`.yaml` 파일이 컴파일 대상)
    pub policies: PathBuf,
    /// 워커 풀 크기
    pub concurrency: usize,
    /// 핫 리로드 모니터
    pub monitor: MonitorKind,
    /// 모니터 폴링 주기
    pub monitor_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Alert,
            policies: PathBuf::new(),
            concurrency: 4,
            monitor: MonitorKind::None,
            monitor_interval: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &EngineSettings) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        map.insert("mode".to_owned(), core.mode.clone());
        map.insert("policies".to_owned(), core.policies.clone());
        map.insert("concurrency".to_owned(), core.concurrency.to_string());
        map.insert("monitor".to_owned(), core.monitor.clone());
        map.insert(
            "monitorinterval".to_owned(),
            format!("{}s", core.monitor_interval_secs),
        );
        Self::from_map(&map)
    }

    /// 문자열 맵에서 엔진 설정을 생성합니다.
    ///
    /// 인식하는 키: `mode`, `policies`, `concurrency`, `monitor`,
    /// `monitorinterval`. 없는 키에는 기본값이 적용됩니다.
    pub fn from_map(conf: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(mode) = conf.get("mode") {
            config.mode = Mode::parse(mode).ok_or_else(|| ConfigError::InvalidValue {
                field: "mode".to_owned(),
                reason: format!("unknown mode '{mode}', expected 'alert' or 'enrich'"),
            })?;
        }

        if let Some(policies) = conf.get("policies") {
            config.policies = PathBuf::from(policies);
        }

        if let Some(concurrency) = conf.get("concurrency") {
            config.concurrency =
                concurrency
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "concurrency".to_owned(),
                        reason: format!("not an integer: '{concurrency}'"),
                    })?;
            if config.concurrency == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "concurrency".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if let Some(monitor) = conf.get("monitor") {
            config.monitor =
                MonitorKind::parse(monitor).ok_or_else(|| ConfigError::InvalidValue {
                    field: "monitor".to_owned(),
                    reason: format!("unknown monitor '{monitor}', expected 'none' or 'local'"),
                })?;
        }

        if let Some(interval) = conf.get("monitorinterval") {
            config.monitor_interval =
                parse_duration(interval).ok_or_else(|| ConfigError::InvalidValue {
                    field: "monitorinterval".to_owned(),
                    reason: format!("not a duration: '{interval}'"),
                })?;
        }

        Ok(config)
    }
}

/// `30s`, `500ms`, `2m` 또는 초 단위 정수 형태의 기간을 파싱합니다.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins
            .trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60));
    }
    None
}
