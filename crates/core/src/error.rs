//! 에러 타입 — 도메인별 에러 정의

/// Flowsentry 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum FlowsentryError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 정책 엔진 에러
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// 로그 스트림 에러
    #[error("stream error: {0}")]
    Stream(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 정책 엔진 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 정책 컴파일 실패
    #[error("policy compilation failed: {0}")]
    Compile(String),

    /// 속성 디코딩 실패
    #[error("attribute error: {0}")]
    Attribute(String),

    /// 채널 통신 실패
    #[error("channel error: {0}")]
    Channel(String),

    /// 엔진 초기화 실패
    #[error("engine init failed: {0}")]
    InitFailed(String),
}
