//! 정책 엔진 에러 타입
//!
//! [`PolicyError`]는 컴파일과 런타임 평가에서 발생하는 모든 에러를
//! 표현합니다. `From<PolicyError> for FlowsentryError` 변환이 구현되어
//! 있어 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use flowsentry_core::error::{EngineError, FlowsentryError};

/// 정책 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// 정책 컴파일 실패 (수집된 에러 요약)
    #[error("policy compilation failed: {summary}")]
    Compile {
        /// 에러 요약 (개별 진단은 로그로 출력됨)
        summary: String,
    },

    /// 런타임 속성 디코딩 실패 (잘못된 JSON 경로 등)
    #[error("attribute error: {attr}: {reason}")]
    Attribute {
        /// 문제가 된 속성 이름
        attr: String,
        /// 실패 사유
        reason: String,
    },

    /// 정책 파일 로딩 실패
    #[error("policy load error: {path}: {reason}")]
    Load {
        /// 정책 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 액션 실행 실패
    #[error("action error: {action}: {reason}")]
    Action {
        /// 액션 이름
        action: String,
        /// 실패 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PolicyError> for FlowsentryError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Compile { summary } => {
                FlowsentryError::Engine(EngineError::Compile(summary))
            }
            PolicyError::Attribute { .. } => {
                FlowsentryError::Engine(EngineError::Attribute(err.to_string()))
            }
            PolicyError::Channel(reason) => FlowsentryError::Engine(EngineError::Channel(reason)),
            PolicyError::Io(e) => FlowsentryError::Io(e),
            other => FlowsentryError::Engine(EngineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display() {
        let err = PolicyError::Compile {
            summary: "3 errors found".to_owned(),
        };
        assert!(err.to_string().contains("3 errors found"));
    }

    #[test]
    fn attribute_error_converts_to_engine_error() {
        let err = PolicyError::Attribute {
            attr: "sf.pod.services.json[0.name]".to_owned(),
            reason: "invalid json".to_owned(),
        };
        let top: FlowsentryError = err.into();
        assert!(matches!(
            top,
            FlowsentryError::Engine(EngineError::Attribute(_))
        ));
    }

    #[test]
    fn io_error_passes_through() {
        let err: PolicyError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let top: FlowsentryError = err.into();
        assert!(matches!(top, FlowsentryError::Io(_)));
    }
}
