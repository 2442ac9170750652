//! 테일러 에러 타입

use flowsentry_core::error::FlowsentryError;

/// 로그 스트림 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// 일반 파일이 아닌 경로
    #[error("unsupported file type: {path}")]
    UnsupportedFileType {
        /// 문제가 된 경로
        path: String,
    },

    /// 라인 채널 전송 실패 (수신측 종료)
    #[error("line channel closed: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TailError> for FlowsentryError {
    fn from(err: TailError) -> Self {
        match err {
            TailError::Io(e) => FlowsentryError::Io(e),
            other => FlowsentryError::Stream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_file_type_display() {
        let err = TailError::UnsupportedFileType {
            path: "/dev/null".to_owned(),
        };
        assert!(err.to_string().contains("/dev/null"));
    }

    #[test]
    fn io_error_converts_to_top_level_io() {
        let err: TailError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let top: FlowsentryError = err.into();
        assert!(matches!(top, FlowsentryError::Io(_)));
    }

    #[test]
    fn channel_error_converts_to_stream() {
        let top: FlowsentryError = TailError::Channel("closed".to_owned()).into();
        assert!(matches!(top, FlowsentryError::Stream(_)));
    }
}
