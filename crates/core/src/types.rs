//! 도메인 타입 — 규칙 주석과 우선순위
//!
//! 정책 엔진이 레코드에 부착하는 메타데이터 타입을 정의합니다.
//! 엔진 크레이트와 드라이버가 모두 이 타입으로 데이터를 교환합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 규칙 우선순위
///
/// `Ord` 구현으로 우선순위 비교가 가능합니다 (`Low < Medium < High`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// 낮음 (기본값)
    #[default]
    Low,
    /// 중간
    Medium,
    /// 높음
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// 매칭된 규칙이 레코드 컨텍스트에 남기는 주석
///
/// 규칙의 조건식 자체는 포함하지 않습니다. 컴파일된 조건은 정책
/// 엔진 내부에만 존재하고, 다운스트림은 이 주석만 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAnnotation {
    /// 규칙 이름
    pub name: String,
    /// 규칙 설명
    pub desc: String,
    /// 분류 태그
    pub tags: Vec<String>,
    /// 우선순위
    pub priority: Priority,
    /// 규칙에 연결된 액션 이름 목록
    pub actions: Vec<String>,
}

/// 해시 종류 — 해시 집합이 부착되는 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    /// 프로세스 실행 파일 해시
    Proc,
    /// 대상 파일 해시
    File,
}

/// 해시 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSet {
    /// MD5 (16진 문자열)
    #[serde(default)]
    pub md5: String,
    /// SHA-1 (16진 문자열)
    #[serde(default)]
    pub sha1: String,
    /// SHA-256 (16진 문자열)
    #[serde(default)]
    pub sha256: String,
}
