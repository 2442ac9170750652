//! 규칙과 필터 타입
//!
//! 컴파일된 정책 오브젝트를 정의합니다. 조건은 파서 상태와 무관한
//! 순수 술어([`Criterion`])로 보관됩니다.

use flowsentry_core::record::Record;
use flowsentry_core::types::{Priority, RuleAnnotation};

use crate::predicate::Criterion;

/// 컴파일된 탐지 규칙
///
/// 규칙은 가산적입니다: 하나의 레코드가 여러 규칙에 매칭될 수 있고,
/// 매칭마다 규칙 메타데이터가 레코드 컨텍스트에 추가됩니다.
#[derive(Clone)]
pub struct Rule {
    /// 규칙 이름
    pub name: String,
    /// 규칙 설명
    pub desc: String,
    /// 컴파일된 조건 술어
    pub condition: Criterion<Record>,
    /// 매칭 시 실행할 액션 이름 목록
    pub actions: Vec<String>,
    /// 분류 태그
    pub tags: Vec<String>,
    /// 우선순위
    pub priority: Priority,
    /// 레코드 타입 prefilter 토큰 (비어 있으면 모든 타입에 적용)
    pub prefilter: Vec<String>,
    /// 활성화 여부
    pub enabled: bool,
}

impl Rule {
    /// prefilter 기준으로 규칙이 이 레코드에 적용 가능한지 확인합니다.
    pub fn is_applicable(&self, r: &Record) -> bool {
        if self.prefilter.is_empty() {
            return true;
        }
        match r.rec_type() {
            Some(rtype) => self.prefilter.iter().any(|t| t == rtype.token()),
            None => false,
        }
    }

    /// 레코드 컨텍스트에 부착할 주석을 생성합니다.
    pub fn annotation(&self) -> RuleAnnotation {
        RuleAnnotation {
            name: self.name.clone(),
            desc: self.desc.clone(),
            tags: self.tags.clone(),
            priority: self.priority,
            actions: self.actions.clone(),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("tags", &self.tags)
            .field("actions", &self.actions)
            .field("prefilter", &self.prefilter)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// 컴파일된 드롭 필터
///
/// 필터는 감산적입니다: 매칭된 레코드는 스트림에서 제거됩니다.
#[derive(Clone)]
pub struct Filter {
    /// 필터 이름
    pub name: String,
    /// 컴파일된 조건 술어
    pub condition: Criterion<Record>,
    /// 활성화 여부
    pub enabled: bool,
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish()
    }
}
