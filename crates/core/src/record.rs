//! 레코드 모델 — 컬럼형 텔레메트리 레코드와 가변 컨텍스트
//!
//! 하나의 [`Record`]는 소스별 평탄화 컬럼 묶음([`FlatRecord`])과
//! 정책 엔진이 기록하는 가변 [`RecordContext`]로 구성됩니다.
//! 컨텍스트는 레코드를 소유한 워커 안에서만 기록되며, 이후에는
//! 읽기 전용입니다.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::{self, Attr, RecordType};
use crate::types::{HashKind, HashSet, RuleAnnotation};

/// 레코드의 논리 소스
///
/// 호스트 이벤트 컬럼 외에, 확장 수집기가 채우는 오버레이 소스가
/// 있습니다. 레코드에 없는 소스의 컬럼을 읽으면 제로 값이 반환됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// 기본 호스트 이벤트 소스
    SysFlow,
    /// 프로세스 상세 오버레이
    Process,
    /// 파일 상세 오버레이
    File,
    /// 네트워크 상세 오버레이
    Network,
    /// 쿠버네티스 오버레이
    K8s,
}

/// 파드에 연결된 서비스 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// 서비스 ID
    pub id: String,
    /// 서비스 이름
    pub name: String,
    /// 네임스페이스
    pub namespace: String,
    /// 클러스터 IP (정수 인코딩)
    pub cluster_ip: i64,
    /// 포트 목록
    pub ports: Vec<i64>,
}

/// 매핑된 속성 값
///
/// 속성 접근자는 동적 타입 값을 반환합니다. 연산 어휘는 이 유니온을
/// 받아 내부에서 타입별로 분기합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64비트 정수
    Int(i64),
    /// 불리언
    Bool(bool),
    /// 문자열 (리스트 값은 구분자로 결합된 형태)
    Str(String),
    /// 정수 배열
    IntArray(Vec<i64>),
    /// 문자열 배열
    StrArray(Vec<String>),
    /// 서비스 배열
    SvcArray(Vec<Service>),
}

impl Value {
    /// 값이 해당 타입의 제로 값인지 확인합니다.
    ///
    /// 존재(exists) 술어의 기반입니다: 빈 문자열, 0, false, 빈 배열은
    /// 모두 제로로 간주합니다.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Int(v) => *v == 0,
            Self::Bool(v) => !v,
            Self::Str(s) => s.is_empty(),
            Self::IntArray(a) => a.is_empty(),
            Self::StrArray(a) => a.is_empty(),
            Self::SvcArray(a) => a.is_empty(),
        }
    }
}

/// 프로세스 식별자 — (호스트 PID, 생성 타임스탬프)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Oid {
    /// 호스트 PID
    pub hpid: i64,
    /// 프로세스 생성 타임스탬프
    pub createts: i64,
}

/// 조상 체인 등 파생 값의 보조 키
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuxAttr {
    /// 조상 프로세스 이름 체인
    ProcAName,
    /// 조상 프로세스 실행 파일 체인
    ProcAExe,
    /// 조상 프로세스 cmdline 체인
    ProcACmdLine,
    /// 조상 프로세스 PID 체인
    ProcAPid,
    /// 부모 프로세스 이름
    PProcName,
    /// 부모 프로세스 실행 파일
    PProcExe,
    /// 부모 프로세스 인자
    PProcArgs,
    /// 부모 프로세스 UID
    PProcUid,
    /// 부모 프로세스 사용자명
    PProcUser,
    /// 부모 프로세스 GID
    PProcGid,
    /// 부모 프로세스 그룹명
    PProcGroup,
    /// 부모 프로세스 TTY 여부
    PProcTty,
    /// 부모 프로세스 entry 여부
    PProcEntry,
    /// 부모 프로세스 cmdline
    PProcCmdLine,
}

/// 프로세스 레지스트리 인터페이스
///
/// 조상/부모 속성은 엔진 외부의 프로세스 레지스트리가 채웁니다.
/// 엔진은 이 조회 인터페이스에만 의존하며, 레지스트리의 소유권이나
/// 축출 정책은 갖지 않습니다.
pub trait ProcessRegistry: Send + Sync {
    /// 캐시된 파생 값을 조회합니다. 없으면 `None`입니다.
    fn cached_value(&self, oid: &Oid, attr: AuxAttr) -> Option<Value>;
}

/// 소스 하나의 평탄화 컬럼 묶음
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRecord {
    /// int64 컬럼
    pub ints: Vec<i64>,
    /// string 컬럼
    pub strs: Vec<String>,
    /// int-array 컬럼
    #[serde(default)]
    pub int_arrays: Vec<Vec<i64>>,
    /// service-array 컬럼
    #[serde(default)]
    pub svc_arrays: Vec<Vec<Service>>,
}

impl FlatRecord {
    /// 모든 컬럼이 제로 값인 레코드를 생성합니다.
    pub fn new() -> Self {
        Self {
            ints: vec![0; schema::INT_WIDTH],
            strs: vec![String::new(); schema::STR_WIDTH],
            int_arrays: vec![Vec::new(); schema::INT_ARRAY_WIDTH],
            svc_arrays: vec![Vec::new(); schema::SVC_ARRAY_WIDTH],
        }
    }
}

impl Default for FlatRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// 레코드의 가변 컨텍스트
///
/// 태그 집합, 매칭된 규칙 주석, 알림 플래그, 해시 맵을 담습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordContext {
    tags: Vec<String>,
    rules: Vec<RuleAnnotation>,
    alert: bool,
    hashes: HashMap<HashKind, HashSet>,
}

impl RecordContext {
    /// 태그를 추가합니다. 중복 태그는 무시됩니다.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// 매칭된 규칙 주석을 추가합니다. 규칙의 태그도 태그 집합에 합쳐집니다.
    pub fn add_rule(&mut self, ann: RuleAnnotation) {
        for tag in &ann.tags {
            self.add_tag(tag.clone());
        }
        self.rules.push(ann);
    }

    /// 알림 플래그를 설정합니다.
    pub fn set_alert(&mut self, alert: bool) {
        self.alert = alert;
    }

    /// 해시 집합을 부착합니다.
    pub fn set_hashes(&mut self, kind: HashKind, hashes: HashSet) {
        self.hashes.insert(kind, hashes);
    }

    /// 태그 목록
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// 매칭된 규칙 주석 목록 (선언 순서)
    pub fn rules(&self) -> &[RuleAnnotation] {
        &self.rules
    }

    /// 알림 플래그
    pub fn alert(&self) -> bool {
        self.alert
    }

    /// 부착된 해시 집합
    pub fn hashes(&self, kind: HashKind) -> Option<&HashSet> {
        self.hashes.get(&kind)
    }
}

/// 컬럼형 텔레메트리 레코드
///
/// 드라이버가 생성하고, 채널로 소유권이 전달되며, 소유한 워커에서만
/// 컨텍스트가 변경된 뒤 한 번 전달됩니다.
#[derive(Clone, Serialize, Deserialize)]
pub struct Record {
    /// 소스별 컬럼 묶음
    sources: HashMap<Source, FlatRecord>,
    /// 가변 컨텍스트
    pub ctx: RecordContext,
    /// 조상 속성 조회용 프로세스 레지스트리
    #[serde(skip)]
    registry: Option<Arc<dyn ProcessRegistry>>,
}

impl Record {
    /// 기본 소스만 갖는 빈 레코드를 생성합니다.
    pub fn new() -> Self {
        let mut sources = HashMap::new();
        sources.insert(Source::SysFlow, FlatRecord::new());
        Self {
            sources,
            ctx: RecordContext::default(),
            registry: None,
        }
    }

    /// 오버레이 소스를 부착합니다.
    pub fn with_source(mut self, source: Source, flat: FlatRecord) -> Self {
        self.sources.insert(source, flat);
        self
    }

    /// 프로세스 레지스트리를 연결합니다.
    pub fn with_registry(mut self, registry: Arc<dyn ProcessRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// int64 컬럼 값을 읽습니다. 소스나 컬럼이 없으면 0입니다.
    pub fn get_int(&self, attr: Attr, source: Source) -> i64 {
        self.sources
            .get(&source)
            .and_then(|f| f.ints.get(attr))
            .copied()
            .unwrap_or(0)
    }

    /// string 컬럼 값을 읽습니다. 소스나 컬럼이 없으면 빈 문자열입니다.
    pub fn get_str(&self, attr: Attr, source: Source) -> &str {
        self.sources
            .get(&source)
            .and_then(|f| f.strs.get(attr))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// int-array 컬럼 값을 읽습니다.
    pub fn get_int_array(&self, attr: Attr, source: Source) -> Option<&Vec<i64>> {
        self.sources.get(&source).and_then(|f| f.int_arrays.get(attr))
    }

    /// service-array 컬럼 값을 읽습니다.
    pub fn get_svc_array(&self, attr: Attr, source: Source) -> Option<&Vec<Service>> {
        self.sources.get(&source).and_then(|f| f.svc_arrays.get(attr))
    }

    /// int64 컬럼 값을 기록합니다. 존재하지 않는 소스는 생성됩니다.
    pub fn set_int(&mut self, attr: Attr, source: Source, value: i64) {
        let flat = self.sources.entry(source).or_default();
        if let Some(slot) = flat.ints.get_mut(attr) {
            *slot = value;
        }
    }

    /// string 컬럼 값을 기록합니다. 존재하지 않는 소스는 생성됩니다.
    pub fn set_str(&mut self, attr: Attr, source: Source, value: impl Into<String>) {
        let flat = self.sources.entry(source).or_default();
        if let Some(slot) = flat.strs.get_mut(attr) {
            *slot = value.into();
        }
    }

    /// 레코드 타입을 반환합니다.
    pub fn rec_type(&self) -> Option<RecordType> {
        RecordType::parse(self.get_int(schema::SF_REC_TYPE, Source::SysFlow))
    }

    /// 현재 프로세스의 OID를 반환합니다.
    pub fn oid(&self) -> Oid {
        Oid {
            hpid: self.get_int(schema::PROC_OID_HPID_INT, Source::SysFlow),
            createts: self.get_int(schema::PROC_OID_CREATETS_INT, Source::SysFlow),
        }
    }

    /// 프로세스 레지스트리에서 캐시된 파생 값을 조회합니다.
    pub fn cached_value(&self, oid: &Oid, attr: AuxAttr) -> Option<Value> {
        self.registry.as_ref()?.cached_value(oid, attr)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("sources", &self.sources)
            .field("ctx", &self.ctx)
            .field("registry", &self.registry.as_ref().map(|_| "<registry>"))
            .finish()
    }
}
