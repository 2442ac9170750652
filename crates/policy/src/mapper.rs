//! 필드 매퍼 — 점 표기 속성 이름을 타입 있는 접근자로 변환합니다.
//!
//! 매퍼는 속성 이름에서 [`FieldEntry`]로의 맵입니다. 같은 접근자 위에
//! 네 가지 타입 뷰(`map`, `map_int`, `map_str`, 배열 뷰)를 노출합니다.
//! 테이블은 프로세스 전역 상수로 시작 시 한 번 구성됩니다.
//!
//! 공개 테이블과 비공개(질의 전용 별칭) 테이블이 병합되며, 키가
//! 중복되면 경고를 남기고 공개 항목이 우선합니다.

use std::collections::HashMap;
use std::hash::Hasher;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use twox_hash::XxHash64;

use flowsentry_core::record::{AuxAttr, Record, Source, Value};
use flowsentry_core::schema::{self, RecordType, LIST_SEP, SPACE, SYMLINK_SEP};

use crate::error::PolicyError;

// --- 공개 속성 이름 ---

pub const SF_TYPE: &str = "sf.type";
pub const SF_OPFLAGS: &str = "sf.opflags";
pub const SF_RET: &str = "sf.ret";
pub const SF_TS: &str = "sf.ts";
pub const SF_ENDTS: &str = "sf.endts";

pub const SF_PROC_OID: &str = "sf.proc.oid";
pub const SF_PROC_PID: &str = "sf.proc.pid";
pub const SF_PROC_NAME: &str = "sf.proc.name";
pub const SF_PROC_EXE: &str = "sf.proc.exe";
pub const SF_PROC_ARGS: &str = "sf.proc.args";
pub const SF_PROC_UID: &str = "sf.proc.uid";
pub const SF_PROC_USER: &str = "sf.proc.user";
pub const SF_PROC_TID: &str = "sf.proc.tid";
pub const SF_PROC_GID: &str = "sf.proc.gid";
pub const SF_PROC_GROUP: &str = "sf.proc.group";
pub const SF_PROC_CREATETS: &str = "sf.proc.createts";
pub const SF_PROC_TTY: &str = "sf.proc.tty";
pub const SF_PROC_ENTRY: &str = "sf.proc.entry";
pub const SF_PROC_CMDLINE: &str = "sf.proc.cmdline";
pub const SF_PROC_ANAME: &str = "sf.proc.aname";
pub const SF_PROC_AEXE: &str = "sf.proc.aexe";
pub const SF_PROC_ACMDLINE: &str = "sf.proc.acmdline";
pub const SF_PROC_APID: &str = "sf.proc.apid";

pub const SF_PPROC_OID: &str = "sf.pproc.oid";
pub const SF_PPROC_PID: &str = "sf.pproc.pid";
pub const SF_PPROC_NAME: &str = "sf.pproc.name";
pub const SF_PPROC_EXE: &str = "sf.pproc.exe";
pub const SF_PPROC_ARGS: &str = "sf.pproc.args";
pub const SF_PPROC_UID: &str = "sf.pproc.uid";
pub const SF_PPROC_USER: &str = "sf.pproc.user";
pub const SF_PPROC_GID: &str = "sf.pproc.gid";
pub const SF_PPROC_GROUP: &str = "sf.pproc.group";
pub const SF_PPROC_CREATETS: &str = "sf.pproc.createts";
pub const SF_PPROC_TTY: &str = "sf.pproc.tty";
pub const SF_PPROC_ENTRY: &str = "sf.pproc.entry";
pub const SF_PPROC_CMDLINE: &str = "sf.pproc.cmdline";

pub const SF_FILE_NAME: &str = "sf.file.name";
pub const SF_FILE_PATH: &str = "sf.file.path";
pub const SF_FILE_SYMLINK: &str = "sf.file.symlink";
pub const SF_FILE_OID: &str = "sf.file.oid";
pub const SF_FILE_DIRECTORY: &str = "sf.file.directory";
pub const SF_FILE_NEWNAME: &str = "sf.file.newname";
pub const SF_FILE_NEWPATH: &str = "sf.file.newpath";
pub const SF_FILE_NEWSYMLINK: &str = "sf.file.newsymlink";
pub const SF_FILE_NEWOID: &str = "sf.file.newoid";
pub const SF_FILE_NEWDIRECTORY: &str = "sf.file.newdirectory";
pub const SF_FILE_TYPE: &str = "sf.file.type";
pub const SF_FILE_IS_OPEN_WRITE: &str = "sf.file.is_open_write";
pub const SF_FILE_IS_OPEN_READ: &str = "sf.file.is_open_read";
pub const SF_FILE_FD: &str = "sf.file.fd";
pub const SF_FILE_OPENFLAGS: &str = "sf.file.openflags";

pub const SF_NET_PROTO: &str = "sf.net.proto";
pub const SF_NET_SPORT: &str = "sf.net.sport";
pub const SF_NET_DPORT: &str = "sf.net.dport";
pub const SF_NET_PORT: &str = "sf.net.port";
pub const SF_NET_SIP: &str = "sf.net.sip";
pub const SF_NET_DIP: &str = "sf.net.dip";
pub const SF_NET_IP: &str = "sf.net.ip";

pub const SF_FLOW_RBYTES: &str = "sf.flow.rbytes";
pub const SF_FLOW_ROPS: &str = "sf.flow.rops";
pub const SF_FLOW_WBYTES: &str = "sf.flow.wbytes";
pub const SF_FLOW_WOPS: &str = "sf.flow.wops";

pub const SF_CONTAINER_ID: &str = "sf.container.id";
pub const SF_CONTAINER_NAME: &str = "sf.container.name";
pub const SF_CONTAINER_IMAGEID: &str = "sf.container.imageid";
pub const SF_CONTAINER_IMAGE: &str = "sf.container.image";
pub const SF_CONTAINER_TYPE: &str = "sf.container.type";
pub const SF_CONTAINER_PRIVILEGED: &str = "sf.container.privileged";

pub const SF_POD_TS: &str = "sf.pod.ts";
pub const SF_POD_ID: &str = "sf.pod.id";
pub const SF_POD_NAME: &str = "sf.pod.name";
pub const SF_POD_NODENAME: &str = "sf.pod.nodename";
pub const SF_POD_NAMESPACE: &str = "sf.pod.namespace";
pub const SF_POD_RESTARTCOUNT: &str = "sf.pod.restartcount";
pub const SF_POD_HOSTIP_JSON: &str = "sf.pod.hostip.json";
pub const SF_POD_HOSTIP: &str = "sf.pod.hostip";
pub const SF_POD_INTERNALIP_JSON: &str = "sf.pod.internalip.json";
pub const SF_POD_INTERNALIP: &str = "sf.pod.internalip";
pub const SF_POD_SERVICES_JSON: &str = "sf.pod.services.json";
pub const SF_POD_SERVICES: &str = "sf.pod.services";

pub const SF_K8SE_ACTION: &str = "sf.ke.action";
pub const SF_K8SE_KIND: &str = "sf.ke.kind";
pub const SF_K8SE_MESSAGE: &str = "sf.ke.message";

pub const SF_NODE_ID: &str = "sf.node.id";
pub const SF_NODE_IP: &str = "sf.node.ip";

pub const SF_SCHEMA_VERSION: &str = "sf.schema.version";
pub const SF_TRACENAME: &str = "sf.tracename";

/// 속성 접근자 함수 타입
pub type FieldMap = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// 정수 뷰 접근자
pub type IntFieldMap = Arc<dyn Fn(&Record) -> i64 + Send + Sync>;

/// 문자열 뷰 접근자
pub type StrFieldMap = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// 접근자 반환 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Int,
    Str,
    Bool,
    StrArray,
    IntArray,
    SvcArray,
    SpecialInt,
    SpecialStr,
    SpecialBool,
}

/// 속성의 논리 섹션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    None,
    Proc,
    PProc,
    File,
    Net,
    Flow,
    Cont,
    Node,
    Meta,
    Pod,
    K8sEvt,
}

/// 공개 속성 하나의 메타데이터
#[derive(Clone)]
pub struct FieldEntry {
    /// 접근자 함수
    pub map: FieldMap,
    /// 평탄화 레코드에서의 대표 컬럼 인덱스
    pub flat_index: schema::Attr,
    /// 접근자 반환 종류
    pub kind: MappingKind,
    /// 소스
    pub source: Source,
    /// 논리 섹션
    pub section: Section,
    /// 파생 값의 보조 키 (조상 체인 등)
    pub aux: Option<AuxAttr>,
}

/// 속성 이름 → 접근자 어댑터
pub struct FieldMapper {
    mappers: HashMap<&'static str, FieldEntry>,
    fields: Vec<&'static str>,
}

impl FieldMapper {
    /// 공개/비공개 테이블을 병합하여 매퍼를 구성합니다.
    pub fn new() -> Self {
        let mut mappers = exported_mappers();

        let mut fields: Vec<&'static str> = mappers.keys().copied().collect();
        fields.sort_by(|a, b| {
            let ka = a.split('.').count();
            let kb = b.split('.').count();
            ka.cmp(&kb).then_with(|| a.cmp(b))
        });

        for (k, v) in non_exported_mappers() {
            if mappers.contains_key(k) {
                tracing::warn!(key = k, "duplicate mapper key, exported entry wins");
            } else {
                mappers.insert(k, v);
            }
        }
        Self { mappers, fields }
    }

    /// 속성의 원시 접근자를 반환합니다.
    ///
    /// 등록되지 않은 이름은 리터럴로 취급되어, 이름 자체를 문자열
    /// 값으로 반환하는 접근자가 됩니다.
    pub fn map(&self, attr: &str) -> FieldMap {
        if let Some(entry) = self.mappers.get(attr) {
            return Arc::clone(&entry.map);
        }
        let literal = attr.to_owned();
        Arc::new(move |_| Value::Str(literal.clone()))
    }

    /// 속성 메타데이터를 반환합니다.
    pub fn entry(&self, attr: &str) -> Option<&FieldEntry> {
        self.mappers.get(attr)
    }

    /// 정수 뷰를 반환합니다.
    ///
    /// 값이 정수가 아니면 속성 이름을 십진 리터럴로 파싱해 보고,
    /// 그마저 실패하면 0입니다.
    pub fn map_int(&self, attr: &str) -> IntFieldMap {
        let accessor = self.map(attr);
        let literal = attr.parse::<i64>().ok();
        Arc::new(move |r| match accessor(r) {
            Value::Int(v) => v,
            _ => literal.unwrap_or(0),
        })
    }

    /// 문자열 뷰를 반환합니다. 모든 등록 속성에 대해 전역적입니다.
    ///
    /// - 정수/불리언 값은 십진/불리언 텍스트로 변환됩니다.
    /// - 문자열 값은 둘러싼 따옴표가 제거됩니다.
    /// - `base[json.path]` 형태의 이름은 `base`가 등록 속성이고 값이
    ///   문자열이면 JSON 하위 필드를 추출합니다 (없으면 빈 문자열).
    pub fn map_str(&self, attr: &str) -> StrFieldMap {
        let checked = self.map_str_checked(attr);
        Arc::new(move |r| checked(r).unwrap_or_default())
    }

    /// [`FieldMapper::map_str`]과 동일하지만 JSON 디코딩 실패를
    /// 에러로 드러냅니다. 연산 어휘가 사용하는 뷰입니다.
    pub fn map_str_checked(
        &self,
        attr: &str,
    ) -> Arc<dyn Fn(&Record) -> Result<String, PolicyError> + Send + Sync> {
        // base[json.path] 분해: base가 등록 속성일 때만 경로 표현식
        let (base, json_path) = match attr.split_once('[') {
            Some((base, rest)) if self.mappers.contains_key(base) && rest.ends_with(']') => {
                (base, Some(rest[..rest.len() - 1].to_owned()))
            }
            _ => (attr, None),
        };

        let accessor = self.map(base);
        let bool_view = self
            .mappers
            .get(base)
            .is_some_and(|e| e.kind == MappingKind::Bool);
        let attr_name = attr.to_owned();

        Arc::new(move |r| match accessor(r) {
            Value::Str(s) => match &json_path {
                Some(path) if !s.is_empty() && !path.is_empty() => {
                    json_field(&s, path).map_err(|reason| PolicyError::Attribute {
                        attr: attr_name.clone(),
                        reason,
                    })
                }
                _ => Ok(trim_bounding_quotes(&s).to_owned()),
            },
            Value::Int(v) => {
                if bool_view {
                    Ok((v != 0).to_string())
                } else {
                    Ok(v.to_string())
                }
            }
            Value::Bool(b) => Ok(b.to_string()),
            _ => Ok(String::new()),
        })
    }

    /// 정수 배열 뷰를 반환합니다.
    pub fn map_int_array(&self, attr: &str) -> Arc<dyn Fn(&Record) -> Option<Vec<i64>> + Send + Sync> {
        let accessor = self.map(attr);
        Arc::new(move |r| match accessor(r) {
            Value::IntArray(a) => Some(a),
            _ => None,
        })
    }

    /// 서비스 배열 뷰를 반환합니다.
    pub fn map_svc_array(
        &self,
        attr: &str,
    ) -> Arc<dyn Fn(&Record) -> Option<Vec<flowsentry_core::record::Service>> + Send + Sync> {
        let accessor = self.map(attr);
        Arc::new(move |r| match accessor(r) {
            Value::SvcArray(a) => Some(a),
            _ => None,
        })
    }

    /// 공개 속성 이름의 정렬된 목록을 반환합니다.
    ///
    /// 점 세그먼트 수 오름차순, 같으면 사전순입니다. 다운스트림 툴링의
    /// 접두사 매칭에 사용됩니다.
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// 프로세스 전역 매퍼 인스턴스
pub fn mapper() -> &'static FieldMapper {
    static MAPPER: OnceLock<FieldMapper> = OnceLock::new();
    MAPPER.get_or_init(FieldMapper::new)
}

/// 둘러싼 따옴표(짝이 맞는 ' 또는 ")를 제거합니다.
pub fn trim_bounding_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// JSON 문자열에서 점 표기 경로의 하위 필드를 추출합니다.
///
/// 경로가 없으면 빈 문자열, JSON 디코딩 실패는 에러입니다.
fn json_field(raw: &str, path: &str) -> Result<String, String> {
    let parsed: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid json: {e}"))?;
    let mut cur = &parsed;
    for seg in path.split('.') {
        cur = match cur {
            serde_json::Value::Object(map) => match map.get(seg) {
                Some(v) => v,
                None => return Ok(String::new()),
            },
            serde_json::Value::Array(items) => match seg.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Ok(String::new()),
            },
            _ => return Ok(String::new()),
        };
    }
    Ok(match cur {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// 경로의 basename을 반환합니다.
fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

/// 패킹된 `path -> link` 표현을 (경로, 링크)로 분해합니다.
fn parse_sym_path(raw: &str) -> (&str, &str) {
    match raw.split_once(SYMLINK_SEP) {
        Some((path, link)) => (path.trim(), link.trim()),
        None => (raw, ""),
    }
}

// --- 접근자 빌더 ---

fn map_str_col(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(r.get_str(attr, src).to_owned()))
}

fn map_int_col(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Int(r.get_int(attr, src)))
}

fn map_int_array_col(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::IntArray(r.get_int_array(attr, src).cloned().unwrap_or_default()))
}

fn map_svc_array_col(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::SvcArray(r.get_svc_array(attr, src).cloned().unwrap_or_default()))
}

/// 파일/네트워크 플로우 컬럼의 합 — 레코드마다 정확히 하나만 0이 아닙니다.
fn map_sum(src: Source, attrs: &'static [schema::Attr]) -> FieldMap {
    Arc::new(move |r| Value::Int(attrs.iter().map(|a| r.get_int(*a, src)).sum()))
}

/// `exe SPACE exeargs` 결합
fn map_join(src: Source, attrs: &'static [schema::Attr]) -> FieldMap {
    Arc::new(move |r| {
        let joined = attrs
            .iter()
            .map(|a| r.get_str(*a, src))
            .collect::<Vec<_>>()
            .join(SPACE);
        Value::Str(joined)
    })
}

fn map_rec_type(src: Source) -> FieldMap {
    Arc::new(move |r| {
        let code = r.get_int(schema::SF_REC_TYPE, src);
        Value::Str(
            RecordType::parse(code)
                .map(|t| t.token().to_owned())
                .unwrap_or_default(),
        )
    })
}

fn map_op_flags(src: Source) -> FieldMap {
    Arc::new(move |r| {
        let flags = r.get_int(schema::OPFLAGS_INT, src);
        let rtype = RecordType::parse(r.get_int(schema::SF_REC_TYPE, src));
        Value::Str(schema::op_flags(flags, rtype).join(LIST_SEP))
    })
}

/// 반환값은 프로세스/파일 이벤트 레코드에서만 의미가 있습니다.
fn map_ret(src: Source) -> FieldMap {
    Arc::new(move |r| {
        match RecordType::parse(r.get_int(schema::SF_REC_TYPE, src)) {
            Some(RecordType::ProcEvt) | Some(RecordType::FileEvt) => {
                Value::Int(r.get_int(schema::RET_INT, src))
            }
            _ => Value::Int(0),
        }
    })
}

/// 종료 타임스탬프는 레코드 타입에 따라 다른 컬럼에서 옵니다.
fn map_end_ts(src: Source) -> FieldMap {
    Arc::new(move |r| {
        match RecordType::parse(r.get_int(schema::SF_REC_TYPE, src)) {
            Some(RecordType::FileFlow) => Value::Int(r.get_int(schema::FL_FILE_ENDTS_INT, src)),
            Some(RecordType::NetFlow) => Value::Int(r.get_int(schema::FL_NETW_ENDTS_INT, src)),
            Some(RecordType::K8sEvt) => Value::Int(r.get_int(schema::TS_INT, src)),
            _ => Value::Int(0),
        }
    })
}

fn map_name(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(base_name(r.get_str(attr, src))))
}

fn map_path(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| {
        let (path, _) = parse_sym_path(r.get_str(attr, src));
        Value::Str(path.to_owned())
    })
}

fn map_symlink(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| {
        let (_, link) = parse_sym_path(r.get_str(attr, src));
        Value::Str(link.to_owned())
    })
}

/// 디렉토리는 심볼릭 링크가 분해된 경로에서 계산합니다.
fn map_dir(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| {
        let (path, _) = parse_sym_path(r.get_str(attr, src));
        let dir = Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        Value::Str(dir)
    })
}

fn map_file_type(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(schema::file_type(r.get_int(attr, src)).to_string()))
}

fn map_is_open_write(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Bool(schema::is_open_write(r.get_int(attr, src))))
}

fn map_is_open_read(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Bool(schema::is_open_read(r.get_int(attr, src))))
}

fn map_open_flags(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(schema::open_flags(r.get_int(attr, src)).join(LIST_SEP)))
}

/// 포트 컬럼들을 구분자로 결합합니다 (양 끝점 표현).
fn map_port(src: Source, attrs: &'static [schema::Attr]) -> FieldMap {
    Arc::new(move |r| {
        let ports = attrs
            .iter()
            .map(|a| r.get_int(*a, src).to_string())
            .collect::<Vec<_>>()
            .join(LIST_SEP);
        Value::Str(ports)
    })
}

/// IP 컬럼들을 점 표기 문자열로 결합합니다.
fn map_ip(src: Source, attrs: &'static [schema::Attr]) -> FieldMap {
    Arc::new(move |r| {
        let ips = attrs
            .iter()
            .map(|a| schema::ip_str(r.get_int(*a, src)))
            .collect::<Vec<_>>()
            .join(LIST_SEP);
        Value::Str(ips)
    })
}

fn map_cont_type(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(schema::container_type(r.get_int(attr, src)).to_owned()))
}

fn map_k8s_action(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(schema::k8s_action(r.get_int(attr, src)).to_owned()))
}

fn map_k8s_kind(src: Source, attr: schema::Attr) -> FieldMap {
    Arc::new(move |r| Value::Str(schema::k8s_component(r.get_int(attr, src)).to_owned()))
}

/// 정수 컬럼의 불리언 뷰 (0이 아니면 참)
fn map_bool_view(src: Source, attr: schema::Attr) -> FieldMap {
    // 원시 값은 정수로 유지하고, 문자열 뷰에서 불리언 텍스트로 렌더링됩니다
    map_int_col(src, attr)
}

/// 조상/부모 속성 — 프로세스 레지스트리의 레코드별 캐시를 조회합니다.
fn map_cached(aux: AuxAttr) -> FieldMap {
    Arc::new(move |r| {
        let oid = r.oid();
        r.cached_value(&oid, aux).unwrap_or_else(|| match aux {
            AuxAttr::ProcAPid | AuxAttr::PProcUid | AuxAttr::PProcGid => Value::Int(0),
            AuxAttr::PProcTty | AuxAttr::PProcEntry => Value::Bool(false),
            _ => Value::Str(String::new()),
        })
    })
}

/// OID — (hpid, createts) 십진 표현에 대한 비암호화 해시의 16진 다이제스트
fn map_oid(src: Source, attrs: &'static [schema::Attr]) -> FieldMap {
    Arc::new(move |r| {
        let mut h = XxHash64::with_seed(0);
        for attr in attrs {
            h.write(r.get_int(*attr, src).to_string().as_bytes());
        }
        Value::Str(format!("{:016x}", h.finish()))
    })
}

// --- 테이블 ---

/// 공개 속성 테이블
fn exported_mappers() -> HashMap<&'static str, FieldEntry> {
    use crate::mapper::{MappingKind as K, Section as S};
    use flowsentry_core::schema::*;
    let src = Source::SysFlow;

    const CMDLINE_ATTRS: &[Attr] = &[PROC_EXE_STR, PROC_EXEARGS_STR];
    const RBYTES_ATTRS: &[Attr] = &[FL_FILE_NUMRRECVBYTES_INT, FL_NETW_NUMRRECVBYTES_INT];
    const ROPS_ATTRS: &[Attr] = &[FL_FILE_NUMRRECVOPS_INT, FL_NETW_NUMRRECVOPS_INT];
    const WBYTES_ATTRS: &[Attr] = &[FL_FILE_NUMWSENDBYTES_INT, FL_NETW_NUMWSENDBYTES_INT];
    const WOPS_ATTRS: &[Attr] = &[FL_FILE_NUMWSENDOPS_INT, FL_NETW_NUMWSENDOPS_INT];
    const PORT_ATTRS: &[Attr] = &[FL_NETW_SPORT_INT, FL_NETW_DPORT_INT];
    const SPORT_ATTRS: &[Attr] = &[FL_NETW_SPORT_INT];
    const DPORT_ATTRS: &[Attr] = &[FL_NETW_DPORT_INT];
    const IP_ATTRS: &[Attr] = &[FL_NETW_SIP_INT, FL_NETW_DIP_INT];
    const SIP_ATTRS: &[Attr] = &[FL_NETW_SIP_INT];
    const DIP_ATTRS: &[Attr] = &[FL_NETW_DIP_INT];
    const PROC_OID_ATTRS: &[Attr] = &[PROC_OID_HPID_INT, PROC_OID_CREATETS_INT];
    const PPROC_OID_ATTRS: &[Attr] = &[PROC_POID_HPID_INT, PROC_POID_CREATETS_INT];

    let e = |map: FieldMap, flat_index: Attr, kind: K, section: S, aux: Option<AuxAttr>| FieldEntry {
        map,
        flat_index,
        kind,
        source: src,
        section,
        aux,
    };

    let mut m: HashMap<&'static str, FieldEntry> = HashMap::new();

    // SysFlow 공통
    m.insert(SF_TYPE, e(map_rec_type(src), SF_REC_TYPE, K::SpecialStr, S::None, None));
    m.insert(SF_OPFLAGS, e(map_op_flags(src), OPFLAGS_INT, K::StrArray, S::None, None));
    m.insert(SF_RET, e(map_ret(src), SF_REC_TYPE, K::SpecialInt, S::None, None));
    m.insert(SF_TS, e(map_int_col(src, TS_INT), TS_INT, K::Int, S::None, None));
    m.insert(SF_ENDTS, e(map_end_ts(src), FL_FILE_ENDTS_INT, K::SpecialInt, S::None, None));

    // 프로세스
    m.insert(SF_PROC_OID, e(map_oid(src, PROC_OID_ATTRS), PROC_OID_HPID_INT, K::SpecialStr, S::Proc, None));
    m.insert(SF_PROC_PID, e(map_int_col(src, PROC_OID_HPID_INT), PROC_OID_HPID_INT, K::Int, S::Proc, None));
    m.insert(SF_PROC_NAME, e(map_name(src, PROC_EXE_STR), PROC_EXE_STR, K::SpecialStr, S::Proc, None));
    m.insert(SF_PROC_EXE, e(map_str_col(src, PROC_EXE_STR), PROC_EXE_STR, K::Str, S::Proc, None));
    m.insert(SF_PROC_ARGS, e(map_str_col(src, PROC_EXEARGS_STR), PROC_EXEARGS_STR, K::Str, S::Proc, None));
    m.insert(SF_PROC_UID, e(map_int_col(src, PROC_UID_INT), PROC_UID_INT, K::Int, S::Proc, None));
    m.insert(SF_PROC_USER, e(map_str_col(src, PROC_USERNAME_STR), PROC_USERNAME_STR, K::Str, S::Proc, None));
    m.insert(SF_PROC_TID, e(map_int_col(src, TID_INT), TID_INT, K::Int, S::Proc, None));
    m.insert(SF_PROC_GID, e(map_int_col(src, PROC_GID_INT), PROC_GID_INT, K::Int, S::Proc, None));
    m.insert(SF_PROC_GROUP, e(map_str_col(src, PROC_GROUPNAME_STR), PROC_GROUPNAME_STR, K::Str, S::Proc, None));
    m.insert(SF_PROC_CREATETS, e(map_int_col(src, PROC_OID_CREATETS_INT), PROC_OID_CREATETS_INT, K::Int, S::Proc, None));
    m.insert(SF_PROC_TTY, e(map_bool_view(src, PROC_TTY_INT), PROC_TTY_INT, K::Bool, S::Proc, None));
    m.insert(SF_PROC_ENTRY, e(map_bool_view(src, PROC_ENTRY_INT), PROC_ENTRY_INT, K::Bool, S::Proc, None));
    m.insert(SF_PROC_CMDLINE, e(map_join(src, CMDLINE_ATTRS), PROC_EXE_STR, K::SpecialStr, S::Proc, None));
    m.insert(SF_PROC_ANAME, e(map_cached(AuxAttr::ProcAName), PROC_OID_HPID_INT, K::StrArray, S::Proc, Some(AuxAttr::ProcAName)));
    m.insert(SF_PROC_AEXE, e(map_cached(AuxAttr::ProcAExe), PROC_OID_HPID_INT, K::StrArray, S::Proc, Some(AuxAttr::ProcAExe)));
    m.insert(SF_PROC_ACMDLINE, e(map_cached(AuxAttr::ProcACmdLine), PROC_OID_HPID_INT, K::StrArray, S::Proc, Some(AuxAttr::ProcACmdLine)));
    m.insert(SF_PROC_APID, e(map_cached(AuxAttr::ProcAPid), PROC_OID_HPID_INT, K::IntArray, S::Proc, Some(AuxAttr::ProcAPid)));

    // 부모 프로세스
    m.insert(SF_PPROC_OID, e(map_oid(src, PPROC_OID_ATTRS), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, None));
    m.insert(SF_PPROC_PID, e(map_int_col(src, PROC_POID_HPID_INT), PROC_POID_HPID_INT, K::Int, S::PProc, None));
    m.insert(SF_PPROC_NAME, e(map_cached(AuxAttr::PProcName), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, Some(AuxAttr::PProcName)));
    m.insert(SF_PPROC_EXE, e(map_cached(AuxAttr::PProcExe), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, Some(AuxAttr::PProcExe)));
    m.insert(SF_PPROC_ARGS, e(map_cached(AuxAttr::PProcArgs), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, Some(AuxAttr::PProcArgs)));
    m.insert(SF_PPROC_UID, e(map_cached(AuxAttr::PProcUid), PROC_POID_HPID_INT, K::SpecialInt, S::PProc, Some(AuxAttr::PProcUid)));
    m.insert(SF_PPROC_USER, e(map_cached(AuxAttr::PProcUser), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, Some(AuxAttr::PProcUser)));
    m.insert(SF_PPROC_GID, e(map_cached(AuxAttr::PProcGid), PROC_POID_HPID_INT, K::SpecialInt, S::PProc, Some(AuxAttr::PProcGid)));
    m.insert(SF_PPROC_GROUP, e(map_cached(AuxAttr::PProcGroup), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, Some(AuxAttr::PProcGroup)));
    m.insert(SF_PPROC_CREATETS, e(map_int_col(src, PROC_POID_CREATETS_INT), PROC_POID_CREATETS_INT, K::Int, S::PProc, None));
    m.insert(SF_PPROC_TTY, e(map_cached(AuxAttr::PProcTty), PROC_POID_HPID_INT, K::SpecialBool, S::PProc, Some(AuxAttr::PProcTty)));
    m.insert(SF_PPROC_ENTRY, e(map_cached(AuxAttr::PProcEntry), PROC_POID_HPID_INT, K::SpecialBool, S::PProc, Some(AuxAttr::PProcEntry)));
    m.insert(SF_PPROC_CMDLINE, e(map_cached(AuxAttr::PProcCmdLine), PROC_POID_HPID_INT, K::SpecialStr, S::PProc, Some(AuxAttr::PProcCmdLine)));

    // 파일
    m.insert(SF_FILE_NAME, e(map_name(src, FILE_PATH_STR), FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_PATH, e(map_path(src, FILE_PATH_STR), FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_SYMLINK, e(map_symlink(src, FILE_PATH_STR), FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_OID, e(map_str_col(src, FILE_OID_STR), FILE_OID_STR, K::Str, S::File, None));
    m.insert(SF_FILE_DIRECTORY, e(map_dir(src, FILE_PATH_STR), FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_NEWNAME, e(map_name(src, SEC_FILE_PATH_STR), SEC_FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_NEWPATH, e(map_path(src, SEC_FILE_PATH_STR), SEC_FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_NEWSYMLINK, e(map_symlink(src, SEC_FILE_PATH_STR), SEC_FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_NEWOID, e(map_str_col(src, SEC_FILE_OID_STR), SEC_FILE_OID_STR, K::Str, S::File, None));
    m.insert(SF_FILE_NEWDIRECTORY, e(map_dir(src, SEC_FILE_PATH_STR), SEC_FILE_PATH_STR, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_TYPE, e(map_file_type(src, FILE_RESTYPE_INT), FILE_RESTYPE_INT, K::SpecialStr, S::File, None));
    m.insert(SF_FILE_IS_OPEN_WRITE, e(map_is_open_write(src, FL_FILE_OPENFLAGS_INT), FL_FILE_OPENFLAGS_INT, K::SpecialBool, S::File, None));
    m.insert(SF_FILE_IS_OPEN_READ, e(map_is_open_read(src, FL_FILE_OPENFLAGS_INT), FL_FILE_OPENFLAGS_INT, K::SpecialBool, S::File, None));
    m.insert(SF_FILE_FD, e(map_int_col(src, FL_FILE_FD_INT), FL_FILE_FD_INT, K::Int, S::File, None));
    m.insert(SF_FILE_OPENFLAGS, e(map_open_flags(src, FL_FILE_OPENFLAGS_INT), FL_FILE_OPENFLAGS_INT, K::StrArray, S::File, None));

    // 네트워크
    m.insert(SF_NET_PROTO, e(map_int_col(src, FL_NETW_PROTO_INT), FL_NETW_PROTO_INT, K::Int, S::Net, None));
    m.insert(SF_NET_SPORT, e(map_int_col(src, FL_NETW_SPORT_INT), FL_NETW_SPORT_INT, K::Int, S::Net, None));
    m.insert(SF_NET_DPORT, e(map_int_col(src, FL_NETW_DPORT_INT), FL_NETW_DPORT_INT, K::Int, S::Net, None));
    m.insert(SF_NET_PORT, e(map_port(src, PORT_ATTRS), FL_NETW_SPORT_INT, K::StrArray, S::Net, None));
    m.insert(SF_NET_SIP, e(map_ip(src, SIP_ATTRS), FL_NETW_SIP_INT, K::SpecialStr, S::Net, None));
    m.insert(SF_NET_DIP, e(map_ip(src, DIP_ATTRS), FL_NETW_DIP_INT, K::SpecialStr, S::Net, None));
    m.insert(SF_NET_IP, e(map_ip(src, IP_ATTRS), FL_NETW_SIP_INT, K::StrArray, S::Net, None));

    // 플로우 (파일/네트워크 중 정확히 하나만 0이 아님)
    m.insert(SF_FLOW_RBYTES, e(map_sum(src, RBYTES_ATTRS), FL_FILE_NUMRRECVBYTES_INT, K::SpecialInt, S::Flow, None));
    m.insert(SF_FLOW_ROPS, e(map_sum(src, ROPS_ATTRS), FL_FILE_NUMRRECVOPS_INT, K::SpecialInt, S::Flow, None));
    m.insert(SF_FLOW_WBYTES, e(map_sum(src, WBYTES_ATTRS), FL_FILE_NUMWSENDBYTES_INT, K::SpecialInt, S::Flow, None));
    m.insert(SF_FLOW_WOPS, e(map_sum(src, WOPS_ATTRS), FL_FILE_NUMWSENDOPS_INT, K::SpecialInt, S::Flow, None));

    // 컨테이너
    m.insert(SF_CONTAINER_ID, e(map_str_col(src, CONT_ID_STR), CONT_ID_STR, K::Str, S::Cont, None));
    m.insert(SF_CONTAINER_NAME, e(map_str_col(src, CONT_NAME_STR), CONT_NAME_STR, K::Str, S::Cont, None));
    m.insert(SF_CONTAINER_IMAGEID, e(map_str_col(src, CONT_IMAGEID_STR), CONT_IMAGEID_STR, K::Str, S::Cont, None));
    m.insert(SF_CONTAINER_IMAGE, e(map_str_col(src, CONT_IMAGE_STR), CONT_IMAGE_STR, K::Str, S::Cont, None));
    m.insert(SF_CONTAINER_TYPE, e(map_cont_type(src, CONT_TYPE_INT), CONT_TYPE_INT, K::SpecialStr, S::Cont, None));
    m.insert(SF_CONTAINER_PRIVILEGED, e(map_int_col(src, CONT_PRIVILEGED_INT), CONT_PRIVILEGED_INT, K::Int, S::Cont, None));

    // 파드
    m.insert(SF_POD_TS, e(map_int_col(src, POD_TS_INT), POD_TS_INT, K::Int, S::Pod, None));
    m.insert(SF_POD_ID, e(map_str_col(src, POD_ID_STR), POD_ID_STR, K::Str, S::Pod, None));
    m.insert(SF_POD_NAME, e(map_str_col(src, POD_NAME_STR), POD_NAME_STR, K::Str, S::Pod, None));
    m.insert(SF_POD_NODENAME, e(map_str_col(src, POD_NODENAME_STR), POD_NODENAME_STR, K::Str, S::Pod, None));
    m.insert(SF_POD_NAMESPACE, e(map_str_col(src, POD_NAMESPACE_STR), POD_NAMESPACE_STR, K::Str, S::Pod, None));
    m.insert(SF_POD_RESTARTCOUNT, e(map_int_col(src, POD_RESTARTCOUNT_INT), POD_RESTARTCOUNT_INT, K::Int, S::Pod, None));
    m.insert(SF_POD_HOSTIP_JSON, e(map_str_col(src, POD_HOSTIP_STR), POD_HOSTIP_STR, K::Str, S::None, None));
    m.insert(SF_POD_HOSTIP, e(map_int_array_col(src, POD_HOSTIP_ANY), POD_HOSTIP_ANY, K::IntArray, S::Pod, None));
    m.insert(SF_POD_INTERNALIP_JSON, e(map_str_col(src, POD_INTERNALIP_STR), POD_INTERNALIP_STR, K::Str, S::None, None));
    m.insert(SF_POD_INTERNALIP, e(map_int_array_col(src, POD_INTERNALIP_ANY), POD_INTERNALIP_ANY, K::IntArray, S::Pod, None));
    m.insert(SF_POD_SERVICES_JSON, e(map_str_col(src, POD_SERVICES_STR), POD_SERVICES_STR, K::Str, S::None, None));
    m.insert(SF_POD_SERVICES, e(map_svc_array_col(src, POD_SERVICES_ANY), POD_SERVICES_ANY, K::SvcArray, S::Pod, None));

    // 쿠버네티스 이벤트
    m.insert(SF_K8SE_ACTION, e(map_k8s_action(src, K8SE_ACTION_INT), K8SE_ACTION_INT, K::SpecialStr, S::K8sEvt, None));
    m.insert(SF_K8SE_KIND, e(map_k8s_kind(src, K8SE_KIND_INT), K8SE_KIND_INT, K::SpecialStr, S::K8sEvt, None));
    m.insert(SF_K8SE_MESSAGE, e(map_str_col(src, K8SE_MESSAGE_STR), K8SE_MESSAGE_STR, K::Str, S::K8sEvt, None));

    // 노드/메타
    m.insert(SF_NODE_ID, e(map_str_col(src, NODE_EXPORTER_STR), NODE_EXPORTER_STR, K::Str, S::Node, None));
    m.insert(SF_NODE_IP, e(map_str_col(src, NODE_IP_STR), NODE_IP_STR, K::Str, S::Node, None));
    m.insert(SF_SCHEMA_VERSION, e(map_int_col(src, SCHEMA_VERSION_INT), SCHEMA_VERSION_INT, K::Int, S::Meta, None));
    m.insert(SF_TRACENAME, e(map_name(src, TRACE_FILENAME_STR), TRACE_FILENAME_STR, K::SpecialStr, S::Meta, None));

    m
}

/// 비공개(질의 전용) 별칭 테이블
///
/// 외부 규칙 문법과의 호환을 위한 별칭입니다. 공개 테이블과 키가
/// 겹치면 공개 항목이 우선합니다.
fn non_exported_mappers() -> HashMap<&'static str, FieldEntry> {
    use crate::mapper::MappingKind as K;
    use flowsentry_core::schema::*;
    let src = Source::SysFlow;

    const PORT_ATTRS: &[Attr] = &[FL_NETW_SPORT_INT, FL_NETW_DPORT_INT];
    const IP_ATTRS: &[Attr] = &[FL_NETW_SIP_INT, FL_NETW_DIP_INT];
    const SIP_ATTRS: &[Attr] = &[FL_NETW_SIP_INT];
    const DIP_ATTRS: &[Attr] = &[FL_NETW_DIP_INT];
    const CMDLINE_ATTRS: &[Attr] = &[PROC_EXE_STR, PROC_EXEARGS_STR];

    let e = |map: FieldMap| FieldEntry {
        map,
        flat_index: 0,
        kind: K::SpecialStr,
        source: src,
        section: Section::None,
        aux: None,
    };

    let mut m: HashMap<&'static str, FieldEntry> = HashMap::new();
    m.insert("evt.type", e(map_op_flags(src)));
    m.insert("evt.rawtime", e(map_int_col(src, TS_INT)));
    m.insert("evt.rawres", e(map_rec_type(src)));
    m.insert("evt.is_open_read", e(map_is_open_read(src, FL_FILE_OPENFLAGS_INT)));
    m.insert("evt.is_open_write", e(map_is_open_write(src, FL_FILE_OPENFLAGS_INT)));
    m.insert("fd.typechar", e(map_file_type(src, FILE_RESTYPE_INT)));
    m.insert("fd.directory", e(map_dir(src, FILE_PATH_STR)));
    m.insert("fd.name", e(map_name(src, FILE_PATH_STR)));
    m.insert("fd.filename", e(map_name(src, FILE_PATH_STR)));
    m.insert("fd.proto", e(map_int_col(src, FL_NETW_PROTO_INT)));
    m.insert("fd.sport", e(map_int_col(src, FL_NETW_SPORT_INT)));
    m.insert("fd.dport", e(map_int_col(src, FL_NETW_DPORT_INT)));
    m.insert("fd.sip", e(map_ip(src, SIP_ATTRS)));
    m.insert("fd.dip", e(map_ip(src, DIP_ATTRS)));
    m.insert("fd.ip", e(map_ip(src, IP_ATTRS)));
    m.insert("fd.port", e(map_port(src, PORT_ATTRS)));
    m.insert("fd.num", e(map_int_col(src, FL_FILE_FD_INT)));
    m.insert("user.name", e(map_str_col(src, PROC_USERNAME_STR)));
    m.insert("proc.pid", e(map_int_col(src, PROC_OID_HPID_INT)));
    m.insert("proc.tid", e(map_int_col(src, TID_INT)));
    m.insert("proc.uid", e(map_int_col(src, PROC_UID_INT)));
    m.insert("proc.gid", e(map_int_col(src, PROC_GID_INT)));
    m.insert("proc.exe", e(map_str_col(src, PROC_EXE_STR)));
    m.insert("proc.name", e(map_name(src, PROC_EXE_STR)));
    m.insert("proc.args", e(map_str_col(src, PROC_EXEARGS_STR)));
    m.insert("proc.cmdline", e(map_join(src, CMDLINE_ATTRS)));
    m.insert("proc.aname", e(map_cached(AuxAttr::ProcAName)));
    m.insert("proc.apid", e(map_cached(AuxAttr::ProcAPid)));
    m.insert("proc.ppid", e(map_int_col(src, PROC_POID_HPID_INT)));
    m.insert("proc.pname", e(map_cached(AuxAttr::PProcName)));
    m.insert("proc.pcmdline", e(map_cached(AuxAttr::PProcCmdLine)));
    m.insert("container.id", e(map_str_col(src, CONT_ID_STR)));
    m.insert("container.name", e(map_str_col(src, CONT_NAME_STR)));
    m.insert("container.image.id", e(map_str_col(src, CONT_IMAGEID_STR)));
    m.insert("container.image", e(map_str_col(src, CONT_IMAGE_STR)));
    m.insert("container.type", e(map_cont_type(src, CONT_TYPE_INT)));
    m.insert("container.privileged", e(map_int_col(src, CONT_PRIVILEGED_INT)));
    m
}
