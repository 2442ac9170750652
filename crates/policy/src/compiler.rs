//! 정책 컴파일러 — 선언을 파싱하고 술어 트리를 구축합니다.
//!
//! 정책 파일은 `list`/`macro`/`filter`/`rule` 선언의 YAML 문서이고,
//! 각 선언의 `condition` 문자열은 조건식 언어([`crate::lang`])로
//! 파싱됩니다. 컴파일은 두 패스로 진행됩니다.
//!
//! 1. **프리 패스**: 모든 파일의 리스트/매크로 정의를 수집합니다.
//!    정의 전 참조(전방 참조)를 해결하기 위함입니다.
//! 2. **메인 패스**: 필터와 규칙을 선언 순서대로 방문하며 술어를
//!    구축합니다. 매크로 참조는 캐시된 표현식 트리로 해석되어 제자리에서
//!    다시 방문되고, `in`/`pmatch`의 리스트 참조는 재귀적으로
//!    평탄화됩니다.
//!
//! 진단이 하나라도 수집되면 컴파일은 요약과 함께 실패하고, 개별
//! 진단은 로그로 출력됩니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use flowsentry_core::record::Record;
use flowsentry_core::schema::LIST_SEP;
use flowsentry_core::types::Priority;

use crate::error::PolicyError;
use crate::lang::{self, BinOp, ErrorSink, Expr};
use crate::mapper::trim_bounding_quotes;
use crate::ops;
use crate::predicate::Criterion;
use crate::types::{Filter, Rule};

/// 매크로/리스트 전개 깊이 한계 — 순환 참조를 컴파일 에러로 만듭니다.
const MAX_EXPANSION_DEPTH: usize = 32;

/// 대괄호 리스트 리터럴 (`[a, b]`) 패턴
fn items_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(.*)\]$").expect("static regex"))
}

/// 컴파일된 정책 묶음
///
/// 규칙과 필터는 선언 순서를 보존합니다: 파일 안에서는 선언 순서,
/// 파일 간에는 전달된 순서입니다.
#[derive(Debug, Default)]
pub struct CompiledPolicy {
    /// 컴파일된 규칙 (선언 순서)
    pub rules: Vec<Rule>,
    /// 컴파일된 필터 (선언 순서)
    pub filters: Vec<Filter>,
}

/// YAML 리스트 또는 `[a, b]` 형태의 문자열 리터럴
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringList {
    List(Vec<String>),
    Bracketed(String),
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(v) => v,
            Self::Bracketed(s) => {
                let inner = items_re().replace(s.trim(), "$1").into_owned();
                inner
                    .split(LIST_SEP)
                    .map(|i| trim_bounding_quotes(i.trim()).to_owned())
                    .filter(|i| !i.is_empty())
                    .collect()
            }
        }
    }
}

/// 정책 선언 원형 (역직렬화 전용)
#[derive(Debug, Deserialize)]
struct RawDecl {
    #[serde(default)]
    rule: Option<String>,
    #[serde(default, rename = "macro")]
    macro_name: Option<String>,
    #[serde(default)]
    list: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    items: Option<StringList>,
    #[serde(default)]
    action: Option<StringList>,
    #[serde(default)]
    tags: Option<StringList>,
    #[serde(default)]
    prefilter: Option<StringList>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    enabled: Option<serde_yaml::Value>,
}

/// 정책 컴파일러
///
/// 파싱 보조 맵(리스트, 매크로)은 컴파일 동안만 존재합니다. 생성된
/// [`CompiledPolicy`]는 파서 상태에 대한 참조를 갖지 않습니다.
#[derive(Default)]
pub struct PolicyCompiler {
    lists: HashMap<String, Vec<String>>,
    macros: HashMap<String, Expr>,
}

impl PolicyCompiler {
    /// 새 컴파일러를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 디렉토리의 모든 `.yaml` 정책 파일을 컴파일합니다.
    ///
    /// 파일은 사전순으로 적용됩니다. 정책 파일이 하나도 없으면
    /// 에러입니다.
    pub async fn compile_dir(dir: impl AsRef<Path>) -> Result<CompiledPolicy, PolicyError> {
        let dir = dir.as_ref();
        let paths = list_policy_files(dir).await?;
        if paths.is_empty() {
            return Err(PolicyError::Load {
                path: dir.display().to_string(),
                reason: "no policy files with extension .yaml found".to_owned(),
            });
        }
        Self::compile_files(&paths).await
    }

    /// 정책 파일 목록을 전달된 순서대로 컴파일합니다.
    pub async fn compile_files(paths: &[PathBuf]) -> Result<CompiledPolicy, PolicyError> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            tracing::debug!(path = %path.display(), "parsing policy file");
            let content =
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| PolicyError::Load {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
            sources.push((path.display().to_string(), content));
        }
        Self::compile_sources(&sources)
    }

    /// (이름, 내용) 쌍 목록에서 정책을 컴파일합니다. 테스트와
    /// 인메모리 정책에 사용됩니다.
    pub fn compile_sources(sources: &[(String, String)]) -> Result<CompiledPolicy, PolicyError> {
        let mut compiler = Self::new();
        let mut sink = ErrorSink::new();

        // 문서 역직렬화
        let mut docs: Vec<(String, Vec<RawDecl>)> = Vec::new();
        for (origin, content) in sources {
            match serde_yaml::from_str::<Vec<RawDecl>>(content) {
                Ok(decls) => docs.push((origin.clone(), decls)),
                Err(e) => sink.push(origin.clone(), None, format!("yaml error: {e}")),
            }
        }

        // 프리 패스: 리스트와 매크로 수집 (전방 참조 해결)
        for (origin, decls) in &docs {
            for decl in decls {
                if let Some(name) = &decl.list {
                    let items = decl
                        .items
                        .clone()
                        .map(StringList::into_vec)
                        .unwrap_or_default();
                    compiler.lists.insert(name.clone(), items);
                } else if let Some(name) = &decl.macro_name {
                    match &decl.condition {
                        Some(cond) => {
                            let tokens = lang::tokenize(cond, name, &mut sink);
                            if let Some(expr) = lang::parse(&tokens, name, &mut sink) {
                                compiler.macros.insert(name.clone(), expr);
                            }
                        }
                        None => sink.push(origin.clone(), None, format!("macro '{name}' has no condition")),
                    }
                }
            }
        }

        // 메인 패스: 필터와 규칙을 선언 순서대로 방문
        let mut compiled = CompiledPolicy::default();
        for (origin, decls) in &docs {
            for decl in decls {
                if let Some(name) = &decl.filter {
                    let condition = compiler.compile_condition(name, decl, origin, &mut sink);
                    compiled.filters.push(Filter {
                        name: name.clone(),
                        condition,
                        enabled: parse_enabled(decl.enabled.as_ref()),
                    });
                } else if let Some(name) = &decl.rule {
                    let condition = compiler.compile_condition(name, decl, origin, &mut sink);
                    compiled.rules.push(Rule {
                        name: name.clone(),
                        desc: decl.desc.clone().unwrap_or_default(),
                        condition,
                        actions: decl.action.clone().map(StringList::into_vec).unwrap_or_default(),
                        tags: decl.tags.clone().map(StringList::into_vec).unwrap_or_default(),
                        priority: parse_priority(decl.priority.as_deref()),
                        prefilter: decl
                            .prefilter
                            .clone()
                            .map(StringList::into_vec)
                            .unwrap_or_default(),
                        enabled: parse_enabled(decl.enabled.as_ref()),
                    });
                }
            }
        }

        if !sink.is_empty() {
            tracing::error!(count = sink.len(), "errors found during policy compilation");
            for issue in sink.issues() {
                tracing::error!(issue = %issue, "compile error");
            }
            return Err(PolicyError::Compile {
                summary: sink.summary(),
            });
        }

        tracing::info!(
            rules = compiled.rules.len(),
            filters = compiled.filters.len(),
            "compiled policies"
        );
        Ok(compiled)
    }

    fn compile_condition(
        &self,
        name: &str,
        decl: &RawDecl,
        origin: &str,
        sink: &mut ErrorSink,
    ) -> Criterion<Record> {
        match &decl.condition {
            Some(cond) => {
                let tokens = lang::tokenize(cond, name, sink);
                match lang::parse(&tokens, name, sink) {
                    Some(expr) => self.visit_expr(&expr, name, sink, 0),
                    None => Criterion::always_false(),
                }
            }
            None => {
                sink.push(origin.to_owned(), None, format!("'{name}' has no condition"));
                Criterion::always_false()
            }
        }
    }

    /// 표현식을 술어로 컴파일합니다. 매크로는 제자리에서 전개됩니다.
    fn visit_expr(
        &self,
        expr: &Expr,
        origin: &str,
        sink: &mut ErrorSink,
        depth: usize,
    ) -> Criterion<Record> {
        if depth > MAX_EXPANSION_DEPTH {
            sink.push(
                origin.to_owned(),
                None,
                "macro expansion too deep (cyclic reference?)".to_owned(),
            );
            return Criterion::always_false();
        }

        match expr {
            Expr::Ident(name) => match self.macros.get(name) {
                Some(inner) => self.visit_expr(inner, origin, sink, depth + 1),
                None => {
                    sink.push(
                        origin.to_owned(),
                        None,
                        format!("unrecognized reference '{name}'"),
                    );
                    Criterion::always_false()
                }
            },
            Expr::Exists(attr) => ops::exists(attr),
            Expr::Binary { op, lhs, rhs } => match op {
                BinOp::Eq => ops::eq(lhs, rhs),
                BinOp::NEq => ops::neq(lhs, rhs),
                BinOp::Gt => ops::gt(lhs, rhs),
                BinOp::Ge => ops::ge(lhs, rhs),
                BinOp::Lt => ops::lt(lhs, rhs),
                BinOp::Le => ops::le(lhs, rhs),
                BinOp::Contains => ops::contains(lhs, rhs),
                BinOp::IContains => ops::icontains(lhs, rhs),
                BinOp::StartsWith => ops::starts_with(lhs, rhs),
                BinOp::EndsWith => ops::ends_with(lhs, rhs),
            },
            Expr::InList { attr, items } => {
                let flat = self.flatten_items(items, origin, sink, 0);
                ops::in_list(attr, &flat)
            }
            Expr::PMatch { attr, items } => {
                let flat = self.flatten_items(items, origin, sink, 0);
                ops::pmatch(attr, &flat)
            }
            Expr::Not(inner) => self.visit_expr(inner, origin, sink, depth).not(),
            Expr::And(operands) => Criterion::all(
                operands
                    .iter()
                    .map(|e| self.visit_expr(e, origin, sink, depth))
                    .collect::<Vec<_>>(),
            ),
            Expr::Or(operands) => Criterion::any(
                operands
                    .iter()
                    .map(|e| self.visit_expr(e, origin, sink, depth))
                    .collect::<Vec<_>>(),
            ),
        }
    }

    /// 리스트 참조를 재귀적으로 말단 원소까지 평탄화합니다.
    ///
    /// 리스트의 리스트는 말단 원소로 펼쳐집니다. 깊이 한계를 넘는
    /// 순환 참조는 컴파일 에러입니다.
    fn flatten_items(
        &self,
        items: &[String],
        origin: &str,
        sink: &mut ErrorSink,
        depth: usize,
    ) -> Vec<String> {
        if depth > MAX_EXPANSION_DEPTH {
            sink.push(
                origin.to_owned(),
                None,
                "list expansion too deep (cyclic reference?)".to_owned(),
            );
            return Vec::new();
        }

        let mut flat = Vec::new();
        for item in items {
            match self.lists.get(item.as_str()) {
                Some(nested) => flat.extend(self.flatten_items(nested, origin, sink, depth + 1)),
                None => flat.push(trim_bounding_quotes(item).to_owned()),
            }
        }
        flat
    }
}

/// 디렉토리에서 `.yaml` 정책 파일 경로를 사전순으로 나열합니다.
async fn list_policy_files(dir: &Path) -> Result<Vec<PathBuf>, PolicyError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| PolicyError::Load {
        path: dir.display().to_string(),
        reason: format!("failed to read directory: {e}"),
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| PolicyError::Load {
        path: dir.display().to_string(),
        reason: format!("failed to read directory entry: {e}"),
    })? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "yaml") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// 텍스트 심각도를 3단계 우선순위로 매핑합니다.
///
/// 알 수 없는 값은 경고를 남기고 `Low`로 내려갑니다.
fn parse_priority(text: Option<&str>) -> Priority {
    let Some(text) = text else {
        return Priority::Low;
    };
    match text.to_lowercase().as_str() {
        "low" | "debug" | "info" | "informational" | "notice" => Priority::Low,
        "medium" | "warning" => Priority::Medium,
        "high" | "error" | "critical" | "emergency" => Priority::High,
        other => {
            tracing::warn!(priority = other, "unrecognized priority value, deferring to low");
            Priority::Low
        }
    }
}

/// enabled 플래그를 파싱합니다.
///
/// 불리언으로 인식되는 텍스트 형태를 허용하고, 인식되지 않는 값은
/// 경고를 남기고 `true`입니다.
fn parse_enabled(value: Option<&serde_yaml::Value>) -> bool {
    match value {
        None => true,
        Some(serde_yaml::Value::Bool(b)) => *b,
        Some(serde_yaml::Value::String(s)) => {
            match trim_bounding_quotes(s) {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
                "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
                other => {
                    tracing::warn!(flag = other, "unrecognized enabled flag, defaulting to true");
                    true
                }
            }
        }
        Some(serde_yaml::Value::Number(n)) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => {
                tracing::warn!(flag = %n, "unrecognized enabled flag, defaulting to true");
                true
            }
        },
        Some(other) => {
            tracing::warn!(flag = ?other, "unrecognized enabled flag, defaulting to true");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsentry_core::record::Source;
    use flowsentry_core::schema::{self, RecordType};

    fn compile(content: &str) -> Result<CompiledPolicy, PolicyError> {
        PolicyCompiler::compile_sources(&[("test.yaml".to_owned(), content.to_owned())])
    }

    fn pe_record(exe: &str) -> Record {
        let mut r = Record::new();
        r.set_int(schema::SF_REC_TYPE, Source::SysFlow, RecordType::ProcEvt as i64);
        r.set_str(schema::PROC_EXE_STR, Source::SysFlow, exe);
        r
    }

    #[test]
    fn compiles_simple_rule() {
        let policy = compile(
            r#"
- rule: proc exec from bin
  desc: process executed from /bin
  condition: sf.type = "PE" and sf.proc.exe contains "/bin/"
  priority: warning
  tags: [process]
"#,
        )
        .unwrap();
        assert_eq!(policy.rules.len(), 1);
        let rule = &policy.rules[0];
        assert_eq!(rule.priority, Priority::Medium);
        assert!(rule.enabled);
        assert!(rule.condition.eval(&pe_record("/usr/bin/bash")).unwrap());
        assert!(!rule.condition.eval(&pe_record("/opt/app")).unwrap());
    }

    #[test]
    fn forward_macro_reference_resolves() {
        // 매크로가 규칙 뒤에 정의되어도 프리 패스 덕분에 해결됩니다
        let policy = compile(
            r#"
- rule: shell spawned
  desc: shell binary executed
  condition: is_shell
  priority: high

- macro: is_shell
  condition: sf.proc.exe in (shell_binaries)

- list: shell_binaries
  items: [/bin/sh, /bin/bash]
"#,
        )
        .unwrap();
        let rule = &policy.rules[0];
        assert!(rule.condition.eval(&pe_record("/bin/sh")).unwrap());
        assert!(!rule.condition.eval(&pe_record("/bin/zsh")).unwrap());
    }

    #[test]
    fn nested_lists_flatten_to_leaves() {
        let policy = compile(
            r#"
- list: shells
  items: [/bin/sh, /bin/bash]

- list: interpreters
  items: [shells, /usr/bin/python3]

- rule: interpreter spawned
  desc: interpreter executed
  condition: sf.proc.exe in (interpreters)
"#,
        )
        .unwrap();
        let rule = &policy.rules[0];
        assert!(rule.condition.eval(&pe_record("/bin/bash")).unwrap());
        assert!(rule.condition.eval(&pe_record("/usr/bin/python3")).unwrap());
        assert!(!rule.condition.eval(&pe_record("/usr/bin/perl")).unwrap());
    }

    #[test]
    fn bracketed_items_literal() {
        let policy = compile(
            r#"
- list: bins
  items: '["/bin/sh", "/bin/bash"]'

- rule: shell
  desc: shell
  condition: sf.proc.exe in (bins)
"#,
        )
        .unwrap();
        assert!(policy.rules[0].condition.eval(&pe_record("/bin/bash")).unwrap());
    }

    #[test]
    fn compiles_filter() {
        let policy = compile(
            r#"
- filter: drop dns
  condition: sf.net.dport = 53
"#,
        )
        .unwrap();
        assert_eq!(policy.filters.len(), 1);
        assert!(policy.filters[0].enabled);

        let mut r = Record::new();
        r.set_int(schema::FL_NETW_DPORT_INT, Source::SysFlow, 53);
        assert!(policy.filters[0].condition.eval(&r).unwrap());
    }

    #[test]
    fn unknown_reference_fails_compilation() {
        let err = compile(
            r#"
- rule: broken
  desc: refers to a macro that does not exist
  condition: no_such_macro
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));
    }

    #[test]
    fn syntax_error_fails_compilation() {
        let err = compile(
            r#"
- rule: broken
  desc: bad condition
  condition: sf.type =
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));
    }

    #[test]
    fn cyclic_list_reference_fails_compilation() {
        let err = compile(
            r#"
- list: a
  items: [b]

- list: b
  items: [a]

- rule: cyclic
  desc: cyclic list
  condition: sf.proc.exe in (a)
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Compile { .. }));
    }

    #[test]
    fn rule_order_is_stable() {
        let policy = PolicyCompiler::compile_sources(&[
            (
                "b.yaml".to_owned(),
                "- rule: second file rule\n  desc: d\n  condition: sf.type = \"PE\"\n".to_owned(),
            ),
            (
                "a.yaml".to_owned(),
                "- rule: third file rule\n  desc: d\n  condition: sf.type = \"PE\"\n".to_owned(),
            ),
        ])
        .unwrap();
        // 파일은 전달된 순서대로 적용됩니다
        assert_eq!(policy.rules[0].name, "second file rule");
        assert_eq!(policy.rules[1].name, "third file rule");
    }

    #[test]
    fn priority_table() {
        for (text, expected) in [
            ("debug", Priority::Low),
            ("info", Priority::Low),
            ("informational", Priority::Low),
            ("notice", Priority::Low),
            ("warning", Priority::Medium),
            ("error", Priority::High),
            ("critical", Priority::High),
            ("emergency", Priority::High),
            ("medium", Priority::Medium),
            ("HIGH", Priority::High),
            ("unknown-level", Priority::Low),
        ] {
            assert_eq!(parse_priority(Some(text)), expected, "priority '{text}'");
        }
        assert_eq!(parse_priority(None), Priority::Low);
    }

    #[test]
    fn enabled_flag_forms() {
        use serde_yaml::Value;
        assert!(parse_enabled(None));
        assert!(parse_enabled(Some(&Value::Bool(true))));
        assert!(!parse_enabled(Some(&Value::Bool(false))));
        assert!(parse_enabled(Some(&Value::String("true".to_owned()))));
        assert!(!parse_enabled(Some(&Value::String("F".to_owned()))));
        assert!(!parse_enabled(Some(&Value::String("0".to_owned()))));
        // 인식되지 않는 값은 true
        assert!(parse_enabled(Some(&Value::String("maybe".to_owned()))));
    }

    #[test]
    fn disabled_rule_is_kept_but_marked() {
        let policy = compile(
            r#"
- rule: disabled rule
  desc: d
  condition: sf.type = "PE"
  enabled: false
"#,
        )
        .unwrap();
        assert!(!policy.rules[0].enabled);
    }

    #[test]
    fn compile_is_idempotent() {
        let source = r#"
- list: bins
  items: [/bin/sh, /bin/bash]

- macro: is_shell
  condition: sf.proc.exe in (bins)

- rule: shell
  desc: shell spawned
  condition: is_shell and sf.type = "PE"
  priority: medium
"#;
        let a = compile(source).unwrap();
        let b = compile(source).unwrap();
        for exe in ["/bin/sh", "/bin/bash", "/bin/zsh", ""] {
            let r = pe_record(exe);
            assert_eq!(
                a.rules[0].condition.eval(&r).unwrap(),
                b.rules[0].condition.eval(&r).unwrap(),
                "match decision must be identical for exe '{exe}'"
            );
        }
    }

    #[tokio::test]
    async fn compile_dir_requires_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = PolicyCompiler::compile_dir(dir.path()).await.unwrap_err();
        assert!(matches!(err, PolicyError::Load { .. }));
    }

    #[tokio::test]
    async fn compile_dir_reads_sorted_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("10-second.yaml"),
            "- rule: r2\n  desc: d\n  condition: sf.type = \"PE\"\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            dir.path().join("00-first.yaml"),
            "- rule: r1\n  desc: d\n  condition: sf.type = \"PE\"\n",
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("ignored.txt"), "not a policy")
            .await
            .unwrap();

        let policy = PolicyCompiler::compile_dir(dir.path()).await.unwrap();
        assert_eq!(policy.rules.len(), 2);
        assert_eq!(policy.rules[0].name, "r1");
        assert_eq!(policy.rules[1].name, "r2");
    }
}
