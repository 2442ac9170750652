//! 연산 어휘 — 규칙 연산을 충족하는 기본 술어 빌더
//!
//! 각 빌더는 컴파일 시점에 매퍼 접근자를 한 번 가져와 클로저에
//! 캡처합니다. 매핑된 값이 리스트 결합 문자열일 수 있으므로, 모든
//! 문자열 비교는 양쪽을 리스트 구분자로 분할한 뒤 어느 한 쌍이라도
//! 만족하면 참입니다. `sf.net.ip`, `sf.opflags` 같은 속성에 대해
//! "어느 원소든 매칭" 의미를 보존합니다.

use flowsentry_core::record::Record;
use flowsentry_core::schema::LIST_SEP;

use crate::mapper::{mapper, trim_bounding_quotes};
use crate::predicate::Criterion;

/// 문자열 비교 연산자 타입
type StrOp = fn(&str, &str) -> bool;

fn op_eq(l: &str, r: &str) -> bool {
    l == r
}

fn op_contains(l: &str, r: &str) -> bool {
    l.contains(r)
}

fn op_icontains(l: &str, r: &str) -> bool {
    l.to_lowercase().contains(&r.to_lowercase())
}

fn op_startswith(l: &str, r: &str) -> bool {
    l.starts_with(r)
}

fn op_endswith(l: &str, r: &str) -> bool {
    l.ends_with(r)
}

/// 양쪽을 리스트 구분자로 분할하여 어느 한 쌍이라도 만족하면 참입니다.
fn eval_str(l: &str, r: &str, op: StrOp) -> bool {
    l.split(LIST_SEP)
        .any(|la| r.split(LIST_SEP).any(|ra| op(la, ra)))
}

/// 존재 술어 — 매핑된 값이 종류별 제로 값이 아니면 참입니다.
pub fn exists(attr: &str) -> Criterion<Record> {
    let m = mapper().map(attr);
    Criterion::new(move |r| Ok(!m(r).is_zero()))
}

fn str_cmp(lattr: &str, rattr: &str, op: StrOp) -> Criterion<Record> {
    let ml = mapper().map_str_checked(lattr);
    let mr = mapper().map_str_checked(rattr);
    Criterion::new(move |r| Ok(eval_str(&ml(r)?, &mr(r)?, op)))
}

/// 문자열 동등 술어
pub fn eq(lattr: &str, rattr: &str) -> Criterion<Record> {
    str_cmp(lattr, rattr, op_eq)
}

/// 문자열 비동등 술어
pub fn neq(lattr: &str, rattr: &str) -> Criterion<Record> {
    eq(lattr, rattr).not()
}

/// 정수 이상(>=) 술어
pub fn ge(lattr: &str, rattr: &str) -> Criterion<Record> {
    let ml = mapper().map_int(lattr);
    let mr = mapper().map_int(rattr);
    Criterion::new(move |r| Ok(ml(r) >= mr(r)))
}

/// 정수 초과(>) 술어
pub fn gt(lattr: &str, rattr: &str) -> Criterion<Record> {
    let ml = mapper().map_int(lattr);
    let mr = mapper().map_int(rattr);
    Criterion::new(move |r| Ok(ml(r) > mr(r)))
}

/// 정수 이하(<=) 술어
pub fn le(lattr: &str, rattr: &str) -> Criterion<Record> {
    gt(lattr, rattr).not()
}

/// 정수 미만(<) 술어
pub fn lt(lattr: &str, rattr: &str) -> Criterion<Record> {
    ge(lattr, rattr).not()
}

/// 부분 문자열 술어
pub fn contains(lattr: &str, rattr: &str) -> Criterion<Record> {
    str_cmp(lattr, rattr, op_contains)
}

/// 대소문자 무시 부분 문자열 술어
pub fn icontains(lattr: &str, rattr: &str) -> Criterion<Record> {
    str_cmp(lattr, rattr, op_icontains)
}

/// 접두사 술어
pub fn starts_with(lattr: &str, rattr: &str) -> Criterion<Record> {
    str_cmp(lattr, rattr, op_startswith)
}

/// 접미사 술어
pub fn ends_with(lattr: &str, rattr: &str) -> Criterion<Record> {
    str_cmp(lattr, rattr, op_endswith)
}

fn list_cmp(attr: &str, list: &[String], op: StrOp) -> Criterion<Record> {
    let m = mapper().map_str_checked(attr);
    let items: Vec<String> = list
        .iter()
        .map(|i| trim_bounding_quotes(i).to_owned())
        .collect();
    Criterion::new(move |r| {
        let v = m(r)?;
        Ok(items.iter().any(|item| eval_str(&v, item, op)))
    })
}

/// 리스트 포함 술어 — 리스트의 어느 원소와든 동등하면 참입니다.
pub fn in_list(attr: &str, list: &[String]) -> Criterion<Record> {
    list_cmp(attr, list, op_eq)
}

/// 리스트 패턴 술어 — 리스트의 어느 원소든 부분 문자열이면 참입니다.
pub fn pmatch(attr: &str, list: &[String]) -> Criterion<Record> {
    list_cmp(attr, list, op_contains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{SF_NET_DPORT, SF_NET_IP, SF_PROC_EXE, SF_TYPE};
    use flowsentry_core::record::Source;
    use flowsentry_core::schema::{self, RecordType};

    fn pe_record(exe: &str) -> Record {
        let mut r = Record::new();
        r.set_int(schema::SF_REC_TYPE, Source::SysFlow, RecordType::ProcEvt as i64);
        r.set_str(schema::PROC_EXE_STR, Source::SysFlow, exe);
        r
    }

    #[test]
    fn eq_compares_mapped_and_literal() {
        let r = pe_record("/bin/sh");
        assert!(eq(SF_PROC_EXE, "/bin/sh").eval(&r).unwrap());
        assert!(eq(SF_TYPE, "\"PE\"").eval(&r).unwrap());
        assert!(!eq(SF_PROC_EXE, "/bin/bash").eval(&r).unwrap());
    }

    #[test]
    fn neq_is_negated_eq() {
        let r = pe_record("/bin/sh");
        assert!(!neq(SF_PROC_EXE, "/bin/sh").eval(&r).unwrap());
        assert!(neq(SF_PROC_EXE, "/bin/bash").eval(&r).unwrap());
    }

    #[test]
    fn integer_comparisons() {
        let mut r = Record::new();
        r.set_int(schema::FL_NETW_DPORT_INT, Source::SysFlow, 443);
        assert!(ge(SF_NET_DPORT, "443").eval(&r).unwrap());
        assert!(gt(SF_NET_DPORT, "80").eval(&r).unwrap());
        assert!(!gt(SF_NET_DPORT, "443").eval(&r).unwrap());
        assert!(le(SF_NET_DPORT, "443").eval(&r).unwrap());
        assert!(lt(SF_NET_DPORT, "1024").eval(&r).unwrap());
        assert!(!lt(SF_NET_DPORT, "443").eval(&r).unwrap());
    }

    #[test]
    fn substring_operators() {
        let r = pe_record("/usr/local/bin/python3");
        assert!(contains(SF_PROC_EXE, "local").eval(&r).unwrap());
        assert!(!contains(SF_PROC_EXE, "LOCAL").eval(&r).unwrap());
        assert!(icontains(SF_PROC_EXE, "LOCAL").eval(&r).unwrap());
        assert!(starts_with(SF_PROC_EXE, "/usr").eval(&r).unwrap());
        assert!(ends_with(SF_PROC_EXE, "python3").eval(&r).unwrap());
    }

    #[test]
    fn exists_checks_zero_values() {
        let r = pe_record("/bin/sh");
        assert!(exists(SF_PROC_EXE).eval(&r).unwrap());
        let empty = Record::new();
        assert!(!exists(SF_PROC_EXE).eval(&empty).unwrap());
    }

    #[test]
    fn in_list_matches_any_element() {
        let r = pe_record("/bin/sh");
        let list = vec!["\"/bin/bash\"".to_owned(), "/bin/sh".to_owned()];
        assert!(in_list(SF_PROC_EXE, &list).eval(&r).unwrap());
        let miss = vec!["/bin/zsh".to_owned()];
        assert!(!in_list(SF_PROC_EXE, &miss).eval(&r).unwrap());
    }

    #[test]
    fn in_singleton_equals_eq_without_separator() {
        let r = pe_record("/bin/sh");
        let list = vec!["/bin/sh".to_owned()];
        assert_eq!(
            in_list(SF_PROC_EXE, &list).eval(&r).unwrap(),
            eq(SF_PROC_EXE, "/bin/sh").eval(&r).unwrap()
        );
    }

    #[test]
    fn pmatch_is_contains_over_list() {
        let r = pe_record("/usr/bin/wget");
        let list = vec!["curl".to_owned(), "wget".to_owned()];
        assert!(pmatch(SF_PROC_EXE, &list).eval(&r).unwrap());
        let miss = vec!["nc".to_owned()];
        assert!(!pmatch(SF_PROC_EXE, &miss).eval(&r).unwrap());
    }

    #[test]
    fn list_valued_attribute_matches_any_element() {
        // sf.net.ip은 양 끝점을 구분자로 결합하여 반환합니다
        let mut r = Record::new();
        r.set_int(schema::FL_NETW_SIP_INT, Source::SysFlow, 0x0100_007f); // 127.0.0.1
        r.set_int(schema::FL_NETW_DIP_INT, Source::SysFlow, 0x0101_a8c0); // 192.168.1.1
        assert!(eq(SF_NET_IP, "192.168.1.1").eval(&r).unwrap());
        assert!(eq(SF_NET_IP, "127.0.0.1").eval(&r).unwrap());
        assert!(!eq(SF_NET_IP, "10.0.0.1").eval(&r).unwrap());
    }
}
