#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod record;
pub mod schema;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, EngineError, FlowsentryError};

// 설정
pub use config::FlowsentryConfig;

// 레코드
pub use record::{
    AuxAttr, FlatRecord, Oid, ProcessRegistry, Record, RecordContext, Service, Source, Value,
};

// 스키마
pub use schema::RecordType;

// 도메인 타입
pub use types::{HashKind, HashSet, Priority, RuleAnnotation};
