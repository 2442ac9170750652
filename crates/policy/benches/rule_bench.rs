//! 규칙 평가 벤치마크
//!
//! 단일/다중 규칙 평가 성능과 스케일링, 정책 컴파일 비용을 측정합니다.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use flowsentry_core::record::{Record, Source};
use flowsentry_core::schema::{self, RecordType};
use flowsentry_policy::{PolicyCompiler, PolicyInterpreter};
use flowsentry_policy::{ActionHandler, EngineConfig, Mode};

fn pe_record(exe: &str) -> Record {
    let mut r = Record::new();
    r.set_int(schema::SF_REC_TYPE, Source::SysFlow, RecordType::ProcEvt as i64);
    r.set_str(schema::PROC_EXE_STR, Source::SysFlow, exe);
    r.set_str(schema::PROC_EXEARGS_STR, Source::SysFlow, "-c ls");
    r
}

fn compile_policy(content: &str) -> flowsentry_policy::CompiledPolicy {
    PolicyCompiler::compile_sources(&[("bench.yaml".to_owned(), content.to_owned())]).unwrap()
}

fn interpreter(content: &str) -> PolicyInterpreter {
    let config = EngineConfig {
        mode: Mode::Alert,
        concurrency: 1,
        ..Default::default()
    };
    let (out_tx, _out_rx) = tokio::sync::mpsc::channel(1);
    PolicyInterpreter::new(
        &config,
        compile_policy(content),
        std::sync::Arc::new(ActionHandler::new()),
        out_tx,
    )
}

const SIMPLE_POLICY: &str = r#"
- rule: shell exec
  desc: shell executed
  condition: sf.type = "PE" and sf.proc.exe contains "/bin/"
"#;

const MACRO_POLICY: &str = r#"
- list: bins
  items: [/bin/sh, /bin/bash, /usr/bin/zsh, /usr/bin/fish]

- macro: is_shell
  condition: sf.proc.exe in (bins)

- rule: shell exec
  desc: shell executed
  condition: is_shell and sf.type = "PE" and not sf.proc.args contains "safe"
"#;

fn bench_single_rule_eval(c: &mut Criterion) {
    let pi = interpreter(SIMPLE_POLICY);
    let record = pe_record("/usr/bin/bash");

    let mut group = c.benchmark_group("single_rule");
    group.throughput(Throughput::Elements(1));

    group.bench_function("contains_match", |b| {
        b.iter(|| pi.process(black_box(record.clone())))
    });

    group.finish();
}

fn bench_macro_rule_eval(c: &mut Criterion) {
    let pi = interpreter(MACRO_POLICY);
    let record = pe_record("/bin/bash");

    let mut group = c.benchmark_group("macro_rule");
    group.throughput(Throughput::Elements(1));

    group.bench_function("list_and_macro", |b| {
        b.iter(|| pi.process(black_box(record.clone())))
    });

    group.finish();
}

fn bench_rules_scaling(c: &mut Criterion) {
    let record = pe_record("/usr/bin/bash");

    let mut group = c.benchmark_group("rules_scaling");

    for rule_count in [1usize, 10, 100].iter() {
        let mut policy = String::new();
        for i in 0..*rule_count {
            policy.push_str(&format!(
                "- rule: rule-{i}\n  desc: d\n  condition: sf.type = \"PE\" and sf.proc.exe contains \"/bin/\"\n"
            ));
        }
        let pi = interpreter(&policy);

        group.throughput(Throughput::Elements(*rule_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(rule_count),
            rule_count,
            |b, _| b.iter(|| pi.process(black_box(record.clone()))),
        );
    }

    group.finish();
}

fn bench_field_mapping(c: &mut Criterion) {
    let m = flowsentry_policy::mapper();
    let record = pe_record("/usr/bin/bash");

    let mut group = c.benchmark_group("field_mapping");
    group.throughput(Throughput::Elements(1));

    let exe = m.map_str("sf.proc.exe");
    group.bench_function("map_str_plain", |b| b.iter(|| exe(black_box(&record))));

    let cmdline = m.map_str("sf.proc.cmdline");
    group.bench_function("map_str_join", |b| b.iter(|| cmdline(black_box(&record))));

    let oid = m.map_str("sf.proc.oid");
    group.bench_function("map_str_oid_hash", |b| b.iter(|| oid(black_box(&record))));

    group.finish();
}

fn bench_policy_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_compilation");

    group.bench_function("compile_simple", |b| {
        b.iter(|| compile_policy(black_box(SIMPLE_POLICY)))
    });

    group.bench_function("compile_with_macro_and_list", |b| {
        b.iter(|| compile_policy(black_box(MACRO_POLICY)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_rule_eval,
    bench_macro_rule_eval,
    bench_rules_scaling,
    bench_field_mapping,
    bench_policy_compilation
);
criterion_main!(benches);
