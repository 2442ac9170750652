//! 정책 인터프리터 — 필터/규칙 적용과 워커 풀
//!
//! 레코드별 알고리즘:
//!
//! 1. 활성 **필터**를 순서대로 평가하여 하나라도 참이면 레코드를
//!    드롭합니다.
//! 2. 활성 **규칙**을 선언 순서대로 평가합니다. 규칙은 가산적이어서
//!    매칭될 때마다 메타데이터가 컨텍스트에 추가되고 다음 규칙으로
//!    진행합니다.
//! 3. alert 모드는 매칭된 레코드만, enrich 모드는 필터를 통과한 모든
//!    레코드를 출력 채널로 내보냅니다.
//!
//! 워커 풀은 `concurrency`개의 태스크가 하나의 intake 채널을
//! 공유합니다. 워커 간 순서는 보존되지 않고, 한 워커 안에서는 FIFO
//! 입니다. 출력 채널 용량은 concurrency이며 가득 차면 워커가
//! 블록됩니다 — 레코드는 조용히 버려지지 않습니다.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use flowsentry_core::metrics::{
    ENGINE_EVAL_ERRORS_TOTAL, ENGINE_RECORDS_DROPPED_TOTAL, ENGINE_RECORDS_MATCHED_TOTAL,
};
use flowsentry_core::record::Record;

use crate::actions::ActionHandler;
use crate::compiler::CompiledPolicy;
use crate::config::{EngineConfig, Mode};
use crate::error::PolicyError;
use crate::types::{Filter, Rule};

/// 컴파일된 정책의 실행기
///
/// 컴파일 후에는 불변입니다. 정책 교체는 새 인터프리터를 만들어
/// 통째로 바꾸고 이전 워커 풀을 드레인하는 방식으로 수행됩니다.
pub struct PolicyInterpreter {
    mode: Mode,
    rules: Arc<Vec<Rule>>,
    filters: Arc<Vec<Filter>>,
    actions: Arc<ActionHandler>,
    concurrency: usize,
    out: mpsc::Sender<Record>,
    intake: Option<mpsc::Sender<Record>>,
    workers: Vec<JoinHandle<()>>,
}

impl PolicyInterpreter {
    /// 컴파일된 정책에서 인터프리터를 생성합니다.
    ///
    /// 규칙이 참조하는 미등록 액션은 여기서 경고로 보고됩니다.
    pub fn new(
        config: &EngineConfig,
        policy: CompiledPolicy,
        actions: Arc<ActionHandler>,
        out: mpsc::Sender<Record>,
    ) -> Self {
        actions.check_actions(&policy.rules);
        Self {
            mode: config.mode,
            rules: Arc::new(policy.rules),
            filters: Arc::new(policy.filters),
            actions,
            concurrency: config.concurrency,
            out,
            intake: None,
            workers: Vec::new(),
        }
    }

    /// 실행 모드
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 로드된 규칙 수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 로드된 필터 수
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// 워커 풀을 시작합니다.
    pub fn start_workers(&mut self) {
        tracing::debug!(workers = self.concurrency, "starting policy interpreter worker pool");
        let (tx, rx) = mpsc::channel::<Record>(self.concurrency);
        let rx = Arc::new(Mutex::new(rx));

        for _ in 0..self.concurrency {
            let rx = Arc::clone(&rx);
            let rules = Arc::clone(&self.rules);
            let filters = Arc::clone(&self.filters);
            let actions = Arc::clone(&self.actions);
            let out = self.out.clone();
            let mode = self.mode;
            self.workers.push(tokio::spawn(async move {
                loop {
                    let record = { rx.lock().await.recv().await };
                    let Some(mut record) = record else {
                        tracing::debug!("worker intake closed, shutting down");
                        break;
                    };

                    if eval_filters(&filters, &record) {
                        counter!(ENGINE_RECORDS_DROPPED_TOTAL).increment(1);
                        continue;
                    }

                    let matched = apply_rules(&rules, &actions, mode, &mut record);
                    if matched {
                        counter!(ENGINE_RECORDS_MATCHED_TOTAL).increment(1);
                        if out.send(record).await.is_err() {
                            tracing::warn!("output channel closed, dropping record");
                        }
                    }
                }
            }));
        }

        self.intake = Some(tx);
    }

    /// intake 채널을 닫고 모든 워커가 드레인을 마칠 때까지 기다립니다.
    pub async fn stop_workers(&mut self) {
        tracing::debug!("stopping policy interpreter worker pool");
        self.intake = None;
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "worker task failed");
            }
        }
    }

    /// 레코드를 워커 풀 큐에 넣습니다.
    pub async fn process_async(&self, r: Record) -> Result<(), PolicyError> {
        match &self.intake {
            Some(tx) => tx
                .send(r)
                .await
                .map_err(|_| PolicyError::Channel("worker intake closed".to_owned())),
            None => Err(PolicyError::Channel("workers not started".to_owned())),
        }
    }

    /// 레코드 하나를 동기적으로 처리합니다.
    ///
    /// 드롭되었거나 (alert 모드에서) 매칭이 없으면 `None`입니다.
    pub fn process(&self, mut r: Record) -> Option<Record> {
        if eval_filters(&self.filters, &r) {
            counter!(ENGINE_RECORDS_DROPPED_TOTAL).increment(1);
            return None;
        }
        let matched = apply_rules(&self.rules, &self.actions, self.mode, &mut r);
        if matched {
            Some(r)
        } else {
            None
        }
    }

    /// 활성 필터 중 하나라도 레코드에 매칭되는지 평가합니다.
    pub fn eval_filters(&self, r: &Record) -> bool {
        eval_filters(&self.filters, r)
    }
}

/// 드롭 필터 평가 — 평가 에러는 false로 취급하고 다음 필터로
/// 진행합니다.
fn eval_filters(filters: &[Filter], r: &Record) -> bool {
    for filter in filters {
        if !filter.enabled {
            continue;
        }
        match filter.condition.eval(r) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                counter!(ENGINE_EVAL_ERRORS_TOTAL).increment(1);
                tracing::debug!(filter = %filter.name, error = %e, "filter evaluation failed");
            }
        }
    }
    false
}

/// 활성 규칙을 선언 순서대로 적용하고, 매칭 여부를 반환합니다.
///
/// enrich 모드는 매칭이 없어도 레코드를 내보내므로 `matched`가 참으로
/// 시작합니다. 평가 에러는 해당 규칙만 false로 취급하고 나머지 규칙
/// 평가를 계속합니다.
fn apply_rules(rules: &[Rule], actions: &ActionHandler, mode: Mode, r: &mut Record) -> bool {
    let mut matched = mode == Mode::Enrich;

    for rule in rules {
        if !rule.enabled || !rule.is_applicable(r) {
            continue;
        }
        match rule.condition.eval(r) {
            Ok(true) => {
                r.ctx.set_alert(mode == Mode::Alert);
                r.ctx.add_rule(rule.annotation());
                actions.handle(rule, r);
                matched = true;
            }
            Ok(false) => {}
            Err(e) => {
                counter!(ENGINE_EVAL_ERRORS_TOTAL).increment(1);
                tracing::debug!(rule = %rule.name, error = %e, "rule evaluation failed");
            }
        }
    }

    matched
}
