//! 정책 엔진 — 인터프리터 생명주기와 메인 디스패치 루프
//!
//! 드라이버가 보내는 레코드 채널을 소비하여 인터프리터의 워커 풀에
//! 전달하고, 모니터가 준비한 새 인터프리터를 폴링 주기마다 원자적으로
//! 교체합니다. 입력 채널이 닫히면 워커를 드레인하고 종료합니다.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;

use flowsentry_core::metrics::{ENGINE_RECORDS_TOTAL, ENGINE_RELOADS_TOTAL};
use flowsentry_core::record::Record;

use crate::actions::ActionHandler;
use crate::compiler::PolicyCompiler;
use crate::config::{EngineConfig, Mode, MonitorKind};
use crate::error::PolicyError;
use crate::interpreter::PolicyInterpreter;
use crate::monitor::PolicyMonitor;

/// 정책 엔진
///
/// enrich 모드에서 정책 경로가 비어 있으면 패스스루로 동작합니다.
/// alert 모드는 컴파일 가능한 정책이 없으면 시작을 거부합니다.
pub struct PolicyEngine {
    config: EngineConfig,
    actions: Arc<ActionHandler>,
    interpreter: Option<PolicyInterpreter>,
    monitor: Option<PolicyMonitor>,
    out_tx: mpsc::Sender<Record>,
}

impl PolicyEngine {
    /// 엔진과 출력 수신 채널을 생성합니다.
    ///
    /// 출력 채널 용량은 워커 수와 같습니다. 가득 차면 워커가 블록되어
    /// 배압이 상류로 전달됩니다.
    pub fn new(config: EngineConfig, actions: ActionHandler) -> (Self, mpsc::Receiver<Record>) {
        let (out_tx, out_rx) = mpsc::channel(config.concurrency);
        (
            Self {
                config,
                actions: Arc::new(actions),
                interpreter: None,
                monitor: None,
                out_tx,
            },
            out_rx,
        )
    }

    /// 정책을 컴파일하고 워커 풀과 모니터를 시작합니다.
    pub async fn init(&mut self) -> Result<(), PolicyError> {
        if self.config.policies.as_os_str().is_empty() {
            return match self.config.mode {
                Mode::Enrich => {
                    tracing::info!("no policies configured, engine runs in passthrough mode");
                    Ok(())
                }
                Mode::Alert => Err(PolicyError::Load {
                    path: String::new(),
                    reason: "configuration attribute 'policies' missing in alert mode".to_owned(),
                }),
            };
        }

        tracing::info!(
            mode = %self.config.mode,
            dir = %self.config.policies.display(),
            "loading policies"
        );
        let compiled = PolicyCompiler::compile_dir(&self.config.policies).await?;
        let mut interpreter = PolicyInterpreter::new(
            &self.config,
            compiled,
            Arc::clone(&self.actions),
            self.out_tx.clone(),
        );
        interpreter.start_workers();
        self.interpreter = Some(interpreter);

        if self.config.monitor == MonitorKind::Local {
            tracing::info!(
                interval = ?self.config.monitor_interval,
                "starting policy monitor"
            );
            self.monitor = Some(PolicyMonitor::start(
                self.config.clone(),
                Arc::clone(&self.actions),
                self.out_tx.clone(),
            ));
        }

        Ok(())
    }

    /// 현재 인터프리터의 규칙 수 (패스스루면 0)
    pub fn rule_count(&self) -> usize {
        self.interpreter.as_ref().map_or(0, |pi| pi.rule_count())
    }

    /// 메인 디스패치 루프 — 입력 채널이 닫힐 때까지 실행됩니다.
    pub async fn run(&mut self, mut input: mpsc::Receiver<Record>) -> Result<(), PolicyError> {
        let mut expiration = tokio::time::Instant::now() + self.config.monitor_interval;

        while let Some(record) = input.recv().await {
            counter!(ENGINE_RECORDS_TOTAL).increment(1);

            // 새로 컴파일된 인터프리터가 있으면 폴링 주기마다 교체합니다
            if self.monitor.is_some() && tokio::time::Instant::now() >= expiration {
                if let Some(fresh) = self.monitor.as_mut().and_then(PolicyMonitor::try_take) {
                    self.swap_interpreter(fresh).await;
                }
                expiration = tokio::time::Instant::now() + self.config.monitor_interval;
            }

            match &self.interpreter {
                Some(pi) => pi.process_async(record).await?,
                // 패스스루: 레코드를 그대로 전달합니다
                None => {
                    self.out_tx
                        .send(record)
                        .await
                        .map_err(|_| PolicyError::Channel("output channel closed".to_owned()))?;
                }
            }
        }

        tracing::debug!("input channel closed, shutting down policy engine");
        self.shutdown().await;
        Ok(())
    }

    /// 이전 워커 풀을 드레인한 뒤 새 인터프리터로 교체합니다.
    async fn swap_interpreter(&mut self, mut fresh: PolicyInterpreter) {
        tracing::info!(
            rules = fresh.rule_count(),
            filters = fresh.filter_count(),
            "swapping in freshly compiled policy interpreter"
        );
        if let Some(mut old) = self.interpreter.take() {
            old.stop_workers().await;
        }
        fresh.start_workers();
        self.interpreter = Some(fresh);
        counter!(ENGINE_RELOADS_TOTAL).increment(1);
    }

    /// 워커와 모니터를 정리합니다.
    pub async fn shutdown(&mut self) {
        if let Some(mut pi) = self.interpreter.take() {
            pi.stop_workers().await;
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
    }
}
