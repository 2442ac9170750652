//! 정책 모니터 — 정책 디렉토리를 폴링하여 새 인터프리터를 준비합니다.
//!
//! 핫 리로드는 의도적으로 거친 단위입니다: 개별 규칙을 고치는 대신
//! 디렉토리에 변화가 있으면 정책 전체를 다시 컴파일하여 새
//! 인터프리터를 채널에 넣어둡니다. 엔진의 디스패치 루프가 폴링
//! 주기마다 [`PolicyMonitor::try_take`]로 꺼내어 통째로 교체합니다.
//! 컴파일에 실패하면 기존 인터프리터가 유지됩니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flowsentry_core::record::Record;

use crate::actions::ActionHandler;
use crate::compiler::PolicyCompiler;
use crate::config::EngineConfig;
use crate::interpreter::PolicyInterpreter;

/// 정책 디렉토리의 변경 지문 — (.yaml 경로, 수정 시각, 크기) 목록
type Fingerprint = Vec<(PathBuf, Option<SystemTime>, u64)>;

/// 정책 디렉토리 폴링 모니터
pub struct PolicyMonitor {
    rx: mpsc::Receiver<PolicyInterpreter>,
    shutdown: CancellationToken,
}

impl PolicyMonitor {
    /// 모니터 태스크를 시작합니다.
    ///
    /// 전달된 설정/액션/출력 채널은 새로 컴파일되는 인터프리터
    /// 구성에 사용됩니다.
    pub fn start(
        config: EngineConfig,
        actions: Arc<ActionHandler>,
        out: mpsc::Sender<Record>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let task_shutdown = shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.monitor_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // 시작 시점의 지문을 기준으로 이후 변화만 감지합니다
            let mut last = fingerprint(&config.policies).await;

            loop {
                tokio::select! {
                    _ = task_shutdown.cancelled() => {
                        tracing::debug!("policy monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let current = fingerprint(&config.policies).await;
                if current == last {
                    continue;
                }
                tracing::info!(
                    dir = %config.policies.display(),
                    "policy directory changed, recompiling"
                );
                last = current;

                match PolicyCompiler::compile_dir(&config.policies).await {
                    Ok(compiled) => {
                        let pi = PolicyInterpreter::new(
                            &config,
                            compiled,
                            Arc::clone(&actions),
                            out.clone(),
                        );
                        // 아직 수거되지 않은 이전 인터프리터는 버리고 최신 것만 남깁니다
                        if tx.try_send(pi).is_err() {
                            tracing::debug!("previous interpreter not yet collected, skipping");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "policy recompilation failed, keeping old interpreter");
                    }
                }
            }
        });

        Self { rx, shutdown }
    }

    /// 준비된 새 인터프리터가 있으면 꺼냅니다. 블록하지 않습니다.
    pub fn try_take(&mut self) -> Option<PolicyInterpreter> {
        self.rx.try_recv().ok()
    }

    /// 모니터 태스크를 종료합니다.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for PolicyMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// 디렉토리의 `.yaml` 파일 지문을 수집합니다.
async fn fingerprint(dir: &std::path::Path) -> Fingerprint {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut fp = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "yaml") {
            continue;
        }
        if let Ok(meta) = entry.metadata().await {
            fp.push((path, meta.modified().ok(), meta.len()));
        }
    }
    fp.sort();
    fp
}
