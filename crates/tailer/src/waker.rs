//! Waker — 대기 중인 스트림을 깨우는 동기화 프리미티브
//!
//! 테일러 스트림은 EOF에서 다음 wake 신호까지 잠듭니다.
//! [`TimerWaker`]는 주기 타이머와 외부 nudge를 하나의 브로드캐스트로
//! 다중화합니다. [`TestWaker`]는 테스트에서 수동으로 wake를 발생시킵니다.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 잠든 스트림을 깨우는 브로드캐스트 인터페이스
pub trait Waker: Send + Sync {
    /// 다음 wake 브로드캐스트에서 완료되는 future를 반환합니다.
    fn wake(&self) -> BoxFuture<'static, ()>;
}

/// 주기 타이머 기반 waker
///
/// 내부 태스크가 `interval`마다 모든 대기자를 깨웁니다.
/// [`TimerWaker::nudge`]로 외부에서 즉시 wake를 발생시킬 수도 있습니다.
pub struct TimerWaker {
    notify: Arc<Notify>,
    shutdown: CancellationToken,
}

impl TimerWaker {
    /// 새 타이머 waker를 생성하고 브로드캐스트 태스크를 시작합니다.
    pub fn new(interval: Duration) -> Self {
        let notify = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();

        let task_notify = Arc::clone(&notify);
        let task_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        task_notify.notify_waiters();
                    }
                    _ = task_shutdown.cancelled() => {
                        // 종료 시 마지막으로 한 번 깨워 대기자를 풀어줍니다
                        task_notify.notify_waiters();
                        break;
                    }
                }
            }
        });

        Self { notify, shutdown }
    }

    /// 외부에서 즉시 wake를 발생시킵니다.
    pub fn nudge(&self) {
        self.notify.notify_waiters();
    }

    /// 브로드캐스트 태스크를 종료합니다.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TimerWaker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Waker for TimerWaker {
    fn wake(&self) -> BoxFuture<'static, ()> {
        let notify = Arc::clone(&self.notify);
        Box::pin(async move { notify.notified().await })
    }
}

/// 테스트용 수동 waker
///
/// [`TestWaker::wake_all`]을 호출할 때까지 대기자는 잠들어 있습니다.
pub struct TestWaker {
    notify: Arc<Notify>,
}

impl TestWaker {
    /// 새 테스트 waker를 생성합니다.
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
        }
    }

    /// 현재 대기 중인 모든 스트림을 깨웁니다.
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}

impl Default for TestWaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Waker for TestWaker {
    fn wake(&self) -> BoxFuture<'static, ()> {
        let notify = Arc::clone(&self.notify);
        Box::pin(async move { notify.notified().await })
    }
}

/// 항상 즉시 깨우는 waker — 잠들지 않고 폴링하는 테스트에 사용합니다.
pub struct AlwaysWaker;

impl Waker for AlwaysWaker {
    fn wake(&self) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}
