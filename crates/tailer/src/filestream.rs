//! 파일 스트림 — 하나의 경로를 영속적인 로그 소스로 추상화합니다.
//!
//! 다른 프로세스가 append하는 일반 파일을 따라가며, 아래 두 변화를
//! 구분해 처리합니다.
//!
//! - **로테이션**: 같은 이름으로 새 inode가 생성됨. 기존 디스크립터는
//!   EOF까지 유효하며, EOF 시점에 새 inode에서 처음부터 읽는 후속
//!   스트림이 생성되고 기존 읽기 루프는 종료됩니다.
//! - **잘림(truncation)**: 같은 디스크립터에서 파일 오프셋이 0으로
//!   되돌아감. 누적 중인 부분 라인을 플러시하고 처음으로 seek하여
//!   계속합니다. 잘리기 전 마지막 로그는 유실될 수 있습니다.
//!
//! EOF에서 0바이트를 읽으면 stat으로 두 경우를 검사하고, 해당 없으면
//! waker의 다음 신호 또는 stop/취소 신호까지 잠듭니다.

use std::future::Future;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use metrics::counter;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use flowsentry_core::metrics::{
    LABEL_PATH, TAILER_CLOSES_TOTAL, TAILER_ERRORS_TOTAL, TAILER_OPENS_TOTAL,
    TAILER_ROTATIONS_TOTAL, TAILER_TRUNCATES_TOTAL,
};

use crate::decode::{decode_and_send, send_line};
use crate::error::TailError;
use crate::logline::LogLine;
use crate::waker::Waker;

/// 읽기 버퍼 크기
const READ_BUFFER_SIZE: usize = 4096;

/// 스트림의 공유 상태 — 읽기 루프와 핸들이 함께 봅니다.
struct StreamState {
    /// 마지막으로 바이트를 읽은 시각
    last_read_time: Instant,
    /// 스트림이 종료되어 더 이상 라인을 내지 않음
    completed: bool,
}

struct Inner {
    pathname: PathBuf,
    lines: mpsc::Sender<LogLine>,
    waker: Arc<dyn Waker>,
    tracker: TaskTracker,
    ctx: CancellationToken,
    stop: CancellationToken,
    state: RwLock<StreamState>,
}

impl Inner {
    fn touch(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.last_read_time = Instant::now();
    }

    fn complete(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.completed = true;
    }
}

/// 하나의 경로를 따라가는 로그 스트림 핸들
///
/// 경로당 활성 스트림은 동시에 하나만 존재해야 합니다. 완료된
/// 스트림은 라인을 다시 내지 않으므로, 파일이 다시 나타나면 호출자가
/// 새 스트림을 만들어야 합니다.
pub struct FileStream {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("pathname", &self.inner.pathname)
            .finish()
    }
}

impl FileStream {
    /// 일반 파일에 대한 새 로그 스트림을 생성하고 읽기 루프를 시작합니다.
    ///
    /// `from_start`가 false이면 파일 끝에서부터 따라갑니다.
    /// 일반 파일이 아닌 경로는 [`TailError::UnsupportedFileType`]입니다.
    pub async fn new(
        ctx: CancellationToken,
        tracker: TaskTracker,
        waker: Arc<dyn Waker>,
        pathname: impl Into<PathBuf>,
        lines: mpsc::Sender<LogLine>,
        from_start: bool,
    ) -> Result<Self, TailError> {
        let pathname = pathname.into();

        let meta = tokio::fs::metadata(&pathname).await?;
        if !meta.is_file() {
            return Err(TailError::UnsupportedFileType {
                path: pathname.display().to_string(),
            });
        }

        let inner = Arc::new(Inner {
            pathname,
            lines,
            waker,
            tracker,
            ctx,
            stop: CancellationToken::new(),
            state: RwLock::new(StreamState {
                last_read_time: Instant::now(),
                completed: false,
            }),
        });

        open_and_spawn(&inner, from_start).await?;
        Ok(Self { inner })
    }

    /// 추적 중인 경로
    pub fn pathname(&self) -> &Path {
        &self.inner.pathname
    }

    /// 마지막으로 바이트를 읽은 시각
    pub fn last_read_time(&self) -> Instant {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last_read_time
    }

    /// 스트림이 종료되어 복구 불가능한지 확인합니다.
    pub fn is_complete(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .completed
    }

    /// 다음 EOF에서 우아하게 종료하도록 신호합니다. 멱등입니다.
    pub fn stop(&self) {
        if !self.inner.stop.is_cancelled() {
            debug!(path = %self.inner.pathname.display(), "signalling stop at next EOF");
            self.inner.stop.cancel();
        }
    }
}

/// 파일을 열고 읽기 루프 태스크를 시작합니다.
///
/// 로테이션과 ESTALE 재오픈도 이 함수를 거칩니다.
fn open_and_spawn(
    inner: &Arc<Inner>,
    from_start: bool,
) -> Pin<Box<dyn Future<Output = Result<(), TailError>> + Send + '_>> {
    Box::pin(async move {
        let path_label = inner.pathname.display().to_string();

        let mut file = match File::open(&inner.pathname).await {
            Ok(f) => f,
            Err(e) => {
                counter!(TAILER_ERRORS_TOTAL, LABEL_PATH => path_label).increment(1);
                return Err(e.into());
            }
        };
        counter!(TAILER_OPENS_TOTAL, LABEL_PATH => path_label.clone()).increment(1);
        debug!(path = %inner.pathname.display(), from_start, "opened log file");

        if !from_start {
            if let Err(e) = file.seek(SeekFrom::End(0)).await {
                counter!(TAILER_ERRORS_TOTAL, LABEL_PATH => path_label).increment(1);
                return Err(e.into());
            }
        }

        #[cfg(unix)]
        let open_ino = {
            use std::os::unix::fs::MetadataExt;
            match file.metadata().await {
                Ok(m) => Some(m.ino()),
                Err(_) => None,
            }
        };
        #[cfg(not(unix))]
        let open_ino: Option<u64> = None;

        // 로테이션/재오픈이 이 함수를 재귀적으로 거치므로 future를 박싱하여
        // 타입 순환을 끊습니다.
        let task_inner = Arc::clone(inner);
        let loop_fut: Pin<Box<dyn Future<Output = ()> + Send>> =
            Box::pin(stream_loop(task_inner, file, open_ino));
        inner.tracker.spawn(loop_fut);
        Ok(())
    })
}

/// 읽기 루프 — 한 파일 디스크립터의 수명을 담당합니다.
async fn stream_loop(inner: Arc<Inner>, mut file: File, open_ino: Option<u64>) {
    #[cfg(not(unix))]
    let _ = open_ino;
    let path_label = inner.pathname.display().to_string();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut partial = String::new();
    let mut total: u64 = 0;

    loop {
        match file.read(&mut buf).await {
            Ok(n) if n > 0 => {
                total += n as u64;
                decode_and_send(&inner.lines, &inner.pathname, &buf[..n], &mut partial).await;
                inner.touch();

                if !inner.ctx.is_cancelled() {
                    continue;
                }
                flush_and_complete(&inner, &mut partial).await;
                break;
            }

            Ok(_) => {
                // EOF에서 0바이트: 로테이션/잘림을 먼저 검사합니다.
                match tokio::fs::metadata(&inner.pathname).await {
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        // 경로 자체가 사라짐. 파일이 다시 나타나면 호출자가
                        // 새 스트림을 만듭니다.
                        info!(path = %inner.pathname.display(), "source no longer exists, exiting");
                        flush_and_complete(&inner, &mut partial).await;
                        break;
                    }
                    Err(e) => {
                        counter!(TAILER_ERRORS_TOTAL, LABEL_PATH => path_label.clone())
                            .increment(1);
                        warn!(path = %inner.pathname.display(), error = %e, "stat failed");
                    }
                    Ok(meta) => {
                        #[cfg(unix)]
                        {
                            use std::os::unix::fs::MetadataExt;
                            if let Some(ino) = open_ino {
                                if meta.ino() != ino {
                                    info!(
                                        path = %inner.pathname.display(),
                                        "rotation detected, spawning stream on new inode"
                                    );
                                    counter!(TAILER_ROTATIONS_TOTAL, LABEL_PATH => path_label.clone())
                                        .increment(1);
                                    if let Err(e) = open_and_spawn(&inner, true).await {
                                        warn!(
                                            path = %inner.pathname.display(),
                                            error = %e,
                                            "failed to open rotated file"
                                        );
                                    }
                                    // 기존 inode는 이미 EOF이므로 여기서 종료합니다.
                                    break;
                                }
                            }
                        }

                        match file.stream_position().await {
                            Err(e) => {
                                counter!(TAILER_ERRORS_TOTAL, LABEL_PATH => path_label.clone())
                                    .increment(1);
                                warn!(path = %inner.pathname.display(), error = %e, "seek failed");
                                continue;
                            }
                            Ok(offset) => {
                                if meta.len() < offset {
                                    // 잘림: 플러시하지 않으면 누적분까지 유실됩니다.
                                    info!(
                                        path = %inner.pathname.display(),
                                        offset,
                                        size = meta.len(),
                                        "truncation detected, seeking to start"
                                    );
                                    if !partial.is_empty() {
                                        send_line(&inner.lines, &inner.pathname, &mut partial)
                                            .await;
                                    }
                                    if let Err(e) = file.seek(SeekFrom::Start(0)).await {
                                        counter!(TAILER_ERRORS_TOTAL, LABEL_PATH => path_label.clone())
                                            .increment(1);
                                        warn!(path = %inner.pathname.display(), error = %e, "seek failed");
                                    }
                                    counter!(TAILER_TRUNCATES_TOTAL, LABEL_PATH => path_label.clone())
                                        .increment(1);
                                    continue;
                                }
                            }
                        }
                    }
                }

                // EOF 유지: 종료 신호를 확인하고 다음 wake까지 잠듭니다.
                if inner.stop.is_cancelled() || inner.ctx.is_cancelled() {
                    flush_and_complete(&inner, &mut partial).await;
                    break;
                }
                tokio::select! {
                    _ = inner.stop.cancelled() => {
                        // stop을 기다리는 동안 쓰기가 도착했을 수 있으므로
                        // 한 번 더 읽은 뒤 위의 종료 검사에서 빠져나갑니다.
                        debug!(path = %inner.pathname.display(), "stopping after next read");
                    }
                    _ = inner.ctx.cancelled() => {
                        debug!(path = %inner.pathname.display(), "cancelled after next read");
                    }
                    _ = inner.waker.wake() => {}
                }
            }

            Err(e) => {
                counter!(TAILER_ERRORS_TOTAL, LABEL_PATH => path_label.clone()).increment(1);
                if e.kind() == ErrorKind::StaleNetworkFileHandle {
                    info!(path = %inner.pathname.display(), "reopening stream after stale handle");
                    if let Err(ne) = open_and_spawn(&inner, true).await {
                        warn!(path = %inner.pathname.display(), error = %ne, "reopen failed");
                    }
                    break;
                }
                warn!(path = %inner.pathname.display(), error = %e, "read failed");
                tokio::select! {
                    _ = inner.stop.cancelled() => {}
                    _ = inner.ctx.cancelled() => {}
                    _ = inner.waker.wake() => {}
                }
            }
        }
    }

    counter!(TAILER_CLOSES_TOTAL, LABEL_PATH => path_label).increment(1);
    debug!(path = %inner.pathname.display(), total, "closing file descriptor");
}

/// 부분 라인을 플러시하고 스트림을 완료 상태로 표시합니다.
async fn flush_and_complete(inner: &Arc<Inner>, partial: &mut String) {
    if !partial.is_empty() {
        send_line(&inner.lines, &inner.pathname, partial).await;
    }
    inner.complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waker::TestWaker;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn recv_line(rx: &mut mpsc::Receiver<LogLine>) -> LogLine {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for line")
            .expect("line channel closed")
    }

    #[tokio::test]
    async fn rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let err = FileStream::new(
            CancellationToken::new(),
            TaskTracker::new(),
            Arc::new(TestWaker::new()),
            dir.path(),
            tx,
            true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TailError::UnsupportedFileType { .. }));
    }

    #[tokio::test]
    async fn reads_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        tokio::fs::write(&path, b"").await.unwrap();

        let waker = Arc::new(TestWaker::new());
        let (tx, mut rx) = mpsc::channel(8);
        let stream = FileStream::new(
            CancellationToken::new(),
            TaskTracker::new(),
            waker.clone(),
            &path,
            tx,
            true,
        )
        .await
        .unwrap();

        let mut f = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        f.write_all(b"x\n").await.unwrap();
        f.flush().await.unwrap();

        // 스트림이 EOF 대기에 들어간 뒤 깨어나 새 내용을 읽습니다
        for _ in 0..50 {
            waker.wake_all();
            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Ok(Some(ll)) =
                tokio::time::timeout(Duration::from_millis(20), rx.recv()).await
            {
                assert_eq!(ll.line, "x");
                assert_eq!(ll.pathname, path);
                stream.stop();
                return;
            }
        }
        panic!("no line received");
    }

    #[tokio::test]
    async fn stop_flushes_partial_line_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        tokio::fs::write(&path, b"no newline").await.unwrap();

        let waker = Arc::new(TestWaker::new());
        let (tx, mut rx) = mpsc::channel(8);
        let tracker = TaskTracker::new();
        let stream = FileStream::new(
            CancellationToken::new(),
            tracker.clone(),
            waker.clone(),
            &path,
            tx,
            true,
        )
        .await
        .unwrap();

        stream.stop();
        // stop 이후 한 번 더 읽고 부분 라인을 플러시해야 합니다
        let ll = recv_line(&mut rx).await;
        assert_eq!(ll.line, "no newline");

        for _ in 0..100 {
            if stream.is_complete() {
                return;
            }
            waker.wake_all();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("stream did not complete after stop");
    }

    #[tokio::test]
    async fn deleted_file_completes_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        tokio::fs::write(&path, b"tail\n").await.unwrap();

        let waker = Arc::new(TestWaker::new());
        let (tx, mut rx) = mpsc::channel(8);
        let stream = FileStream::new(
            CancellationToken::new(),
            TaskTracker::new(),
            waker.clone(),
            &path,
            tx,
            true,
        )
        .await
        .unwrap();

        assert_eq!(recv_line(&mut rx).await.line, "tail");

        tokio::fs::remove_file(&path).await.unwrap();
        for _ in 0..100 {
            if stream.is_complete() {
                return;
            }
            waker.wake_all();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("stream did not complete after file removal");
    }
}
