//! Record ingress drivers.
//!
//! Record decoding from native capture formats is handled by external
//! collaborators; the daemon ships two thin drivers over the JSON-lines
//! flat-record representation:
//!
//! * [`TraceDriver`] replays a finite trace file and closes the record
//!   channel at EOF.
//! * [`TailDriver`] follows growing log files through the
//!   rotation-aware tailer and parses each emitted line as one record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use flowsentry_core::record::Record;
use flowsentry_tailer::{FileStream, LogLine, TimerWaker, Waker};

/// Replays a JSON-lines trace file into the record channel.
///
/// Dropping the sender at EOF closes the channel, which signals the
/// engine to drain and shut down.
pub struct TraceDriver {
    path: PathBuf,
}

impl TraceDriver {
    /// Create a driver for the given trace file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the trace to the end, sending one record per line.
    ///
    /// Malformed lines are logged and skipped.
    pub async fn run(self, records: mpsc::Sender<Record>) -> anyhow::Result<()> {
        tracing::info!(path = %self.path.display(), "replaying trace file");

        let file = tokio::fs::File::open(&self.path).await?;
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut sent: u64 = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(record) => {
                    if records.send(record).await.is_err() {
                        tracing::warn!("record channel closed, stopping trace replay");
                        break;
                    }
                    sent += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed trace line");
                }
            }
        }

        tracing::info!(records = sent, "trace replay finished");
        // records 송신자가 드롭되며 채널이 닫히고 엔진이 드레인됩니다
        Ok(())
    }
}

/// Follows growing log files and parses each line as one flat record.
pub struct TailDriver {
    paths: Vec<PathBuf>,
    poll_interval: Duration,
}

impl TailDriver {
    /// Create a driver for the given watch paths.
    pub fn new(paths: Vec<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            paths,
            poll_interval,
        }
    }

    /// Tail the watch paths until cancellation.
    ///
    /// Each pathname has at most one active stream; when a stream
    /// completes (file removed) a fresh one is spawned if the file
    /// reappears.
    pub async fn run(
        self,
        ctx: CancellationToken,
        records: mpsc::Sender<Record>,
    ) -> anyhow::Result<()> {
        let tracker = TaskTracker::new();
        let waker = Arc::new(TimerWaker::new(self.poll_interval));
        let (line_tx, mut line_rx) = mpsc::channel::<LogLine>(256);

        let mut streams: Vec<FileStream> = Vec::new();
        for path in &self.paths {
            match FileStream::new(
                ctx.clone(),
                tracker.clone(),
                waker.clone() as Arc<dyn Waker>,
                path,
                line_tx.clone(),
                false,
            )
            .await
            {
                Ok(stream) => streams.push(stream),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot tail file"),
            }
        }

        let mut respawn_timer = tokio::time::interval(self.poll_interval.max(Duration::from_millis(100)));
        respawn_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                line = line_rx.recv() => {
                    let Some(line) = line else { break };
                    match serde_json::from_str::<Record>(&line.line) {
                        Ok(record) => {
                            if records.send(record).await.is_err() {
                                tracing::warn!("record channel closed, stopping tail driver");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(
                                path = %line.pathname.display(),
                                error = %e,
                                "skipping malformed record line"
                            );
                        }
                    }
                }
                _ = respawn_timer.tick() => {
                    // 완료된 스트림은 파일이 다시 나타나면 새로 엽니다
                    for stream in &mut streams {
                        if stream.is_complete() {
                            let path = stream.pathname().to_path_buf();
                            match FileStream::new(
                                ctx.clone(),
                                tracker.clone(),
                                waker.clone() as Arc<dyn Waker>,
                                &path,
                                line_tx.clone(),
                                true,
                            )
                            .await
                            {
                                Ok(fresh) => {
                                    tracing::info!(path = %path.display(), "re-opened completed stream");
                                    *stream = fresh;
                                }
                                Err(_) => {} // 파일이 아직 없음
                            }
                        }
                    }
                }
            }
        }

        for stream in &streams {
            stream.stop();
        }
        waker.shutdown();
        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
