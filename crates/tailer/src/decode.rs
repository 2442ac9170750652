//! 바이트 버퍼를 라인 단위로 디코딩하여 채널로 전송합니다.

use std::path::Path;

use metrics::counter;
use tokio::sync::mpsc;

use flowsentry_core::metrics::{LABEL_PATH, TAILER_LINES_TOTAL};

use crate::logline::LogLine;

/// 읽은 바이트를 유니코드로 디코딩하고, 개행마다 한 라인을 전송합니다.
///
/// `\r`은 버리고, `\n`은 누적 버퍼를 한 라인으로 플러시합니다.
/// 나머지 문자는 `partial` 버퍼에 누적됩니다. 유효하지 않은 UTF-8
/// 시퀀스는 대체 문자로 디코딩됩니다.
pub(crate) async fn decode_and_send(
    lines: &mpsc::Sender<LogLine>,
    pathname: &Path,
    buf: &[u8],
    partial: &mut String,
) {
    for c in String::from_utf8_lossy(buf).chars() {
        match c {
            '\r' => {}
            '\n' => send_line(lines, pathname, partial).await,
            _ => partial.push(c),
        }
    }
}

/// 누적 버퍼를 한 라인으로 전송하고 버퍼를 비웁니다.
pub(crate) async fn send_line(lines: &mpsc::Sender<LogLine>, pathname: &Path, partial: &mut String) {
    counter!(TAILER_LINES_TOTAL, LABEL_PATH => pathname.display().to_string()).increment(1);
    let line = LogLine::new(pathname, std::mem::take(partial));
    if lines.send(line).await.is_err() {
        tracing::debug!(path = %pathname.display(), "line receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn newline_flushes_single_line() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut partial = String::new();
        decode_and_send(&tx, Path::new("a.log"), b"hello\n", &mut partial).await;

        let ll = rx.recv().await.unwrap();
        assert_eq!(ll.line, "hello");
        assert!(partial.is_empty());
    }

    #[tokio::test]
    async fn carriage_return_is_eaten() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut partial = String::new();
        decode_and_send(&tx, Path::new("a.log"), b"dos line\r\n", &mut partial).await;

        assert_eq!(rx.recv().await.unwrap().line, "dos line");
    }

    #[tokio::test]
    async fn partial_line_accumulates_across_reads() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut partial = String::new();
        decode_and_send(&tx, Path::new("a.log"), b"hel", &mut partial).await;
        assert_eq!(partial, "hel");

        decode_and_send(&tx, Path::new("a.log"), b"lo\nworld", &mut partial).await;
        assert_eq!(rx.recv().await.unwrap().line, "hello");
        assert_eq!(partial, "world");
    }

    #[tokio::test]
    async fn multiple_lines_in_one_buffer() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut partial = String::new();
        decode_and_send(&tx, Path::new("a.log"), b"a\nb\nc\n", &mut partial).await;

        assert_eq!(rx.recv().await.unwrap().line, "a");
        assert_eq!(rx.recv().await.unwrap().line, "b");
        assert_eq!(rx.recv().await.unwrap().line, "c");
    }

    #[tokio::test]
    async fn utf8_content_survives() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut partial = String::new();
        decode_and_send(&tx, Path::new("a.log"), "경로 확인\n".as_bytes(), &mut partial).await;
        assert_eq!(rx.recv().await.unwrap().line, "경로 확인");
    }
}
