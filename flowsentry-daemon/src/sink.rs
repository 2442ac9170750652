//! Downstream sink for enriched records.
//!
//! Writes one JSON object per enriched record, wrapped in a small
//! envelope carrying the emission timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use flowsentry_core::record::Record;

/// Envelope written for each enriched record.
#[derive(Debug, Serialize)]
struct Emitted<'a> {
    /// Emission timestamp (RFC 3339).
    emitted_at: DateTime<Utc>,
    /// The enriched record, context included.
    record: &'a Record,
}

/// Consumes the engine output channel and writes JSON lines.
///
/// Returns the number of records written. The sink exits when the
/// output channel closes.
pub async fn write_json_lines<W>(
    mut records: mpsc::Receiver<Record>,
    writer: &mut W,
) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written: u64 = 0;
    while let Some(record) = records.recv().await {
        let envelope = Emitted {
            emitted_at: Utc::now(),
            record: &record,
        };
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        written += 1;
    }
    writer.flush().await?;
    tracing::info!(records = written, "sink finished");
    Ok(written)
}
