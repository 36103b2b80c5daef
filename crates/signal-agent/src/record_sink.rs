use analysis_core::{AnalysisError, EvaluationRecord, RecordSink};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per evaluation to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    // Serializes appends from concurrent instrument tasks.
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn store(&self, record: &EvaluationRecord) -> Result<(), AnalysisError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| AnalysisError::InvalidData(format!("record serialization failed: {}", e)))?;
        line.push('\n');

        let io_err = |e: std::io::Error| AnalysisError::ApiError(format!("{}: {}", self.path.display(), e));

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json-lines"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use analysis_core::SignalDirection;

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonLinesSink::new(&path);

        sink.store(&record("BTC", SignalDirection::Buy, 55.5)).await.unwrap();
        sink.store(&record("ETH", SignalDirection::Sell, 41.0)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: EvaluationRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.instrument(), "BTC");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["signal"]["direction"], "SELL");
    }

    #[tokio::test]
    async fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing").join("records.jsonl"));
        let err = sink
            .store(&record("BTC", SignalDirection::Buy, 55.5))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ApiError(_)));
    }
}
