//! JSON Lines file store.

use super::{BoxFuture, StorageError, StorageResult, StrokeStore};
use crate::stroke::StrokeSegment;
use crate::validate::validate_segment;
use log::warn;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File-backed stroke store.
///
/// Keeps one JSON encoded segment per line, in admission order. A missing
/// file is an empty history.
pub struct FileStore {
    path: PathBuf,
    /// Append handle, opened lazily and dropped on reset or write failure.
    writer: Mutex<Option<File>>,
}

impl FileStore {
    /// Create a store at the given path.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        Ok(Self {
            path,
            writer: Mutex::new(None),
        })
    }

    /// Path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cut the file back to `len` bytes.
    async fn truncate(&self, len: u64) -> StorageResult<()> {
        let mut writer = self.writer.lock().await;
        *writer = None;
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error("open", e))?;
        file.set_len(len).await.map_err(|e| self.io_error("truncate", e))
    }

    /// Write the newline the last record is missing.
    async fn terminate_last_line(&self) -> StorageResult<()> {
        let mut writer = self.writer.lock().await;
        *writer = None;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error("open", e))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| self.io_error("append to", e))?;
        file.flush().await.map_err(|e| self.io_error("append to", e))
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> StorageError {
        StorageError::Io(format!("Failed to {} {}: {}", action, self.path.display(), e))
    }
}

impl StrokeStore for FileStore {
    fn load(&self) -> BoxFuture<'_, StorageResult<Vec<StrokeSegment>>> {
        Box::pin(async move {
            let bytes = match fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(self.io_error("read", e)),
            };

            // Anything after the last newline was written without its
            // terminator. A complete record only lost the newline; anything
            // else was cut off mid-write and is dropped so the next append
            // starts on a fresh line.
            let mut complete = bytes
                .iter()
                .rposition(|b| *b == b'\n')
                .map_or(0, |i| i + 1);
            if complete < bytes.len() {
                if parse_record(&bytes[complete..]).is_ok() {
                    warn!(
                        "Restoring the missing newline after the last record of {}",
                        self.path.display()
                    );
                    self.terminate_last_line().await?;
                    complete = bytes.len();
                } else {
                    warn!(
                        "Discarding {} bytes of a partial record at the end of {}",
                        bytes.len() - complete,
                        self.path.display()
                    );
                    self.truncate(complete as u64).await?;
                }
            }

            let mut strokes = Vec::new();
            for (index, line) in bytes[..complete].split(|b| *b == b'\n').enumerate() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match parse_record(line) {
                    Ok(segment) => strokes.push(segment),
                    Err(reason) => warn!(
                        "Skipping record {} of {}: {}",
                        index + 1,
                        self.path.display(),
                        reason
                    ),
                }
            }
            Ok(strokes)
        })
    }

    fn append(&self, segment: &StrokeSegment) -> BoxFuture<'_, StorageResult<()>> {
        let line = match serde_json::to_string(segment) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => {
                return Box::pin(async move { Err(StorageError::Serialization(e.to_string())) });
            }
        };

        Box::pin(async move {
            let mut writer = self.writer.lock().await;
            if writer.is_none() {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|e| self.io_error("open", e))?;
                *writer = Some(file);
            }

            if let Some(file) = writer.as_mut() {
                let written = match file.write_all(line.as_bytes()).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    // Reopen on the next append rather than reuse a handle
                    // in an unknown state.
                    *writer = None;
                    return Err(self.io_error("append to", e));
                }
            }
            Ok(())
        })
    }

    fn reset(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut writer = self.writer.lock().await;
            *writer = None;
            File::create(&self.path)
                .await
                .map_err(|e| self.io_error("truncate", e))?;
            Ok(())
        })
    }
}

fn parse_record(line: &[u8]) -> Result<StrokeSegment, String> {
    let value = serde_json::from_slice::<Value>(line).map_err(|e| e.to_string())?;
    validate_segment(&value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{classify, Inbound};
    use tempfile::tempdir;

    fn segment(x: f64) -> StrokeSegment {
        StrokeSegment::new((x, 0.0), (x + 1.0, 1.0), 4.0, [255, 0, 0, 255]).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_history() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("strokes.jsonl")).unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_load_keeps_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("strokes.jsonl");
        let store = FileStore::new(&path).unwrap();

        for x in [3.0, 1.0, 2.0] {
            store.append(&segment(x)).await.unwrap();
        }

        let reopened = FileStore::new(&path).unwrap();
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded, vec![segment(3.0), segment(1.0), segment(2.0)]);
    }

    #[tokio::test]
    async fn test_reset_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strokes.jsonl");
        let store = FileStore::new(&path).unwrap();

        store.append(&segment(1.0)).await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        store.append(&segment(2.0)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![segment(2.0)]);
    }

    #[tokio::test]
    async fn test_corrupt_records_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strokes.jsonl");
        let good = r#"{"x1":0,"y1":0,"x2":10,"y2":10,"w":8,"c":[0,0,0,255],"originId":"a"}"#;
        let contents = format!(
            "{good}\nnot json at all\n{{\"x1\":\"a\",\"y1\":0,\"x2\":1,\"y2\":1,\"w\":1,\"c\":[0,0,0,255]}}\n\n{good}\n"
        );
        std::fs::write(&path, contents).unwrap();

        let store = FileStore::new(&path).unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].origin_id(), Some("a"));
        assert_eq!(serde_json::to_string(&loaded[1]).unwrap(), good);
    }

    #[tokio::test]
    async fn test_partial_trailing_record_is_repaired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strokes.jsonl");
        let good = r#"{"x1":0,"y1":0,"x2":10,"y2":10,"w":8,"c":[0,0,0,255]}"#;
        std::fs::write(&path, format!("{good}\n{{\"x1\":1,\"y1\":")).unwrap();

        let store = FileStore::new(&path).unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);

        let Inbound::Stroke(next) = classify(
            r#"{"t":"stroke","s":{"x1":5,"y1":5,"x2":6,"y2":6,"w":1,"c":[1,1,1,1]}}"#,
        ) else {
            panic!("expected a stroke");
        };
        store.append(&next).await.unwrap();

        let loaded = FileStore::new(&path).unwrap().load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1], next);
    }

    #[tokio::test]
    async fn test_complete_record_without_newline_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strokes.jsonl");
        let good = r#"{"x1":0,"y1":0,"x2":10,"y2":10,"w":8,"c":[0,0,0,255]}"#;
        std::fs::write(&path, good).unwrap();

        let store = FileStore::new(&path).unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(serde_json::to_string(&loaded[0]).unwrap(), good);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{good}\n"));

        store.append(&segment(2.0)).await.unwrap();
        let loaded = FileStore::new(&path).unwrap().load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1], segment(2.0));
    }
}
