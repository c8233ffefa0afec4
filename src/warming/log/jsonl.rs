use std::{io::ErrorKind, num::NonZeroUsize, path::Path};

use async_trait::async_trait;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{info, warn};

use crate::domain::events::RevalidationEvent;
use crate::warming::error::LogStoreError;

use super::{EventFilter, EventLogStore, memory::MemoryEventLog};

/// Durable store: one JSON document per line, appended and flushed per event.
///
/// Queries are served from an in-memory index holding the newest `capacity`
/// events, rebuilt from the file on open.
pub struct JsonlEventLog {
    writer: Mutex<Writer>,
    index: MemoryEventLog,
}

struct Writer {
    file: File,
    /// The file may end in a partial line (torn tail on disk, or a write that
    /// failed midway); the next append must start on a fresh line.
    needs_newline: bool,
}

impl JsonlEventLog {
    pub async fn open(path: impl AsRef<Path>, capacity: NonZeroUsize) -> Result<Self, LogStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let index = MemoryEventLog::new(capacity);
        let replayed = replay(path, &index).await?;
        if replayed.torn_tail {
            warn!(
                target = "prewarm::event_log",
                path = %path.display(),
                "event log does not end in a newline; next append starts a fresh line"
            );
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        info!(
            target = "prewarm::event_log",
            path = %path.display(),
            loaded = replayed.loaded,
            "jsonl event log opened"
        );

        Ok(Self {
            writer: Mutex::new(Writer {
                file,
                needs_newline: replayed.torn_tail,
            }),
            index,
        })
    }
}

struct Replayed {
    loaded: usize,
    torn_tail: bool,
}

async fn replay(path: &Path, index: &MemoryEventLog) -> Result<Replayed, LogStoreError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(Replayed {
                loaded: 0,
                torn_tail: false,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let mut loaded = 0;
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RevalidationEvent>(line) {
            Ok(event) => {
                index.push(event);
                loaded += 1;
            }
            Err(err) => warn!(
                target = "prewarm::event_log",
                path = %path.display(),
                line = line_no + 1,
                error = %err,
                "skipping unreadable event log line"
            ),
        }
    }
    Ok(Replayed {
        loaded,
        torn_tail: !contents.is_empty() && !contents.ends_with('\n'),
    })
}

#[async_trait]
impl EventLogStore for JsonlEventLog {
    async fn append(&self, event: RevalidationEvent) -> Result<(), LogStoreError> {
        let encoded = serde_json::to_string(&event)?;

        let mut writer = self.writer.lock().await;
        let mut line = String::with_capacity(encoded.len() + 2);
        if writer.needs_newline {
            line.push('\n');
        }
        line.push_str(&encoded);
        line.push('\n');

        // Until a write completes the tail of the file is unknown.
        writer.needs_newline = true;
        writer.file.write_all(line.as_bytes()).await?;
        writer.file.flush().await?;
        writer.needs_newline = false;
        drop(writer);

        self.index.push(event);
        Ok(())
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<RevalidationEvent>, LogStoreError> {
        Ok(self.index.select(filter))
    }
}
