// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pup log tailer.
//!
//! Opens `<container_log_dir>/pup-<id>`, replays existing content, then
//! follows appended lines. Subscribers are expected to drain promptly or
//! cancel; a slow subscriber blocks the tailer, never the writer.

use dbx_core::PupId;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 10;

pub struct LogTailer {
    container_log_dir: PathBuf,
    appear_timeout: Duration,
    poll_interval: Duration,
}

impl LogTailer {
    pub fn new(container_log_dir: PathBuf) -> Self {
        Self {
            container_log_dir,
            appear_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Shorter polling windows for tests.
    pub fn with_timings(mut self, appear_timeout: Duration, poll_interval: Duration) -> Self {
        self.appear_timeout = appear_timeout;
        self.poll_interval = poll_interval;
        self
    }

    fn log_path(&self, id: &PupId) -> PathBuf {
        self.container_log_dir.join(format!("pup-{id}"))
    }

    /// Start tailing. Waits for the file to appear (bounded), replays
    /// existing lines, then streams additions until cancelled. Cancelling
    /// closes the output channel.
    pub async fn tail(
        &self,
        id: &PupId,
    ) -> std::io::Result<(CancellationToken, mpsc::Receiver<String>)> {
        let path = self.log_path(id);
        let file = self.wait_for_file(&path).await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            if let Err(e) = follow(file, tx, task_cancel, poll_interval).await {
                tracing::warn!(path = %path.display(), error = %e, "log tail ended");
            }
        });

        Ok((cancel, rx))
    }

    async fn wait_for_file(&self, path: &Path) -> std::io::Result<File> {
        let deadline = tokio::time::Instant::now() + self.appear_timeout;
        loop {
            match File::open(path).await {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
                Err(e) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(e);
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Replay from the start, then poll for appended lines.
async fn follow(
    file: File,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    poll_interval: Duration,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = reader.read_line(&mut line) => read?,
        };

        if read == 0 {
            // At EOF: wait for more output.
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(poll_interval) => continue,
            }
        }

        let out = line.trim_end_matches('\n').to_string();
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sent = tx.send(out) => {
                if sent.is_err() {
                    // Subscriber went away; stop tailing.
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tailer_tests.rs"]
mod tests;
