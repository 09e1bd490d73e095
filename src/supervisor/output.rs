//! Output sink — combined console stream of the managed process.
//!
//! Lines from stdout, stderr and the supervisor itself land in one ordered
//! stream. Subscribers get them live over a broadcast channel; a bounded
//! ring buffer keeps recent lines for readers that attach late.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, Mutex};

pub const DEFAULT_OUTPUT_BUFFER: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputLine {
    /// Sequential ID, keeps counting across clears
    pub id: u64,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
    pub source: OutputSource,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputSource {
    Stdout,
    Stderr,
    /// Notices from the supervisor itself
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Line(OutputLine),
    /// The console was wiped (new run, or stop).
    Cleared,
}

struct OutputBuffer {
    lines: VecDeque<OutputLine>,
    next_id: u64,
    max_size: usize,
}

impl OutputBuffer {
    fn with_capacity(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            lines: VecDeque::with_capacity(max_size.min(1024)),
            next_id: 0,
            max_size,
        }
    }

    fn push(&mut self, source: OutputSource, content: String) -> OutputLine {
        let line = OutputLine {
            id: self.next_id,
            timestamp: current_timestamp(),
            source,
            content,
        };
        self.next_id += 1;

        if self.lines.len() >= self.max_size {
            self.lines.pop_front();
        }
        self.lines.push_back(line.clone());
        line
    }

    fn get_since(&self, since_id: u64) -> Vec<OutputLine> {
        self.lines.iter().filter(|l| l.id > since_id).cloned().collect()
    }

    fn get_recent(&self, count: usize) -> Vec<OutputLine> {
        self.lines.iter().rev().take(count).rev().cloned().collect()
    }
}

/// Cloneable handle to the shared output stream.
#[derive(Clone)]
pub struct OutputSink {
    buffer: Arc<Mutex<OutputBuffer>>,
    events: broadcast::Sender<OutputEvent>,
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER)
    }
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_lines: usize) -> Self {
        let (events, _) = broadcast::channel(2048);
        Self {
            buffer: Arc::new(Mutex::new(OutputBuffer::with_capacity(max_lines))),
            events,
        }
    }

    /// Subscribe to live output. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }

    pub async fn push(&self, source: OutputSource, content: impl Into<String>) -> OutputLine {
        let line = self.buffer.lock().await.push(source, content.into());
        // no subscribers is fine
        let _ = self.events.send(OutputEvent::Line(line.clone()));
        line
    }

    pub async fn system(&self, message: impl Into<String>) -> OutputLine {
        self.push(OutputSource::System, message).await
    }

    pub async fn clear(&self) {
        self.buffer.lock().await.lines.clear();
        let _ = self.events.send(OutputEvent::Cleared);
    }

    pub async fn since(&self, since_id: u64) -> Vec<OutputLine> {
        self.buffer.lock().await.get_since(since_id)
    }

    pub async fn recent(&self, count: usize) -> Vec<OutputLine> {
        self.buffer.lock().await.get_recent(count)
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
