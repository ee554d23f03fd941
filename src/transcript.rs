//! Host context seams and the per-attempt transcript

use chrono::{DateTime, Local};

/// Display color for live progress output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleColor {
    /// Host default
    Default,
    /// Attempt in progress
    Yellow,
    /// Success
    Green,
    /// Failure
    Red,
}

/// Line-oriented live progress output provided by the host
pub trait ConsoleSink: Send + Sync {
    /// Color used for subsequent lines
    fn set_color(&self, color: ConsoleColor);

    /// Write one line
    fn write_line(&self, line: &str);
}

/// Everything the runner needs from the host for one invocation
pub trait ExecutionContext: ConsoleSink {
    /// Look up a per-invocation parameter (see [`crate::types::params`])
    fn parameter(&self, name: &str) -> Option<String>;
}

/// One transcript line
#[derive(Clone, Debug)]
pub struct TranscriptEntry {
    /// When the line was recorded
    pub at: DateTime<Local>,
    /// Line text
    pub text: String,
}

/// Ordered log of one attempt, mirrored to the host console as it is written
pub struct Transcript<'a> {
    entries: Vec<TranscriptEntry>,
    sink: &'a dyn ConsoleSink,
}

impl<'a> Transcript<'a> {
    /// Start an empty transcript writing through to `sink`
    pub fn new(sink: &'a dyn ConsoleSink) -> Self {
        Self {
            entries: Vec::new(),
            sink,
        }
    }

    /// Append a line
    pub fn record(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.sink.write_line(&text);
        tracing::debug!(line = %text, "transcript");
        self.entries.push(TranscriptEntry {
            at: Local::now(),
            text,
        });
    }

    /// Change the console color
    pub fn set_color(&self, color: ConsoleColor) {
        self.sink.set_color(color);
    }

    /// Lines recorded so far
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Consume the transcript into a single `<br/>`-joined body
    pub fn finalize(self) -> String {
        self.entries
            .into_iter()
            .map(|e| e.text)
            .collect::<Vec<_>>()
            .join("<br/>")
    }
}

/// Timestamp format used in transcript lines
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
