//! Rolling detection log.
//!
//! Every alerting frame appends one entry. Only the most recent few entries
//! are ever displayed; storage is capped so a long run does not grow without
//! bound.

use std::collections::VecDeque;
use std::fmt;

use chrono::{Local, NaiveTime};

/// Entries shown in the UI.
pub const DEFAULT_DISPLAY_ENTRIES: usize = 5;
/// Entries retained in memory.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// One alerting frame, stamped with local wall-clock time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveTime,
    pub label: String,
}

impl LogEntry {
    pub fn new(timestamp: NaiveTime, label: impl Into<String>) -> Self {
        Self {
            timestamp,
            label: label.into(),
        }
    }

    pub fn now(label: impl Into<String>) -> Self {
        Self::new(Local::now().time(), label)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} Detected",
            self.timestamp.format("%H:%M:%S"),
            title_case(&self.label)
        )
    }
}

/// Upper-case the first letter of every word, lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Append-only, capacity-capped log of alert entries.
#[derive(Clone, Debug)]
pub struct DetectionLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    display: usize,
    total_recorded: u64,
}

impl DetectionLog {
    pub fn new(display: usize, capacity: usize) -> Self {
        let capacity = capacity.max(display).max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            display,
            total_recorded: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total_recorded += 1;
    }

    pub fn record(&mut self, label: &str) -> &LogEntry {
        self.push(LogEntry::now(label));
        &self.entries[self.entries.len() - 1]
    }

    /// The most recent entries, oldest first.
    pub fn recent(&self) -> Vec<&LogEntry> {
        let skip = self.entries.len().saturating_sub(self.display);
        self.entries.iter().skip(skip).collect()
    }

    /// Display lines for [`DetectionLog::recent`].
    pub fn recent_lines(&self) -> Vec<String> {
        self.recent().iter().map(|entry| entry.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ever recorded, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}

impl Default for DetectionLog {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_ENTRIES, DEFAULT_LOG_CAPACITY)
    }
}
