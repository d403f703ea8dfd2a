// SPDX-License-Identifier: GPL-3.0-only

//! Decoded results and the deduplicating result history

use crate::constants::sampling::{DEDUP_WINDOW, HISTORY_LIMIT};
use crate::decoder::{BarcodeFormat, DecodedBarcode};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// One decoded result surfaced to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub text: String,
    pub format: BarcodeFormat,
    /// Device the frame came from
    pub device_id: Option<String>,
    pub scanned_at: DateTime<Local>,
}

impl ScanRecord {
    pub fn new(decoded: DecodedBarcode, device_id: Option<String>) -> Self {
        Self {
            text: decoded.text,
            format: decoded.format,
            device_id,
            scanned_at: Local::now(),
        }
    }

    /// Two records describe the same code when format and text match
    pub fn same_code(&self, other: &ScanRecord) -> bool {
        self.format == other.format && self.text == other.text
    }
}

impl fmt::Display for ScanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.format, self.text)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    record: ScanRecord,
    last_seen: Instant,
}

/// Most-recent-first list of unique results
#[derive(Debug, Clone)]
pub struct ScanHistory {
    entries: VecDeque<Entry>,
    dedup_window: Duration,
    limit: usize,
}

impl Default for ScanHistory {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW, HISTORY_LIMIT)
    }
}

impl ScanHistory {
    pub fn new(dedup_window: Duration, limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            dedup_window,
            limit: limit.max(1),
        }
    }

    /// Record a decoded result
    ///
    /// Returns `true` when the result is new and should be surfaced. A repeat
    /// of the most recent code inside the dedup window only refreshes its
    /// last-seen time. Anything else moves to the front, dropping an older
    /// copy of the same code.
    pub fn record(&mut self, record: ScanRecord, now: Instant) -> bool {
        if let Some(head) = self.entries.front_mut()
            && head.record.same_code(&record)
            && now.saturating_duration_since(head.last_seen) < self.dedup_window
        {
            head.last_seen = now;
            return false;
        }

        self.entries.retain(|e| !e.record.same_code(&record));
        self.entries.push_front(Entry {
            record,
            last_seen: now,
        });
        self.entries.truncate(self.limit);
        true
    }

    pub fn latest(&self) -> Option<&ScanRecord> {
        self.entries.front().map(|e| &e.record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn to_vec(&self) -> Vec<ScanRecord> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
