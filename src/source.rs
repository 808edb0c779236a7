use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::archive::{self, ArchiveError};
use crate::config::{Config, LocalZone};
use crate::message::RawMessage;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("transient source error: {0}")]
    Transient(String),
    #[error("source error: {0}")]
    Fatal(String),
}

/// One page of chronologically ordered messages.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub messages: Vec<RawMessage>,
    /// Cursor for the following page; `None` once the channel is exhausted.
    pub next: Option<usize>,
}

/// Paginated access to one channel's history, oldest first.
pub trait MessageSource {
    fn channel(&self) -> &str;
    fn fetch_batch(&mut self, cursor: usize, limit: usize) -> Result<Batch, SourceError>;
}

/// Source backed by a JSON array export on disk.
pub struct ArchiveSource {
    channel: String,
    messages: Vec<RawMessage>,
}

impl ArchiveSource {
    pub fn new(channel: impl Into<String>, mut messages: Vec<RawMessage>) -> Self {
        messages.sort_by_key(|m| m.instant());
        Self { channel: channel.into(), messages }
    }

    pub fn open(channel: impl Into<String>, path: &Path) -> Result<Self, ArchiveError> {
        Ok(Self::new(channel, archive::load(path)?))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageSource for ArchiveSource {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn fetch_batch(&mut self, cursor: usize, limit: usize) -> Result<Batch, SourceError> {
        let end = (cursor + limit.max(1)).min(self.messages.len());
        let messages = self.messages.get(cursor..end).map(<[RawMessage]>::to_vec).unwrap_or_default();
        let next = if end < self.messages.len() { Some(end) } else { None };
        Ok(Batch { messages, next })
    }
}

/// Inclusive time window for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// From the start of `day` in `zone` until `now`.
    pub fn since_day(day: NaiveDate, zone: &LocalZone, now: DateTime<Utc>) -> Self {
        let start = zone.start_of_day(day).unwrap_or(now);
        Self { start, end: now }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

#[derive(Debug, Clone)]
pub struct FetchOpts {
    pub page_size: usize,
    pub max_retries: u32,
    pub transient_backoff: Duration,
    pub progress: bool,
}

impl FetchOpts {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            page_size: cfg.page_size,
            max_retries: cfg.max_retries,
            transient_backoff: cfg.transient_backoff(),
            progress: false,
        }
    }
}

/// Messages collected in range, plus why retrieval stopped early, if it did.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub messages: Vec<RawMessage>,
    pub skipped_invalid_date: usize,
    pub halted: Option<String>,
}

pub fn fetch_messages(
    source: &mut dyn MessageSource,
    range: TimeRange,
    opts: &FetchOpts,
    stop: &AtomicBool,
) -> FetchOutcome {
    fetch_messages_with(source, range, opts, stop, std::thread::sleep)
}

/// Pages through `source`, resuming from the same cursor after rate limits and transient
/// failures. Whatever was collected before a halt is returned.
pub fn fetch_messages_with(
    source: &mut dyn MessageSource,
    range: TimeRange,
    opts: &FetchOpts,
    stop: &AtomicBool,
    mut sleep: impl FnMut(Duration),
) -> FetchOutcome {
    let bar = if opts.progress { ProgressBar::new_spinner() } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::with_template("{spinner} Fetching messages: {pos} kept {msg}") {
        bar.set_style(style);
    }

    let mut out = FetchOutcome::default();
    let mut cursor = Some(0usize);
    let mut failures = 0u32;
    while let Some(at) = cursor {
        if stop.load(Ordering::SeqCst) {
            out.halted = Some("interrupted".to_string());
            break;
        }
        let batch = match source.fetch_batch(at, opts.page_size) {
            Ok(batch) => {
                failures = 0;
                batch
            }
            Err(e) => {
                let delay = match &e {
                    SourceError::RateLimited { retry_after } => *retry_after,
                    SourceError::Transient(_) => opts.transient_backoff,
                    SourceError::Fatal(_) => {
                        warn!(channel = source.channel(), error = %e, "retrieval halted");
                        out.halted = Some(e.to_string());
                        break;
                    }
                };
                failures += 1;
                if failures > opts.max_retries {
                    warn!(channel = source.channel(), error = %e, failures, "giving up after repeated failures");
                    out.halted = Some(e.to_string());
                    break;
                }
                warn!(channel = source.channel(), error = %e, delay_secs = delay.as_secs(), "retrying batch");
                bar.set_message(format!("(waiting {}s)", delay.as_secs()));
                sleep(delay);
                continue;
            }
        };

        for msg in batch.messages {
            match msg.instant() {
                Some(t) if range.contains(t) => {
                    out.messages.push(msg);
                    bar.inc(1);
                }
                Some(_) => {}
                None => out.skipped_invalid_date += 1,
            }
        }
        bar.set_message("");
        cursor = batch.next;
    }
    bar.finish_and_clear();
    info!(
        channel = source.channel(),
        kept = out.messages.len(),
        skipped_invalid_date = out.skipped_invalid_date,
        halted = out.halted.as_deref().unwrap_or("no"),
        "retrieval finished"
    );
    out
}
