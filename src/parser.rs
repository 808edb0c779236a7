use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::cleaning::clean_text;
use crate::config::Config;
use crate::links::message_links;
use crate::message::RawMessage;
use crate::metrics::{extract_metric_fragments, PerMetric};
use crate::patterns::extract_token_name;

pub const DISPLAY_FORMAT: &str = "%H:%M:%S %d/%m/%Y";
pub const INVALID_DATE: &str = "Invalid date";

/// Message time shifted to the display offset, or a marker for missing/unparsable input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Valid(DateTime<FixedOffset>),
    Invalid,
}

impl Timestamp {
    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Timestamp::Valid(t) => Some(*t),
            Timestamp::Invalid => None,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.instant().map(|t| t.date_naive())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Valid(t) => write!(f, "{}", t.format(DISPLAY_FORMAT)),
            Timestamp::Invalid => f.write_str(INVALID_DATE),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Typed fields pulled out of one channel post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub timestamp: Timestamp,
    pub token_name: String,
    pub clean_text: String,
    pub chart_link: Option<String>,
    pub social_link: Option<String>,
    pub metrics: PerMetric<Option<String>>,
    pub views: u64,
    pub forwards: u64,
    /// Every link annotation target, kept for identifier searches.
    pub links: Vec<String>,
}

/// Parses an ISO-8601 instant; values without an offset are taken as UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let aware = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];
    for f in aware.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    for f in naive.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    None
}

pub fn localize_timestamp(date: Option<&str>, offset: FixedOffset) -> Timestamp {
    match date.and_then(parse_instant) {
        Some(utc) => Timestamp::Valid(utc.with_timezone(&offset)),
        None => Timestamp::Invalid,
    }
}

pub fn normalize(msg: &RawMessage, cfg: &Config) -> NormalizedRecord {
    let clean = clean_text(&msg.message);
    let (chart_link, social_link) = message_links(msg, &clean);
    let record = NormalizedRecord {
        timestamp: localize_timestamp(msg.date.as_deref(), cfg.display_offset),
        token_name: extract_token_name(&clean),
        metrics: extract_metric_fragments(&clean),
        chart_link,
        social_link,
        views: msg.views,
        forwards: msg.forwards,
        links: msg.link_targets().map(str::to_string).collect(),
        clean_text: clean,
    };
    debug!(id = msg.id, token = %record.token_name, chart = ?record.chart_link, "normalized message");
    record
}

/// Normalizes a batch, optionally keeping only records whose display date equals `day`.
pub fn normalize_all(messages: &[RawMessage], cfg: &Config, day: Option<NaiveDate>) -> Vec<NormalizedRecord> {
    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        let ts = localize_timestamp(msg.date.as_deref(), cfg.display_offset);
        if let Some(day) = day {
            match ts.date() {
                Some(d) if d == day => {}
                Some(_) => continue,
                None => {
                    debug!(id = msg.id, "skipping message with invalid date under day filter");
                    continue;
                }
            }
        }
        out.push(normalize(msg, cfg));
    }
    out
}
