use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid UTC offset {0:?} (expected +HH:MM)")]
    Offset(String),
    #[error("unknown time zone {0:?} (expected an IANA name such as Europe/Amsterdam, or +HH:MM)")]
    Zone(String),
}

/// Run configuration, loaded from `config.json` and passed into every workflow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel_url: String,
    /// Zone used for "start of today" and user-entered dates.
    #[serde(deserialize_with = "zone_field")]
    pub timezone: LocalZone,
    #[serde(deserialize_with = "offset_field")]
    pub display_offset: FixedOffset,
    pub output_directory: PathBuf,
    pub archive_path: PathBuf,
    /// Export the archive-backed message source reads from.
    pub source_path: PathBuf,
    pub page_size: usize,
    pub max_retries: u32,
    pub transient_backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let plus_one = FixedOffset::east_opt(3600).unwrap_or_else(utc);
        Self {
            channel_url: String::new(),
            timezone: LocalZone::Fixed(plus_one),
            display_offset: plus_one,
            output_directory: PathBuf::from("."),
            archive_path: PathBuf::from("raidboard_chat_history.json"),
            source_path: PathBuf::from("channel_export.json"),
            page_size: 100,
            max_retries: 5,
            transient_backoff_secs: 5,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_secs(self.transient_backoff_secs)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

static RE_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:UTC|GMT)?\s*([+-])(\d{1,2})(?::?(\d{2}))?$").unwrap()
});

/// Parses `+01:00`, `-0530`, `UTC+1` or `Z`.
pub fn parse_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let t = s.trim();
    if matches!(t, "Z" | "UTC" | "GMT") {
        return Ok(utc());
    }
    let caps = RE_OFFSET.captures(t).ok_or_else(|| ConfigError::Offset(s.to_string()))?;
    let hours: i32 = caps[2].parse().map_err(|_| ConfigError::Offset(s.to_string()))?;
    let minutes: i32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).map_err(|_| ConfigError::Offset(s.to_string()))?;
    let secs = (hours * 3600 + minutes * 60) * if &caps[1] == "-" { -1 } else { 1 };
    FixedOffset::east_opt(secs).ok_or_else(|| ConfigError::Offset(s.to_string()))
}

/// Operator's wall-clock zone: an IANA zone (DST-aware) or a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl LocalZone {
    /// IANA names first, then fixed offsets.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let t = s.trim();
        if let Ok(tz) = t.parse::<Tz>() {
            return Ok(LocalZone::Named(tz));
        }
        if t.contains('/') {
            return Err(ConfigError::Zone(s.to_string()));
        }
        parse_offset(t).map(LocalZone::Fixed)
    }

    /// Instant of the first local minute of `day`.
    pub fn start_of_day(&self, day: NaiveDate) -> Option<DateTime<Utc>> {
        match self {
            LocalZone::Named(tz) => local_midnight(tz, day),
            LocalZone::Fixed(offset) => local_midnight(offset, day),
        }
    }

    pub fn date_of(&self, t: DateTime<Utc>) -> NaiveDate {
        match self {
            LocalZone::Named(tz) => t.with_timezone(tz).date_naive(),
            LocalZone::Fixed(offset) => t.with_timezone(offset).date_naive(),
        }
    }

    pub fn format(&self, t: DateTime<Utc>, fmt: &str) -> String {
        match self {
            LocalZone::Named(tz) => t.with_timezone(tz).format(fmt).to_string(),
            LocalZone::Fixed(offset) => t.with_timezone(offset).format(fmt).to_string(),
        }
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalZone::Named(tz) => write!(f, "{}", tz.name()),
            LocalZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

// Where midnight falls in a DST gap, the day starts at the first valid local hour.
fn local_midnight<Z: TimeZone>(zone: &Z, day: NaiveDate) -> Option<DateTime<Utc>> {
    (0..3).find_map(|hour| {
        let local = day.and_hms_opt(hour, 0, 0)?;
        zone.from_local_datetime(&local).earliest().map(|t| t.with_timezone(&Utc))
    })
}

fn zone_field<'de, D>(de: D) -> Result<LocalZone, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(de)?;
    LocalZone::parse(&s).map_err(serde::de::Error::custom)
}

fn offset_field<'de, D>(de: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(de)?;
    parse_offset(&s).map_err(serde::de::Error::custom)
}
