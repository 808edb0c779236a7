use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Entity tag Telegram uses for text spans that carry a hidden URL.
pub const TEXT_URL_ENTITY: &str = "MessageEntityTextUrl";

/// One channel post as delivered by the message source and persisted in the archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    /// ISO-8601 instant; kept as text because archives may carry malformed values.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub forwards: u64,
    #[serde(default)]
    pub entities: Vec<LinkAnnotation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkAnnotation {
    #[serde(rename = "_", default)]
    pub kind: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl LinkAnnotation {
    pub fn text_url(offset: usize, length: usize, url: impl Into<String>) -> Self {
        Self { kind: TEXT_URL_ENTITY.to_string(), offset, length, url: Some(url.into()) }
    }

    /// Target URL when this annotation is a hidden-link span.
    pub fn link_target(&self) -> Option<&str> {
        if self.kind == TEXT_URL_ENTITY { self.url.as_deref() } else { None }
    }
}

impl RawMessage {
    /// Targets of all link annotations, in message order.
    pub fn link_targets(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().filter_map(|e| e.link_target())
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(crate::parser::parse_instant)
    }
}

fn lenient_text<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<String>::deserialize(de)?;
    Ok(v.unwrap_or_default())
}

// Telethon dumps counts as ints, but null and numeric strings show up in older archives.
fn lenient_count<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    })
}
