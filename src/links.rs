use once_cell::sync::Lazy;
use regex::Regex;

use crate::message::RawMessage;

pub const CHART_PREFIX: &str = "https://dexscreener.com/";
pub const SOCIAL_PREFIX: &str = "https://x.com/";

static RE_CHART: Lazy<Regex> = Lazy::new(|| Regex::new(r"https://dexscreener\.com/\S+").unwrap());
static RE_SOCIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https://x\.com/\S+").unwrap());

/// Link annotations first, then the first inline occurrence in `text`.
fn two_tier<'a>(
    text: &str,
    annotations: impl IntoIterator<Item = &'a str>,
    prefix: &str,
    inline: &Regex,
) -> Option<String> {
    annotations
        .into_iter()
        .find(|url| url.starts_with(prefix))
        .map(str::to_string)
        .or_else(|| inline.find(text).map(|m| m.as_str().to_string()))
}

pub fn extract_chart_link<'a>(text: &str, annotations: impl IntoIterator<Item = &'a str>) -> Option<String> {
    two_tier(text, annotations, CHART_PREFIX, &RE_CHART)
}

pub fn extract_social_link<'a>(text: &str, annotations: impl IntoIterator<Item = &'a str>) -> Option<String> {
    two_tier(text, annotations, SOCIAL_PREFIX, &RE_SOCIAL)
}

/// Chart and social link of a message, looked up in `text` (normally the cleaned body).
pub fn message_links(msg: &RawMessage, text: &str) -> (Option<String>, Option<String>) {
    (
        extract_chart_link(text, msg.link_targets()),
        extract_social_link(text, msg.link_targets()),
    )
}
