use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Engagement metrics reported on the social post behind a shill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricKind {
    Likes,
    Retweets,
    Replies,
    Bookmarks,
}

impl MetricKind {
    /// Line-matching priority and table order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Likes,
        MetricKind::Retweets,
        MetricKind::Replies,
        MetricKind::Bookmarks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Likes => "Likes",
            MetricKind::Retweets => "Retweets",
            MetricKind::Replies => "Replies",
            MetricKind::Bookmarks => "Bookmarks",
        }
    }

    /// Column glyph used in report headers.
    pub fn glyph(self) -> &'static str {
        match self {
            MetricKind::Likes => "❤️",
            MetricKind::Retweets => "🔄",
            MetricKind::Replies => "💬",
            MetricKind::Bookmarks => "🔖",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One `T` per metric kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerMetric<T> {
    slots: [T; 4],
}

impl<T> PerMetric<T> {
    pub fn from_fn(mut f: impl FnMut(MetricKind) -> T) -> Self {
        Self { slots: MetricKind::ALL.map(&mut f) }
    }

    pub fn get(&self, kind: MetricKind) -> &T {
        &self.slots[kind.index()]
    }

    pub fn get_mut(&mut self, kind: MetricKind) -> &mut T {
        &mut self.slots[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &T)> {
        MetricKind::ALL.into_iter().zip(self.slots.iter())
    }
}

impl<T: Serialize> Serialize for PerMetric<T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.slots.len()))?;
        for (kind, v) in self.iter() {
            map.serialize_entry(kind.label(), v)?;
        }
        map.end()
    }
}

/// Parsed metric fragment such as `"120 (+15)"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricValue {
    pub count: i64,
    pub disparity: i64,
}

/// Leading count and count-minus-delta of a raw fragment. Failures give 0.
pub fn parse_metric_fragment(fragment: &str) -> MetricValue {
    MetricValue { count: parse_count(fragment), disparity: parse_disparity(fragment) }
}

fn parse_count(fragment: &str) -> i64 {
    fragment
        .split_whitespace()
        .next()
        .map(|tok| tok.replace(['(', '+'], ""))
        .and_then(|tok| tok.parse::<i64>().ok())
        .unwrap_or(0)
}

fn parse_disparity(fragment: &str) -> i64 {
    let count = fragment.split_whitespace().next().and_then(|tok| tok.parse::<i64>().ok());
    let delta = fragment
        .split("(+")
        .nth(1)
        .map(|d| d.replace(')', ""))
        .and_then(|d| d.trim().parse::<i64>().ok());
    match (count, delta) {
        (Some(count), Some(delta)) => count - delta,
        _ => 0,
    }
}

fn label_position(line: &str, label: &str) -> Option<usize> {
    line.match_indices(label)
        .filter(|(i, _)| *i == 0 || line[..*i].ends_with(char::is_whitespace))
        .map(|(i, _)| i)
        .last()
}

/// Raw fragments found on lines carrying `"<Metric>: "`. Absent metrics stay `None`.
pub fn extract_metric_fragments(text: &str) -> PerMetric<Option<String>> {
    let mut out: PerMetric<Option<String>> = PerMetric::default();
    for line in text.lines() {
        for kind in MetricKind::ALL {
            let label = format!("{}: ", kind.label());
            if let Some(pos) = label_position(line, &label) {
                *out.get_mut(kind) = Some(line[pos + label.len()..].to_string());
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_parsing() {
        assert_eq!(parse_metric_fragment("120 (+15)"), MetricValue { count: 120, disparity: 105 });
        assert_eq!(parse_metric_fragment("45"), MetricValue { count: 45, disparity: 0 });
        assert_eq!(parse_metric_fragment("abc"), MetricValue { count: 0, disparity: 0 });
        assert_eq!(parse_metric_fragment(""), MetricValue { count: 0, disparity: 0 });
        assert_eq!(parse_metric_fragment("+7"), MetricValue { count: 7, disparity: 0 });
        assert_eq!(parse_metric_fragment("30 (+5) hot"), MetricValue { count: 30, disparity: 0 });
    }

    #[test]
    fn fragments_by_line() {
        let text = "FOO Just launched\n❤ Likes: 50 (+10)\n🔄 Retweets: 7\nnothing";
        let f = extract_metric_fragments(text);
        assert_eq!(f.get(MetricKind::Likes).as_deref(), Some("50 (+10)"));
        assert_eq!(f.get(MetricKind::Retweets).as_deref(), Some("7"));
        assert_eq!(f.get(MetricKind::Replies), &None);
    }

    #[test]
    fn label_needs_word_boundary_before_it() {
        let f = extract_metric_fragments("SuperLikes: 9\nLikes: 3");
        assert_eq!(f.get(MetricKind::Likes).as_deref(), Some("3"));
    }

    #[test]
    fn one_metric_claims_a_line() {
        let f = extract_metric_fragments("x Likes: 4 | Retweets: 2");
        assert_eq!(f.get(MetricKind::Likes).as_deref(), Some("4 | Retweets: 2"));
        assert_eq!(f.get(MetricKind::Retweets), &None);
    }

    #[test]
    fn per_metric_slots_follow_kind_order() {
        let labels = PerMetric::from_fn(|kind| kind.label().len());
        assert_eq!(labels.iter().map(|(k, v)| (k, *v)).collect::<Vec<_>>(), vec![
            (MetricKind::Likes, 5),
            (MetricKind::Retweets, 8),
            (MetricKind::Replies, 7),
            (MetricKind::Bookmarks, 9),
        ]);
        let json = serde_json::to_string(&labels).unwrap();
        assert_eq!(json, r#"{"Likes":5,"Retweets":8,"Replies":7,"Bookmarks":9}"#);
    }
}
