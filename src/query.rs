use ahash::AHashMap;
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Reverse;

use crate::aggregate::StreamingAggregator;
use crate::parser::{NormalizedRecord, Timestamp};
use crate::tables::{chart_rows, RecurringChartRow};

pub const RECENT_SOCIAL_LIMIT: usize = 5;

/// Case-insensitive match of `identifier` against the cleaned text or any link target.
pub fn contains_token(rec: &NormalizedRecord, identifier: &str) -> bool {
    let needle = identifier.to_lowercase();
    if rec.clean_text.to_lowercase().contains(&needle) {
        return true;
    }
    rec.links.iter().any(|url| url.to_lowercase().contains(&needle))
}

/// Global token ranks by mention count; ties keep first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TokenRanks {
    ranks: AHashMap<String, usize>,
    ordered: Vec<(String, usize)>,
}

impl TokenRanks {
    pub fn rank(&self, token: &str) -> Option<usize> {
        self.ranks.get(token).copied()
    }

    /// (token, mention count) from rank 1 down.
    pub fn ordered(&self) -> &[(String, usize)] {
        &self.ordered
    }
}

pub fn rank_tokens(records: &[NormalizedRecord]) -> TokenRanks {
    let mut first_seen: AHashMap<&str, usize> = AHashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for rec in records {
        match first_seen.get(rec.token_name.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                first_seen.insert(rec.token_name.as_str(), counts.len());
                counts.push((rec.token_name.clone(), 1));
            }
        }
    }
    let ordered: Vec<(String, usize)> = counts.into_iter().sorted_by_key(|(_, c)| Reverse(*c)).collect();
    let ranks = ordered.iter().enumerate().map(|(i, (t, _))| (t.clone(), i + 1)).collect();
    TokenRanks { ranks, ordered }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRow {
    pub rank: Option<usize>,
    #[serde(flatten)]
    pub chart: RecurringChartRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialMention {
    pub token_name: String,
    pub social_link: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub identifier: String,
    pub matched_records: usize,
    pub rows: Vec<SearchRow>,
    pub recent_social: Vec<SocialMention>,
}

impl SearchReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.recent_social.is_empty()
    }
}

/// Chart entities and recent social posts for every record mentioning `identifier`.
/// Ranks are computed over the full record set, not just the matches.
pub fn search(records: &[NormalizedRecord], identifier: &str) -> SearchReport {
    let ranks = rank_tokens(records);
    let matches: Vec<&NormalizedRecord> = records.iter().filter(|r| contains_token(r, identifier)).collect();

    let mut agg = StreamingAggregator::new();
    agg.ingest_all(matches.iter().map(|r| (*r).clone()));
    let rows = chart_rows(&agg)
        .into_iter()
        .map(|chart| SearchRow { rank: ranks.rank(&chart.token_name), chart })
        .collect();

    let recent_social = matches
        .iter()
        .filter_map(|r| {
            r.social_link.as_ref().map(|link| SocialMention {
                token_name: r.token_name.clone(),
                social_link: link.clone(),
                timestamp: r.timestamp,
            })
        })
        .sorted_by_key(|m| Reverse(m.timestamp.instant()))
        .take(RECENT_SOCIAL_LIMIT)
        .collect();

    SearchReport { identifier: identifier.to_string(), matched_records: matches.len(), rows, recent_social }
}
