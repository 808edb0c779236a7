use ahash::AHashMap;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::hash::Hash;
use tracing::debug;

use crate::metrics::{parse_metric_fragment, MetricKind, PerMetric};
use crate::parser::{NormalizedRecord, Timestamp};
use crate::tables::{self, ReportTables};

/// (token, chart link): unit of occurrence counting and timing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChartKey {
    pub token_name: String,
    pub chart_link: String,
}

/// (token, chart link, social link): unit of metric and disparity tracking.
/// A missing social link is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DetailKey {
    pub token_name: String,
    pub chart_link: String,
    pub social_link: String,
}

impl DetailKey {
    pub fn chart_key(&self) -> ChartKey {
        ChartKey { token_name: self.token_name.clone(), chart_link: self.chart_link.clone() }
    }

    pub fn belongs_to(&self, chart: &ChartKey) -> bool {
        self.token_name == chart.token_name && self.chart_link == chart.chart_link
    }
}

/// Hash-indexed map that iterates in first-insertion order.
#[derive(Debug, Clone)]
pub struct Ordered<K, V> {
    index: AHashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Ordered<K, V> {
    fn default() -> Self {
        Self { index: AHashMap::new(), entries: Vec::new() }
    }
}

impl<K: Eq + Hash + Clone, V: Default> Ordered<K, V> {
    pub fn entry(&mut self, key: &K) -> &mut V {
        let idx = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.entries.push((key.clone(), V::default()));
                self.index.insert(key.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }
}

impl<K: Eq + Hash, V> Ordered<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartOccurrence {
    pub count: usize,
    pub timestamps: Vec<DateTime<FixedOffset>>,
}

/// One (record, metric) observation kept for the top-instances table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricInstance {
    pub token_name: String,
    pub metric: MetricKind,
    pub count: i64,
    pub timestamp: Timestamp,
    pub chart_link: String,
    pub social_link: String,
}

/// Folds normalized records, in chronological order, into the accumulators the
/// report tables are built from.
#[derive(Debug, Default)]
pub struct StreamingAggregator {
    chart_occurrence: Ordered<ChartKey, ChartOccurrence>,
    metric_values: PerMetric<Ordered<DetailKey, Vec<i64>>>,
    metric_disparities: PerMetric<Ordered<DetailKey, Vec<(i64, Timestamp)>>>,
    top_metric_instances: PerMetric<Vec<MetricInstance>>,
    candidates: Vec<NormalizedRecord>,
    skipped_invalid_time: usize,
}

impl StreamingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, rec: NormalizedRecord) {
        self.fold_chart(&rec);
        self.candidates.push(rec);
    }

    pub fn ingest_all(&mut self, records: impl IntoIterator<Item = NormalizedRecord>) {
        for rec in records {
            self.ingest(rec);
        }
    }

    fn fold_chart(&mut self, rec: &NormalizedRecord) {
        let chart_link = match rec.chart_link.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => return,
        };
        let at = match rec.timestamp {
            Timestamp::Valid(t) => t,
            Timestamp::Invalid => {
                self.skipped_invalid_time += 1;
                debug!(token = %rec.token_name, "chart mention without a valid time left out of chart stats");
                return;
            }
        };

        let detail = DetailKey {
            token_name: rec.token_name.clone(),
            chart_link: chart_link.to_string(),
            social_link: rec.social_link.clone().unwrap_or_default(),
        };
        let occ = self.chart_occurrence.entry(&detail.chart_key());
        occ.count += 1;
        occ.timestamps.push(at);

        for (kind, fragment) in rec.metrics.iter() {
            let Some(fragment) = fragment else { continue };
            let value = parse_metric_fragment(fragment);
            self.metric_values.get_mut(kind).entry(&detail).push(value.count);
            self.metric_disparities.get_mut(kind).entry(&detail).push((value.disparity, rec.timestamp));
            self.top_metric_instances.get_mut(kind).push(MetricInstance {
                token_name: detail.token_name.clone(),
                metric: kind,
                count: value.count,
                timestamp: rec.timestamp,
                chart_link: detail.chart_link.clone(),
                social_link: detail.social_link.clone(),
            });
        }
    }

    pub fn chart_occurrences(&self) -> &Ordered<ChartKey, ChartOccurrence> {
        &self.chart_occurrence
    }

    pub fn metric_values(&self, kind: MetricKind) -> &Ordered<DetailKey, Vec<i64>> {
        self.metric_values.get(kind)
    }

    pub fn metric_disparities(&self, kind: MetricKind) -> &Ordered<DetailKey, Vec<(i64, Timestamp)>> {
        self.metric_disparities.get(kind)
    }

    pub fn metric_instances(&self, kind: MetricKind) -> &[MetricInstance] {
        self.top_metric_instances.get(kind)
    }

    pub fn candidates(&self) -> &[NormalizedRecord] {
        &self.candidates
    }

    /// Chart mentions dropped because their time could not be parsed.
    pub fn skipped_invalid_time(&self) -> usize {
        self.skipped_invalid_time
    }

    /// Values of `kind` pooled over every social-link variant of `chart`.
    pub fn pooled_values(&self, kind: MetricKind, chart: &ChartKey) -> Vec<i64> {
        self.metric_values
            .get(kind)
            .iter()
            .filter(|(k, _)| k.belongs_to(chart))
            .flat_map(|(_, v)| v.iter().copied())
            .collect()
    }

    pub fn finalize(self) -> ReportTables {
        tables::build(&self)
    }
}
