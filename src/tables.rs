use itertools::Itertools;
use serde::Serialize;
use std::cmp::Reverse;

use crate::aggregate::{ChartKey, DetailKey, MetricInstance, StreamingAggregator};
use crate::metrics::{MetricKind, PerMetric};
use crate::parser::{NormalizedRecord, Timestamp};
use crate::temporal::{average_inter_arrival_or_na, NOT_AVAILABLE};

pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringChartRow {
    pub token_name: String,
    pub chart_link: String,
    pub occurrences: usize,
    pub avg_inter_arrival: String,
    /// Means pooled across all social-link variants of the chart; 0 without data.
    pub metric_means: PerMetric<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisparityRow {
    pub token_name: String,
    pub chart_link: String,
    pub social_link: String,
    pub max_disparity: i64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTables {
    pub most_recurring_charts: Vec<RecurringChartRow>,
    pub top_disparities: PerMetric<Vec<DisparityRow>>,
    pub top_metric_instances: PerMetric<Vec<MetricInstance>>,
    pub top_views: Vec<NormalizedRecord>,
    pub top_forwards: Vec<NormalizedRecord>,
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() { return 0.0; }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Row for one chart entity, in the same shape used by recurring-chart and search tables.
pub fn chart_row(agg: &StreamingAggregator, key: &ChartKey) -> Option<RecurringChartRow> {
    let occ = agg.chart_occurrences().get(key)?;
    Some(RecurringChartRow {
        token_name: key.token_name.clone(),
        chart_link: key.chart_link.clone(),
        occurrences: occ.count,
        avg_inter_arrival: average_inter_arrival_or_na(&occ.timestamps),
        metric_means: PerMetric::from_fn(|kind| mean(&agg.pooled_values(kind, key))),
    })
}

/// Every chart entity in first-seen order.
pub fn chart_rows(agg: &StreamingAggregator) -> Vec<RecurringChartRow> {
    agg.chart_occurrences()
        .iter()
        .filter_map(|(key, _)| chart_row(agg, key))
        .collect()
}

pub fn most_recurring_charts(agg: &StreamingAggregator, n: usize) -> Vec<RecurringChartRow> {
    chart_rows(agg)
        .into_iter()
        .sorted_by_key(|r| Reverse(r.occurrences))
        .take(n)
        .collect()
}

fn disparity_row(key: &DetailKey, values: &[(i64, Timestamp)]) -> DisparityRow {
    // First occurrence of the maximum.
    let best = values.iter().fold(None::<&(i64, Timestamp)>, |best, v| match best {
        Some(b) if b.0 >= v.0 => Some(b),
        _ => Some(v),
    });
    let (max_disparity, date) = match best {
        Some((d, ts)) => (*d, ts.to_string()),
        None => (0, NOT_AVAILABLE.to_string()),
    };
    DisparityRow {
        token_name: key.token_name.clone(),
        chart_link: key.chart_link.clone(),
        social_link: key.social_link.clone(),
        max_disparity,
        date,
    }
}

pub fn top_disparities(agg: &StreamingAggregator, kind: MetricKind, n: usize) -> Vec<DisparityRow> {
    agg.metric_disparities(kind)
        .iter()
        .map(|(key, values)| disparity_row(key, values))
        .sorted_by_key(|r| Reverse(r.max_disparity))
        .take(n)
        .collect()
}

pub fn top_metric_instances(agg: &StreamingAggregator, kind: MetricKind, n: usize) -> Vec<MetricInstance> {
    agg.metric_instances(kind)
        .iter()
        .sorted_by_key(|m| Reverse(m.count))
        .take(n)
        .cloned()
        .collect()
}

pub fn top_by<F>(records: &[NormalizedRecord], n: usize, field: F) -> Vec<NormalizedRecord>
where
    F: Fn(&NormalizedRecord) -> u64,
{
    records
        .iter()
        .sorted_by_key(|r| Reverse(field(*r)))
        .take(n)
        .cloned()
        .collect()
}

pub fn build(agg: &StreamingAggregator) -> ReportTables {
    ReportTables {
        most_recurring_charts: most_recurring_charts(agg, TOP_N),
        top_disparities: PerMetric::from_fn(|kind| top_disparities(agg, kind, TOP_N)),
        top_metric_instances: PerMetric::from_fn(|kind| top_metric_instances(agg, kind, TOP_N)),
        top_views: top_by(agg.candidates(), TOP_N, |r| r.views),
        top_forwards: top_by(agg.candidates(), TOP_N, |r| r.forwards),
    }
}
