use chrono::{Duration, TimeZone, Utc};
use shillscope::aggregate::{ChartKey, StreamingAggregator};
use shillscope::config::Config;
use shillscope::message::{LinkAnnotation, RawMessage};
use shillscope::metrics::MetricKind;
use shillscope::parser::normalize_all;
use shillscope::tables::TOP_N;

const CHART: &str = "https://dexscreener.com/solana/foo";

fn at(secs: i64) -> String {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::seconds(secs);
    t.to_rfc3339()
}

fn alert(id: i64, token: &str, chart: &str, secs: i64, body: &str) -> RawMessage {
    RawMessage {
        id,
        message: format!("{token} Just launched\n{body}"),
        date: Some(at(secs)),
        views: 0,
        forwards: 0,
        entities: vec![LinkAnnotation::text_url(0, token.len(), chart)],
    }
}

fn aggregate(messages: &[RawMessage]) -> StreamingAggregator {
    let mut agg = StreamingAggregator::new();
    agg.ingest_all(normalize_all(messages, &Config::default(), None));
    agg
}

#[test]
fn recurring_chart_end_to_end() {
    let messages = vec![
        alert(1, "FOO", CHART, 0, "Likes: 50 (+10)"),
        alert(2, "FOO", CHART, 105, "Likes: 80 (+5)"),
        alert(3, "FOO", CHART, 210, "Retweets: 4"),
    ];
    let tables = aggregate(&messages).finalize();

    assert_eq!(tables.most_recurring_charts.len(), 1);
    let row = &tables.most_recurring_charts[0];
    assert_eq!(row.token_name, "FOO");
    assert_eq!(row.chart_link, CHART);
    assert_eq!(row.occurrences, 3);
    assert_eq!(row.avg_inter_arrival, "1:45");
    assert_eq!(*row.metric_means.get(MetricKind::Likes), 65.0);
    assert_eq!(*row.metric_means.get(MetricKind::Retweets), 4.0);
    assert_eq!(*row.metric_means.get(MetricKind::Replies), 0.0);

    let likes = tables.top_disparities.get(MetricKind::Likes);
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].max_disparity, 75);
    assert_eq!(likes[0].date, "11:01:45 01/05/2024");

    let instances = tables.top_metric_instances.get(MetricKind::Likes);
    assert_eq!(instances.iter().map(|m| m.count).collect::<Vec<_>>(), vec![80, 50]);
}

#[test]
fn single_mention_has_no_average() {
    let tables = aggregate(&[alert(1, "FOO", CHART, 0, "")]).finalize();
    assert_eq!(tables.most_recurring_charts[0].avg_inter_arrival, "N/A");
    assert!(tables.top_disparities.get(MetricKind::Likes).is_empty());
}

#[test]
fn records_without_chart_or_time_only_feed_views_pool() {
    let mut no_chart = alert(1, "BAR", CHART, 0, "Likes: 10");
    no_chart.entities.clear();
    no_chart.views = 500;
    let mut bad_time = alert(2, "FOO", CHART, 0, "Likes: 10");
    bad_time.date = Some("not a date".into());
    bad_time.forwards = 9;

    let agg = aggregate(&[no_chart, bad_time]);
    assert!(agg.chart_occurrences().is_empty());
    assert_eq!(agg.skipped_invalid_time(), 1);
    assert!(agg.metric_instances(MetricKind::Likes).is_empty());

    let tables = agg.finalize();
    assert!(tables.most_recurring_charts.is_empty());
    assert_eq!(tables.top_views[0].token_name, "BAR");
    assert_eq!(tables.top_forwards[0].token_name, "FOO");
    assert_eq!(tables.top_forwards[0].timestamp.to_string(), "Invalid date");
}

#[test]
fn malformed_metric_values_count_as_zero() {
    let agg = aggregate(&[alert(1, "FOO", CHART, 0, "Likes: lots\nReplies: 12 (+x)")]);
    let key = ChartKey { token_name: "FOO".into(), chart_link: CHART.into() };
    assert_eq!(agg.pooled_values(MetricKind::Likes, &key), vec![0]);
    assert_eq!(agg.pooled_values(MetricKind::Replies, &key), vec![12]);
    assert_eq!(agg.pooled_values(MetricKind::Bookmarks, &key), Vec::<i64>::new());
}

#[test]
fn means_pool_social_link_variants() {
    let messages = vec![
        alert(1, "FOO", CHART, 0, "Likes: 10\nhttps://x.com/a/status/1"),
        alert(2, "FOO", CHART, 60, "Likes: 30\nhttps://x.com/b/status/2"),
    ];
    let agg = aggregate(&messages);
    assert_eq!(agg.metric_values(MetricKind::Likes).len(), 2);
    let tables = agg.finalize();
    assert_eq!(*tables.most_recurring_charts[0].metric_means.get(MetricKind::Likes), 20.0);
}

#[test]
fn ties_keep_first_seen_order() {
    let messages = vec![
        alert(1, "AAA", "https://dexscreener.com/solana/a", 0, "Likes: 20 (+10)"),
        alert(2, "BBB", "https://dexscreener.com/solana/b", 10, "Likes: 20 (+10)"),
        alert(3, "CCC", "https://dexscreener.com/solana/c", 20, "Likes: 40 (+10)"),
    ];
    let tables = aggregate(&messages).finalize();

    let charts: Vec<&str> = tables.most_recurring_charts.iter().map(|r| r.token_name.as_str()).collect();
    assert_eq!(charts, vec!["AAA", "BBB", "CCC"]);

    let disparities: Vec<&str> = tables
        .top_disparities
        .get(MetricKind::Likes)
        .iter()
        .map(|r| r.token_name.as_str())
        .collect();
    assert_eq!(disparities, vec!["CCC", "AAA", "BBB"]);
}

#[test]
fn tables_are_capped_at_top_n() {
    let messages: Vec<RawMessage> = (0..15)
        .map(|i| {
            let mut m = alert(i, &format!("T{i}"), &format!("https://dexscreener.com/solana/{i}"), i * 10, "Likes: 1");
            m.views = i as u64;
            m
        })
        .collect();
    let tables = aggregate(&messages).finalize();
    assert_eq!(tables.most_recurring_charts.len(), TOP_N);
    assert_eq!(tables.top_metric_instances.get(MetricKind::Likes).len(), TOP_N);
    assert_eq!(tables.top_views.len(), TOP_N);
    assert_eq!(tables.top_views[0].views, 14);
}

#[test]
fn record_without_a_metric_line_stays_out_of_that_metric() {
    let messages = vec![
        alert(1, "FOO", CHART, 0, "Likes: 50 (+10)\nhttps://x.com/foo/status/1"),
        alert(2, "FOO", CHART, 60, "Retweets: 9 (+4)\nhttps://x.com/foo/status/2"),
    ];
    let agg = aggregate(&messages);

    let likes_keys: Vec<&str> = agg.metric_values(MetricKind::Likes).iter().map(|(k, _)| k.social_link.as_str()).collect();
    assert_eq!(likes_keys, vec!["https://x.com/foo/status/1"]);
    let likes_disparity_keys: Vec<&str> =
        agg.metric_disparities(MetricKind::Likes).iter().map(|(k, _)| k.social_link.as_str()).collect();
    assert_eq!(likes_disparity_keys, vec!["https://x.com/foo/status/1"]);
    assert_eq!(agg.metric_instances(MetricKind::Likes).len(), 1);

    let retweet_keys: Vec<&str> = agg.metric_values(MetricKind::Retweets).iter().map(|(k, _)| k.social_link.as_str()).collect();
    assert_eq!(retweet_keys, vec!["https://x.com/foo/status/2"]);

    assert_eq!(agg.candidates().len(), 2);
    assert_eq!(agg.candidates()[1].social_link.as_deref(), Some("https://x.com/foo/status/2"));

    let tables = agg.finalize();
    assert_eq!(tables.most_recurring_charts[0].occurrences, 2);
    assert_eq!(*tables.most_recurring_charts[0].metric_means.get(MetricKind::Likes), 50.0);
    assert_eq!(tables.top_disparities.get(MetricKind::Likes).len(), 1);
    assert_eq!(tables.top_disparities.get(MetricKind::Retweets)[0].max_disparity, 5);
}

#[test]
fn unsorted_archive_still_gives_positive_gaps() {
    let messages = vec![
        alert(1, "FOO", CHART, 210, ""),
        alert(2, "FOO", CHART, 0, ""),
        alert(3, "FOO", CHART, 105, ""),
    ];
    let tables = aggregate(&messages).finalize();
    assert_eq!(tables.most_recurring_charts[0].avg_inter_arrival, "1:45");
}
