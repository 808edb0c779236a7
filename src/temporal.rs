use chrono::{DateTime, TimeZone};

/// Display value for statistics that need more data than was seen.
pub const NOT_AVAILABLE: &str = "N/A";

/// Mean gap in seconds between consecutive timestamps, taken in chronological order.
pub fn mean_gap_seconds<Tz: TimeZone>(times: &[DateTime<Tz>]) -> Option<f64> {
    if times.len() < 2 { return None; }
    let mut sorted = times.to_vec();
    sorted.sort();
    let total: f64 = sorted
        .windows(2)
        .map(|w| (w[1].clone() - w[0].clone()).num_milliseconds() as f64 / 1000.0)
        .sum();
    Some(total / (sorted.len() - 1) as f64)
}

/// Mean inter-arrival time as `M:SS`, truncated toward zero. `None` below two timestamps.
pub fn average_inter_arrival<Tz: TimeZone>(times: &[DateTime<Tz>]) -> Option<String> {
    let avg = mean_gap_seconds(times)?;
    let minutes = (avg / 60.0).trunc();
    let seconds = (avg - minutes * 60.0).trunc();
    Some(format!("{}:{:02}", minutes as i64, seconds as i64))
}

pub fn average_inter_arrival_or_na<Tz: TimeZone>(times: &[DateTime<Tz>]) -> String {
    average_inter_arrival(times).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
