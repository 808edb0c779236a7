use rust_xlsxwriter::{Workbook, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::aggregate::MetricInstance;
use crate::metrics::MetricKind;
use crate::parser::NormalizedRecord;
use crate::query::SearchReport;
use crate::tables::{DisparityRow, RecurringChartRow, ReportTables};
use crate::temporal::NOT_AVAILABLE;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("cannot write spreadsheet {path}: {source}")]
    Xlsx { path: PathBuf, source: XlsxError },
    #[error("cannot serialize report {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn display_len(&self) -> usize {
        match self {
            Cell::Text(s) => s.chars().count(),
            Cell::Int(n) => n.to_string().len(),
        }
    }
}

/// A header row plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Tables stacked vertically on one worksheet, separated by `gap` blank rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub tables: Vec<Table>,
    pub gap: u32,
}

impl Sheet {
    /// First row of each table (its header row).
    pub fn table_starts(&self) -> Vec<u32> {
        let mut row = 0u32;
        self.tables
            .iter()
            .map(|t| {
                let start = row;
                row += 1 + t.rows.len() as u32 + self.gap;
                start
            })
            .collect()
    }

    /// Widest cell per column (headers included) plus padding.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for t in &self.tables {
            let header_lens = t.headers.iter().map(|h| h.chars().count());
            let row_lens = t.rows.iter().flat_map(|r| r.iter().map(Cell::display_len).enumerate());
            for (i, len) in header_lens.enumerate().chain(row_lens) {
                if widths.len() <= i {
                    widths.resize(i + 1, 0);
                }
                widths[i] = widths[i].max(len);
            }
        }
        widths.into_iter().map(|w| w + 2).collect()
    }
}

fn fmt_mean(v: f64) -> String {
    format!("{v:.2}")
}

fn opt(s: &Option<String>) -> String {
    s.clone().unwrap_or_default()
}

fn recurring_table(rows: &[RecurringChartRow]) -> Table {
    let mut headers: Vec<String> = vec!["Token".into(), "📈 Chart Link".into(), "Occur.".into(), "Avg Time (m:s)".into()];
    headers.extend(MetricKind::ALL.iter().map(|k| k.glyph().to_string()));
    let rows = rows
        .iter()
        .map(|r| {
            let mut cells = vec![
                Cell::text(&r.token_name),
                Cell::text(&r.chart_link),
                Cell::Int(r.occurrences as i64),
                Cell::text(&r.avg_inter_arrival),
            ];
            cells.extend(r.metric_means.iter().map(|(_, m)| Cell::Text(fmt_mean(*m))));
            cells
        })
        .collect();
    Table { headers, rows }
}

fn disparity_table(kind: MetricKind, rows: &[DisparityRow]) -> Table {
    Table {
        headers: vec![
            "Token".into(),
            "📈 Chart Link".into(),
            "x.com Link".into(),
            format!("Max {kind} Disparity"),
            "Date".into(),
        ],
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    Cell::text(&r.token_name),
                    Cell::text(&r.chart_link),
                    Cell::text(&r.social_link),
                    Cell::Int(r.max_disparity),
                    Cell::text(&r.date),
                ]
            })
            .collect(),
    }
}

fn instances_table(rows: &[MetricInstance]) -> Table {
    Table {
        headers: ["Token", "Metric", "Value", "Date", "📈 Chart Link", "x.com Link"].map(String::from).to_vec(),
        rows: rows
            .iter()
            .map(|m| {
                vec![
                    Cell::text(&m.token_name),
                    Cell::text(m.metric.label()),
                    Cell::Int(m.count),
                    Cell::Text(m.timestamp.to_string()),
                    Cell::text(&m.chart_link),
                    Cell::text(&m.social_link),
                ]
            })
            .collect(),
    }
}

fn records_table(rows: &[NormalizedRecord]) -> Table {
    Table {
        headers: ["date", "token_name", "message_text", "url", "x.com Link", "views", "forwards"]
            .map(String::from)
            .to_vec(),
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    Cell::Text(r.timestamp.to_string()),
                    Cell::text(&r.token_name),
                    Cell::text(&r.clean_text),
                    Cell::Text(opt(&r.chart_link)),
                    Cell::Text(opt(&r.social_link)),
                    Cell::Int(r.views as i64),
                    Cell::Int(r.forwards as i64),
                ]
            })
            .collect(),
    }
}

/// Worksheet layout of the full report.
pub fn layout(tables: &ReportTables) -> Vec<Sheet> {
    vec![
        Sheet {
            name: "Most Recurring Charts".into(),
            tables: vec![recurring_table(&tables.most_recurring_charts)],
            gap: 0,
        },
        Sheet {
            name: "Top 10 Disparities".into(),
            tables: tables
                .top_disparities
                .iter()
                .filter(|(_, rows)| !rows.is_empty())
                .map(|(kind, rows)| disparity_table(kind, rows))
                .collect(),
            gap: 2,
        },
        Sheet {
            name: "Top Metrics Instances".into(),
            tables: tables.top_metric_instances.iter().map(|(_, rows)| instances_table(rows)).collect(),
            gap: 2,
        },
        Sheet {
            name: "Top Views & Forwards".into(),
            tables: vec![records_table(&tables.top_views), records_table(&tables.top_forwards)],
            gap: 1,
        },
    ]
}

pub fn write_xlsx(path: &Path, sheets: &[Sheet]) -> Result<(), ReportError> {
    let xlsx_err = |source: XlsxError| ReportError::Xlsx { path: path.to_path_buf(), source };
    let mut workbook = Workbook::new();
    for sheet in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(&sheet.name).map_err(xlsx_err)?;
        for (table, start) in sheet.tables.iter().zip(sheet.table_starts()) {
            for (col, h) in table.headers.iter().enumerate() {
                ws.write_string(start, col as u16, h).map_err(xlsx_err)?;
            }
            for (i, row) in table.rows.iter().enumerate() {
                let r = start + 1 + i as u32;
                for (col, cell) in row.iter().enumerate() {
                    match cell {
                        Cell::Text(s) => ws.write_string(r, col as u16, s),
                        Cell::Int(n) => ws.write_number(r, col as u16, *n as f64),
                    }
                    .map_err(xlsx_err)?;
                }
            }
        }
        for (col, width) in sheet.column_widths().into_iter().enumerate() {
            ws.set_column_width(col as u16, width as f64).map_err(xlsx_err)?;
        }
    }
    workbook.save(path).map_err(xlsx_err)?;
    Ok(())
}

pub fn write_json(path: &Path, tables: &ReportTables) -> Result<(), ReportError> {
    let body = serde_json::to_string_pretty(tables)
        .map_err(|source| ReportError::Json { path: path.to_path_buf(), source })?;
    std::fs::write(path, body).map_err(|source| ReportError::Io { path: path.to_path_buf(), source })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xlsx,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Json => "json",
        }
    }
}

/// `"<base> V<n>.<ext>"` in `dir` with the smallest unused `n >= 1`.
pub fn versioned_path(dir: &Path, base: &str, extension: &str) -> PathBuf {
    (1u32..)
        .map(|v| dir.join(format!("{base} V{v}.{extension}")))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join(format!("{base}.{extension}")))
}

/// Writes the report under a fresh versioned name and returns the path used.
pub fn save_report(dir: &Path, base: &str, format: ReportFormat, tables: &ReportTables) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::Io { path: dir.to_path_buf(), source })?;
    let path = versioned_path(dir, base, format.extension());
    match format {
        ReportFormat::Xlsx => write_xlsx(&path, &layout(tables))?,
        ReportFormat::Json => write_json(&path, tables)?,
    }
    info!(path = %path.display(), "report saved");
    Ok(path)
}

/// Launches the platform's default handler for `path`.
pub fn open_file(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(target_os = "macos")]
    let mut cmd = std::process::Command::new("open");
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let mut cmd = std::process::Command::new("xdg-open");
    cmd.arg(path).spawn().map(|_| ())
}

/// Box-drawn console table.
pub fn render_grid(table: &Table) -> String {
    let sheet = Sheet { name: String::new(), tables: vec![table.clone()], gap: 0 };
    let widths = sheet.column_widths();
    let rule = |l: &str, m: &str, r: &str, fill: &str| {
        let parts: Vec<String> = widths.iter().map(|w| fill.repeat(*w)).collect();
        format!("{l}{}{r}\n", parts.join(m))
    };
    let line = |cells: Vec<String>| {
        let parts: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!(" {c}{} ", " ".repeat(w - 2 - c.chars().count().min(w - 2))))
            .collect();
        format!("│{}│\n", parts.join("│"))
    };
    let cell_text = |c: &Cell| match c {
        Cell::Text(s) => s.clone(),
        Cell::Int(n) => n.to_string(),
    };

    let mut out = rule("╒", "╤", "╕", "═");
    out.push_str(&line(table.headers.clone()));
    out.push_str(&rule("╞", "╪", "╡", "═"));
    for (i, row) in table.rows.iter().enumerate() {
        if i > 0 {
            out.push_str(&rule("├", "┼", "┤", "─"));
        }
        out.push_str(&line(row.iter().map(cell_text).collect()));
    }
    out.push_str(&rule("╘", "╧", "╛", "═"));
    out
}

/// Console tables for an identifier search.
pub fn render_search(report: &SearchReport) -> String {
    let mut out = String::new();
    if !report.rows.is_empty() {
        let mut headers: Vec<String> = ["Rank", "Token", "📈 Chart Link", "Occur.", "Avg Time (m:s)"].map(String::from).to_vec();
        headers.extend(MetricKind::ALL.iter().map(|k| k.glyph().to_string()));
        let rows = report
            .rows
            .iter()
            .map(|r| {
                let mut cells = vec![
                    r.rank.map_or(Cell::text(NOT_AVAILABLE), |n| Cell::Int(n as i64)),
                    Cell::text(&r.chart.token_name),
                    Cell::text(&r.chart.chart_link),
                    Cell::Int(r.chart.occurrences as i64),
                    Cell::text(&r.chart.avg_inter_arrival),
                ];
                cells.extend(r.chart.metric_means.iter().map(|(_, m)| Cell::Text(fmt_mean(*m))));
                cells
            })
            .collect();
        out.push_str(&render_grid(&Table { headers, rows }));
    }
    if report.recent_social.is_empty() {
        out.push_str("\nNo information could be found from this token,\n");
        out.push_str("this can mean the token CA is incorrect or there\n");
        out.push_str(&format!("has been no interaction between the channel and this token '{}'.\n", report.identifier));
    } else {
        let table = Table {
            headers: ["Token", "🔗 x.com Link", "Time (UTC+1)"].map(String::from).to_vec(),
            rows: report
                .recent_social
                .iter()
                .map(|m| vec![Cell::text(&m.token_name), Cell::text(&m.social_link), Cell::Text(m.timestamp.to_string())])
                .collect(),
        };
        out.push_str(&render_grid(&table));
    }
    out
}
