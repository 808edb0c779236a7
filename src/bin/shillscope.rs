use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shillscope::aggregate::StreamingAggregator;
use shillscope::config::Config;
use shillscope::report::{self, ReportFormat};
use shillscope::source::{fetch_messages, ArchiveSource, FetchOpts, TimeRange};
use shillscope::{archive, parser, query};

#[derive(Parser, Debug)]
#[command(name = "shillscope", version, about = "Shill channel scraper and engagement report")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long = "config", default_value = "config.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch messages since a start date, aggregate them and optionally save a report
    Scan(ScanArgs),
    /// Look up a token identifier (e.g. contract address) in the archived history
    Search(SearchArgs),
    /// Verify configuration and message source access
    Check,
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Start date: `today` or YYYY-MM-DD (configured time zone)
    #[arg(long = "from")] from: Option<String>,
    /// Only aggregate messages whose display date is this day (YYYY-MM-DD)
    #[arg(long = "date")] date: Option<NaiveDate>,
    /// Reuse the existing archive instead of fetching
    #[arg(long = "no-fetch", default_value_t = false)] no_fetch: bool,
    /// Save the report without asking
    #[arg(long = "save", default_value_t = false)] save: bool,
    /// Report file base name (defaults to today's date)
    #[arg(long = "name")] name: Option<String>,
    #[arg(long = "format", value_enum, default_value_t = FormatArg::Xlsx)] format: FormatArg,
    /// Open the saved report
    #[arg(long = "open", default_value_t = false)] open: bool,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Token identifier; prompted for when omitted
    identifier: Option<String>,
    /// Fetch new messages into the archive before searching
    #[arg(long = "refresh", default_value_t = false)] refresh: bool,
    /// Print the search result as JSON
    #[arg(long = "json", default_value_t = false)] json: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum FormatArg {
    #[default]
    Xlsx,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Xlsx => ReportFormat::Xlsx,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

fn interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shillscope=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config)?;

    let command = match cli.command {
        Some(c) => c,
        None if interactive() => prompt_command()?,
        None => bail!("no command given; see --help"),
    };
    match command {
        Command::Scan(args) => run_scan(&cfg, args),
        Command::Search(args) => run_search(&cfg, args),
        Command::Check => run_check(&cfg),
    }
}

fn prompt_command() -> anyhow::Result<Command> {
    let choice = Select::new()
        .with_prompt("Choose an option")
        .items(&["Scan (what is being shilled today or since a date)", "Search a token"])
        .default(0)
        .interact()?;
    Ok(match choice {
        0 => Command::Scan(ScanArgs::default()),
        _ => Command::Search(SearchArgs { identifier: None, refresh: false, json: false }),
    })
}

fn resolve_start_day(cfg: &Config, from: Option<String>) -> anyhow::Result<NaiveDate> {
    let today = cfg.timezone.date_of(Utc::now());
    let raw = match from {
        Some(s) => s,
        None if interactive() => {
            let choice = Select::new()
                .with_prompt("Fetch messages from")
                .items(&["Start of today", "A specific date"])
                .default(0)
                .interact()?;
            if choice == 0 {
                "today".to_string()
            } else {
                Input::<String>::new().with_prompt("Start date (YYYY-MM-DD)").interact_text()?
            }
        }
        None => "today".to_string(),
    };
    if raw.trim().eq_ignore_ascii_case("today") {
        return Ok(today);
    }
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(d) => Ok(d),
        Err(_) => {
            warn!(input = %raw, "invalid start date, using the start of today");
            Ok(today)
        }
    }
}

fn stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || s.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "cannot install Ctrl-C handler");
    }
    stop
}

/// Pulls messages since `start_day` from the source and replaces the archive with them.
fn refresh_archive(cfg: &Config, start_day: NaiveDate) -> anyhow::Result<Vec<shillscope::message::RawMessage>> {
    let mut source = ArchiveSource::open(cfg.channel_url.clone(), &cfg.source_path)
        .with_context(|| format!("opening message source {}", cfg.source_path.display()))?;
    let range = TimeRange::since_day(start_day, &cfg.timezone, Utc::now());
    info!(start = %range.start, end = %range.end, "fetching messages");
    let opts = FetchOpts { progress: interactive(), ..FetchOpts::from_config(cfg) };
    let outcome = fetch_messages(&mut source, range, &opts, &stop_flag());
    if let Some(reason) = &outcome.halted {
        eprintln!("Retrieval stopped early ({reason}); continuing with {} messages.", outcome.messages.len());
    }
    archive::save(&cfg.archive_path, &outcome.messages)
        .with_context(|| format!("writing archive {}", cfg.archive_path.display()))?;
    Ok(outcome.messages)
}

fn confirm(prompt: &str, flag: bool) -> anyhow::Result<bool> {
    if flag || !interactive() {
        return Ok(flag);
    }
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn run_scan(cfg: &Config, args: ScanArgs) -> anyhow::Result<()> {
    let messages = if args.no_fetch {
        archive::load(&cfg.archive_path).with_context(|| format!("reading archive {}", cfg.archive_path.display()))?
    } else {
        let start_day = resolve_start_day(cfg, args.from.clone())?;
        refresh_archive(cfg, start_day)?
    };

    let records = parser::normalize_all(&messages, cfg, args.date);
    let mut agg = StreamingAggregator::new();
    agg.ingest_all(records);
    if agg.skipped_invalid_time() > 0 {
        warn!(count = agg.skipped_invalid_time(), "chart mentions without a valid time were left out");
    }
    let tables = agg.finalize();

    let sheets = report::layout(&tables);
    if let Some(first) = sheets.first().and_then(|s| s.tables.first()) {
        println!("Most Recurring Charts");
        print!("{}", report::render_grid(first));
    }

    if !confirm("Save the tables to a file?", args.save)? {
        println!("The tables were not saved.");
        return Ok(());
    }
    let today = cfg.timezone.format(Utc::now(), "%d.%m.%Y");
    let base = match args.name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        Some(_) => today,
        None if interactive() => {
            let n: String = Input::new()
                .with_prompt("File name (without extension, empty for today's date)")
                .allow_empty(true)
                .interact_text()?;
            if n.trim().is_empty() { today } else { n.trim().to_string() }
        }
        None => today,
    };
    let path = report::save_report(&cfg.output_directory, &base, args.format.into(), &tables)
        .with_context(|| format!("saving report in {}", cfg.output_directory.display()))?;
    println!("The tables have been saved to {}", path.display());

    if confirm("Open the file now?", args.open)? {
        if let Err(e) = report::open_file(&path) {
            eprintln!("Unable to open the file: {e}");
        }
    }
    Ok(())
}

fn run_search(cfg: &Config, args: SearchArgs) -> anyhow::Result<()> {
    let identifier = match args.identifier {
        Some(id) => id,
        None if interactive() => Input::<String>::new().with_prompt("Token CA (contract address)").interact_text()?,
        None => bail!("an identifier is required"),
    };
    let identifier = identifier.trim().to_string();
    if identifier.is_empty() {
        bail!("an identifier is required");
    }

    let messages = if confirm("Fetch new messages first?", args.refresh)? {
        let start_day = resolve_start_day(cfg, None)?;
        refresh_archive(cfg, start_day)?
    } else {
        archive::load(&cfg.archive_path).with_context(|| format!("reading archive {}", cfg.archive_path.display()))?
    };

    let records = parser::normalize_all(&messages, cfg, None);
    let result = query::search(&records, &identifier);
    info!(identifier = %identifier, matched = result.matched_records, charts = result.rows.len(), "search finished");
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", report::render_search(&result));
    }
    Ok(())
}

fn run_check(cfg: &Config) -> anyhow::Result<()> {
    let source = ArchiveSource::open(cfg.channel_url.clone(), &cfg.source_path)
        .with_context(|| format!("opening message source {}", cfg.source_path.display()))?;
    let channel = if cfg.channel_url.is_empty() { "(unset)" } else { cfg.channel_url.as_str() };
    println!("Channel: {channel}");
    println!("Messages available: {}", source.len());
    println!("Archive: {}", cfg.archive_path.display());
    println!("Current time in {}: {}", cfg.timezone, cfg.timezone.format(Utc::now(), "%Y-%m-%d %H:%M:%S"));
    Ok(())
}
