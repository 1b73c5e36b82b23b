//! Barsilo CLI — fetch, validate, and label commands.
//!
//! Commands:
//! - `fetch` — download daily bars from Yahoo Finance into the parquet cache
//! - `validate` — quality-check cached files, optionally repairing them
//! - `label` — attach forward-return labels to cached series and write one table

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use barsilo_core::{
    fetch_and_cache, label_frame, report_csv, validate_batch, DeadZonePolicy, FetchOptions,
    LabelParams, QualityReport, SeriesStore, StdoutProgress, ValidateOptions, YahooDaily,
};

#[derive(Parser)]
#[command(
    name = "barsilo",
    about = "Barsilo CLI — daily OHLCV bar silo and trend labeler"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily bars from Yahoo Finance into the parquet cache.
    Fetch {
        /// Tickers to fetch (e.g., SPY QQQ AAPL).
        #[arg(long, required = true, num_args = 1..)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD) for tickers with no cache yet.
        #[arg(long, default_value = "2010-01-01")]
        start: String,

        /// End date (YYYY-MM-DD, exclusive). Defaults to tomorrow, UTC.
        #[arg(long)]
        end: Option<String>,

        /// Cache directory. Defaults to $BARSILO_DATA_DIR, then data/raw.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Refetch the full window and replace the cached series.
        #[arg(long, default_value_t = false)]
        force_full: bool,
    },
    /// Quality-check cached files, optionally repairing them.
    Validate {
        /// Cache directory. Defaults to $BARSILO_DATA_DIR, then data/raw.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Tickers to check. Defaults to every cached file.
        #[arg(long, num_args = 1..)]
        tickers: Option<Vec<String>>,

        /// Re-coerce dates, sort, and drop duplicate days before checking.
        #[arg(long, default_value_t = false)]
        fix: bool,

        /// Persist repaired frames back to their cache files (with --fix).
        #[arg(long, default_value_t = false)]
        write_back: bool,

        /// Also write the report as CSV to this path.
        #[arg(long)]
        report_out: Option<PathBuf>,
    },
    /// Attach forward-return labels to cached series and write one table.
    Label {
        /// Cache directory. Defaults to $BARSILO_DATA_DIR, then data/raw.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Tickers to label. Defaults to every cached file.
        #[arg(long, num_args = 1..)]
        tickers: Option<Vec<String>>,

        /// Price column the forward return is computed from.
        #[arg(long, default_value = "adj_close")]
        price_col: String,

        /// Forward horizon in rows.
        #[arg(long, default_value_t = 1)]
        horizon: usize,

        /// Dead-zone half-width on the log-return scale.
        #[arg(long, default_value_t = 1e-3)]
        epsilon: f64,

        /// Encode dead-zone rows as 0 instead of leaving them null.
        #[arg(long, default_value_t = false)]
        fill_deadzone: bool,

        /// Output parquet path.
        #[arg(long, default_value = "data/labels.parquet")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            tickers,
            start,
            end,
            out_dir,
            force_full,
        } => run_fetch(tickers, &start, end.as_deref(), out_dir, force_full),
        Commands::Validate {
            data_dir,
            tickers,
            fix,
            write_back,
            report_out,
        } => run_validate(data_dir, tickers, fix, write_back, report_out),
        Commands::Label {
            data_dir,
            tickers,
            price_col,
            horizon,
            epsilon,
            fill_deadzone,
            out,
        } => run_label(
            data_dir,
            tickers,
            price_col,
            horizon,
            epsilon,
            fill_deadzone,
            out,
        ),
    }
}

/// Flag wins, then `BARSILO_DATA_DIR`, then `data/raw`.
fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os("BARSILO_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data/raw"))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn run_fetch(
    tickers: Vec<String>,
    start: &str,
    end: Option<&str>,
    out_dir: Option<PathBuf>,
    force_full: bool,
) -> Result<()> {
    let opts = FetchOptions {
        start: parse_date(start)?,
        end: end.map(parse_date).transpose()?,
        force_full,
    };
    let store = SeriesStore::new(resolve_data_dir(out_dir));
    let provider = YahooDaily::new();

    let summary = fetch_and_cache(&provider, &store, &tickers, &opts, Some(&StdoutProgress));

    let written = summary.written_paths();
    if !written.is_empty() {
        println!();
        println!("Cached files:");
        for path in written {
            println!("  {}", path.display());
        }
    }

    // failures stay inline; a partial batch is still a successful run
    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
    }

    Ok(())
}

fn run_validate(
    data_dir: Option<PathBuf>,
    tickers: Option<Vec<String>>,
    fix: bool,
    write_back: bool,
    report_out: Option<PathBuf>,
) -> Result<()> {
    let store = SeriesStore::new(resolve_data_dir(data_dir));
    let opts = ValidateOptions {
        tickers,
        fix,
        write_back,
    };
    let reports = validate_batch(&store, &opts)?;

    if reports.is_empty() {
        println!("No cached files under {}", store.data_dir().display());
        return Ok(());
    }

    print_report_table(&reports);

    if let Some(path) = report_out {
        let csv = report_csv(&reports)?;
        std::fs::write(&path, csv)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!();
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_report_table(reports: &[QualityReport]) {
    println!(
        "{:<16} {:>7} {:>5} {:>7} {:>6} {:>5} {:>8} {:>8}",
        "File", "Rows", "Dups", "Sorted", "Nulls", "Neg", "ZeroVol", "Gaps>3d"
    );
    println!("{}", "-".repeat(70));

    for report in reports {
        let name = file_name(&report.file);
        match (&report.metrics, &report.error) {
            (Some(m), _) => {
                let nulls = m.null_open
                    + m.null_high
                    + m.null_low
                    + m.null_close
                    + m.null_adj_close
                    + m.null_volume;
                println!(
                    "{:<16} {:>7} {:>5} {:>7} {:>6} {:>5} {:>8} {:>8}",
                    name,
                    m.rows,
                    m.duplicate_dates,
                    if m.date_sorted { "yes" } else { "no" },
                    nulls,
                    m.negative_prices,
                    m.zero_volume_days,
                    m.date_gaps_over_3d
                );
                if !m.columns_ok {
                    println!("{:<16}   missing required columns", "");
                }
                if !m.empty_columns.is_empty() {
                    println!("{:<16}   empty columns: {}", "", m.empty_columns.join(", "));
                }
            }
            (None, Some(err)) => println!("{name:<16} unreadable: {err}"),
            (None, None) => println!("{name:<16} missing"),
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn run_label(
    data_dir: Option<PathBuf>,
    tickers: Option<Vec<String>>,
    price_col: String,
    horizon: usize,
    epsilon: f64,
    fill_deadzone: bool,
    out: PathBuf,
) -> Result<()> {
    let store = SeriesStore::new(resolve_data_dir(data_dir));
    let combined = store.load_all(tickers.as_deref())?;

    if combined.height() == 0 {
        println!("No cached series under {}", store.data_dir().display());
        return Ok(());
    }

    let params = LabelParams {
        price_col,
        horizon,
        epsilon,
        policy: if fill_deadzone {
            DeadZonePolicy::FillDown
        } else {
            DeadZonePolicy::Drop
        },
        ..LabelParams::default()
    };
    let labeled = label_frame(&combined, &params)?;

    SeriesStore::write_frame(&out, &labeled)
        .with_context(|| format!("failed to write {}", out.display()))?;

    let labels = labeled.column("label")?.i32()?;
    let up = labels.into_iter().filter(|v| *v == Some(1)).count();
    let down = labels.into_iter().filter(|v| *v == Some(0)).count();

    println!();
    println!("=== Label Summary ===");
    println!("Rows:       {}", labeled.height());
    println!("Up:         {up}");
    println!("Down:       {down}");
    println!("Unlabeled:  {}", labels.null_count());
    println!();
    println!("Labels saved to: {}", out.display());

    Ok(())
}
