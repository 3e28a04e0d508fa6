use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use env_logger::Env;

use sales_report::data::InputSource;
use sales_report::pipeline::{self, Config, FileStatus, RunOutcome, Variant};
use sales_report::reporting::format_yen;

#[derive(Parser, Debug)]
#[command(name = "sales-report", version, about = "Consolidate sales CSV files into an Excel report")]
struct Args {
    /// Report flavour
    #[arg(value_enum, default_value_t = Variant::Advanced)]
    variant: Variant,

    /// Directory the input pattern is resolved against
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Glob pattern overriding the variant's input files
    #[arg(long)]
    pattern: Option<String>,

    /// Where the workbook and chart are written (defaults to --dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip the rankings printed to the console
    #[arg(long, short)]
    quiet: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config::for_variant(args.variant, &args.dir);
        if let Some(pattern) = args.pattern {
            config.source = InputSource::Glob(pattern);
        }
        if let Some(output_dir) = args.output_dir {
            config.output_dir = output_dir;
        }
        config.quiet = args.quiet;
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config: Config = Args::parse().into();
    let outcome = pipeline::run(&config, Local::now().naive_local())
        .with_context(|| format!("{:?} report failed", config.variant))?;

    let summary = match outcome {
        RunOutcome::NoInput => {
            println!("No input files found, nothing to do.");
            return Ok(());
        },
        RunOutcome::Completed(summary) => summary,
    };

    for file in &summary.files {
        match file {
            FileStatus::Loaded { path, rows } => println!("OK     {} ({} rows)", path.display(), rows),
            FileStatus::Failed { path, reason } => println!("FAILED {} - {}", path.display(), reason),
        }
    }
    println!();
    println!("Combined rows: {}", summary.combined_rows);
    println!("Total quantity: {}", summary.total_quantity);
    println!("Total revenue: {}", format_yen(summary.total_revenue));
    println!();
    println!("Workbook: {}", summary.workbook.display());
    for (index, sheet) in summary.sheets.iter().enumerate() {
        println!("  {}. {}", index + 1, sheet);
    }
    if let Some(chart) = &summary.chart {
        println!("Chart:    {}", chart.display());
    }

    Ok(())
}
