use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::ValueEnum;
use log::{info, warn};
use rust_decimal::Decimal;

use crate::data::{self, InputSource, LoadOutcome, BRANCH_COLUMN, DATE_COLUMN, PRODUCT_COLUMN, STAFF_COLUMN};
use crate::reporting::aggregate::{
    branch_ranking, branch_staff_ranking, daily_trend, product_ranking, staff_ranking, AggregateGroup, GroupKey,
};
use crate::reporting::chart::{render_dashboard, Dashboard};
use crate::reporting::sheets::{DataSheet, Report, SummarySheet};
use crate::reporting::table::SalesTable;
use crate::reporting::{format_yen, ReportError};

/// Which of the three report flavours to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Single `sales_data.csv`, product and staff totals.
    Basic,
    /// Every `sales_*.csv`, branch/product/staff rankings and daily trend.
    Advanced,
    /// Every `sample_data/sales_*.csv` plus a PNG dashboard.
    Chart,
}

/// Aggregation views a variant can put into its workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Data,
    Branch,
    Product,
    Staff,
    BranchStaff,
    Daily,
}

impl Variant {
    pub fn default_source(&self) -> InputSource {
        match self {
            Variant::Basic => InputSource::Fixed("sales_data.csv".to_string()),
            Variant::Advanced => InputSource::Glob("sales_*.csv".to_string()),
            Variant::Chart => InputSource::Glob("sample_data/sales_*.csv".to_string()),
        }
    }

    pub fn workbook_prefix(&self) -> &'static str {
        match self {
            Variant::Basic => "sales_report",
            Variant::Advanced => "consolidated_report",
            Variant::Chart => "report_with_chart",
        }
    }

    fn stamp_format(&self) -> &'static str {
        match self {
            Variant::Basic => "%Y%m%d",
            Variant::Advanced | Variant::Chart => "%Y%m%d_%H%M%S",
        }
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &'static [(&'static str, View)] {
        match self {
            Variant::Basic => &[
                ("詳細データ", View::Data),
                ("商品別集計", View::Product),
                ("担当者別集計", View::Staff),
            ],
            Variant::Advanced => &[
                ("全データ", View::Data),
                ("支店別ランキング", View::Branch),
                ("商品別ランキング", View::Product),
                ("担当者別詳細", View::BranchStaff),
                ("日別推移", View::Daily),
            ],
            Variant::Chart => &[
                ("全データ", View::Data),
                ("支店別ランキング", View::Branch),
                ("商品別ランキング", View::Product),
                ("日別推移", View::Daily),
            ],
        }
    }

    pub fn renders_chart(&self) -> bool {
        *self == Variant::Chart
    }

    /// The chart variant drops branch views when no input carried the column.
    fn includes(&self, view: View, table: &SalesTable) -> bool {
        !(*self == Variant::Chart && view == View::Branch && !table.has_branch())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub variant: Variant,
    pub source: InputSource,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub quiet: bool,
}

impl Config {
    pub fn for_variant(variant: Variant, dir: &Path) -> Config {
        Config {
            variant,
            source: variant.default_source(),
            input_dir: dir.to_path_buf(),
            output_dir: dir.to_path_buf(),
            quiet: false,
        }
    }

    pub fn workbook_path(&self, now: NaiveDateTime) -> PathBuf {
        let stamp = now.format(self.variant.stamp_format());
        self.output_dir
            .join(format!("{}_{}.xlsx", self.variant.workbook_prefix(), stamp))
    }

    pub fn chart_path(&self, now: NaiveDateTime) -> PathBuf {
        self.output_dir
            .join(format!("sales_chart_{}.png", now.format("%Y%m%d_%H%M%S")))
    }
}

/// Per-file result as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Loaded { path: PathBuf, rows: usize },
    Failed { path: PathBuf, reason: String },
}

impl From<&LoadOutcome> for FileStatus {
    fn from(outcome: &LoadOutcome) -> Self {
        let path = outcome.path().to_path_buf();
        match outcome {
            LoadOutcome::Loaded(file) => FileStatus::Loaded {
                path,
                rows: file.records.len(),
            },
            LoadOutcome::Failed { reason, .. } => FileStatus::Failed {
                path,
                reason: reason.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub files: Vec<FileStatus>,
    pub combined_rows: usize,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub sheets: Vec<String>,
    pub workbook: PathBuf,
    pub chart: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing matched the input source; no artifact was written.
    NoInput,
    Completed(RunSummary),
}

pub fn build_report(variant: Variant, table: &SalesTable) -> Result<Report, ReportError> {
    let mut report = Report::new();

    for &(name, view) in variant.sheets() {
        if !variant.includes(view, table) {
            continue;
        }

        match view {
            View::Data => report.push(DataSheet::new(name, table)),
            View::Branch => report.push(SummarySheet::new(name, &[BRANCH_COLUMN], &branch_ranking(table)?)),
            View::Product => report.push(SummarySheet::new(name, &[PRODUCT_COLUMN], &product_ranking(table)?)),
            View::Staff => report.push(SummarySheet::new(name, &[STAFF_COLUMN], &staff_ranking(table)?)),
            View::BranchStaff => report.push(SummarySheet::new(
                name,
                &[BRANCH_COLUMN, STAFF_COLUMN],
                &branch_staff_ranking(table)?,
            )),
            View::Daily => report.push(SummarySheet::new(name, &[DATE_COLUMN], &daily_trend(table)?)),
        }
    }

    Ok(report)
}

pub fn build_dashboard(table: &SalesTable) -> Result<Dashboard, ReportError> {
    let branches = table.has_branch().then(|| branch_ranking(table)).transpose()?;
    Dashboard::new(branches.as_deref(), &product_ranking(table)?, &daily_trend(table)?)
}

fn print_ranking<K: GroupKey>(title: &str, groups: &[AggregateGroup<K>]) {
    println!("=== {} ===", title);
    for (rank, group) in groups.iter().enumerate() {
        println!(
            "{:>3}. {:<20} {:>8} {:>16}",
            rank + 1,
            group.key.label(),
            group.quantity,
            format_yen(group.revenue)
        );
    }
    println!();
}

/// Runs one batch: discover, load, combine, aggregate, write.
pub fn run(config: &Config, now: NaiveDateTime) -> Result<RunOutcome, ReportError> {
    let paths = data::discover(&config.input_dir, &config.source)?;
    if paths.is_empty() {
        warn!("no input files found for {:?} in {}", config.source, config.input_dir.display());
        return Ok(RunOutcome::NoInput);
    }

    info!("found {} input file(s)", paths.len());
    for path in &paths {
        info!("  - {}", path.display());
    }

    let outcomes = data::load_all(&paths);
    let files: Vec<FileStatus> = outcomes.iter().map(FileStatus::from).collect();
    if !outcomes.iter().any(LoadOutcome::is_loaded) {
        return Err(ReportError::NothingLoaded(outcomes.len()));
    }

    let table = SalesTable::from_outcomes(outcomes)?;
    if table.is_empty() {
        warn!("loaded files contain no data rows, the report will only have headers");
    } else {
        info!("combined {} rows", table.len());
    }
    let total_revenue = table.total_revenue()?;

    if !config.quiet {
        if table.has_branch() {
            print_ranking("Branch ranking", &branch_ranking(&table)?);
        }
        print_ranking("Product ranking", &product_ranking(&table)?);
    }

    fs::create_dir_all(&config.output_dir)?;

    let chart = if config.variant.renders_chart() {
        let path = config.chart_path(now);
        render_dashboard(&path, &build_dashboard(&table)?)?;
        info!("chart written to {}", path.display());
        Some(path)
    } else {
        None
    };

    let report = build_report(config.variant, &table)?;
    let workbook = config.workbook_path(now);
    report.save(&workbook)?;
    info!("workbook written to {}", workbook.display());

    Ok(RunOutcome::Completed(RunSummary {
        files,
        combined_rows: table.len(),
        total_quantity: table.total_quantity(),
        total_revenue,
        sheets: report.sheet_names().into_iter().map(str::to_string).collect(),
        workbook,
        chart,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::reporting::table::SalesRow;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(8, 5, 7).unwrap()
    }

    fn table(has_branch: bool) -> SalesTable {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let row = SalesRow::new(day, None, "マウス".into(), Some("田中".into()), 1, dec!(100)).unwrap();
        SalesTable::new(vec![row], has_branch, true)
    }

    #[test]
    fn test_artifact_names() {
        let basic = Config::for_variant(Variant::Basic, Path::new("out"));
        assert_eq!(basic.workbook_path(now()), Path::new("out/sales_report_20240309.xlsx"));

        let advanced = Config::for_variant(Variant::Advanced, Path::new("out"));
        assert_eq!(advanced.workbook_path(now()), Path::new("out/consolidated_report_20240309_080507.xlsx"));

        let chart = Config::for_variant(Variant::Chart, Path::new("out"));
        assert_eq!(chart.workbook_path(now()), Path::new("out/report_with_chart_20240309_080507.xlsx"));
        assert_eq!(chart.chart_path(now()), Path::new("out/sales_chart_20240309_080507.png"));
    }

    #[test]
    fn test_default_sources() {
        assert_eq!(Variant::Basic.default_source(), InputSource::Fixed("sales_data.csv".into()));
        assert_eq!(Variant::Advanced.default_source(), InputSource::Glob("sales_*.csv".into()));
        assert_eq!(Variant::Chart.default_source(), InputSource::Glob("sample_data/sales_*.csv".into()));
    }

    #[test]
    fn test_report_sheets_per_variant() -> anyhow::Result<()> {
        let table = table(true);

        assert_eq!(
            build_report(Variant::Basic, &table)?.sheet_names(),
            vec!["詳細データ", "商品別集計", "担当者別集計"]
        );
        assert_eq!(
            build_report(Variant::Advanced, &table)?.sheet_names(),
            vec!["全データ", "支店別ランキング", "商品別ランキング", "担当者別詳細", "日別推移"]
        );
        assert_eq!(
            build_report(Variant::Chart, &table)?.sheet_names(),
            vec!["全データ", "支店別ランキング", "商品別ランキング", "日別推移"]
        );

        Ok(())
    }

    #[test]
    fn test_chart_variant_without_branch_column() -> anyhow::Result<()> {
        let table = table(false);

        assert_eq!(
            build_report(Variant::Chart, &table)?.sheet_names(),
            vec!["全データ", "商品別ランキング", "日別推移"]
        );
        assert_eq!(
            build_report(Variant::Advanced, &table)?.sheet_names(),
            vec!["全データ", "支店別ランキング", "商品別ランキング", "担当者別詳細", "日別推移"]
        );

        Ok(())
    }

    #[test]
    fn test_dashboard_follows_branch_presence() -> anyhow::Result<()> {
        assert!(build_dashboard(&table(true))?.branches.is_some());
        assert!(build_dashboard(&table(false))?.branches.is_none());

        Ok(())
    }
}
