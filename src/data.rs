use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use glob::{glob, Pattern};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;

use crate::reporting::ReportError;

pub const DATE_COLUMN: &str = "日付";
pub const BRANCH_COLUMN: &str = "支店";
pub const PRODUCT_COLUMN: &str = "商品名";
pub const STAFF_COLUMN: &str = "担当者";
pub const QUANTITY_COLUMN: &str = "数量";
pub const UNIT_PRICE_COLUMN: &str = "単価";
pub const REVENUE_COLUMN: &str = "売上";

const REQUIRED_COLUMNS: [&str; 4] = [DATE_COLUMN, PRODUCT_COLUMN, QUANTITY_COLUMN, UNIT_PRICE_COLUMN];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("record {record}: {source}")]
    InvalidRecord { record: usize, source: csv::Error },
    #[error("record {record}: negative unit price {price}")]
    NegativePrice { record: usize, price: Decimal },
    #[error("record {record}: revenue of {quantity} x {price} is out of range")]
    Overflow { record: usize, quantity: u32, price: Decimal },
}

/// Where the input files of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Glob pattern relative to the working directory, e.g. `sales_*.csv`.
    Glob(String),
    /// A single file name relative to the working directory.
    Fixed(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "日付", deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    #[serde(rename = "支店", default)] // Default to `None` if the column is absent
    pub branch: Option<String>,
    #[serde(rename = "商品名")]
    pub product: String,
    #[serde(rename = "担当者", default)]
    pub staff: Option<String>,
    #[serde(rename = "数量")]
    pub quantity: u32,
    #[serde(rename = "単価", deserialize_with = "deserialize_decimal")]
    pub unit_price: Decimal,
}

impl SalesRecord {
    /// `quantity * unit_price`, or `None` when it does not fit in a `Decimal`.
    pub fn revenue(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }
}

/// Rows of one successfully parsed input file.
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub has_branch: bool,
    pub has_staff: bool,
    pub records: Vec<SalesRecord>,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedFile),
    Failed { path: PathBuf, reason: LoadError },
}

impl LoadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            LoadOutcome::Loaded(file) => &file.path,
            LoadOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

/// Parses an amount from its text so no digit goes through `f64`.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.contains(|ch: char| ch == 'e' || ch == 'E') {
        Decimal::from_scientific(raw).ok()
    } else {
        Decimal::from_str_exact(raw).ok()
    }
}

fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_decimal(&raw).ok_or_else(|| de::Error::custom(format!("invalid amount `{}`", raw)))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date `{}`", raw)))
}

/// Lists the input files of a run in lexicographic order.
///
/// An empty result is not an error, the caller decides how to report it.
pub fn discover(dir: &Path, source: &InputSource) -> Result<Vec<PathBuf>, ReportError> {
    let mut files = match source {
        InputSource::Fixed(name) => {
            let path = dir.join(name);
            if path.is_file() {
                vec![path]
            } else {
                Vec::new()
            }
        },
        InputSource::Glob(pattern) => {
            let base = Pattern::escape(&dir.to_string_lossy());
            let full = Path::new(&base).join(pattern);
            let mut files = Vec::new();

            for entry in glob(&full.to_string_lossy())? {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(path) => debug!("skipping non-file entry, path={}", path.display()),
                    Err(err) => warn!("cannot read path, err={}", err),
                }
            }

            files
        },
    };

    files.sort();
    debug!("discovered {} input file(s) in {}", files.len(), dir.display());

    Ok(files)
}

pub fn read_sales_csv(path: &Path) -> Result<LoadedFile, LoadError> {
    let file = File::open(path)?;
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let headers = csv_reader.headers()?.clone();
    let has_column = |name: &str| headers.iter().any(|header| header == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !has_column(column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for (index, record) in csv_reader.deserialize::<SalesRecord>().enumerate() {
        let record = record.map_err(|source| LoadError::InvalidRecord { record: index + 1, source })?;
        if record.unit_price.is_sign_negative() && !record.unit_price.is_zero() {
            return Err(LoadError::NegativePrice {
                record: index + 1,
                price: record.unit_price,
            });
        }
        if record.revenue().is_none() {
            return Err(LoadError::Overflow {
                record: index + 1,
                quantity: record.quantity,
                price: record.unit_price,
            });
        }
        records.push(record);
    }

    Ok(LoadedFile {
        path: path.to_path_buf(),
        has_branch: has_column(BRANCH_COLUMN),
        has_staff: has_column(STAFF_COLUMN),
        records,
    })
}

/// Loads every file independently; a failing file never stops the batch.
pub fn load_all(paths: &[PathBuf]) -> Vec<LoadOutcome> {
    paths
        .iter()
        .map(|path| match read_sales_csv(path) {
            Ok(file) => {
                info!("loaded {} ({} rows)", path.display(), file.records.len());
                LoadOutcome::Loaded(file)
            },
            Err(reason) => {
                error!("failed to load {}, err={}", path.display(), reason);
                LoadOutcome::Failed {
                    path: path.clone(),
                    reason,
                }
            },
        })
        .collect()
}
