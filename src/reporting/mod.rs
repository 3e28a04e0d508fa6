use enum_dispatch::enum_dispatch;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Worksheet, XlsxError};
use thiserror::Error;

pub mod aggregate;
pub mod chart;
pub mod sheets;
pub mod table;


use sheets::{DataSheet, SummarySheet};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("none of the {0} input file(s) could be loaded")]
    NothingLoaded(usize),
    #[error("workbook error: {0}")]
    Workbook(#[from] XlsxError),
    #[error("chart rendering failed: {0}")]
    Chart(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("value {0} cannot be represented in the report")]
    Number(Decimal),
    #[error("{0} exceeds the decimal range")]
    Overflow(&'static str),
}

/// A named table that can be laid out as one worksheet.
#[enum_dispatch]
pub trait SheetSource {
    fn name(&self) -> &str;
    fn row_count(&self) -> usize;
    fn to_worksheet(&self) -> Result<Worksheet, ReportError>;
}

#[enum_dispatch(SheetSource)]
#[derive(Debug)]
pub enum Sheet {
    DataSheet,
    SummarySheet,
}

/// Formats an amount as yen with thousands separators, e.g. `¥1,234,500`.
pub fn format_yen(amount: Decimal) -> String {
    let text = amount.normalize().to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer, fraction) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match fraction {
        Some(fraction) => format!("{}¥{}.{}", sign, grouped, fraction),
        None => format!("{}¥{}", sign, grouped),
    }
}
