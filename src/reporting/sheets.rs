use std::path::Path;

use chrono::{Datelike, NaiveDate};
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};

use super::aggregate::{AggregateGroup, GroupKey};
use super::table::{SalesRow, SalesTable};
use super::{ReportError, Sheet, SheetSource};
use crate::data::{
    BRANCH_COLUMN, DATE_COLUMN, PRODUCT_COLUMN, QUANTITY_COLUMN, REVENUE_COLUMN, STAFF_COLUMN, UNIT_PRICE_COLUMN,
};

const DATE_FORMAT: &str = "yyyy-mm-dd";
const MONEY_FORMAT: &str = "#,##0";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Date(NaiveDate),
    Integer(u64),
    Money(Decimal),
}

struct Formats {
    header: Format,
    date: Format,
    money: Format,
}

impl Formats {
    fn new() -> Formats {
        Formats {
            header: Format::new().set_bold(),
            date: Format::new().set_num_format(DATE_FORMAT),
            money: Format::new().set_num_format(MONEY_FORMAT),
        }
    }
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell, formats: &Formats) -> Result<(), ReportError> {
    match cell {
        Cell::Empty => {},
        Cell::Text(text) => {
            worksheet.write_string(row, col, text)?;
        },
        Cell::Date(date) => {
            let datetime = ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)?;
            worksheet.write_datetime_with_format(row, col, &datetime, &formats.date)?;
        },
        Cell::Integer(value) => {
            worksheet.write_number(row, col, *value as f64)?;
        },
        Cell::Money(amount) => {
            let value = amount.to_f64().ok_or(ReportError::Number(*amount))?;
            worksheet.write_number_with_format(row, col, value, &formats.money)?;
        },
    }

    Ok(())
}

fn build_worksheet(name: &str, headers: &[&str], rows: &[Vec<Cell>]) -> Result<Worksheet, ReportError> {
    let formats = Formats::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(name)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
    }

    for (index, cells) in rows.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            write_cell(&mut worksheet, index as u32 + 1, col as u16, cell, &formats)?;
        }
    }

    worksheet.autofit();

    Ok(worksheet)
}

/// Every combined row with its revenue. Optional columns only appear when
/// at least one input file carried them.
#[derive(Debug)]
pub struct DataSheet {
    name: String,
    table: SalesTable,
}

impl DataSheet {
    pub fn new(name: &str, table: &SalesTable) -> DataSheet {
        DataSheet {
            name: name.to_string(),
            table: table.clone(),
        }
    }

    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = vec![DATE_COLUMN];
        if self.table.has_branch() {
            headers.push(BRANCH_COLUMN);
        }
        headers.push(PRODUCT_COLUMN);
        if self.table.has_staff() {
            headers.push(STAFF_COLUMN);
        }
        headers.extend([QUANTITY_COLUMN, UNIT_PRICE_COLUMN, REVENUE_COLUMN]);
        headers
    }

    fn cells(&self, row: &SalesRow) -> Vec<Cell> {
        let optional = |value: Option<&str>| value.map_or(Cell::Empty, |value| Cell::Text(value.to_string()));

        let mut cells = vec![Cell::Date(row.date())];
        if self.table.has_branch() {
            cells.push(optional(row.branch()));
        }
        cells.push(Cell::Text(row.product().clone()));
        if self.table.has_staff() {
            cells.push(optional(row.staff()));
        }
        cells.extend([
            Cell::Integer(u64::from(row.quantity())),
            Cell::Money(row.unit_price()),
            Cell::Money(row.revenue()),
        ]);
        cells
    }
}

impl SheetSource for DataSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_count(&self) -> usize {
        self.table.len()
    }

    fn to_worksheet(&self) -> Result<Worksheet, ReportError> {
        let rows: Vec<Vec<Cell>> = self.table.rows().iter().map(|row| self.cells(row)).collect();
        build_worksheet(&self.name, &self.headers(), &rows)
    }
}

/// One aggregation view: key column(s), summed quantity, summed revenue.
#[derive(Debug)]
pub struct SummarySheet {
    name: String,
    headers: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

impl SummarySheet {
    pub fn new<K: GroupKey>(name: &str, key_headers: &[&'static str], groups: &[AggregateGroup<K>]) -> SummarySheet {
        let mut headers = key_headers.to_vec();
        headers.extend([QUANTITY_COLUMN, REVENUE_COLUMN]);

        let rows = groups
            .iter()
            .map(|group| {
                let mut cells = group.key.cells();
                cells.push(Cell::Integer(group.quantity));
                cells.push(Cell::Money(group.revenue));
                cells
            })
            .collect();

        SummarySheet {
            name: name.to_string(),
            headers,
            rows,
        }
    }

    pub fn headers(&self) -> &[&'static str] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

impl SheetSource for SummarySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn to_worksheet(&self) -> Result<Worksheet, ReportError> {
        build_worksheet(&self.name, &self.headers, &self.rows)
    }
}

/// The sheets of one run, written together as a single workbook.
#[derive(Debug, Default)]
pub struct Report {
    sheets: Vec<Sheet>,
}

impl Report {
    pub fn new() -> Report {
        Report { sheets: Vec::new() }
    }

    pub fn push<S: Into<Sheet>>(&mut self, sheet: S) {
        self.sheets.push(sheet.into());
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name()).collect()
    }

    /// Lays out every sheet in memory and saves once, so a failing sheet
    /// leaves no file behind.
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            debug!("writing sheet {} ({} rows)", sheet.name(), sheet.row_count());
            workbook.push_worksheet(sheet.to_worksheet()?);
        }

        workbook.save(path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use super::*;
    use crate::reporting::aggregate::{branch_staff_ranking, product_ranking};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn table(has_branch: bool, has_staff: bool) -> SalesTable {
        SalesTable::new(
            vec![
                SalesRow::new(date(1), Some("東京".into()), "ノートPC".into(), Some("田中".into()), 2, dec!(1000))
                    .unwrap(),
                SalesRow::new(date(2), None, "マウス".into(), None, 5, dec!(300)).unwrap(),
            ],
            has_branch,
            has_staff,
        )
    }

    #[test]
    fn test_data_sheet_columns_follow_presence() {
        let full = DataSheet::new("全データ", &table(true, true));
        assert_eq!(full.headers(), vec!["日付", "支店", "商品名", "担当者", "数量", "単価", "売上"]);
        assert_eq!(
            full.cells(&full.table.rows()[1]),
            vec![
                Cell::Date(date(2)),
                Cell::Empty,
                Cell::Text("マウス".into()),
                Cell::Empty,
                Cell::Integer(5),
                Cell::Money(dec!(300)),
                Cell::Money(dec!(1500)),
            ]
        );

        let narrow = DataSheet::new("詳細データ", &table(false, false));
        assert_eq!(narrow.headers(), vec!["日付", "商品名", "数量", "単価", "売上"]);
        assert_eq!(narrow.row_count(), 2);
    }

    #[test]
    fn test_summary_sheet_rows() -> Result<()> {
        let table = table(true, true);

        let products = SummarySheet::new("商品別ランキング", &[PRODUCT_COLUMN], &product_ranking(&table)?);
        assert_eq!(products.headers(), &["商品名", "数量", "売上"]);
        assert_eq!(
            products.rows(),
            &[
                vec![Cell::Text("ノートPC".into()), Cell::Integer(2), Cell::Money(dec!(2000))],
                vec![Cell::Text("マウス".into()), Cell::Integer(5), Cell::Money(dec!(1500))],
            ]
        );

        let staff = SummarySheet::new("担当者別詳細", &[BRANCH_COLUMN, STAFF_COLUMN], &branch_staff_ranking(&table)?);
        assert_eq!(staff.headers(), &["支店", "担当者", "数量", "売上"]);
        assert_eq!(staff.rows()[1], vec![Cell::Empty, Cell::Empty, Cell::Integer(5), Cell::Money(dec!(1500))]);

        Ok(())
    }

    #[test]
    fn test_report_keeps_sheet_order() -> Result<()> {
        let table = table(true, true);
        let mut report = Report::new();
        report.push(DataSheet::new("全データ", &table));
        report.push(SummarySheet::new("商品別ランキング", &[PRODUCT_COLUMN], &product_ranking(&table)?));

        assert_eq!(report.sheet_names(), vec!["全データ", "商品別ランキング"]);

        let dir = TempDir::new()?;
        let path = dir.path().join("report.xlsx");
        report.save(&path)?;
        assert!(path.is_file());

        Ok(())
    }

    #[test]
    fn test_invalid_sheet_name_is_an_error() -> Result<()> {
        let sheet = SummarySheet::new("bad/name", &[PRODUCT_COLUMN], &product_ranking(&table(true, true))?);
        assert!(matches!(sheet.to_worksheet(), Err(ReportError::Workbook(_))));

        let dir = TempDir::new()?;
        let path = dir.path().join("report.xlsx");
        let mut report = Report::new();
        report.push(DataSheet::new("全データ", &table(true, true)));
        report.push(sheet);
        assert!(report.save(&path).is_err());
        assert!(!path.exists());

        Ok(())
    }
}
