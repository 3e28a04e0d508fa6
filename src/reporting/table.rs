use chrono::NaiveDate;
use getset::{CopyGetters, Getters};
use rust_decimal::Decimal;

use super::ReportError;
use crate::data::{LoadOutcome, LoadedFile, SalesRecord};

/// One sales line with its derived revenue.
///
/// Fields are private so the revenue can never drift from
/// `quantity * unit_price` after the row is built.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct SalesRow {
    #[getset(get_copy = "pub")]
    date: NaiveDate,
    branch: Option<String>,
    #[getset(get = "pub")]
    product: String,
    staff: Option<String>,
    #[getset(get_copy = "pub")]
    quantity: u32,
    #[getset(get_copy = "pub")]
    unit_price: Decimal,
    #[getset(get_copy = "pub")]
    revenue: Decimal,
}

impl SalesRow {
    pub fn new(
        date: NaiveDate,
        branch: Option<String>,
        product: String,
        staff: Option<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<SalesRow, ReportError> {
        let revenue = Decimal::from(quantity)
            .checked_mul(unit_price)
            .ok_or(ReportError::Overflow("row revenue"))?;

        Ok(SalesRow {
            date,
            branch,
            product,
            staff,
            quantity,
            unit_price,
            revenue,
        })
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn staff(&self) -> Option<&str> {
        self.staff.as_deref()
    }
}

impl TryFrom<SalesRecord> for SalesRow {
    type Error = ReportError;

    fn try_from(record: SalesRecord) -> Result<Self, Self::Error> {
        SalesRow::new(
            record.date,
            record.branch,
            record.product,
            record.staff,
            record.quantity,
            record.unit_price,
        )
    }
}

/// The combined rows of every loaded file, in file then row order.
#[derive(Debug, Clone, Default, PartialEq, CopyGetters)]
pub struct SalesTable {
    rows: Vec<SalesRow>,
    #[getset(get_copy = "pub")]
    has_branch: bool,
    #[getset(get_copy = "pub")]
    has_staff: bool,
}

impl SalesTable {
    pub fn new(rows: Vec<SalesRow>, has_branch: bool, has_staff: bool) -> SalesTable {
        SalesTable {
            rows,
            has_branch,
            has_staff,
        }
    }

    pub fn combine<I>(files: I) -> Result<SalesTable, ReportError>
    where
        I: IntoIterator<Item = LoadedFile>,
    {
        let mut table = SalesTable::default();
        for file in files {
            table.has_branch |= file.has_branch;
            table.has_staff |= file.has_staff;
            for record in file.records {
                table.rows.push(SalesRow::try_from(record)?);
            }
        }

        Ok(table)
    }

    /// Combines the successful outcomes, skipping the failed ones.
    pub fn from_outcomes(outcomes: Vec<LoadOutcome>) -> Result<SalesTable, ReportError> {
        SalesTable::combine(outcomes.into_iter().filter_map(|outcome| match outcome {
            LoadOutcome::Loaded(file) => Some(file),
            LoadOutcome::Failed { .. } => None,
        }))
    }

    pub fn rows(&self) -> &[SalesRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_quantity(&self) -> u64 {
        self.rows.iter().map(|row| u64::from(row.quantity)).sum()
    }

    pub fn total_revenue(&self) -> Result<Decimal, ReportError> {
        self.rows.iter().try_fold(Decimal::ZERO, |total, row| {
            total.checked_add(row.revenue).ok_or(ReportError::Overflow("total revenue"))
        })
    }
}
