use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::sheets::Cell;
use super::table::{SalesRow, SalesTable};
use super::ReportError;

/// Summed quantity and revenue of the rows sharing one key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateGroup<K> {
    pub key: K,
    pub quantity: u64,
    pub revenue: Decimal,
    /// Position of the key's first row in the table.
    pub first_seen: usize,
}

impl<K> AggregateGroup<K> {
    fn new(key: K, first_seen: usize) -> AggregateGroup<K> {
        AggregateGroup {
            key,
            quantity: 0,
            revenue: Decimal::ZERO,
            first_seen,
        }
    }

    fn add(&mut self, row: &SalesRow) -> Result<(), ReportError> {
        self.quantity += u64::from(row.quantity());
        self.revenue = self
            .revenue
            .checked_add(row.revenue())
            .ok_or(ReportError::Overflow("group revenue"))?;
        Ok(())
    }
}

/// How a group key is shown in sheets, charts and on the console.
pub trait GroupKey {
    fn cells(&self) -> Vec<Cell>;
    fn label(&self) -> String;
}

impl GroupKey for String {
    fn cells(&self) -> Vec<Cell> {
        vec![Cell::Text(self.clone())]
    }

    fn label(&self) -> String {
        self.clone()
    }
}

impl GroupKey for Option<String> {
    fn cells(&self) -> Vec<Cell> {
        match self {
            Some(value) => vec![Cell::Text(value.clone())],
            None => vec![Cell::Empty],
        }
    }

    fn label(&self) -> String {
        self.clone().unwrap_or_else(|| "(blank)".to_string())
    }
}

impl GroupKey for NaiveDate {
    fn cells(&self) -> Vec<Cell> {
        vec![Cell::Date(*self)]
    }

    fn label(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }
}

impl<A: GroupKey, B: GroupKey> GroupKey for (A, B) {
    fn cells(&self) -> Vec<Cell> {
        let mut cells = self.0.cells();
        cells.extend(self.1.cells());
        cells
    }

    fn label(&self) -> String {
        format!("{} / {}", self.0.label(), self.1.label())
    }
}

/// Groups rows by `key_fn`, keeping groups in first-seen key order.
///
/// Rows whose key is missing are not dropped, they share a `None` group.
pub fn group_by<K, F>(table: &SalesTable, key_fn: F) -> Result<Vec<AggregateGroup<K>>, ReportError>
where
    K: Eq + Hash + Clone,
    F: Fn(&SalesRow) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<AggregateGroup<K>> = Vec::new();

    for (position, row) in table.rows().iter().enumerate() {
        let key = key_fn(row);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(AggregateGroup::new(key, position));
            groups.len() - 1
        });
        groups[slot].add(row)?;
    }

    Ok(groups)
}

/// Stable sort by revenue, highest first. Equal revenues keep first-seen order.
pub fn rank_by_revenue<K>(groups: &mut [AggregateGroup<K>]) {
    groups.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.first_seen.cmp(&b.first_seen)));
}

/// Sort by key ascending, used for time series.
pub fn sort_by_key<K: Ord>(groups: &mut [AggregateGroup<K>]) {
    groups.sort_by(|a, b| a.key.cmp(&b.key));
}

pub fn branch_ranking(table: &SalesTable) -> Result<Vec<AggregateGroup<Option<String>>>, ReportError> {
    let mut groups = group_by(table, |row| row.branch().map(str::to_string))?;
    rank_by_revenue(&mut groups);
    Ok(groups)
}

pub fn product_ranking(table: &SalesTable) -> Result<Vec<AggregateGroup<String>>, ReportError> {
    let mut groups = group_by(table, |row| row.product().clone())?;
    rank_by_revenue(&mut groups);
    Ok(groups)
}

pub fn staff_ranking(table: &SalesTable) -> Result<Vec<AggregateGroup<Option<String>>>, ReportError> {
    let mut groups = group_by(table, |row| row.staff().map(str::to_string))?;
    rank_by_revenue(&mut groups);
    Ok(groups)
}

pub type BranchStaff = (Option<String>, Option<String>);

pub fn branch_staff_ranking(table: &SalesTable) -> Result<Vec<AggregateGroup<BranchStaff>>, ReportError> {
    let mut groups = group_by(table, |row| (row.branch().map(str::to_string), row.staff().map(str::to_string)))?;
    rank_by_revenue(&mut groups);
    Ok(groups)
}

pub fn daily_trend(table: &SalesTable) -> Result<Vec<AggregateGroup<NaiveDate>>, ReportError> {
    let mut groups = group_by(table, |row| row.date())?;
    sort_by_key(&mut groups);
    Ok(groups)
}
