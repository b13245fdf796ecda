use crate::schema::{GroupDimension, PivotRow, ReportingPeriod, SignedRow};
use crate::error::Result;
use crate::utils::checked_add;
use crate::variance::pivot_row;
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One component of a grouping key. Values sort before nulls, so groups for
/// unmapped accounts and blank dimensions land at the end of the pivot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Value(String),
    Null,
}

impl KeyPart {
    fn from_option(value: Option<&str>) -> Self {
        match value {
            Some(v) => KeyPart::Value(v.to_string()),
            None => KeyPart::Null,
        }
    }

    fn into_option(self) -> Option<String> {
        match self {
            KeyPart::Value(v) => Some(v),
            KeyPart::Null => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    dimension: KeyPart,
    category: KeyPart,
    subcategory: KeyPart,
}

#[derive(Debug, Default)]
struct GroupTotals {
    actual: Decimal,
    budget: Decimal,
    prior: Decimal,
    row_count: usize,
}

pub struct Aggregator {
    period: ReportingPeriod,
    dimension: GroupDimension,
}

impl Aggregator {
    pub fn new(period: ReportingPeriod, dimension: GroupDimension) -> Self {
        Self { period, dimension }
    }

    /// Rows whose period truncates to the selected month.
    pub fn filter_period<'a>(&self, rows: &'a [SignedRow]) -> Vec<&'a SignedRow> {
        rows.iter()
            .filter(|row| self.period.contains(row.period()))
            .collect()
    }

    /// Sums signed measures per (dimension, category, subcategory) group for
    /// the selected month. Returns an empty vec when no rows match.
    ///
    /// Sums are exact; a group total outside the decimal range is an
    /// `AmountOverflow` error.
    pub fn aggregate(&self, rows: &[SignedRow]) -> Result<Vec<PivotRow>> {
        let in_period = self.filter_period(rows);

        let mut groups: BTreeMap<GroupKey, GroupTotals> = BTreeMap::new();
        for row in &in_period {
            let key = GroupKey {
                dimension: KeyPart::from_option(row.dimension_value(self.dimension)),
                category: KeyPart::from_option(row.joined.category()),
                subcategory: KeyPart::from_option(row.joined.subcategory()),
            };

            let totals = groups.entry(key).or_default();
            totals.actual = checked_add(totals.actual, row.actual_signed, "summing actual")?;
            totals.budget = checked_add(totals.budget, row.budget_signed, "summing budget")?;
            totals.prior = checked_add(totals.prior, row.prior_signed, "summing prior year")?;
            totals.row_count += 1;
        }

        debug!(
            "Aggregated {} of {} rows for {} into {} groups by {}",
            in_period.len(),
            rows.len(),
            self.period,
            groups.len(),
            self.dimension
        );

        groups
            .into_iter()
            .map(|(key, totals)| {
                pivot_row(
                    key.dimension.into_option(),
                    key.category.into_option(),
                    key.subcategory.into_option(),
                    totals.actual,
                    totals.budget,
                    totals.prior,
                    totals.row_count,
                )
            })
            .collect()
    }
}
