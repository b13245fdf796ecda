use crate::error::{Result, VarianceError};
use crate::schema::{DriverRow, PivotRow, TotalsRow};
use crate::utils::{checked_add, safe_divide};
use log::debug;
use rust_decimal::Decimal;

pub const DEFAULT_TOP_K: usize = 10;

/// Absolute and percent variance of actual against budget.
///
/// The percentage is taken against `|budget|` so an overspend on a negative
/// budget line still reads as a positive variance when actual exceeds budget.
pub fn variance(actual: Decimal, budget: Decimal) -> Result<(Decimal, Decimal)> {
    let var_abs = actual
        .checked_sub(budget)
        .ok_or_else(|| VarianceError::AmountOverflow("computing actual - budget".to_string()))?;
    Ok((var_abs, safe_divide(var_abs, budget.abs())))
}

pub(crate) fn pivot_row(
    dimension: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    actual: Decimal,
    budget: Decimal,
    prior: Decimal,
    row_count: usize,
) -> Result<PivotRow> {
    let (var_abs, var_pct) = variance(actual, budget)?;
    Ok(PivotRow {
        dimension,
        category,
        subcategory,
        actual,
        budget,
        prior,
        var_abs,
        var_pct,
        row_count,
    })
}

/// Column-wise totals with the variance recomputed from the sums.
pub fn compute_totals(pivot: &[PivotRow]) -> Result<TotalsRow> {
    let mut totals = TotalsRow::default();
    for row in pivot {
        totals.actual = checked_add(totals.actual, row.actual, "totalling actual")?;
        totals.budget = checked_add(totals.budget, row.budget, "totalling budget")?;
        totals.prior = checked_add(totals.prior, row.prior, "totalling prior year")?;
        totals.row_count += row.row_count;
    }

    let (var_abs, var_pct) = variance(totals.actual, totals.budget)?;
    totals.var_abs = var_abs;
    totals.var_pct = var_pct;
    Ok(totals)
}

pub struct DriverRanker {
    top_k: usize,
}

impl Default for DriverRanker {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl DriverRanker {
    pub fn new(top_k: usize) -> Result<Self> {
        validate_top_k(top_k)?;
        Ok(Self { top_k })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-K rows by `|var_abs|` descending. The sort is stable, so equal
    /// drivers keep their pivot order.
    pub fn rank(&self, pivot: &[PivotRow]) -> Vec<DriverRow> {
        let mut ranked: Vec<&PivotRow> = pivot.iter().collect();
        ranked.sort_by(|a, b| b.var_abs.abs().cmp(&a.var_abs.abs()));

        let drivers: Vec<DriverRow> = ranked
            .into_iter()
            .take(self.top_k)
            .enumerate()
            .map(|(idx, row)| DriverRow {
                abs_driver: row.var_abs.abs(),
                row: row.clone(),
                rank: idx + 1,
            })
            .collect();

        debug!("Ranked {} drivers from {} pivot rows", drivers.len(), pivot.len());
        drivers
    }
}

pub fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(VarianceError::InvalidTopK(top_k));
    }
    Ok(())
}
