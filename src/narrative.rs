//! Hand-off to an external summarization service.
//!
//! This module only shapes the request. The network client lives in
//! [`crate::llm`] behind the `narrative` feature, and its errors are a separate
//! type so a failed summary can never invalidate an [`ExportPayload`].

use crate::schema::{DriverRow, ExportPayload, TotalsRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SUMMARY_LINES: usize = 5;

pub const SYSTEM_PROMPT: &str = "You are a financial analyst writing concise management commentary. \
Explain the largest actual-versus-budget variances using only the figures provided. \
Do not invent numbers. Answer in at most three short paragraphs.";

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("Narrative credentials missing: set {0}")]
    MissingCredentials(String),

    #[error("Narrative request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Narrative transport failure: {0}")]
    Transport(String),

    #[error("Narrative service returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Malformed narrative response: {0}")]
    MalformedResponse(String),
}

/// The display columns of one driver line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub label: String,
    pub actual: Decimal,
    pub budget: Decimal,
    pub var_abs: Decimal,
    pub var_pct: Decimal,
}

impl SummaryLine {
    pub fn from_driver(driver: &DriverRow) -> Self {
        let row = &driver.row;
        let mut parts: Vec<&str> = Vec::new();
        if let Some(dimension) = row.dimension.as_deref() {
            parts.push(dimension);
        }
        parts.push(row.category.as_deref().unwrap_or("Unmapped"));
        parts.push(row.subcategory.as_deref().unwrap_or("Unmapped"));

        Self {
            label: parts.join(" / "),
            actual: row.actual,
            budget: row.budget,
            var_abs: row.var_abs,
            var_pct: row.var_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub period_label: String,
    pub grouping_label: String,
    pub lines: Vec<SummaryLine>,
    pub totals: TotalsRow,
}

impl NarrativeRequest {
    pub fn new(
        drivers: &[DriverRow],
        totals: &TotalsRow,
        period_label: impl Into<String>,
        grouping_label: impl Into<String>,
        max_lines: usize,
    ) -> Self {
        Self {
            period_label: period_label.into(),
            grouping_label: grouping_label.into(),
            lines: drivers
                .iter()
                .take(max_lines)
                .map(SummaryLine::from_driver)
                .collect(),
            totals: totals.clone(),
        }
    }

    pub fn from_payload(payload: &ExportPayload, max_lines: usize) -> Self {
        Self::new(
            &payload.drivers,
            &payload.totals,
            payload.metadata.period.clone(),
            payload.metadata.view_dimension.clone(),
            max_lines,
        )
    }

    /// Compact markdown prompt: context labels, a driver table and the totals.
    pub fn to_prompt(&self) -> String {
        let mut prompt = format!(
            "Period: {}\nView: {}\n\nTop variance drivers (sign-normalized):\n\n",
            self.period_label, self.grouping_label
        );
        prompt.push_str("| Line | Actual | Budget | Variance | Variance % |\n");
        prompt.push_str("|---|---:|---:|---:|---:|\n");
        for line in &self.lines {
            prompt.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                line.label,
                money(line.actual),
                money(line.budget),
                money(line.var_abs),
                percent(line.var_pct)
            ));
        }

        prompt.push_str(&format!(
            "\nTotals: actual {}, budget {}, variance {} ({})\n",
            money(self.totals.actual),
            money(self.totals.budget),
            money(self.totals.var_abs),
            percent(self.totals.var_pct)
        ));
        prompt
    }
}

/// Rounds to `dp` places and pads with trailing zeros.
fn fixed(value: Decimal, dp: u32) -> String {
    let mut rounded = value.round_dp(dp);
    rounded.rescale(dp);
    rounded.to_string()
}

fn money(value: Decimal) -> String {
    fixed(value, 2)
}

fn percent(ratio: Decimal) -> String {
    match ratio.checked_mul(Decimal::ONE_HUNDRED) {
        Some(pct) => format!("{}%", fixed(pct, 1)),
        None => "n/a".to_string(),
    }
}

/// Plain summary used when the external service is unavailable.
pub fn fallback_summary(request: &NarrativeRequest) -> String {
    let direction = if request.totals.var_abs >= Decimal::ZERO {
        "above"
    } else {
        "below"
    };

    let mut summary = format!(
        "For {} ({} view), actuals of {} came in {} {} budget ({}).",
        request.period_label,
        request.grouping_label,
        money(request.totals.actual),
        money(request.totals.var_abs.abs()),
        direction,
        percent(request.totals.var_pct)
    );

    if let Some(top) = request.lines.first() {
        summary.push_str(&format!(
            " The largest driver was {} with a variance of {} ({}).",
            top.label,
            money(top.var_abs),
            percent(top.var_pct)
        ));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PivotRow;
    use rust_decimal_macros::dec;

    fn driver(dimension: Option<&str>, category: Option<&str>, var_abs: Decimal, rank: usize) -> DriverRow {
        DriverRow {
            row: PivotRow {
                dimension: dimension.map(str::to_string),
                category: category.map(str::to_string),
                subcategory: category.map(|_| "Product".to_string()),
                actual: dec!(800) + var_abs,
                budget: dec!(800),
                prior: Decimal::ZERO,
                var_abs,
                var_pct: var_abs / dec!(800),
                row_count: 1,
            },
            abs_driver: var_abs.abs(),
            rank,
        }
    }

    fn totals() -> TotalsRow {
        TotalsRow {
            actual: dec!(1000),
            budget: dec!(800),
            prior: Decimal::ZERO,
            var_abs: dec!(200),
            var_pct: dec!(0.25),
            row_count: 3,
        }
    }

    #[test]
    fn test_summary_line_labels() {
        let line = SummaryLine::from_driver(&driver(Some("North"), Some("Revenue"), dec!(200), 1));
        assert_eq!(line.label, "North / Revenue / Product");

        let unmapped = SummaryLine::from_driver(&driver(None, None, dec!(10), 2));
        assert_eq!(unmapped.label, "Unmapped / Unmapped");
    }

    #[test]
    fn test_request_truncates_lines() {
        let drivers: Vec<DriverRow> = (1..=8)
            .map(|i| driver(None, Some("Revenue"), dec!(100) / Decimal::from(i), i))
            .collect();
        let request = NarrativeRequest::new(&drivers, &totals(), "2024-01", "Total", 3);
        assert_eq!(request.lines.len(), 3);
        assert_eq!(request.period_label, "2024-01");
    }

    #[test]
    fn test_prompt_contains_table_and_totals() {
        let request = NarrativeRequest::new(
            &[driver(None, Some("Revenue"), dec!(200), 1)],
            &totals(),
            "2024-01",
            "Total",
            DEFAULT_SUMMARY_LINES,
        );
        let prompt = request.to_prompt();

        assert!(prompt.contains("Period: 2024-01"));
        assert!(prompt.contains("View: Total"));
        assert!(prompt.contains("| Revenue / Product | 1000.00 | 800.00 | 200.00 | 25.0% |"));
        assert!(prompt.contains("Totals: actual 1000.00, budget 800.00, variance 200.00 (25.0%)"));
    }

    #[test]
    fn test_fallback_summary() {
        let request = NarrativeRequest::new(
            &[driver(None, Some("Revenue"), dec!(200), 1)],
            &totals(),
            "2024-01",
            "Total",
            DEFAULT_SUMMARY_LINES,
        );
        let summary = fallback_summary(&request);
        assert!(summary.starts_with("For 2024-01 (Total view), actuals of 1000.00 came in 200.00 above budget (25.0%)."));
        assert!(summary.contains("Revenue / Product"));
    }

    #[test]
    fn test_amounts_are_rounded_for_display() {
        let mut odd = totals();
        odd.actual = dec!(1234.5678);
        odd.var_pct = dec!(1) / dec!(7);
        let request = NarrativeRequest::new(&[], &odd, "2024-03", "Total", 5);
        let prompt = request.to_prompt();
        assert!(prompt.contains("Totals: actual 1234.57, budget 800.00, variance 200.00 (14.3%)"));

        odd.var_pct = Decimal::MAX;
        let request = NarrativeRequest::new(&[], &odd, "2024-03", "Total", 5);
        assert!(request.to_prompt().contains("(n/a)"));
    }

    #[test]
    fn test_fallback_summary_without_drivers() {
        let mut below = totals();
        below.var_abs = dec!(-50);
        below.var_pct = dec!(-0.05);
        let request = NarrativeRequest::new(&[], &below, "2024-02", "cost_center", 5);
        let summary = fallback_summary(&request);
        assert!(summary.contains("50.00 below budget (-5.0%)"));
        assert!(!summary.contains("largest driver"));
    }
}
