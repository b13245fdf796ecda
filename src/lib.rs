//! # P&L Variance
//!
//! A library for standardizing raw profit-and-loss ledger extracts against a
//! chart of accounts and explaining actual-vs-budget variances.
//!
//! ## Pipeline
//!
//! - **Load**: delimited ledger and chart-of-accounts files become typed rows
//! - **Map**: fact rows are left-joined to the chart; unmapped codes are kept and reported
//! - **Normalize**: per-account signs give every P&L line the same orientation
//! - **Aggregate**: rows for one month are summed by category, subcategory and an optional organizational dimension
//! - **Rank**: variances are computed with a defined-zero division policy and the largest drivers ranked
//! - **Assemble**: pivot, drivers, totals and warnings are packaged into an [`ExportPayload`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_variance::*;
//! use rust_decimal_macros::dec;
//!
//! let facts = b"account_code,period,actual,budget,prior_year\n4000,2024-01-01,1000,800,900\n";
//! let chart = b"account_code,category,subcategory,sign\n4000,Revenue,Product,1\n";
//!
//! let config = AnalysisConfig::new("2024-01".parse()?, GroupDimension::Total);
//! let payload = analyze_csv(facts, chart, &config)?;
//!
//! assert_eq!(payload.totals.var_abs, dec!(200));
//! assert_eq!(payload.totals.var_pct, dec!(0.25));
//! ```

pub mod aggregation;
pub mod cache;
pub mod chart_of_accounts;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod narrative;
pub mod normalizer;
pub mod schema;
pub mod utils;
pub mod variance;

#[cfg(feature = "narrative")]
pub mod llm;

pub use aggregation::Aggregator;
pub use cache::{ContentHash, TableCache};
pub use chart_of_accounts::{ChartOfAccounts, JoinOutcome, UnmappedSet};
pub use error::{Result, VarianceError};
pub use export::assemble_payload;
pub use ingestion::{available_periods, load_chart_of_accounts, load_fact_rows};
pub use narrative::{fallback_summary, NarrativeError, NarrativeRequest, SummaryLine};
pub use normalizer::normalize_signs;
pub use schema::*;
pub use utils::safe_divide;
pub use variance::{compute_totals, DriverRanker, DEFAULT_TOP_K};
pub use rust_decimal::Decimal;

use log::{debug, info, warn};
use std::sync::Arc;

/// Runs the analysis pipeline, optionally memoizing parsed inputs by content.
#[derive(Default)]
pub struct VarianceProcessor {
    facts: TableCache<Vec<FactRow>>,
    charts: TableCache<Vec<AccountMapping>>,
}

impl VarianceProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure transform from typed inputs to the export payload.
    pub fn process(
        facts: &[FactRow],
        mappings: &[AccountMapping],
        config: &AnalysisConfig,
    ) -> Result<ExportPayload> {
        validate_config(config)?;

        info!(
            "Running variance analysis for {} by {}",
            config.period, config.dimension
        );
        debug!(
            "Inputs contain {} fact rows and {} chart of accounts entries",
            facts.len(),
            mappings.len()
        );

        let chart = ChartOfAccounts::from_mappings(mappings)?;
        let ranker = DriverRanker::new(config.top_k)?;

        let JoinOutcome {
            rows,
            unmapped,
            unmapped_row_count,
        } = chart.join(facts);
        let signed = normalizer::normalize_signs(rows);

        let pivot = Aggregator::new(config.period, config.dimension).aggregate(&signed)?;
        let drivers = ranker.rank(&pivot);
        let totals = compute_totals(&pivot)?;

        let mut warnings = Vec::new();
        if !unmapped.is_empty() {
            warnings.push(PipelineWarning::UnmappedAccounts {
                account_codes: unmapped.to_vec(),
                row_count: unmapped_row_count,
            });
        }
        if pivot.is_empty() {
            warn!("No ledger rows fall in {}", config.period);
            warnings.push(PipelineWarning::PeriodNotPresent {
                period: config.period.to_string(),
            });
        }

        Ok(assemble_payload(
            pivot,
            drivers,
            totals,
            config.metadata(),
            warnings,
        ))
    }

    pub fn load_facts(&self, bytes: &[u8]) -> Result<Arc<Vec<FactRow>>> {
        self.facts
            .get_or_compute(&ContentHash::of(bytes), || load_fact_rows(bytes))
    }

    pub fn load_chart(&self, bytes: &[u8]) -> Result<Arc<Vec<AccountMapping>>> {
        self.charts
            .get_or_compute(&ContentHash::of(bytes), || load_chart_of_accounts(bytes))
    }

    /// Loads (through the cache) and analyzes raw uploaded bytes.
    pub fn analyze(
        &self,
        fact_bytes: &[u8],
        chart_bytes: &[u8],
        config: &AnalysisConfig,
    ) -> Result<ExportPayload> {
        let facts = self.load_facts(fact_bytes)?;
        let mappings = self.load_chart(chart_bytes)?;
        Self::process(&facts, &mappings, config)
    }
}

pub fn run_variance_analysis(
    facts: &[FactRow],
    mappings: &[AccountMapping],
    config: &AnalysisConfig,
) -> Result<ExportPayload> {
    VarianceProcessor::process(facts, mappings, config)
}

/// Uncached convenience wrapper over raw delimited input.
pub fn analyze_csv(
    fact_bytes: &[u8],
    chart_bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<ExportPayload> {
    let facts = load_fact_rows(fact_bytes)?;
    let mappings = load_chart_of_accounts(chart_bytes)?;
    run_variance_analysis(&facts, &mappings, config)
}

fn validate_config(config: &AnalysisConfig) -> Result<()> {
    variance::validate_top_k(config.top_k)?;
    Ok(())
}
