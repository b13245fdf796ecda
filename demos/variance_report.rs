use pnl_variance::{
    available_periods, fallback_summary, load_fact_rows, AnalysisConfig, Decimal, GroupDimension,
    NarrativeRequest, ReportingPeriod, VarianceProcessor, DEFAULT_TOP_K,
};
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;

// A small ledger extract: revenue booked positive, costs booked positive
// and flipped by the chart of accounts.
const SAMPLE_LEDGER: &str = "\
account_code,period,business_unit,cost_center,actual,budget,prior_year
4000,2024-03-04,Retail,CC-100,182000,170000,158000
4000,2024-03-18,Wholesale,CC-200,96500,110000,101000
4100,2024-03-29,Retail,CC-100,14200,12000,11800
5000,2024-03-11,Retail,CC-100,91000,85000,79000
5000,2024-03-12,Wholesale,CC-200,54300,61000,57500
6100,2024-03-01,Retail,CC-110,22000,22000,21000
6200,2024-03-15,Wholesale,CC-210,18750,12500,11000
7000,2024-03-31,,,3400,0,0
4000,2024-02-19,Retail,CC-100,175000,168000,150000
";

const SAMPLE_CHART: &str = "\
account_code,category,subcategory,sign
4000,Revenue,Product Sales,1
4100,Revenue,Services,1
5000,Cost of Sales,Materials,-1
6100,Operating Expenses,Rent,-1
6200,Operating Expenses,Marketing,-1
";

fn cents(value: Decimal) -> Decimal {
    value.round_dp(2)
}

fn pct(ratio: Decimal) -> Decimal {
    ratio
        .checked_mul(Decimal::ONE_HUNDRED)
        .unwrap_or_default()
        .round_dp(1)
}

/// Usage: variance_report [LEDGER.csv CHART.csv] [YYYY-MM] [Total|business_unit|cost_center]
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (ledger, chart) = match (args.first(), args.get(1)) {
        (Some(ledger), Some(chart)) => (fs::read(ledger)?, fs::read(chart)?),
        _ => (SAMPLE_LEDGER.as_bytes().to_vec(), SAMPLE_CHART.as_bytes().to_vec()),
    };

    let facts = load_fact_rows(&ledger)?;
    let periods = available_periods(&facts);
    println!(
        "Periods in ledger: {}",
        periods
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let period: ReportingPeriod = match args.get(2) {
        Some(selector) => selector.parse()?,
        None => *periods.last().ok_or("ledger has no rows")?,
    };
    let dimension: GroupDimension = match args.get(3) {
        Some(selector) => selector.parse()?,
        None => GroupDimension::BusinessUnit,
    };

    let processor = VarianceProcessor::new();
    let config = AnalysisConfig::new(period, dimension).with_top_k(DEFAULT_TOP_K);
    let payload = processor.analyze(&ledger, &chart, &config)?;

    println!("\n=== Variance pivot: {} by {} ===", period, dimension);
    println!(
        "{:<12} {:<20} {:<16} {:>12} {:>12} {:>12} {:>8}",
        "Dimension", "Category", "Subcategory", "Actual", "Budget", "Variance", "Var %"
    );
    for row in &payload.pivot_table {
        println!(
            "{:<12} {:<20} {:<16} {:>12} {:>12} {:>12} {:>7}%",
            row.dimension.as_deref().unwrap_or("-"),
            row.category.as_deref().unwrap_or("(unmapped)"),
            row.subcategory.as_deref().unwrap_or("(unmapped)"),
            cents(row.actual),
            cents(row.budget),
            cents(row.var_abs),
            pct(row.var_pct)
        );
    }
    println!(
        "{:<50} {:>12} {:>12} {:>12} {:>7}%",
        "Total",
        cents(payload.totals.actual),
        cents(payload.totals.budget),
        cents(payload.totals.var_abs),
        pct(payload.totals.var_pct)
    );

    println!("\n=== Top drivers ===");
    for driver in &payload.drivers {
        println!(
            "#{:<3} {:<20} {:<16} {:>12}",
            driver.rank,
            driver.row.category.as_deref().unwrap_or("(unmapped)"),
            driver.row.subcategory.as_deref().unwrap_or("(unmapped)"),
            cents(driver.row.var_abs)
        );
    }

    for code in payload.unmapped_accounts() {
        println!("⚠️  Account {} has no chart of accounts entry", code);
    }

    let request = NarrativeRequest::from_payload(&payload, 3);
    println!("\n=== Summary ===\n{}", fallback_summary(&request));

    let mut json_file = File::create("variance_payload.json")?;
    json_file.write_all(payload.to_json()?.as_bytes())?;
    fs::write("variance_pivot.csv", payload.pivot_to_csv()?)?;
    fs::write("variance_drivers.csv", payload.drivers_to_csv()?)?;
    println!("\n✅ Wrote variance_payload.json, variance_pivot.csv and variance_drivers.csv");

    Ok(())
}
