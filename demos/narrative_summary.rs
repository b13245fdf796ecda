use pnl_variance::llm::{CompletionClient, NarrativeWriter};
use pnl_variance::{analyze_csv, AnalysisConfig, GroupDimension, NarrativeRequest};
use std::error::Error;
use std::time::Duration;

const LEDGER: &str = "\
account_code,period,business_unit,actual,budget,prior_year
4000,2024-06-30,Retail,240000,225000,210000
4000,2024-06-30,Online,88000,104000,76000
5000,2024-06-30,Retail,121000,112000,104000
6200,2024-06-30,Online,31000,18000,15000
";

const CHART: &str = "\
account_code,category,subcategory,sign
4000,Revenue,Product Sales,1
5000,Cost of Sales,Materials,-1
6200,Operating Expenses,Marketing,-1
";

/// Requires OPENAI_API_KEY; OPENAI_BASE_URL and NARRATIVE_MODEL are optional.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AnalysisConfig::new("2024-06".parse()?, GroupDimension::BusinessUnit);
    let payload = analyze_csv(LEDGER.as_bytes(), CHART.as_bytes(), &config)?;
    let request = NarrativeRequest::from_payload(&payload, 5);

    println!("Prompt sent to the model:\n\n{}", request.to_prompt());

    let model = std::env::var("NARRATIVE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let client = CompletionClient::from_env()?;
    let writer = NarrativeWriter::new(client, model).with_timeout(Duration::from_secs(20));

    let narrative = writer.write_or_fallback(&request).await;
    println!("\n=== Commentary ===\n{}", narrative);

    Ok(())
}
