use crate::error::{Result, VarianceError};
use crate::schema::{AccountMapping, FactRow, ReportingPeriod};
use crate::utils::{parse_amount, parse_ledger_date};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

const FACT_TABLE: &str = "fact";
const COA_TABLE: &str = "chart of accounts";

pub const FACT_REQUIRED_COLUMNS: &[&str] = &["account_code", "period", "actual", "budget", "prior_year"];
pub const FACT_OPTIONAL_COLUMNS: &[&str] = &["business_unit", "cost_center"];
pub const COA_REQUIRED_COLUMNS: &[&str] = &["account_code", "category", "subcategory", "sign"];

/// Header name to column position, resolved once per table.
struct ColumnIndex {
    table: &'static str,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Duplicate header names are rejected so a cell is never read from an
    /// ambiguous column. Blank headers are ignored.
    fn from_headers(table: &'static str, headers: &StringRecord) -> Result<Self> {
        let mut positions = HashMap::with_capacity(headers.len());
        for (idx, name) in headers.iter().enumerate() {
            let name = name.trim_start_matches('\u{feff}').trim();
            if name.is_empty() {
                continue;
            }
            if positions.insert(name.to_string(), idx).is_some() {
                return Err(VarianceError::ParseError {
                    table,
                    details: format!("duplicate column '{}'", name),
                });
            }
        }
        Ok(Self { table, positions })
    }

    /// The join key is checked first so its absence is reported as a schema
    /// problem rather than a generic missing column.
    fn require(&self, required: &[&str]) -> Result<()> {
        if !self.positions.contains_key("account_code") {
            return Err(VarianceError::SchemaError(self.table));
        }

        for column in required {
            if !self.positions.contains_key(*column) {
                return Err(VarianceError::MissingColumn {
                    table: self.table,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.positions.get(column).and_then(|idx| record.get(*idx))
    }

    fn text(&self, record: &StringRecord, column: &str) -> String {
        self.get(record, column).unwrap_or_default().to_string()
    }

    fn optional_text(&self, record: &StringRecord, column: &str) -> Option<String> {
        self.get(record, column)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn amount(&self, record: &StringRecord, column: &str, line: usize) -> Result<Decimal> {
        let raw = self.get(record, column).unwrap_or_default();
        parse_amount(raw).ok_or_else(|| VarianceError::InvalidNumber {
            line,
            column: column.to_string(),
            value: raw.to_string(),
        })
    }
}

fn read_records(table: &'static str, bytes: &[u8]) -> Result<(ColumnIndex, Vec<StringRecord>)> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| VarianceError::ParseError {
            table,
            details: e.to_string(),
        })?
        .clone();
    let index = ColumnIndex::from_headers(table, &headers)?;

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| VarianceError::ParseError {
            table,
            details: e.to_string(),
        })?;

    Ok((index, records))
}

/// Parses a delimited ledger extract into typed fact rows.
///
/// Line numbers in errors count data rows from 1, excluding the header.
pub fn load_fact_rows(bytes: &[u8]) -> Result<Vec<FactRow>> {
    let (index, records) = read_records(FACT_TABLE, bytes)?;
    index.require(FACT_REQUIRED_COLUMNS)?;

    let mut rows = Vec::with_capacity(records.len());
    for (offset, record) in records.iter().enumerate() {
        let line = offset + 1;
        let raw_period = index.get(record, "period").unwrap_or_default();
        let period = parse_ledger_date(raw_period).ok_or_else(|| VarianceError::InvalidPeriod {
            line,
            value: raw_period.to_string(),
        })?;

        rows.push(FactRow {
            account_code: index.text(record, "account_code"),
            period,
            business_unit: index.optional_text(record, "business_unit"),
            cost_center: index.optional_text(record, "cost_center"),
            actual: index.amount(record, "actual", line)?,
            budget: index.amount(record, "budget", line)?,
            prior_year: index.amount(record, "prior_year", line)?,
        });
    }

    debug!("Loaded {} fact rows", rows.len());
    Ok(rows)
}

/// Parses a chart-of-accounts mapping file.
///
/// Signs are read as raw numbers here and validated when the chart is built.
pub fn load_chart_of_accounts(bytes: &[u8]) -> Result<Vec<AccountMapping>> {
    let (index, records) = read_records(COA_TABLE, bytes)?;
    index.require(COA_REQUIRED_COLUMNS)?;

    let mut mappings = Vec::with_capacity(records.len());
    for (offset, record) in records.iter().enumerate() {
        let line = offset + 1;
        mappings.push(AccountMapping {
            account_code: index.text(record, "account_code"),
            category: index.text(record, "category"),
            subcategory: index.text(record, "subcategory"),
            sign: index.amount(record, "sign", line)?,
        });
    }

    debug!("Loaded {} chart of accounts entries", mappings.len());
    Ok(mappings)
}

/// Distinct calendar months present in the facts, ascending.
pub fn available_periods(rows: &[FactRow]) -> Vec<ReportingPeriod> {
    rows.iter()
        .map(|row| ReportingPeriod::from_date(row.period))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const FACTS: &str = "\
account_code,period,business_unit,cost_center,actual,budget,prior_year
4000,2024-01-01,North,CC1,1000,800,900
5000,2024-01-15,South,,250.5,,200
4000,2024-02-01,,CC2,1100,850,950
";

    const CHART: &str = "\
account_code,category,subcategory,sign
4000,Revenue,Product,1
5000,COGS,Materials,-1
";

    #[test]
    fn test_load_fact_rows() {
        let rows = load_fact_rows(FACTS.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first.account_code, "4000");
        assert_eq!(first.period, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.business_unit.as_deref(), Some("North"));
        assert_eq!(first.cost_center.as_deref(), Some("CC1"));
        assert_eq!(first.actual, dec!(1000));

        let second = &rows[1];
        assert_eq!(second.cost_center, None);
        assert_eq!(second.budget, dec!(0));
        assert_eq!(second.actual, dec!(250.5));

        assert_eq!(rows[2].business_unit, None);
    }

    #[test]
    fn test_optional_dimension_columns_may_be_absent() {
        let csv = "account_code,period,actual,budget,prior_year\n4000,2024-01-01,1,2,3\n";
        let rows = load_fact_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].business_unit, None);
        assert_eq!(rows[0].cost_center, None);
    }

    #[test]
    fn test_column_order_and_bom_are_tolerated() {
        let csv = "\u{feff}budget, actual ,prior_year,period,account_code,notes\n800,1000,0,2024-01-01,4000,ignored\n";
        let rows = load_fact_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].account_code, "4000");
        assert_eq!(rows[0].actual, dec!(1000));
        assert_eq!(rows[0].budget, dec!(800));
    }

    #[test]
    fn test_missing_join_key_is_schema_error() {
        let csv = "code,period,actual,budget,prior_year\n4000,2024-01-01,1,2,3\n";
        assert!(matches!(
            load_fact_rows(csv.as_bytes()),
            Err(VarianceError::SchemaError("fact"))
        ));

        let chart = "code,category,subcategory,sign\n4000,Revenue,Product,1\n";
        assert!(matches!(
            load_chart_of_accounts(chart.as_bytes()),
            Err(VarianceError::SchemaError("chart of accounts"))
        ));
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "account_code,period,actual,prior_year\n4000,2024-01-01,1,3\n";
        match load_fact_rows(csv.as_bytes()) {
            Err(VarianceError::MissingColumn { column, .. }) => assert_eq!(column, "budget"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_period_aborts_ingestion() {
        let csv = "account_code,period,actual,budget,prior_year\n4000,2024-01-01,1,2,3\n4000,soon,1,2,3\n";
        match load_fact_rows(csv.as_bytes()) {
            Err(VarianceError::InvalidPeriod { line, value }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidPeriod, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_number() {
        let csv = "account_code,period,actual,budget,prior_year\n4000,2024-01-01,lots,2,3\n";
        assert!(matches!(
            load_fact_rows(csv.as_bytes()),
            Err(VarianceError::InvalidNumber { line: 1, .. })
        ));
    }

    #[test]
    fn test_ragged_rows_are_parse_errors() {
        let csv = "account_code,period,actual,budget,prior_year\n4000,2024-01-01,1\n";
        assert!(matches!(
            load_fact_rows(csv.as_bytes()),
            Err(VarianceError::ParseError { table: "fact", .. })
        ));
    }

    #[test]
    fn test_duplicate_header_is_parse_error() {
        let csv = "account_code,period,actual,budget,prior_year,actual\n4000,2024-01-01,1,2,3,4\n";
        match load_fact_rows(csv.as_bytes()) {
            Err(VarianceError::ParseError { table, details }) => {
                assert_eq!(table, "fact");
                assert!(details.contains("'actual'"));
            }
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_cent_amounts_are_exact() {
        let csv = "account_code,period,actual,budget,prior_year\n4000,2024-01-01,0.10,0.20,1234567.89\n";
        let rows = load_fact_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].actual + rows[0].budget, dec!(0.3));
        assert_eq!(rows[0].prior_year.to_string(), "1234567.89");
    }

    #[test]
    fn test_empty_input_reports_missing_join_key() {
        assert!(matches!(
            load_fact_rows(b""),
            Err(VarianceError::SchemaError(_))
        ));
    }

    #[test]
    fn test_load_chart_of_accounts() {
        let chart = load_chart_of_accounts(CHART.as_bytes()).unwrap();
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[1].category, "COGS");
        assert_eq!(chart[1].sign, dec!(-1));
    }

    #[test]
    fn test_available_periods() {
        let rows = load_fact_rows(FACTS.as_bytes()).unwrap();
        let periods: Vec<String> = available_periods(&rows)
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(periods, vec!["2024-01", "2024-02"]);
    }

    #[test]
    fn test_loading_is_deterministic() {
        let first = load_fact_rows(FACTS.as_bytes()).unwrap();
        let second = load_fact_rows(FACTS.as_bytes()).unwrap();
        assert_eq!(first, second);
    }
}
