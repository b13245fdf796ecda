use crate::error::Result;
use crate::schema::{DriverRow, ExportPayload, PayloadMetadata, PipelineWarning, PivotRow, TotalsRow};
use csv::Writer;
use rust_decimal::Decimal;

const PIVOT_HEADER: &[&str] = &[
    "dimension",
    "category",
    "subcategory",
    "actual",
    "budget",
    "prior",
    "var_abs",
    "var_pct",
    "row_count",
];

/// Packages the analysis results for downstream rendering. No I/O happens here.
pub fn assemble_payload(
    pivot_table: Vec<PivotRow>,
    drivers: Vec<DriverRow>,
    totals: TotalsRow,
    metadata: PayloadMetadata,
    warnings: Vec<PipelineWarning>,
) -> ExportPayload {
    ExportPayload {
        metadata,
        pivot_table,
        drivers,
        totals,
        warnings,
    }
}

/// Amount cell without trailing zeros, so `2.50 + 0.50` renders as `3`.
fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

fn pivot_fields(row: &PivotRow) -> Vec<String> {
    vec![
        row.dimension.clone().unwrap_or_default(),
        row.category.clone().unwrap_or_default(),
        row.subcategory.clone().unwrap_or_default(),
        amount(row.actual),
        amount(row.budget),
        amount(row.prior),
        amount(row.var_abs),
        amount(row.var_pct),
        row.row_count.to_string(),
    ]
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl ExportPayload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExportPayload)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Account codes reported as unmapped, if any.
    pub fn unmapped_accounts(&self) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|warning| match warning {
                PipelineWarning::UnmappedAccounts { account_codes, .. } => Some(account_codes),
                PipelineWarning::PeriodNotPresent { .. } => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Pivot sheet as CSV, with a trailing `Total` line. Null keys render as
    /// empty cells.
    pub fn pivot_to_csv(&self) -> Result<String> {
        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(PIVOT_HEADER)?;

        for row in &self.pivot_table {
            writer.write_record(pivot_fields(row))?;
        }

        let totals = &self.totals;
        writer.write_record([
            "Total".to_string(),
            String::new(),
            String::new(),
            amount(totals.actual),
            amount(totals.budget),
            amount(totals.prior),
            amount(totals.var_abs),
            amount(totals.var_pct),
            totals.row_count.to_string(),
        ])?;

        finish(writer)
    }

    /// Driver sheet as CSV, in rank order.
    pub fn drivers_to_csv(&self) -> Result<String> {
        let mut writer = Writer::from_writer(Vec::new());

        let mut header = vec!["rank"];
        header.extend_from_slice(PIVOT_HEADER);
        header.push("abs_driver");
        writer.write_record(&header)?;

        for driver in &self.drivers {
            let mut fields = vec![driver.rank.to_string()];
            fields.extend(pivot_fields(&driver.row));
            fields.push(amount(driver.abs_driver));
            writer.write_record(fields)?;
        }

        finish(writer)
    }
}
