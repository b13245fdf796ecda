use crate::error::{Result, VarianceError};
use crate::utils::parse_ledger_date;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single ledger line from the fact extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub account_code: String,
    pub period: NaiveDate,
    pub business_unit: Option<String>,
    pub cost_center: Option<String>,
    pub actual: Decimal,
    pub budget: Decimal,
    pub prior_year: Decimal,
}

/// A chart-of-accounts line as read from the mapping file.
///
/// `sign` is kept as the raw numeric cell; it is validated into a [`Sign`]
/// when the chart is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMapping {
    pub account_code: String,
    pub category: String,
    pub subcategory: String,
    pub sign: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn multiplier(self) -> Decimal {
        match self {
            Sign::Positive => Decimal::ONE,
            Sign::Negative => Decimal::NEGATIVE_ONE,
        }
    }

    /// Accepts exactly +1 or -1 (`1.0` and `-1.00` included).
    pub fn from_raw(value: Decimal) -> Option<Self> {
        if value == Decimal::ONE {
            Some(Sign::Positive)
        } else if value == Decimal::NEGATIVE_ONE {
            Some(Sign::Negative)
        } else {
            None
        }
    }
}

impl From<Sign> for i8 {
    fn from(sign: Sign) -> Self {
        match sign {
            Sign::Positive => 1,
            Sign::Negative => -1,
        }
    }
}

impl TryFrom<i8> for Sign {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Sign::Positive),
            -1 => Ok(Sign::Negative),
            other => Err(format!("sign must be 1 or -1, got {}", other)),
        }
    }
}

/// The reporting attributes a fact row picks up from the chart of accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedAccount {
    pub category: String,
    pub subcategory: String,
    pub sign: Sign,
}

/// A fact row left-joined to the chart of accounts.
///
/// `mapping` is `None` when the account code has no chart entry. Such rows are
/// kept so their volume stays visible downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
    pub fact: FactRow,
    pub mapping: Option<MappedAccount>,
}

impl JoinedRow {
    pub fn category(&self) -> Option<&str> {
        self.mapping.as_ref().map(|m| m.category.as_str())
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.mapping.as_ref().map(|m| m.subcategory.as_str())
    }

    pub fn sign(&self) -> Option<Sign> {
        self.mapping.as_ref().map(|m| m.sign)
    }

    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }
}

/// A joined row with its measures multiplied by the account sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRow {
    pub joined: JoinedRow,
    pub actual_signed: Decimal,
    pub budget_signed: Decimal,
    pub prior_signed: Decimal,
}

impl SignedRow {
    pub fn period(&self) -> NaiveDate {
        self.joined.fact.period
    }

    pub fn dimension_value(&self, dimension: GroupDimension) -> Option<&str> {
        match dimension {
            GroupDimension::Total => None,
            GroupDimension::BusinessUnit => self.joined.fact.business_unit.as_deref(),
            GroupDimension::CostCenter => self.joined.fact.cost_center.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum GroupDimension {
    #[default]
    #[serde(rename = "Total")]
    #[schemars(description = "No organizational split; one row per category and subcategory")]
    Total,

    #[serde(rename = "business_unit")]
    #[schemars(description = "Split each category and subcategory by business unit")]
    BusinessUnit,

    #[serde(rename = "cost_center")]
    #[schemars(description = "Split each category and subcategory by cost center")]
    CostCenter,
}

impl GroupDimension {
    pub fn label(self) -> &'static str {
        match self {
            GroupDimension::Total => "Total",
            GroupDimension::BusinessUnit => "business_unit",
            GroupDimension::CostCenter => "cost_center",
        }
    }
}

impl fmt::Display for GroupDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GroupDimension {
    type Err = VarianceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Total" => Ok(GroupDimension::Total),
            "business_unit" => Ok(GroupDimension::BusinessUnit),
            "cost_center" => Ok(GroupDimension::CostCenter),
            other => Err(VarianceError::InvalidDimension(other.to_string())),
        }
    }
}

/// A calendar month used to select ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportingPeriod {
    year: i32,
    month: u32,
}

impl ReportingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(VarianceError::InvalidPeriodSelector(format!(
                "{}-{}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// True when `date` truncates to this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportingPeriod {
    type Err = VarianceError;

    fn from_str(s: &str) -> Result<Self> {
        parse_ledger_date(s)
            .map(Self::from_date)
            .ok_or_else(|| VarianceError::InvalidPeriodSelector(s.to_string()))
    }
}

impl TryFrom<String> for ReportingPeriod {
    type Error = VarianceError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReportingPeriod> for String {
    fn from(period: ReportingPeriod) -> Self {
        period.to_string()
    }
}

fn default_top_k() -> usize {
    crate::variance::DEFAULT_TOP_K
}

fn default_generated_by() -> String {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string()
}

/// Selectors for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub period: ReportingPeriod,

    #[serde(default)]
    pub dimension: GroupDimension,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_generated_by")]
    pub generated_by: String,
}

impl AnalysisConfig {
    pub fn new(period: ReportingPeriod, dimension: GroupDimension) -> Self {
        Self {
            period,
            dimension,
            top_k: default_top_k(),
            generated_by: default_generated_by(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_generated_by(mut self, generated_by: impl Into<String>) -> Self {
        self.generated_by = generated_by.into();
        self
    }

    pub fn metadata(&self) -> PayloadMetadata {
        PayloadMetadata {
            period: self.period.to_string(),
            view_dimension: self.dimension.label().to_string(),
            generated_by: self.generated_by.clone(),
            top_k: self.top_k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PivotRow {
    #[schemars(
        description = "Value of the grouping dimension (business unit or cost center). Null when grouping by Total or when the ledger cell was empty."
    )]
    pub dimension: Option<String>,

    #[schemars(description = "Reporting category from the chart of accounts. Null for unmapped accounts.")]
    pub category: Option<String>,

    #[schemars(description = "Reporting subcategory from the chart of accounts. Null for unmapped accounts.")]
    pub subcategory: Option<String>,

    #[schemars(description = "Sum of sign-normalized actuals")]
    pub actual: Decimal,

    #[schemars(description = "Sum of sign-normalized budget")]
    pub budget: Decimal,

    #[schemars(description = "Sum of sign-normalized prior-year figures")]
    pub prior: Decimal,

    #[schemars(description = "actual - budget")]
    pub var_abs: Decimal,

    #[schemars(description = "var_abs / |budget|, or exactly 0 when budget is 0")]
    pub var_pct: Decimal,

    #[schemars(description = "Number of ledger rows folded into this group")]
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DriverRow {
    #[serde(flatten)]
    pub row: PivotRow,

    #[schemars(description = "|var_abs|, the ranking key")]
    pub abs_driver: Decimal,

    #[schemars(description = "1-based position in the driver ranking")]
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TotalsRow {
    pub actual: Decimal,
    pub budget: Decimal,
    pub prior: Decimal,

    #[schemars(description = "Recomputed from the summed actual and budget")]
    pub var_abs: Decimal,

    #[schemars(
        description = "Recomputed from the summed actual and budget; never an average of row percentages"
    )]
    pub var_pct: Decimal,

    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    #[schemars(
        description = "Ledger account codes with no chart-of-accounts entry. Their rows are reported under a null category."
    )]
    UnmappedAccounts {
        account_codes: Vec<String>,
        row_count: usize,
    },

    #[schemars(description = "The selected period has no ledger rows, so the pivot is empty.")]
    PeriodNotPresent { period: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PayloadMetadata {
    #[schemars(description = "Selected reporting month, YYYY-MM")]
    pub period: String,

    #[schemars(description = "Grouping dimension label: Total, business_unit or cost_center")]
    pub view_dimension: String,

    #[schemars(description = "Tag identifying the producer of this payload")]
    pub generated_by: String,

    #[schemars(description = "Maximum number of driver rows requested")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExportPayload {
    pub metadata: PayloadMetadata,
    pub pivot_table: Vec<PivotRow>,
    pub drivers: Vec<DriverRow>,
    pub totals: TotalsRow,

    #[serde(default)]
    pub warnings: Vec<PipelineWarning>,
}
