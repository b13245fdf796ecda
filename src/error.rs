use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VarianceError {
    #[error("Parse error in {table} input: {details}")]
    ParseError { table: &'static str, details: String },

    #[error("Parse error: required column '{column}' is missing from {table} input")]
    MissingColumn { table: &'static str, column: String },

    #[error("Invalid period '{value}' on line {line}: expected a date such as YYYY-MM-DD")]
    InvalidPeriod { line: usize, value: String },

    #[error("Invalid numeric value '{value}' in column '{column}' on line {line}")]
    InvalidNumber {
        line: usize,
        column: String,
        value: String,
    },

    #[error("Schema error: join key 'account_code' is missing from {0} input")]
    SchemaError(&'static str),

    #[error("Invalid sign {value} for account {account_code}: must be 1 or -1")]
    InvalidSign { account_code: String, value: Decimal },

    #[error("Duplicate account code in chart of accounts: {0}")]
    DuplicateAccountCode(String),

    #[error("Amount overflow while {0}")]
    AmountOverflow(String),

    #[error("Invalid grouping dimension '{0}': expected Total, business_unit or cost_center")]
    InvalidDimension(String),

    #[error("Invalid period selector '{0}': expected YYYY-MM")]
    InvalidPeriodSelector(String),

    #[error("Invalid driver count {0}: must be at least 1")]
    InvalidTopK(usize),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VarianceError>;
