use crate::error::{Result, VarianceError};
use crate::schema::{AccountMapping, FactRow, JoinedRow, MappedAccount, Sign};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Distinct account codes that had no chart-of-accounts entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedSet(BTreeSet<String>);

impl UnmappedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account_code: impl Into<String>) -> bool {
        self.0.insert(account_code.into())
    }

    pub fn contains(&self, account_code: &str) -> bool {
        self.0.contains(account_code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub rows: Vec<JoinedRow>,
    pub unmapped: UnmappedSet,
    /// Fact rows whose account code was not found.
    pub unmapped_row_count: usize,
}

/// Validated chart of accounts, keyed by account code.
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    entries: HashMap<String, MappedAccount>,
    order: Vec<String>,
}

impl ChartOfAccounts {
    /// Builds the lookup, rejecting signs other than +1/-1 and repeated codes.
    pub fn from_mappings(mappings: &[AccountMapping]) -> Result<Self> {
        let mut entries = HashMap::with_capacity(mappings.len());
        let mut order = Vec::with_capacity(mappings.len());

        for mapping in mappings {
            let sign =
                Sign::from_raw(mapping.sign).ok_or_else(|| VarianceError::InvalidSign {
                    account_code: mapping.account_code.clone(),
                    value: mapping.sign,
                })?;

            if entries.contains_key(&mapping.account_code) {
                return Err(VarianceError::DuplicateAccountCode(
                    mapping.account_code.clone(),
                ));
            }

            entries.insert(
                mapping.account_code.clone(),
                MappedAccount {
                    category: mapping.category.clone(),
                    subcategory: mapping.subcategory.clone(),
                    sign,
                },
            );
            order.push(mapping.account_code.clone());
        }

        debug!("Chart of accounts contains {} entries", entries.len());
        Ok(Self { entries, order })
    }

    pub fn lookup(&self, account_code: &str) -> Option<&MappedAccount> {
        self.entries.get(account_code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct categories in first-seen chart order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.order
            .iter()
            .filter_map(|code| self.entries.get(code))
            .map(|entry| entry.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }

    /// Left-joins fact rows on account code (exact, case-sensitive).
    ///
    /// Unmapped rows are kept with no mapping; their codes are collected but
    /// never fail the join.
    pub fn join(&self, facts: &[FactRow]) -> JoinOutcome {
        let mut unmapped = UnmappedSet::new();
        let mut unmapped_row_count = 0;

        let rows = facts
            .iter()
            .map(|fact| {
                let mapping = self.lookup(&fact.account_code).cloned();
                if mapping.is_none() {
                    unmapped.insert(fact.account_code.as_str());
                    unmapped_row_count += 1;
                }
                JoinedRow {
                    fact: fact.clone(),
                    mapping,
                }
            })
            .collect();

        if !unmapped.is_empty() {
            warn!(
                "{} account codes ({} rows) have no chart of accounts mapping: {}",
                unmapped.len(),
                unmapped_row_count,
                unmapped.to_vec().join(", ")
            );
        }

        JoinOutcome {
            rows,
            unmapped,
            unmapped_row_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn mapping(code: &str, category: &str, subcategory: &str, sign: i64) -> AccountMapping {
        AccountMapping {
            account_code: code.to_string(),
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            sign: Decimal::from(sign),
        }
    }

    fn fact(code: &str) -> FactRow {
        FactRow {
            account_code: code.to_string(),
            period: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            business_unit: None,
            cost_center: None,
            actual: dec!(100),
            budget: dec!(90),
            prior_year: dec!(80),
        }
    }

    #[test]
    fn test_chart_of_accounts_creation() {
        let chart = ChartOfAccounts::from_mappings(&[
            mapping("4000", "Revenue", "Product", 1),
            mapping("4100", "Revenue", "Services", 1),
            mapping("6000", "Opex", "Rent", -1),
        ])
        .unwrap();

        assert_eq!(chart.len(), 3);
        assert_eq!(chart.lookup("6000").unwrap().sign, Sign::Negative);
        assert_eq!(chart.categories(), vec!["Revenue", "Opex"]);
        assert!(chart.lookup("9999").is_none());
    }

    #[test]
    fn test_invalid_sign_is_rejected() {
        let result = ChartOfAccounts::from_mappings(&[mapping("4000", "Revenue", "Product", 2)]);
        match result {
            Err(VarianceError::InvalidSign { account_code, value }) => {
                assert_eq!(account_code, "4000");
                assert_eq!(value, dec!(2));
            }
            other => panic!("expected InvalidSign, got {:?}", other),
        }

        assert!(ChartOfAccounts::from_mappings(&[mapping("4000", "Revenue", "Product", 0)]).is_err());
    }

    #[test]
    fn test_duplicate_account_code_is_rejected() {
        let result = ChartOfAccounts::from_mappings(&[
            mapping("4000", "Revenue", "Product", 1),
            mapping("4000", "Revenue", "Services", 1),
        ]);
        assert!(matches!(result, Err(VarianceError::DuplicateAccountCode(code)) if code == "4000"));
    }

    #[test]
    fn test_join_keeps_unmapped_rows() {
        let chart = ChartOfAccounts::from_mappings(&[mapping("4000", "Revenue", "Product", 1)]).unwrap();
        let facts = vec![fact("4000"), fact("7777"), fact("7777"), fact("8888")];

        let outcome = chart.join(&facts);

        assert_eq!(outcome.rows.len(), facts.len());
        assert_eq!(outcome.unmapped.len(), 2);
        assert!(outcome.unmapped.contains("7777"));
        assert!(outcome.unmapped.contains("8888"));
        assert_eq!(outcome.unmapped_row_count, 3);

        assert_eq!(outcome.rows[0].category(), Some("Revenue"));
        assert_eq!(outcome.rows[1].category(), None);
        assert_eq!(outcome.rows[1].subcategory(), None);
        assert_eq!(outcome.rows[1].sign(), None);
    }

    #[test]
    fn test_join_is_case_sensitive() {
        let chart = ChartOfAccounts::from_mappings(&[mapping("ab-1", "Revenue", "Product", 1)]).unwrap();
        let outcome = chart.join(&[fact("AB-1")]);
        assert!(!outcome.rows[0].is_mapped());
        assert!(outcome.unmapped.contains("AB-1"));
    }
}
