use crate::schema::{JoinedRow, SignedRow, Sign};

/// Multiplier applied to a joined row. Unmapped rows are left as reported (+1).
pub fn effective_sign(row: &JoinedRow) -> Sign {
    row.sign().unwrap_or(Sign::Positive)
}

pub fn normalize_row(row: JoinedRow) -> SignedRow {
    let multiplier = effective_sign(&row).multiplier();
    SignedRow {
        actual_signed: row.fact.actual * multiplier,
        budget_signed: row.fact.budget * multiplier,
        prior_signed: row.fact.prior_year * multiplier,
        joined: row,
    }
}

pub fn normalize_signs(rows: Vec<JoinedRow>) -> Vec<SignedRow> {
    rows.into_iter().map(normalize_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FactRow, MappedAccount};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn joined(sign: Option<Sign>) -> JoinedRow {
        JoinedRow {
            fact: FactRow {
                account_code: "6000".to_string(),
                period: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                business_unit: None,
                cost_center: None,
                actual: dec!(120),
                budget: dec!(-100),
                prior_year: dec!(90),
            },
            mapping: sign.map(|sign| MappedAccount {
                category: "Opex".to_string(),
                subcategory: "Rent".to_string(),
                sign,
            }),
        }
    }

    #[test]
    fn test_negative_sign_flips_all_measures() {
        let signed = normalize_row(joined(Some(Sign::Negative)));
        assert_eq!(signed.actual_signed, dec!(-120));
        assert_eq!(signed.budget_signed, dec!(100));
        assert_eq!(signed.prior_signed, dec!(-90));
    }

    #[test]
    fn test_positive_sign_keeps_measures() {
        let signed = normalize_row(joined(Some(Sign::Positive)));
        assert_eq!(signed.actual_signed, dec!(120));
        assert_eq!(signed.budget_signed, dec!(-100));
        assert_eq!(signed.prior_signed, dec!(90));
    }

    #[test]
    fn test_unmapped_rows_pass_through_unchanged() {
        let row = joined(None);
        assert_eq!(effective_sign(&row), Sign::Positive);

        let signed = normalize_row(row);
        assert_eq!(signed.actual_signed, dec!(120));
        assert_eq!(signed.budget_signed, dec!(-100));
        assert_eq!(signed.prior_signed, dec!(90));
        assert!(!signed.joined.is_mapped());
    }

    #[test]
    fn test_normalize_signs_preserves_row_count() {
        let rows = vec![joined(None), joined(Some(Sign::Negative)), joined(Some(Sign::Positive))];
        assert_eq!(normalize_signs(rows).len(), 3);
    }
}
