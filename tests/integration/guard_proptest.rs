//! Property tests for the guard and row limits.

use proptest::prelude::*;
use warehouse_sandbox::safety::{validate_query, BLOCKED_KEYWORDS};

use super::common::TestWarehouse;

const WRITE_STATEMENTS: &[&str] = &[
    "INSERT INTO mart_pnl_report VALUES ('X', 'opex', '2024-03', 1, 1, 0, 0)",
    "UPDATE mart_pnl_report SET actual_usd = 0",
    "DELETE FROM fct_fx_rates",
    "REPLACE INTO seed_manifest VALUES ('seed', '0')",
    "DROP TABLE numbers",
    "CREATE TABLE shadow AS SELECT * FROM numbers",
    "ALTER TABLE numbers RENAME TO numbers_old",
    "CREATE INDEX idx_numbers ON numbers (n)",
    "ATTACH DATABASE 'shadow.db' AS shadow",
    "PRAGMA user_version = 7",
    "VACUUM",
    "REINDEX numbers",
    "ANALYZE",
    "BEGIN IMMEDIATE",
    "SELECT n INTO backup FROM numbers",
];

/// Ways of smuggling a statement past a naive prefix check.
fn wrap(statement: &str, variant: u8) -> String {
    match variant {
        0 => statement.to_string(),
        1 => format!("WITH x AS (SELECT 1) {statement}"),
        2 => format!("SELECT 1; {statement}"),
        3 => format!("SELECT * FROM ({statement})"),
        _ => format!("/* report */ {statement};"),
    }
}

fn blocked_keyword() -> impl Strategy<Value = &'static str> {
    prop::sample::select(
        BLOCKED_KEYWORDS
            .iter()
            .copied()
            .filter(|kw| *kw != "ANALYZE")
            .collect::<Vec<_>>(),
    )
}

/// Randomly re-cases each character.
fn recase(word: &str, mask: &[bool]) -> String {
    word.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
        .collect()
}

proptest! {
    #[test]
    fn blocked_keyword_anywhere_is_rejected(
        keyword in blocked_keyword(),
        mask in prop::collection::vec(any::<bool>(), 1..8),
        column in "[a-z]{1,8}",
    ) {
        let sql = format!("SELECT c_{column} FROM mart_pnl_report WHERE note = '{}'", recase(keyword, &mask));
        prop_assert!(validate_query(&sql).is_err(), "accepted: {}", sql);
    }

    #[test]
    fn leading_analyze_is_rejected(mask in prop::collection::vec(any::<bool>(), 1..8)) {
        let sql = format!("{} mart_pnl_report", recase("ANALYZE", &mask));
        prop_assert!(validate_query(&sql).is_err());
    }

    #[test]
    fn keyword_inside_identifier_is_accepted(
        keyword in blocked_keyword(),
        suffix in "[a-z]{1,6}",
    ) {
        let sql = format!(
            "SELECT c_{}_{suffix} FROM mart_pnl_report",
            keyword.to_lowercase()
        );
        prop_assert_eq!(validate_query(&sql), Ok(sql.clone()));
    }

    #[test]
    fn trailing_statement_is_rejected(tail in "[a-z]{1,8}") {
        let sql = format!("SELECT 1; {tail}");
        prop_assert!(validate_query(&sql).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn row_count_never_exceeds_max_rows(max_rows in 1usize..40, limit in 0usize..80) {
        let warehouse = TestWarehouse::new();
        let executor = warehouse.executor(max_rows);

        let result = executor.execute(&format!("SELECT n FROM numbers ORDER BY n LIMIT {limit}"));

        prop_assert!(result.is_ok());
        prop_assert_eq!(result.row_count, limit.min(max_rows));
        prop_assert_eq!(result.rows.len(), result.row_count);
        prop_assert_eq!(result.truncated, limit > max_rows);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn write_batch_leaves_file_untouched(
        batch in prop::collection::vec(
            (
                prop::sample::select(WRITE_STATEMENTS.to_vec()),
                prop::collection::vec(any::<bool>(), 1..8),
                0u8..5,
            ),
            1..8,
        ),
    ) {
        let warehouse = TestWarehouse::new();
        let before = warehouse.file_bytes();
        let executor = warehouse.executor(50);

        for (statement, mask, variant) in &batch {
            let sql = wrap(&recase(statement, mask), *variant);
            let result = executor.execute(&sql);
            prop_assert!(result.error.is_some(), "accepted: {}", sql);
            prop_assert_eq!(result.row_count, 0);
        }
        executor.close().unwrap();

        prop_assert_eq!(executor.audit_len(), batch.len());
        prop_assert_eq!(warehouse.file_bytes(), before);
    }
}
