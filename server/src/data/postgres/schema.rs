//! PostgreSQL schema and statements for the destination table

pub fn create_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    date_time VARCHAR(255) NOT NULL,
    metrics_name VARCHAR(255) NOT NULL,
    value NUMERIC NOT NULL
)"#
    )
}

pub fn create_unique_index(table: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_{table}_row ON {table} (date_time, metrics_name, value)"
    )
}

/// Insert-if-absent; `$3` is the fixed-point text, cast to NUMERIC
pub fn insert_if_absent(table: &str) -> String {
    format!(
        r#"
INSERT INTO {table} (date_time, metrics_name, value)
SELECT $1, $2, CAST($3 AS NUMERIC)
WHERE NOT EXISTS (
    SELECT 1 FROM {table}
    WHERE date_time = $1 AND metrics_name = $2 AND value = CAST($3 AS NUMERIC)
)
ON CONFLICT DO NOTHING"#
    )
}

pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reuses_positional_parameters() {
        let sql = insert_if_absent("monitoring");
        assert_eq!(sql.matches("$1").count(), 2);
        assert_eq!(sql.matches("$3").count(), 2);
        assert!(!sql.contains("$4"));
    }

    #[test]
    fn test_value_column_is_numeric() {
        assert!(create_table("monitoring").contains("value NUMERIC NOT NULL"));
    }
}
